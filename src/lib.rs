//! Oak: structural queries over source trees
//!
//! Runs tree-sitter pattern queries against many files at once and collects
//! the matched sub-trees as named captures, aggregated per query across the
//! whole run.
//!
//! # Architecture
//!
//! Query texts are compiled once per language into a [`QuerySet`].
//! Predicates (`eq?`, `not-eq?`, `match?`, `not-match?`) are lifted out of
//! the pattern text and evaluated here rather than by tree-sitter. The
//! [`Runner`] fans files out over a bounded worker pool and reassembles the
//! per-file [`QueryResults`] in input order. Syntax trees can also be dumped
//! as text, XML, JSON or YAML for inspection.
//!
//! Two entry points sit on top:
//!
//! - [`command`]: YAML-described commands. Strict, the first bad file
//!   aborts the run.
//! - [`api`]: the [`QueryBuilder`]. Lenient, bad files are logged and
//!   skipped.
//!
//! # Example
//!
//! ```no_run
//! use oak_query::{Language, QueryDefinition, QuerySet, RunOptions, Runner};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let queries = QuerySet::compile(
//!     Language::from_name("go")?,
//!     &[QueryDefinition::new(
//!         "exported",
//!         r#"((function_declaration name: (identifier) @name) (#match? @name "^[A-Z]"))"#,
//!     )],
//! )?;
//!
//! let files = vec![PathBuf::from("main.go")];
//! let by_file = Runner::new(RunOptions::default()).run(&queries, &files)?;
//! for row in by_file.rows() {
//!     println!("{}:{} {}", row.file, row.start_row + 1, row.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod command;
pub mod dump;
pub mod lang;
pub mod logging;
pub mod results;
pub mod runner;
pub mod sources;
pub mod ts;

// Re-exports
pub use api::{ApiError, QueryBuilder, Reducer, RunConfig};
pub use command::{CommandError, QueryCommand, RunSettings};
pub use dump::{DumpError, DumpOptions, Format};
pub use lang::{Language, LanguageError};
pub use results::{Capture, CaptureRow, Match, Position, QueryResult, QueryResults, ResultsByFile};
pub use runner::{
    CancellationToken, FailurePolicy, FileError, RunError, RunOptions, Runner, DEFAULT_MAX_WORKERS,
};
pub use ts::{
    CompileErrorKind, QueryCompileError, QueryDefinition, QuerySet, SourceParser, TreeSitterError,
};
