//! Tree-sitter integration: parsing, query compilation and match
//! post-processing.
//!
//! Tree traversal and pattern matching are left to tree-sitter. This module
//! turns its raw match stream into filtered, merged [`crate::results::Match`]es.

pub mod errors;
pub mod parser;
pub mod predicates;
pub mod query;

pub use errors::{CompileErrorKind, QueryCompileError, TreeSitterError};
pub use parser::{node_text, ParsedSource, SourceParser};
pub use query::{CompiledQuery, QueryDefinition, QuerySet};
