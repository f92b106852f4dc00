//! Concurrent multi-file runner.
//!
//! Files are parsed and queried on a dedicated rayon pool sized to
//! `max_workers`. Per-file results are buffered by input index and folded
//! into a [`ResultsByFile`] in a single-threaded pass once every task has
//! joined, so output order is the input order and never completion order.

use crate::lang::{Language, LanguageError};
use crate::results::{QueryResults, ResultsByFile};
use crate::ts::{QueryCompileError, QueryDefinition, QuerySet, SourceParser, TreeSitterError};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_WORKERS: usize = 4;

/// What to do when one file cannot be read, parsed or queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run on the first file error.
    #[default]
    FailFast,
    /// Log the error, skip the file and keep going.
    FailSoft,
}

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_workers: usize,
    pub policy: FailurePolicy,
    pub cancellation: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            policy: FailurePolicy::default(),
            cancellation: CancellationToken::default(),
        }
    }
}

impl RunOptions {
    pub fn fail_soft() -> Self {
        Self {
            policy: FailurePolicy::FailSoft,
            ..Self::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source}")]
    Language {
        path: PathBuf,
        #[source]
        source: LanguageError,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TreeSitterError,
    },

    #[error("{}: {source}", .path.display())]
    Query {
        path: PathBuf,
        #[source]
        source: QueryCompileError,
    },
}

impl FileError {
    pub fn path(&self) -> &Path {
        match self {
            FileError::Read { path, .. }
            | FileError::Language { path, .. }
            | FileError::Parse { path, .. }
            | FileError::Query { path, .. } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("run cancelled")]
    Cancelled,

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs compiled queries over many files with bounded concurrency.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    options: RunOptions,
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run one query set, compiled for a single language, over `files`.
    pub fn run(&self, queries: &QuerySet, files: &[PathBuf]) -> Result<ResultsByFile, RunError> {
        self.run_with(files, |path| process_file(queries, path))
    }

    /// Run query definitions over files of mixed languages.
    ///
    /// Each file's language is detected from its name and the definitions
    /// are compiled once per language before any file is processed. A
    /// definition that does not compile for a language fails every file of
    /// that language.
    pub fn run_detecting(
        &self,
        definitions: &[QueryDefinition],
        files: &[PathBuf],
    ) -> Result<ResultsByFile, RunError> {
        let mut sets: HashMap<&'static str, Result<QuerySet, QueryCompileError>> = HashMap::new();
        for path in files {
            if let Ok(language) = Language::for_path(path) {
                sets.entry(language.name())
                    .or_insert_with(|| QuerySet::compile(language, definitions));
            }
        }

        self.run_with(files, |path| {
            let language = Language::for_path(path).map_err(|source| FileError::Language {
                path: path.to_path_buf(),
                source,
            })?;
            match sets.get(language.name()) {
                Some(Ok(queries)) => process_file(queries, path),
                Some(Err(e)) => Err(FileError::Query {
                    path: path.to_path_buf(),
                    source: e.clone(),
                }),
                None => Err(FileError::Language {
                    path: path.to_path_buf(),
                    source: LanguageError::UnknownFile {
                        path: path.display().to_string(),
                    },
                }),
            }
        })
    }

    /// Fan `task` out over `files` and reassemble the results in input order.
    pub(crate) fn run_with<F>(&self, files: &[PathBuf], task: F) -> Result<ResultsByFile, RunError>
    where
        F: Fn(&Path) -> Result<QueryResults, FileError> + Sync,
    {
        let workers = self.options.max_workers.max(1);
        let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
        let cancellation = &self.options.cancellation;
        let policy = self.options.policy;

        info!(files = files.len(), workers, ?policy, "starting run");

        let buffered: Vec<Option<QueryResults>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if cancellation.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    match task(path) {
                        Ok(results) => {
                            debug!(file = %path.display(), queries = results.len(), "processed file");
                            Ok(Some(results))
                        }
                        Err(e) if policy == FailurePolicy::FailSoft => {
                            warn!(file = %path.display(), error = %e, "skipping file");
                            Ok(None)
                        }
                        Err(e) => Err(RunError::File(e)),
                    }
                })
                .collect::<Result<Vec<_>, RunError>>()
        })?;

        if cancellation.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let mut by_file = ResultsByFile::new();
        for (path, results) in files.iter().zip(buffered) {
            if let Some(results) = results {
                by_file.push(path.clone(), results);
            }
        }
        Ok(by_file)
    }
}

/// Read, parse and query one file.
pub fn process_file(queries: &QuerySet, path: &Path) -> Result<QueryResults, FileError> {
    let source = fs::read(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut parser = SourceParser::new(queries.language()).map_err(parse_error)?;
    let parsed = parser.parse_source(source).map_err(parse_error)?;

    Ok(queries.execute(parsed.root_node(), &parsed.source))
}
