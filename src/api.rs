//! Library entry point for running ad-hoc queries.
//!
//! Unlike [`crate::command`], runs started here are lenient: a file that
//! cannot be read or parsed is logged and left out of the results.
//!
//! ```no_run
//! # fn main() -> Result<(), oak_query::api::ApiError> {
//! use oak_query::api::{QueryBuilder, Reducer, RunConfig};
//!
//! let count = QueryBuilder::new()
//!     .language("go")
//!     .query("funcs", "(function_declaration name: (identifier) @name)")
//!     .run_with_reducer(&RunConfig::new().directory("./pkg").recursive(true), Reducer::Count)?;
//! println!("{count}");
//! # Ok(())
//! # }
//! ```

use crate::command::{render_template, RenderError};
use crate::lang::{Language, LanguageError};
use crate::results::ResultsByFile;
use crate::runner::{CancellationToken, RunError, RunOptions, Runner, DEFAULT_MAX_WORKERS};
use crate::sources::{build_globset, dedupe, expand_glob, scan_directory, SourceError};
use crate::ts::{QueryCompileError, QueryDefinition, QuerySet};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("language is required")]
    MissingLanguage,

    #[error("at least one query is required")]
    NoQueries,

    #[error("no files found to process")]
    NoFiles,

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML file {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error(transparent)]
    Query(#[from] QueryCompileError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("result reducer failed: {0}")]
    Reducer(#[source] BoxError),
}

/// Which files a run covers.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub files: Vec<PathBuf>,
    pub glob: Option<String>,
    pub directory: Option<PathBuf>,
    pub recursive: bool,
    pub max_workers: usize,
    pub cancellation: CancellationToken,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            glob: None,
            directory: None,
            recursive: false,
            max_workers: DEFAULT_MAX_WORKERS,
            cancellation: CancellationToken::default(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.glob = Some(pattern.into());
        self
    }

    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Explicit files first, then glob matches, then the directory scan.
/// Directory scans only pick up files of `language`. Repeated paths keep
/// their first position.
pub fn resolve_files(config: &RunConfig, language: Language) -> Result<Vec<PathBuf>, ApiError> {
    let mut files = config.files.clone();

    if let Some(pattern) = &config.glob {
        files.extend(expand_glob(pattern)?);
    }

    if let Some(dir) = &config.directory {
        let filter = build_globset(&language.default_globs())?;
        files.extend(scan_directory(dir, config.recursive, Some(&filter))?);
    }

    Ok(dedupe(files))
}

/// How [`QueryBuilder::run_with_reducer`] turns results into a value.
pub enum Reducer {
    /// Results by file as a JSON object
    Json,
    /// Total number of matches over every file and query
    Count,
    /// One line per capture: `file:line:column: query.capture text`
    Text,
    Custom(Box<dyn Fn(&ResultsByFile) -> Result<Value, BoxError> + Send + Sync>),
}

impl Reducer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ResultsByFile) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Reducer::Custom(Box::new(f))
    }

    pub fn reduce(&self, results: &ResultsByFile) -> Result<Value, ApiError> {
        match self {
            Reducer::Json => Ok(serde_json::to_value(results)?),
            Reducer::Count => {
                let count: usize = results
                    .iter()
                    .flat_map(|file| file.results.iter())
                    .map(|(_, result)| result.len())
                    .sum();
                Ok(json!(count))
            }
            Reducer::Text => {
                let lines: Vec<String> = results
                    .rows()
                    .into_iter()
                    .map(|row| {
                        format!(
                            "{}:{}:{}: {}.{} {}",
                            row.file,
                            row.start_row + 1,
                            row.start_column + 1,
                            row.query,
                            row.capture,
                            row.text
                        )
                    })
                    .collect();
                Ok(Value::String(lines.join("\n")))
            }
            Reducer::Custom(f) => f(results).map_err(ApiError::Reducer),
        }
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Json => f.write_str("Json"),
            Reducer::Count => f.write_str("Count"),
            Reducer::Text => f.write_str("Text"),
            Reducer::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Deserialize)]
struct QueryFile {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    queries: QueryList,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryList {
    Named(BTreeMap<String, String>),
    Listed(Vec<QueryDefinition>),
}

impl Default for QueryList {
    fn default() -> Self {
        QueryList::Listed(Vec::new())
    }
}

/// Collects a language and named queries, then runs them over files.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    language: Option<String>,
    queries: Vec<QueryDefinition>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, query: impl Into<String>) -> Self {
        self.queries.push(QueryDefinition::new(name, query));
        self
    }

    /// Add a query whose text is the content of `path`.
    pub fn query_file(self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ApiError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.query(name, text))
    }

    /// Add the queries of a YAML file, and take its language if it sets one.
    ///
    /// `queries` may be a mapping of name to query text or a list of
    /// `{name, query}` entries.
    pub fn from_yaml(mut self, path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ApiError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: QueryFile = serde_yaml::from_str(&content).map_err(|source| ApiError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(language) = file.language.filter(|l| !l.is_empty()) {
            self.language = Some(language);
        }
        match file.queries {
            QueryList::Named(named) => self
                .queries
                .extend(named.into_iter().map(|(name, query)| QueryDefinition::new(name, query))),
            QueryList::Listed(listed) => self.queries.extend(listed),
        }
        Ok(self)
    }

    pub fn queries(&self) -> &[QueryDefinition] {
        &self.queries
    }

    fn resolve_language(&self) -> Result<Language, ApiError> {
        let name = self.language.as_deref().ok_or(ApiError::MissingLanguage)?;
        Ok(Language::from_name(name)?)
    }

    /// Run every query over the configured files.
    pub fn run(&self, config: &RunConfig) -> Result<ResultsByFile, ApiError> {
        let language = self.resolve_language()?;
        if self.queries.is_empty() {
            return Err(ApiError::NoQueries);
        }

        let files = resolve_files(config, language)?;
        if files.is_empty() {
            return Err(ApiError::NoFiles);
        }
        debug!(language = language.name(), files = files.len(), "resolved files");

        let set = QuerySet::compile(language, &self.queries)?;
        let options = RunOptions::fail_soft()
            .with_max_workers(config.max_workers)
            .with_cancellation(config.cancellation.clone());

        Ok(Runner::new(options).run(&set, &files)?)
    }

    /// Run and render `template` with `Language` and `ResultsByFile`.
    pub fn run_with_template(&self, template: &str, config: &RunConfig) -> Result<String, ApiError> {
        let results = self.run(config)?;
        let data = json!({
            "Language": self.language.as_deref().unwrap_or_default(),
            "ResultsByFile": serde_json::to_value(&results)?,
        });
        Ok(render_template(template, data)?)
    }

    pub fn run_with_template_file(
        &self,
        template_path: impl AsRef<Path>,
        config: &RunConfig,
    ) -> Result<String, ApiError> {
        let path = template_path.as_ref();
        let template = fs::read_to_string(path).map_err(|source| ApiError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.run_with_template(&template, config)
    }

    pub fn run_with_reducer(&self, config: &RunConfig, reducer: Reducer) -> Result<Value, ApiError> {
        let results = self.run(config)?;
        reducer.reduce(&results)
    }
}
