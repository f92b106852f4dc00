//! YAML-described query commands.
//!
//! A command bundles a language, parameterised queries, declared flags and
//! an output template. Running one is strict: the first file that cannot be
//! read or parsed aborts the whole run.

pub mod loader;
pub mod render;
pub mod schema;

pub use loader::{load_from_path, load_from_str, LoadError};
pub use render::{render_template, QueryTemplates, RenderError, RenderedQueries};
pub use schema::{CommandDescription, FlagDefinition, FlagType, ValidationError, ValidationIssue};

use crate::lang::{Language, LanguageError};
use crate::results::{CaptureRow, ResultsByFile};
use crate::runner::{
    CancellationToken, FailurePolicy, RunError, RunOptions, Runner, DEFAULT_MAX_WORKERS,
};
use crate::sources::{collect_sources, SourceError};
use crate::ts::{QueryCompileError, QueryDefinition, QuerySet};
use minijinja::Value as TemplateValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("unknown flag '{name}' for command {command}")]
    UnknownFlag { command: String, name: String },

    #[error("missing required flag '{name}'")]
    MissingFlag { name: String },

    #[error("{0}")]
    InvalidFlag(String),

    #[error("command {command} does not declare a language")]
    MissingLanguage { command: String },

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error("no sources provided")]
    NoSources,

    #[error(transparent)]
    Sources(#[from] SourceError),

    #[error(transparent)]
    Query(#[from] QueryCompileError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Per-invocation settings of a command.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub sources: Vec<PathBuf>,
    /// Raw `name=value` flag values, in command-line order.
    pub params: Vec<(String, String)>,
    /// Expand directories using the language's default globs.
    pub recurse: bool,
    /// Explicit globs for directory expansion; override `recurse` defaults.
    pub globs: Vec<String>,
    /// Print the rendered queries instead of running them.
    pub print_queries: bool,
    pub max_workers: usize,
    pub cancellation: CancellationToken,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            params: Vec::new(),
            recurse: false,
            globs: Vec::new(),
            print_queries: false,
            max_workers: DEFAULT_MAX_WORKERS,
            cancellation: CancellationToken::default(),
        }
    }
}

impl RunSettings {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Output of [`QueryCommand::rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRows {
    Queries(Vec<QueryDefinition>),
    Captures(Vec<CaptureRow>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RowFormat {
    /// One JSON object per line
    #[default]
    JsonLines,
    Json,
    Yaml,
}

impl CommandRows {
    pub fn len(&self) -> usize {
        match self {
            CommandRows::Queries(rows) => rows.len(),
            CommandRows::Captures(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write(&self, w: &mut dyn Write, format: RowFormat) -> Result<(), CommandError> {
        match self {
            CommandRows::Queries(rows) => write_rows(rows, w, format),
            CommandRows::Captures(rows) => write_rows(rows, w, format),
        }
    }
}

fn write_rows<T: serde::Serialize>(rows: &[T], w: &mut dyn Write, format: RowFormat) -> Result<(), CommandError> {
    match format {
        RowFormat::JsonLines => {
            for row in rows {
                serde_json::to_writer(&mut *w, row)?;
                writeln!(w)?;
            }
        }
        RowFormat::Json => {
            serde_json::to_writer_pretty(&mut *w, rows)?;
            writeln!(w)?;
        }
        RowFormat::Yaml => serde_yaml::to_writer(&mut *w, rows)?,
    }
    Ok(())
}

/// A loaded command, ready to run.
#[derive(Debug, Clone)]
pub struct QueryCommand {
    description: CommandDescription,
    templates: QueryTemplates,
}

impl QueryCommand {
    pub fn new(description: CommandDescription) -> Self {
        let templates = QueryTemplates::new(description.queries.clone());
        Self {
            description,
            templates,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CommandError> {
        Ok(Self::new(load_from_path(path)?))
    }

    pub fn description(&self) -> &CommandDescription {
        &self.description
    }

    pub fn language(&self) -> Result<Language, CommandError> {
        let name = self
            .description
            .language
            .as_deref()
            .ok_or_else(|| CommandError::MissingLanguage {
                command: self.description.name.clone(),
            })?;
        Ok(Language::from_name(name)?)
    }

    /// Resolve every declared flag from raw values, falling back to defaults.
    pub fn parameters(&self, raw: &[(String, String)]) -> Result<Map<String, Value>, CommandError> {
        let mut given: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, value) in raw {
            if self.description.flag(name).is_none() {
                return Err(CommandError::UnknownFlag {
                    command: self.description.name.clone(),
                    name: name.clone(),
                });
            }
            given.entry(name.as_str()).or_default().push(value.clone());
        }

        let mut params = Map::new();
        for flag in &self.description.flags {
            let value = match given.get(flag.name.as_str()) {
                Some(values) => flag.parse_value(values).map_err(CommandError::InvalidFlag)?,
                None if flag.required => {
                    return Err(CommandError::MissingFlag {
                        name: flag.name.clone(),
                    })
                }
                None => flag.default_value(),
            };
            params.insert(flag.name.clone(), value);
        }
        Ok(params)
    }

    /// Render the query texts with the resolved parameters.
    pub fn render_queries(&self, params: &Map<String, Value>) -> Result<RenderedQueries, CommandError> {
        Ok(self.templates.render(params)?)
    }

    fn results_by_file(
        &self,
        queries: &RenderedQueries,
        settings: &RunSettings,
    ) -> Result<ResultsByFile, CommandError> {
        if settings.sources.is_empty() {
            return Err(CommandError::NoSources);
        }

        let language = self.language()?;
        let globs = if settings.globs.is_empty() && settings.recurse {
            language.default_globs()
        } else {
            settings.globs.clone()
        };
        let files = collect_sources(&settings.sources, &globs)?;
        debug!(command = %self.description.name, files = files.len(), "resolved sources");

        let set = QuerySet::compile(language, queries.definitions())?;
        let options = RunOptions::default()
            .with_policy(FailurePolicy::FailFast)
            .with_max_workers(settings.max_workers)
            .with_cancellation(settings.cancellation.clone());

        Ok(Runner::new(options).run(&set, &files)?)
    }

    /// Run the command and write its rendered template to `w`.
    pub fn run_into_writer(&self, settings: &RunSettings, w: &mut dyn Write) -> Result<(), CommandError> {
        let params = self.parameters(&settings.params)?;
        let queries = self.render_queries(&params)?;

        if settings.print_queries {
            queries.write_yaml(w)?;
            return Ok(());
        }

        let by_file = self.results_by_file(&queries, settings)?;
        let all = by_file.aggregate();

        let mut data: BTreeMap<String, TemplateValue> = BTreeMap::new();
        for (name, result) in all.iter() {
            data.insert(name.to_string(), TemplateValue::from_serialize(result));
        }
        for (name, value) in &params {
            data.insert(name.clone(), TemplateValue::from_serialize(value));
        }
        data.insert("Results".to_string(), TemplateValue::from_serialize(&all));
        data.insert("ResultsByFile".to_string(), TemplateValue::from_serialize(&by_file));

        let rendered = render_template(&self.description.template, &data)?;
        writeln!(w, "{}", rendered.trim())?;
        Ok(())
    }

    /// Run the command and return one row per capture, in input-file order.
    pub fn rows(&self, settings: &RunSettings) -> Result<CommandRows, CommandError> {
        let params = self.parameters(&settings.params)?;
        let queries = self.render_queries(&params)?;

        if settings.print_queries {
            return Ok(CommandRows::Queries(queries.into_definitions()));
        }

        let by_file = self.results_by_file(&queries, settings)?;
        Ok(CommandRows::Captures(by_file.rows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(flags: &str) -> QueryCommand {
        let yaml = format!(
            r#"
name: test
language: go
flags:
{flags}
queries:
  - name: funcs
    query: |
      (function_declaration name: (identifier) @name)
template: "{{{{ Results.funcs.matches | length }}}}"
"#
        );
        QueryCommand::new(load_from_str(&yaml).unwrap())
    }

    const FLAGS: &str = "  - name: limit\n    type: int\n    default: 3\n  - name: tags\n    type: string-list\n";

    #[test]
    fn parameters_use_defaults_and_overrides() {
        let cmd = command(FLAGS);
        let params = cmd.parameters(&[]).unwrap();
        assert_eq!(params["limit"], json!(3));
        assert_eq!(params["tags"], json!([]));

        let raw = vec![
            ("limit".to_string(), "9".to_string()),
            ("tags".to_string(), "a".to_string()),
            ("tags".to_string(), "b".to_string()),
        ];
        let params = cmd.parameters(&raw).unwrap();
        assert_eq!(params["limit"], json!(9));
        assert_eq!(params["tags"], json!(["a", "b"]));
    }

    #[test]
    fn unknown_and_invalid_flags_are_rejected() {
        let cmd = command(FLAGS);
        let err = cmd
            .parameters(&[("nope".to_string(), "1".to_string())])
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownFlag { .. }));

        let err = cmd
            .parameters(&[("limit".to_string(), "many".to_string())])
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidFlag(_)));
    }

    #[test]
    fn required_flag_must_be_given() {
        let cmd = command("  - name: who\n    required: true\n");
        assert!(matches!(
            cmd.parameters(&[]),
            Err(CommandError::MissingFlag { .. })
        ));
    }

    #[test]
    fn print_queries_skips_execution() {
        let cmd = command(FLAGS);
        let settings = RunSettings {
            print_queries: true,
            ..RunSettings::default()
        };

        let mut out = Vec::new();
        cmd.run_into_writer(&settings, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("name: funcs"));

        match cmd.rows(&settings).unwrap() {
            CommandRows::Queries(rows) => assert_eq!(rows[0].name, "funcs"),
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[test]
    fn running_without_sources_fails() {
        let cmd = command(FLAGS);
        let mut out = Vec::new();
        let err = cmd.run_into_writer(&RunSettings::default(), &mut out).unwrap_err();
        assert!(matches!(err, CommandError::NoSources));
    }
}
