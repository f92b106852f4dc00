use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use oak_query::api::Reducer;
use oak_query::command::{render_template, QueryCommand, RowFormat, RunSettings};
use oak_query::dump::{dump_tree, DumpOptions, Format};
use oak_query::logging::{self, LogFormat};
use oak_query::ts::SourceParser;
use oak_query::{
    Language, QueryDefinition, QuerySet, ResultsByFile, RunOptions, Runner, DEFAULT_MAX_WORKERS,
};
use serde_json::Map;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "oak")]
#[command(about = "Structural queries over source trees", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. "info", "oak_query=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an ad-hoc query over files
    Query {
        /// File holding the query text, or "-" for stdin
        #[arg(short, long)]
        query: String,

        /// Language of every file (detected per file if omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// Name the query's results are stored under
        #[arg(short, long, default_value = "query")]
        name: String,

        /// Template file to render the results with
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Maximum number of files processed at once
        #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
        workers: usize,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a YAML command description over sources
    Run {
        /// Path to the command YAML file
        command: PathBuf,

        /// Flag value as name=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Expand directories with the language's default globs
        #[arg(short, long)]
        recursive: bool,

        /// Glob used to expand directories (repeatable)
        #[arg(short, long = "glob")]
        globs: Vec<String>,

        /// Print the rendered queries instead of running them
        #[arg(long)]
        print_queries: bool,

        /// Emit one row per capture instead of the rendered template
        #[arg(long)]
        rows: bool,

        #[arg(long, value_enum, default_value_t = RowFormat::JsonLines)]
        row_format: RowFormat,

        /// Maximum number of files processed at once
        #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
        workers: usize,

        sources: Vec<PathBuf>,
    },

    /// Print the syntax tree of a file
    Dump {
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Include byte offsets
        #[arg(long)]
        show_bytes: bool,

        /// Leave out node source text
        #[arg(long)]
        no_content: bool,

        /// Leave out named/missing/extra/error flags
        #[arg(long)]
        no_attributes: bool,

        /// Keep whitespace-only nodes
        #[arg(long)]
        keep_whitespace: bool,

        /// Language of the file (detected from its name if omitted)
        #[arg(short, long)]
        language: Option<String>,

        file: PathBuf,
    },

    /// List supported languages
    Languages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
    /// One line per capture
    Text,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, cli.log_format) {
        eprintln!("{} {}", "error:".red(), e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Query {
            query,
            language,
            name,
            template,
            format,
            workers,
            files,
        } => cmd_query(
            &query,
            language.as_deref(),
            name,
            template.as_deref(),
            format,
            workers,
            &files,
        ),

        Commands::Run {
            command,
            params,
            recursive,
            globs,
            print_queries,
            rows,
            row_format,
            workers,
            sources,
        } => {
            let settings = RunSettings {
                sources,
                params,
                recurse: recursive,
                globs,
                print_queries,
                max_workers: workers,
                ..RunSettings::default()
            };
            cmd_run(&command, &settings, rows.then_some(row_format))
        }

        Commands::Dump {
            format,
            show_bytes,
            no_content,
            no_attributes,
            keep_whitespace,
            language,
            file,
        } => {
            let options = DumpOptions {
                show_bytes,
                show_content: !no_content,
                show_attributes: !no_attributes,
                skip_whitespace: !keep_whitespace,
            };
            cmd_dump(&file, language.as_deref(), format, &options)
        }

        Commands::Languages => cmd_languages(),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red(), e);
        std::process::exit(1);
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

fn read_query_text(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read query from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(source).with_context(|| format!("Failed to read query file {source}"))
}

fn cmd_query(
    query: &str,
    language: Option<&str>,
    name: String,
    template: Option<&Path>,
    format: OutputFormat,
    workers: usize,
    files: &[PathBuf],
) -> Result<()> {
    let text = read_query_text(query)?;
    if text.trim().is_empty() {
        bail!("Query text is empty");
    }
    let definitions = vec![QueryDefinition::new(name.clone(), text)];
    let runner = Runner::new(RunOptions::fail_soft().with_max_workers(workers));

    let by_file = match language {
        Some(language) => {
            let queries = QuerySet::compile(Language::from_name(language)?, &definitions)?;
            runner.run(&queries, files)?
        }
        None => runner.run_detecting(&definitions, files)?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(path) = template {
        let template = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        let all = by_file.aggregate();
        let mut data = Map::new();
        data.insert(name.clone(), serde_json::to_value(all.get(&name))?);
        data.insert("Results".to_string(), serde_json::to_value(&all)?);
        data.insert("ResultsByFile".to_string(), serde_json::to_value(&by_file)?);
        writeln!(out, "{}", render_template(&template, data)?.trim())?;
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &by_file)?;
            writeln!(out)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut out, &by_file)?,
        OutputFormat::Text => {
            if let Some(lines) = Reducer::Text.reduce(&by_file)?.as_str() {
                if !lines.is_empty() {
                    writeln!(out, "{lines}")?;
                }
            }
        }
    }

    print_summary(&by_file, files.len());
    Ok(())
}

fn print_summary(by_file: &ResultsByFile, requested: usize) {
    let matches: usize = by_file
        .iter()
        .flat_map(|file| file.results.iter())
        .map(|(_, result)| result.len())
        .sum();
    eprintln!(
        "{}",
        format!(
            "{} matches in {} of {} files",
            matches,
            by_file.len(),
            requested
        )
        .dimmed()
    );
    if by_file.len() < requested {
        eprintln!(
            "{}",
            format!("{} files skipped", requested - by_file.len()).yellow()
        );
    }
}

fn cmd_run(command: &Path, settings: &RunSettings, rows: Option<RowFormat>) -> Result<()> {
    let command = QueryCommand::load(command)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match rows {
        Some(format) => command.rows(settings)?.write(&mut out, format)?,
        None => command.run_into_writer(settings, &mut out)?,
    }
    Ok(())
}

fn cmd_dump(file: &Path, language: Option<&str>, format: Format, options: &DumpOptions) -> Result<()> {
    let language = match language {
        Some(name) => Language::from_name(name)?,
        None => Language::for_path(file)?,
    };
    let source = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let mut parser = SourceParser::new(language)?;
    let parsed = parser.parse_source(source)?;
    if parsed.has_errors() {
        eprintln!(
            "{}",
            format!("Warning: {} contains syntax errors", file.display()).yellow()
        );
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dump_tree(&parsed.tree, &parsed.source, &mut out, format, options)?;
    Ok(())
}

fn cmd_languages() -> Result<()> {
    for language in Language::all() {
        println!(
            "{:<12} {}",
            language.name(),
            language.default_globs().join(" ").dimmed()
        );
    }
    Ok(())
}
