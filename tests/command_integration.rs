//! YAML commands run end to end over a temporary Go project

use oak_query::command::{CommandError, CommandRows, RowFormat};
use oak_query::{QueryCommand, RunError, RunSettings};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const COMMAND: &str = r#"
name: funcs
short: List functions
language: go
flags:
  - name: prefix
    type: string
    default: ""
queries:
  - name: funcs
    query: |
      ((function_declaration name: (identifier) @name)
       (#match? @name "^{{ prefix }}"))
template: |
  {% for m in funcs.matches %}{{ m.name.text }}
  {% endfor %}
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pkg/inner")).unwrap();
    fs::write(dir.path().join("command.yaml"), COMMAND).unwrap();
    fs::write(
        dir.path().join("pkg/a.go"),
        "package pkg\n\nfunc Alpha() {}\nfunc beta() {}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("pkg/inner/b.go"),
        "package inner\n\nfunc Gamma() {}\n",
    )
    .unwrap();
    fs::write(dir.path().join("pkg/README.md"), "# docs\n").unwrap();
    dir
}

fn load(dir: &Path) -> QueryCommand {
    QueryCommand::load(dir.join("command.yaml")).unwrap()
}

fn render(command: &QueryCommand, settings: &RunSettings) -> String {
    let mut out = Vec::new();
    command.run_into_writer(settings, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_template_output_over_recursive_sources() {
    let dir = project();
    let command = load(dir.path());

    let settings = RunSettings {
        recurse: true,
        ..RunSettings::new(vec![dir.path().join("pkg")])
    };
    let out = render(&command, &settings);

    let names: Vec<&str> = out.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    assert_eq!(names, vec!["Alpha", "beta", "Gamma"]);
    assert!(out.ends_with('\n'));
}

#[test]
fn test_flags_parameterise_queries() {
    let dir = project();
    let command = load(dir.path());

    let settings = RunSettings::new(vec![dir.path().join("pkg/a.go")]).param("prefix", "[A-Z]");
    let out = render(&command, &settings);
    assert_eq!(out.trim(), "Alpha");
}

#[test]
fn test_rows_in_file_order() {
    let dir = project();
    let command = load(dir.path());

    let a = dir.path().join("pkg/a.go");
    let b = dir.path().join("pkg/inner/b.go");
    let rows = match command.rows(&RunSettings::new(vec![b.clone(), a.clone()])).unwrap() {
        CommandRows::Captures(rows) => rows,
        other => panic!("unexpected rows: {other:?}"),
    };

    let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["Gamma", "Alpha", "beta"]);
    assert_eq!(rows[0].file, b.display().to_string());

    let mut out = Vec::new();
    CommandRows::Captures(rows).write(&mut out, RowFormat::JsonLines).unwrap();
    let first: serde_json::Value =
        serde_json::from_str(String::from_utf8(out).unwrap().lines().next().unwrap()).unwrap();
    assert_eq!(first["text"], "Gamma");
    assert_eq!(first["capture"], "name");
    assert_eq!(first["type"], "identifier");
    assert_eq!(first["startRow"], 2);
}

#[test]
fn test_globs_select_directory_files() {
    let dir = project();
    let command = load(dir.path());

    let settings = RunSettings {
        globs: vec!["inner/*.go".to_string()],
        ..RunSettings::new(vec![dir.path().join("pkg")])
    };
    assert_eq!(render(&command, &settings).trim(), "Gamma");
}

#[test]
fn test_unreadable_source_aborts_the_run() {
    let dir = project();
    let command = load(dir.path());

    let settings = RunSettings::new(vec![
        dir.path().join("pkg/a.go"),
        dir.path().join("pkg/missing.go"),
    ]);
    let mut out = Vec::new();
    let err = command.run_into_writer(&settings, &mut out).unwrap_err();
    assert!(matches!(err, CommandError::Run(RunError::File(_))));
    assert!(out.is_empty());
}

#[test]
fn test_print_queries_renders_parameters() {
    let dir = project();
    let command = load(dir.path());

    let settings = RunSettings {
        print_queries: true,
        ..RunSettings::default()
    }
    .param("prefix", "Al");
    let out = render(&command, &settings);
    assert!(out.contains("^Al"));
    assert!(!out.contains("{{"));
}
