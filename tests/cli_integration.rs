//! Integration tests for the `oak` binary

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn oak(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oak"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Helper to create a directory with Go sources, a query and a command
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("main.go"),
        "package main\n\nfunc main() {}\n\nfunc helper() {}\n",
    )
    .unwrap();

    fs::write(
        dir.path().join("funcs.scm"),
        "(function_declaration name: (identifier) @name)\n",
    )
    .unwrap();

    fs::write(
        dir.path().join("command.yaml"),
        r#"name: funcs
language: go
queries:
  - name: funcs
    query: "(function_declaration name: (identifier) @name)"
template: "{{ funcs.matches | length }} functions"
"#,
    )
    .unwrap();

    dir
}

#[test]
fn test_help_lists_subcommands() {
    let output = oak(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for sub in ["query", "run", "dump", "languages"] {
        assert!(text.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn test_languages() {
    let output = oak(&["languages"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.lines().any(|l| l.starts_with("go ")));
    assert!(text.lines().any(|l| l.starts_with("rust ")));
}

#[test]
fn test_query_text_output() {
    let dir = setup_workspace();
    let query = dir.path().join("funcs.scm");
    let file = dir.path().join("main.go");

    let output = oak(&[
        "query",
        "-q",
        query.to_str().unwrap(),
        "-n",
        "funcs",
        "--format",
        "text",
        file.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(":3:6: funcs.name main"));
    assert!(lines[1].ends_with(":5:6: funcs.name helper"));
    assert!(stderr(&output).contains("2 matches in 1 of 1 files"));
}

#[test]
fn test_query_json_output() {
    let dir = setup_workspace();
    let query = dir.path().join("funcs.scm");
    let file = dir.path().join("main.go");

    let output = oak(&[
        "query",
        "-q",
        query.to_str().unwrap(),
        "-l",
        "go",
        file.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let matches = &value[file.to_str().unwrap()]["query"]["matches"];
    assert_eq!(matches[1]["name"]["text"], "helper");
    assert_eq!(matches[1]["name"]["type"], "identifier");
}

#[test]
fn test_query_with_template() {
    let dir = setup_workspace();
    let query = dir.path().join("funcs.scm");
    let template = dir.path().join("names.j2");
    fs::write(
        &template,
        "{% for m in funcs.matches %}{{ m.name.text }} {% endfor %}",
    )
    .unwrap();

    let output = oak(&[
        "query",
        "-q",
        query.to_str().unwrap(),
        "-n",
        "funcs",
        "-t",
        template.to_str().unwrap(),
        dir.path().join("main.go").to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "main helper\n");
}

#[test]
fn test_run_command() {
    let dir = setup_workspace();
    let output = oak(&[
        "run",
        dir.path().join("command.yaml").to_str().unwrap(),
        "-r",
        dir.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "2 functions\n");
}

#[test]
fn test_run_rows() {
    let dir = setup_workspace();
    let output = oak(&[
        "run",
        dir.path().join("command.yaml").to_str().unwrap(),
        "--rows",
        dir.path().join("main.go").to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["text"], "main");
    assert_eq!(rows[1]["startRow"], 4);
}

#[test]
fn test_run_rejects_unknown_param() {
    let dir = setup_workspace();
    let output = oak(&[
        "run",
        dir.path().join("command.yaml").to_str().unwrap(),
        "--param",
        "nope=1",
        dir.path().join("main.go").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown flag 'nope'"));
}

#[test]
fn test_dump_json() {
    let dir = setup_workspace();
    let output = oak(&[
        "dump",
        "--format",
        "json",
        dir.path().join("main.go").to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let doc: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["type"], "source_file");
    assert_eq!(doc["named"], true);
}

#[test]
fn test_dump_unknown_language_fails() {
    let dir = setup_workspace();
    let notes = dir.path().join("notes.unknown");
    fs::write(&notes, "text").unwrap();

    let output = oak(&["dump", notes.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error:"));
}

#[test]
fn test_missing_query_file_fails() {
    let dir = setup_workspace();
    let output = oak(&[
        "query",
        "-q",
        "/no/such/query.scm",
        dir.path().join("main.go").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to read query file"));
}
