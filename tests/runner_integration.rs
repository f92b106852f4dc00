//! Multi-file runs over real files on disk

use oak_query::{
    FailurePolicy, FileError, Language, QueryDefinition, QuerySet, RunError, RunOptions, Runner,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn go_project(count: usize) -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let files = (0..count)
        .map(|i| {
            let path = dir.path().join(format!("f{i:03}.go"));
            fs::write(&path, format!("package p\n\nfunc F{i}() {{}}\n")).unwrap();
            path
        })
        .collect();
    (dir, files)
}

fn funcs() -> QuerySet {
    QuerySet::compile(
        Language::from_name("go").unwrap(),
        &[QueryDefinition::new(
            "funcs",
            "(function_declaration name: (identifier) @name)",
        )],
    )
    .unwrap()
}

#[test]
fn test_aggregate_keeps_input_order() {
    let (_dir, mut files) = go_project(40);
    files.reverse();

    let by_file = Runner::new(RunOptions::default().with_max_workers(8))
        .run(&funcs(), &files)
        .unwrap();

    let names: Vec<String> = by_file
        .aggregate()
        .get("funcs")
        .unwrap()
        .matches
        .iter()
        .map(|m| m.get("name").unwrap().text.clone())
        .collect();
    let expected: Vec<String> = (0..40).rev().map(|i| format!("F{i}")).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_rows_follow_file_order() {
    let (_dir, files) = go_project(3);
    let by_file = Runner::default().run(&funcs(), &files).unwrap();

    let rows = by_file.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].file, files[0].display().to_string());
    assert_eq!(rows[2].text, "F2");
    assert_eq!(rows[0].query, "funcs");
    assert_eq!(rows[0].capture, "name");
    assert_eq!(rows[0].kind, "identifier");
    assert_eq!((rows[0].start_row, rows[0].start_column), (2, 5));
}

#[test]
fn test_fail_soft_and_fail_fast_differ() {
    let (dir, mut files) = go_project(2);
    files.insert(1, dir.path().join("missing.go"));

    let lenient = Runner::new(RunOptions::fail_soft()).run(&funcs(), &files).unwrap();
    assert_eq!(lenient.len(), 2);
    assert!(lenient.get(&files[1]).is_none());

    let strict = Runner::new(RunOptions::default().with_policy(FailurePolicy::FailFast));
    match strict.run(&funcs(), &files) {
        Err(RunError::File(FileError::Read { path, .. })) => assert_eq!(path, files[1]),
        other => panic!("expected read error, got {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_detecting_languages_per_file() {
    let dir = TempDir::new().unwrap();
    let go = dir.path().join("main.go");
    let python = dir.path().join("tool.py");
    let text = dir.path().join("notes.txt");
    fs::write(&go, "package main\n\n// go comment\nfunc main() {}\n").unwrap();
    fs::write(&python, "# python comment\nprint(1)\n").unwrap();
    fs::write(&text, "plain text\n").unwrap();

    let definitions = [QueryDefinition::new("comments", "(comment) @c")];
    let files = vec![go.clone(), python.clone(), text.clone()];

    let by_file = Runner::new(RunOptions::fail_soft())
        .run_detecting(&definitions, &files)
        .unwrap();
    assert_eq!(by_file.len(), 2);

    let go_comment = &by_file.get(&go).unwrap().get("comments").unwrap().matches[0];
    assert_eq!(go_comment.get("c").unwrap().text, "// go comment");
    let py_comment = &by_file.get(&python).unwrap().get("comments").unwrap().matches[0];
    assert_eq!(py_comment.get("c").unwrap().text, "# python comment");

    let err = Runner::default().run_detecting(&definitions, &files).unwrap_err();
    assert!(matches!(err, RunError::File(FileError::Language { .. })));
}

#[test]
fn test_query_that_only_fails_for_one_language() {
    let dir = TempDir::new().unwrap();
    let go = dir.path().join("main.go");
    let rust = dir.path().join("lib.rs");
    fs::write(&go, "package main\n\nfunc main() {}\n").unwrap();
    fs::write(&rust, "fn main() {}\n").unwrap();

    let definitions = [QueryDefinition::new("fns", "(function_item) @f")];
    let by_file = Runner::new(RunOptions::fail_soft())
        .run_detecting(&definitions, &[go.clone(), rust.clone()])
        .unwrap();

    assert!(by_file.get(&go).is_none());
    assert_eq!(by_file.get(&rust).unwrap().get("fns").unwrap().len(), 1);
}
