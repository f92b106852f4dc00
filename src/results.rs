//! Result model: captures, matches, per-query results and their aggregation
//! across files.
//!
//! Matches are shared behind [`Arc`] so that cloning a [`QueryResult`] copies
//! the match list but not the matches themselves.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Zero-based row/column location in a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<tree_sitter::Point> for Position {
    fn from(point: tree_sitter::Point) -> Self {
        Self {
            row: point.row,
            column: point.column,
        }
    }
}

/// One sub-tree bound to a query capture variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    /// Capture variable name, without the leading `@`
    pub name: String,
    /// Source text of the captured node
    pub text: String,
    /// Grammar node kind
    #[serde(rename = "type")]
    pub kind: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Position,
    pub end_point: Position,
}

impl Capture {
    pub(crate) fn from_node(name: &str, node: tree_sitter::Node<'_>, source: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            text: crate::ts::parser::node_text(node, source),
            kind: node.kind().to_string(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_point: node.start_position().into(),
            end_point: node.end_position().into(),
        }
    }

    /// Extend this capture with a later occurrence of the same variable.
    ///
    /// Text is joined with a newline; the start stays, the end moves to the
    /// later occurrence.
    pub fn absorb(&mut self, later: &Capture) {
        self.text.push('\n');
        self.text.push_str(&later.text);
        self.end_byte = later.end_byte;
        self.end_point = later.end_point;
    }
}

/// One pattern occurrence: capture variable name to capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Match {
    captures: BTreeMap<String, Capture>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capture, merging it into an existing capture of the same name.
    pub fn insert(&mut self, capture: Capture) {
        match self.captures.entry(capture.name.clone()) {
            btree_map::Entry::Occupied(mut existing) => existing.get_mut().absorb(&capture),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(capture);
            }
        }
    }

    /// Insert a capture, replacing any existing capture of the same name.
    pub fn insert_replacing(&mut self, capture: Capture) {
        self.captures.insert(capture.name.clone(), capture);
    }

    pub fn get(&self, name: &str) -> Option<&Capture> {
        self.captures.get(name)
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn captures(&self) -> impl Iterator<Item = &Capture> {
        self.captures.values()
    }
}

impl FromIterator<Capture> for Match {
    fn from_iter<I: IntoIterator<Item = Capture>>(iter: I) -> Self {
        let mut m = Match::new();
        for capture in iter {
            m.insert(capture);
        }
        m
    }
}

/// Output of one query over one or more files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query_name: String,
    pub matches: Vec<Arc<Match>>,
}

impl QueryResult {
    pub fn new(query_name: impl Into<String>, matches: Vec<Match>) -> Self {
        Self {
            query_name: query_name.into(),
            matches: matches.into_iter().map(Arc::new).collect(),
        }
    }

    /// Copy the match list; the matches themselves are shared.
    pub fn shallow_clone(&self) -> Self {
        Self {
            query_name: self.query_name.clone(),
            matches: self.matches.clone(),
        }
    }

    /// Append another result's matches after this result's matches.
    pub fn append(&mut self, other: &QueryResult) {
        self.matches.extend(other.matches.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Results for every query, keyed by query name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryResults {
    results: BTreeMap<String, QueryResult>,
}

impl QueryResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: QueryResult) {
        self.results.insert(result.query_name.clone(), result);
    }

    pub fn get(&self, query_name: &str) -> Option<&QueryResult> {
        self.results.get(query_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryResult)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Fold another file's results into this aggregate.
    ///
    /// A query seen for the first time is shallow-cloned in; later results for
    /// the same query only have their matches appended.
    pub fn merge(&mut self, other: &QueryResults) {
        for (name, result) in &other.results {
            match self.results.get_mut(name) {
                Some(existing) => existing.append(result),
                None => {
                    self.results.insert(name.clone(), result.shallow_clone());
                }
            }
        }
    }
}

impl FromIterator<QueryResult> for QueryResults {
    fn from_iter<I: IntoIterator<Item = QueryResult>>(iter: I) -> Self {
        let mut results = QueryResults::new();
        for result in iter {
            results.insert(result);
        }
        results
    }
}

/// Results of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResults {
    pub path: PathBuf,
    pub results: QueryResults,
}

/// Per-file results, kept in input-file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsByFile {
    files: Vec<FileResults>,
}

impl ResultsByFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, results: QueryResults) {
        self.files.push(FileResults {
            path: path.into(),
            results,
        });
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&QueryResults> {
        let path = path.as_ref();
        self.files
            .iter()
            .find(|file| file.path == path)
            .map(|file| &file.results)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileResults> {
        self.files.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|file| file.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Concatenate every query's matches across files, in file order.
    pub fn aggregate(&self) -> QueryResults {
        let mut all = QueryResults::new();
        for file in &self.files {
            all.merge(&file.results);
        }
        all
    }

    /// One flat row per capture, in file order.
    pub fn rows(&self) -> Vec<CaptureRow> {
        let mut rows = Vec::new();
        for file in &self.files {
            let file_name = file.path.display().to_string();
            for (query_name, result) in file.results.iter() {
                for m in &result.matches {
                    for capture in m.captures() {
                        rows.push(CaptureRow::new(&file_name, query_name, capture));
                    }
                }
            }
        }
        rows
    }
}

impl Serialize for ResultsByFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            map.serialize_entry(&file.path.display().to_string(), &file.results)?;
        }
        map.end()
    }
}

/// Flat, per-capture view of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRow {
    pub file: String,
    pub query: String,
    pub capture: String,
    pub start_row: usize,
    pub start_column: usize,
    pub end_row: usize,
    pub end_column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl CaptureRow {
    fn new(file: &str, query: &str, capture: &Capture) -> Self {
        Self {
            file: file.to_string(),
            query: query.to_string(),
            capture: capture.name.clone(),
            start_row: capture.start_point.row,
            start_column: capture.start_point.column,
            end_row: capture.end_point.row,
            end_column: capture.end_point.column,
            start_byte: capture.start_byte,
            end_byte: capture.end_byte,
            kind: capture.kind.clone(),
            text: capture.text.clone(),
        }
    }
}
