use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to set language for parser: {language}")]
    LanguageSet { language: String },

    #[error("failed to parse source code")]
    ParseFailed,

    #[error(transparent)]
    Query(#[from] QueryCompileError),
}

/// What part of a query failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    Syntax,
    NodeType,
    Field,
    Capture,
    Predicate,
    Structure,
    Language,
    Regex,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompileErrorKind::Syntax => "syntax",
            CompileErrorKind::NodeType => "node type",
            CompileErrorKind::Field => "field",
            CompileErrorKind::Capture => "capture",
            CompileErrorKind::Predicate => "predicate",
            CompileErrorKind::Structure => "structure",
            CompileErrorKind::Language => "language",
            CompileErrorKind::Regex => "regex",
        };
        f.write_str(label)
    }
}

impl From<tree_sitter::QueryErrorKind> for CompileErrorKind {
    fn from(kind: tree_sitter::QueryErrorKind) -> Self {
        use tree_sitter::QueryErrorKind;
        match kind {
            QueryErrorKind::Syntax => CompileErrorKind::Syntax,
            QueryErrorKind::NodeType => CompileErrorKind::NodeType,
            QueryErrorKind::Field => CompileErrorKind::Field,
            QueryErrorKind::Capture => CompileErrorKind::Capture,
            QueryErrorKind::Predicate => CompileErrorKind::Predicate,
            QueryErrorKind::Structure => CompileErrorKind::Structure,
            QueryErrorKind::Language => CompileErrorKind::Language,
        }
    }
}

/// A named query whose pattern text could not be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error parsing query {query}: '{kind}' at line {line}: {message}")]
pub struct QueryCompileError {
    pub query: String,
    /// 1-based line inside the pattern text.
    pub line: usize,
    pub kind: CompileErrorKind,
    pub message: String,
}

impl QueryCompileError {
    pub(crate) fn at_offset(
        query: &str,
        text: &str,
        offset: usize,
        kind: CompileErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            query: query.to_string(),
            line: line_at_offset(text, offset),
            kind,
            message: message.into(),
        }
    }
}

/// 1-based line number of a byte offset, clamped to the text length.
pub(crate) fn line_at_offset(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    1 + text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_numbers_are_one_based_and_clamped() {
        let text = "(a)\n(b)\n(c";
        assert_eq!(line_at_offset(text, 0), 1);
        assert_eq!(line_at_offset(text, 4), 2);
        assert_eq!(line_at_offset(text, 9), 3);
        assert_eq!(line_at_offset(text, 500), 3);
    }

    #[test]
    fn compile_error_names_query_and_line() {
        let err = QueryCompileError::at_offset(
            "functions",
            "(a)\n(bogus",
            5,
            CompileErrorKind::NodeType,
            "invalid node type bogus",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("functions"));
        assert!(rendered.contains("line 2"));
        assert!(rendered.contains("node type"));
    }
}
