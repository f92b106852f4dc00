use crate::lang::Language;
use crate::ts::errors::TreeSitterError;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser bound to one language.
///
/// A fresh parser is created per file so no incremental state leaks between
/// inputs.
pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new(language: Language) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|_| TreeSitterError::LanguageSet {
                language: language.name().to_string(),
            })?;

        Ok(Self { parser })
    }

    /// Parse source bytes into a tree-sitter Tree.
    pub fn parse(&mut self, source: &[u8]) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and keep the bytes alongside the tree.
    pub fn parse_source(&mut self, source: Vec<u8>) -> Result<ParsedSource, TreeSitterError> {
        let tree = self.parse(&source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource {
    pub source: Vec<u8>,
    pub tree: Tree,
}

impl ParsedSource {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

/// Source text of a node, decoded lossily.
pub fn node_text(node: tree_sitter::Node<'_>, source: &[u8]) -> String {
    source
        .get(node.byte_range())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}
