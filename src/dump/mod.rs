//! Whole-tree dumps for inspecting how a grammar parses a file.
//!
//! One traversal ([`build_record`]) walks the tree and applies
//! [`DumpOptions`]; each output format only renders the resulting
//! [`NodeRecord`].

mod document;
mod json;
mod text;
mod xml;
mod yaml;

pub use document::NodeDocument;
pub use json::JsonDumper;
pub use text::TextDumper;
pub use xml::XmlDumper;
pub use yaml::YamlDumper;

use crate::results::Position;
use std::fmt;
use std::io::Write;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// Longest content string emitted before elision.
pub const MAX_CONTENT_CHARS: usize = 60;
const ELISION: &str = "...";

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("no tree to dump")]
    EmptyTree,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Xml,
    Json,
    Yaml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Text => "text",
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "xml" => Ok(Format::Xml),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unknown dump format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpOptions {
    pub show_bytes: bool,
    pub show_content: bool,
    pub show_attributes: bool,
    pub skip_whitespace: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            show_bytes: false,
            show_content: true,
            show_attributes: true,
            skip_whitespace: true,
        }
    }
}

/// The view of a syntax tree node the dumpers need.
pub trait SyntaxNode: Sized {
    fn kind(&self) -> &str;
    /// Zero-based start row/column
    fn start_position(&self) -> Position;
    /// Zero-based end row/column
    fn end_position(&self) -> Position;
    fn byte_range(&self) -> Range<usize>;
    fn is_named(&self) -> bool;
    fn is_missing(&self) -> bool;
    fn is_extra(&self) -> bool;
    fn has_error(&self) -> bool;
    /// Children in source order, each with the field it fills, if any.
    fn children(&self) -> Vec<(Option<String>, Self)>;
}

impl SyntaxNode for tree_sitter::Node<'_> {
    fn kind(&self) -> &str {
        tree_sitter::Node::kind(self)
    }

    fn start_position(&self) -> Position {
        tree_sitter::Node::start_position(self).into()
    }

    fn end_position(&self) -> Position {
        tree_sitter::Node::end_position(self).into()
    }

    fn byte_range(&self) -> Range<usize> {
        tree_sitter::Node::byte_range(self)
    }

    fn is_named(&self) -> bool {
        tree_sitter::Node::is_named(self)
    }

    fn is_missing(&self) -> bool {
        tree_sitter::Node::is_missing(self)
    }

    fn is_extra(&self) -> bool {
        tree_sitter::Node::is_extra(self)
    }

    fn has_error(&self) -> bool {
        tree_sitter::Node::has_error(self)
    }

    fn children(&self) -> Vec<(Option<String>, Self)> {
        let mut cursor = self.walk();
        let mut children = Vec::new();
        if cursor.goto_first_child() {
            loop {
                children.push((cursor.field_name().map(str::to_string), cursor.node()));
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        children
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attributes {
    pub named: bool,
    pub missing: bool,
    pub extra: bool,
    pub has_error: bool,
}

/// One node after filtering, with only the parts the options asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub kind: String,
    pub start: Position,
    pub end: Position,
    pub bytes: Option<Range<usize>>,
    pub attributes: Option<Attributes>,
    /// Raw source text; formats truncate and escape it themselves.
    pub content: Option<String>,
    pub children: Vec<ChildRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRecord {
    pub field: Option<String>,
    pub node: NodeRecord,
}

impl NodeRecord {
    /// `startLine,startCol-endLine,endCol`, all 1-based.
    pub fn position(&self) -> String {
        format!(
            "{},{}-{},{}",
            self.start.row + 1,
            self.start.column + 1,
            self.end.row + 1,
            self.end.column + 1
        )
    }

    pub fn byte_span(&self) -> Option<String> {
        self.bytes
            .as_ref()
            .map(|range| format!("{}-{}", range.start, range.end))
    }
}

fn is_whitespace_kind(kind: &str) -> bool {
    !kind.is_empty() && kind.chars().all(char::is_whitespace)
}

/// Walk `node` and everything below it, applying `options`.
///
/// Returns `None` when the node itself is filtered out.
pub fn build_record<N: SyntaxNode>(node: &N, source: &[u8], options: &DumpOptions) -> Option<NodeRecord> {
    let kind = node.kind();
    if options.skip_whitespace && is_whitespace_kind(kind) {
        return None;
    }

    let range = node.byte_range();
    let content = options.show_content.then(|| {
        source
            .get(range.clone())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    });
    let attributes = options.show_attributes.then(|| Attributes {
        named: node.is_named(),
        missing: node.is_missing(),
        extra: node.is_extra(),
        has_error: node.has_error(),
    });

    let children = node
        .children()
        .into_iter()
        .filter_map(|(field, child)| {
            build_record(&child, source, options).map(|node| ChildRecord { field, node })
        })
        .collect();

    Some(NodeRecord {
        kind: kind.to_string(),
        start: node.start_position(),
        end: node.end_position(),
        bytes: options.show_bytes.then_some(range),
        attributes,
        content,
        children,
    })
}

/// Shorten `content` to at most [`MAX_CONTENT_CHARS`] characters.
pub(crate) fn truncate(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let keep = MAX_CONTENT_CHARS - ELISION.len();
    let mut short: String = content.chars().take(keep).collect();
    short.push_str(ELISION);
    short
}

/// Escape line breaks and tabs for single-line output.
pub(crate) fn escape_controls(content: &str) -> String {
    content
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

/// A serializer for filtered node trees.
pub trait Dumper {
    fn dump(&self, root: &NodeRecord, w: &mut dyn Write) -> Result<(), DumpError>;
}

pub fn dumper(format: Format) -> Box<dyn Dumper> {
    match format {
        Format::Text => Box::new(TextDumper),
        Format::Xml => Box::new(XmlDumper),
        Format::Json => Box::new(JsonDumper),
        Format::Yaml => Box::new(YamlDumper),
    }
}

/// Dump `node` and its descendants.
pub fn dump_node<N: SyntaxNode>(
    node: &N,
    source: &[u8],
    w: &mut dyn Write,
    format: Format,
    options: &DumpOptions,
) -> Result<(), DumpError> {
    let root = build_record(node, source, options).ok_or(DumpError::EmptyTree)?;
    dumper(format).dump(&root, w)
}

/// Dump a whole parsed tree.
pub fn dump_tree(
    tree: &tree_sitter::Tree,
    source: &[u8],
    w: &mut dyn Write,
    format: Format,
    options: &DumpOptions,
) -> Result<(), DumpError> {
    dump_node(&tree.root_node(), source, w, format, options)
}
