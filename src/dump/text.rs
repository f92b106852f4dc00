use super::{escape_controls, truncate, DumpError, Dumper, NodeRecord};
use std::io::Write;

/// Indented outline, one node per line.
///
/// ```text
/// assignment [1,1-1,6] [named] "x = y"
///   left: identifier [1,1-1,2] [named] "x"
/// ```
pub struct TextDumper;

impl TextDumper {
    fn write_node(
        node: &NodeRecord,
        field: Option<&str>,
        depth: usize,
        w: &mut dyn Write,
    ) -> Result<(), DumpError> {
        let indent = "  ".repeat(depth);
        let prefix = field.map(|name| format!("{name}: ")).unwrap_or_default();
        write!(w, "{indent}{prefix}{} [{}]", node.kind, node.position())?;

        if let Some(span) = node.byte_span() {
            write!(w, " bytes:{span}")?;
        }

        if let Some(attributes) = node.attributes {
            let flags: Vec<&str> = [
                (attributes.named, "named"),
                (attributes.missing, "missing"),
                (attributes.extra, "extra"),
                (attributes.has_error, "error"),
            ]
            .into_iter()
            .filter_map(|(set, label)| set.then_some(label))
            .collect();
            if !flags.is_empty() {
                write!(w, " [{}]", flags.join(","))?;
            }
        }

        if let Some(content) = &node.content {
            write!(w, " \"{}\"", truncate(&escape_controls(content)))?;
        }
        writeln!(w)?;

        for child in &node.children {
            Self::write_node(&child.node, child.field.as_deref(), depth + 1, w)?;
        }
        Ok(())
    }
}

impl Dumper for TextDumper {
    fn dump(&self, root: &NodeRecord, w: &mut dyn Write) -> Result<(), DumpError> {
        Self::write_node(root, None, 0, w)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assignment, render};
    use super::super::{DumpOptions, Format};

    #[test]
    fn renders_outline_with_fields() {
        let (root, source) = assignment();
        let out = render(Format::Text, &root, source, &DumpOptions::default());
        let expected = "\
assignment [1,1-1,6] [named] \"x = y\"
  left: identifier [1,1-1,2] [named] \"x\"
  = [1,3-1,4] \"=\"
  right: identifier [1,5-1,6] [named] \"y\"
";
        assert_eq!(out, expected);
    }

    #[test]
    fn shows_bytes_without_content() {
        let (root, source) = assignment();
        let options = DumpOptions {
            show_bytes: true,
            show_content: false,
            show_attributes: false,
            skip_whitespace: true,
        };
        let out = render(Format::Text, &root, source, &options);
        assert_eq!(out.lines().next(), Some("assignment [1,1-1,6] bytes:0-5"));
    }
}
