use super::{truncate, DumpError, Dumper, NodeRecord};
use std::io::Write;

/// `<tree>` document with one `<node>` element per node. Children that fill
/// a grammar field are wrapped in `<field name="...">`.
pub struct XmlDumper;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\t' => escaped.push_str("&#9;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl XmlDumper {
    fn write_node(node: &NodeRecord, depth: usize, w: &mut dyn Write) -> Result<(), DumpError> {
        let indent = "  ".repeat(depth);
        write!(
            w,
            "{indent}<node type=\"{}\" pos=\"{}\"",
            escape(&node.kind),
            node.position()
        )?;

        if let Some(span) = node.byte_span() {
            write!(w, " bytes=\"{span}\"")?;
        }
        if let Some(a) = node.attributes {
            write!(
                w,
                " named=\"{}\" missing=\"{}\" extra=\"{}\" has_error=\"{}\"",
                a.named, a.missing, a.extra, a.has_error
            )?;
        }
        if let Some(content) = &node.content {
            write!(w, " content=\"{}\"", escape(&truncate(content)))?;
        }
        writeln!(w, ">")?;

        for child in &node.children {
            match &child.field {
                Some(field) => {
                    writeln!(w, "{indent}  <field name=\"{}\">", escape(field))?;
                    Self::write_node(&child.node, depth + 2, w)?;
                    writeln!(w, "{indent}  </field>")?;
                }
                None => Self::write_node(&child.node, depth + 1, w)?,
            }
        }

        writeln!(w, "{indent}</node>")?;
        Ok(())
    }
}

impl Dumper for XmlDumper {
    fn dump(&self, root: &NodeRecord, w: &mut dyn Write) -> Result<(), DumpError> {
        writeln!(w, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(w, "<tree>")?;
        Self::write_node(root, 1, w)?;
        writeln!(w, "</tree>")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assignment, render, FakeNode};
    use super::super::{DumpOptions, Format};
    use super::escape;

    #[test]
    fn wraps_field_children() {
        let (root, source) = assignment();
        let options = DumpOptions {
            show_attributes: false,
            ..DumpOptions::default()
        };
        let out = render(Format::Xml, &root, source, &options);
        let expected = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<tree>
  <node type=\"assignment\" pos=\"1,1-1,6\" content=\"x = y\">
    <field name=\"left\">
      <node type=\"identifier\" pos=\"1,1-1,2\" content=\"x\">
      </node>
    </field>
    <node type=\"=\" pos=\"1,3-1,4\" content=\"=\">
    </node>
    <field name=\"right\">
      <node type=\"identifier\" pos=\"1,5-1,6\" content=\"y\">
      </node>
    </field>
  </node>
</tree>
";
        assert_eq!(out, expected);
    }

    #[test]
    fn escapes_kinds_and_content() {
        let root = FakeNode::leaf("<-", 0..6);
        let out = render(Format::Xml, &root, b"a<\"&\"\n", &DumpOptions::default());
        assert!(out.contains("type=\"&lt;-\""));
        assert!(out.contains("content=\"a&lt;&quot;&amp;&quot;&#10;\""));
        assert!(out.contains("named=\"true\" missing=\"false\" extra=\"false\" has_error=\"false\""));
    }

    #[test]
    fn escape_handles_plain_text() {
        assert_eq!(escape("plain"), "plain");
    }
}
