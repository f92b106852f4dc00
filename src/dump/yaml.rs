use super::{DumpError, Dumper, NodeDocument, NodeRecord};
use std::io::Write;

/// YAML node tree with single-line content.
pub struct YamlDumper;

impl Dumper for YamlDumper {
    fn dump(&self, root: &NodeRecord, w: &mut dyn Write) -> Result<(), DumpError> {
        let doc = NodeDocument::from_record(root, true);
        serde_yaml::to_writer(&mut *w, &doc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assignment, render, FakeNode};
    use super::super::{DumpOptions, Format, NodeDocument};

    #[test]
    fn matches_json_outline() {
        let (root, source) = assignment();
        let options = DumpOptions::default();

        let yaml: NodeDocument =
            serde_yaml::from_str(&render(Format::Yaml, &root, source, &options)).unwrap();
        let json: NodeDocument =
            serde_json::from_str(&render(Format::Json, &root, source, &options)).unwrap();

        assert_eq!(yaml.outline(), json.outline());
        assert_eq!(yaml.outline().len(), 4);
    }

    #[test]
    fn escapes_content_to_one_line() {
        let root = FakeNode::leaf("block", 0..3);
        let out = render(Format::Yaml, &root, b"a\nb", &DumpOptions::default());
        let doc: NodeDocument = serde_yaml::from_str(&out).unwrap();
        assert_eq!(doc.content.as_deref(), Some("a\\nb"));
    }
}
