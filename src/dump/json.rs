use super::{DumpError, Dumper, NodeDocument, NodeRecord};
use std::io::Write;

/// Pretty-printed JSON node tree. Content is truncated but not escaped
/// beyond what JSON itself requires.
pub struct JsonDumper;

impl Dumper for JsonDumper {
    fn dump(&self, root: &NodeRecord, w: &mut dyn Write) -> Result<(), DumpError> {
        let doc = NodeDocument::from_record(root, false);
        serde_json::to_writer_pretty(&mut *w, &doc)?;
        writeln!(w)?;
        Ok(())
    }
}
