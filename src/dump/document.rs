use super::{escape_controls, truncate, NodeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Serializable node tree shared by the JSON and YAML dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub pos: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub named: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub missing: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub extra: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<NodeDocument>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDocument>,
}

impl NodeDocument {
    /// Convert a record; `escape` selects single-line content.
    pub fn from_record(record: &NodeRecord, escape: bool) -> Self {
        let attributes = record.attributes.unwrap_or_default();
        let content = record
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
            .map(|content| {
                if escape {
                    truncate(&escape_controls(content))
                } else {
                    truncate(content)
                }
            });

        let mut fields: BTreeMap<String, Vec<NodeDocument>> = BTreeMap::new();
        let mut children = Vec::new();
        for child in &record.children {
            let node = Self::from_record(&child.node, escape);
            match &child.field {
                Some(field) => fields.entry(field.clone()).or_default().push(node),
                None => children.push(node),
            }
        }

        Self {
            kind: record.kind.clone(),
            pos: record.position(),
            bytes: record.byte_span(),
            named: attributes.named,
            missing: attributes.missing,
            extra: attributes.extra,
            has_error: attributes.has_error,
            content,
            fields,
            children,
        }
    }

    /// Depth-first `(type, pos)` pairs, fields before plain children.
    pub fn outline(&self) -> Vec<(String, String)> {
        let mut out = vec![(self.kind.clone(), self.pos.clone())];
        for node in self.fields.values().flatten().chain(&self.children) {
            out.extend(node.outline());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::assignment;
    use super::super::{build_record, DumpOptions};
    use super::*;

    #[test]
    fn splits_fields_from_children() {
        let (root, source) = assignment();
        let record = build_record(&root, source, &DumpOptions::default()).unwrap();
        let doc = NodeDocument::from_record(&record, false);

        assert_eq!(doc.fields.keys().collect::<Vec<_>>(), vec!["left", "right"]);
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.children[0].kind, "=");
        assert!(!doc.children[0].named);
        assert_eq!(doc.fields["left"][0].content.as_deref(), Some("x"));
    }

    #[test]
    fn omits_unset_parts() {
        let (root, source) = assignment();
        let options = DumpOptions {
            show_bytes: false,
            show_content: false,
            show_attributes: false,
            skip_whitespace: true,
        };
        let record = build_record(&root, source, &options).unwrap();
        let value = serde_json::to_value(NodeDocument::from_record(&record, false)).unwrap();

        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["children", "fields", "pos", "type"]);
    }
}
