//! Where did each value come from?
//!
//! Every node in a merged tree keeps the [`SourceInfo`] of the document it
//! was read from, so walking the leaves yields an audit trail of the final
//! configuration.

use casc_yaml::{NodeValue, SourceInfo, YamlNode};
use std::fmt::Write;

/// One leaf of a merged tree and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEntry {
    /// Dotted path to the leaf, e.g. `jenkins.nodes[0].name`.
    pub path: String,
    pub source: SourceInfo,
}

/// Collect the origin of every scalar leaf, in document order.
///
/// Empty sequences and mappings count as leaves. A scalar root is reported
/// with the path `<root>`.
pub fn provenance(root: &YamlNode) -> Vec<ProvenanceEntry> {
    let mut entries = Vec::new();
    collect(root, &mut String::new(), &mut entries);
    entries
}

/// Render entries as `path <- source` lines.
pub fn render_provenance(entries: &[ProvenanceEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{} <- {}", entry.path, entry.source.label());
    }
    out
}

fn collect(node: &YamlNode, path: &mut String, entries: &mut Vec<ProvenanceEntry>) {
    match &node.value {
        NodeValue::Mapping(children) if !children.is_empty() => {
            for entry in children {
                let key = entry.key.as_str().unwrap_or("?");
                let len = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                collect(&entry.value, path, entries);
                path.truncate(len);
            }
        }
        NodeValue::Sequence(items) if !items.is_empty() => {
            for (index, item) in items.iter().enumerate() {
                let len = path.len();
                let _ = write!(path, "[{index}]");
                collect(item, path, entries);
                path.truncate(len);
            }
        }
        _ => entries.push(ProvenanceEntry {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.clone()
            },
            source: node.source_info.clone(),
        }),
    }
}
