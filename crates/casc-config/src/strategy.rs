//! Merge strategies: how an incoming node tree is folded into the root.
//!
//! Strategies form a closed set selected by name. All of them deep-merge
//! mappings key by key; they differ in what happens when two sources meet at
//! the same path with anything else:
//!
//! | strategy          | scalar ≠ scalar | sequence × sequence | kind mismatch |
//! |-------------------|-----------------|---------------------|---------------|
//! | `errorOnConflict` | conflict error  | incoming replaces   | conflict error|
//! | `override`        | incoming wins   | incoming replaces   | incoming wins |
//! | `append`          | incoming wins   | concatenated        | incoming wins |

use crate::types::ConfigError;
use casc_yaml::{NodeValue, Scalar, SourceInfo, YamlHashEntry, YamlNode};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How successive sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Reject differing values at the same path.
    #[default]
    ErrorOnConflict,

    /// Later sources win.
    Override,

    /// Later sources win, sequences accumulate.
    Append,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 3] = [
        MergeStrategy::ErrorOnConflict,
        MergeStrategy::Override,
        MergeStrategy::Append,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MergeStrategy::ErrorOnConflict => "errorOnConflict",
            MergeStrategy::Override => "override",
            MergeStrategy::Append => "append",
        }
    }

    /// Look a strategy up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(name))
    }

    /// Select a strategy, falling back to the default for absent or unknown names.
    pub fn resolve(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Self::default();
        };
        Self::from_name(name).unwrap_or_else(|| {
            tracing::warn!(
                strategy = name,
                "unknown merge strategy, using {}",
                Self::default().name()
            );
            Self::default()
        })
    }

    /// Merge `incoming` into `root`.
    ///
    /// `source_label` names the source `incoming` came from; it is used for
    /// conflict messages when the incoming nodes carry no label of their own.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Conflict`] under `errorOnConflict` when the two trees
    /// disagree. `root` may already hold part of `incoming` at that point.
    pub fn merge(self, root: &mut YamlNode, incoming: YamlNode, source_label: &str) -> Result<(), ConfigError> {
        let mut path = Vec::new();
        self.merge_node(root, incoming, source_label, &mut path)
    }

    fn merge_node(
        self,
        root: &mut YamlNode,
        incoming: YamlNode,
        source_label: &str,
        path: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let YamlNode { value, source_info } = incoming;
        match value {
            NodeValue::Mapping(entries) => match &mut root.value {
                NodeValue::Mapping(existing) => self.merge_mappings(existing, entries, source_label, path),
                _ => {
                    let incoming = YamlNode::new_mapping(entries, source_info);
                    self.replace_mismatched(root, incoming, source_label, path)
                }
            },
            NodeValue::Sequence(items) => match &mut root.value {
                NodeValue::Sequence(existing) if self == MergeStrategy::Append => {
                    existing.extend(items);
                    Ok(())
                }
                NodeValue::Sequence(_) => {
                    *root = YamlNode::new_sequence(items, source_info);
                    Ok(())
                }
                _ => {
                    let incoming = YamlNode::new_sequence(items, source_info);
                    self.replace_mismatched(root, incoming, source_label, path)
                }
            },
            NodeValue::Scalar(scalar) => {
                let incoming = YamlNode::new_scalar(scalar, source_info);
                if !root.is_scalar() {
                    return self.replace_mismatched(root, incoming, source_label, path);
                }
                if root.content_eq(&incoming) {
                    return Ok(());
                }
                match self {
                    MergeStrategy::ErrorOnConflict => {
                        let reason = format!(
                            "'{}' vs '{}'",
                            root.as_str().unwrap_or_default(),
                            incoming.as_str().unwrap_or_default()
                        );
                        Err(conflict(path, reason, root, &incoming, source_label))
                    }
                    MergeStrategy::Override | MergeStrategy::Append => {
                        *root = incoming;
                        Ok(())
                    }
                }
            }
        }
    }

    fn merge_mappings(
        self,
        existing: &mut Vec<YamlHashEntry>,
        entries: Vec<YamlHashEntry>,
        source_label: &str,
        path: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        // Scalar keys are looked up by value; other keys fall back to a scan.
        let mut scalar_index: HashMap<Scalar, usize> = existing
            .iter()
            .enumerate()
            .filter_map(|(index, e)| e.key.as_scalar().map(|key| (key.clone(), index)))
            .collect();

        for entry in entries {
            let found = match entry.key.as_scalar() {
                Some(key) => scalar_index.get(key).copied(),
                None => existing.iter().position(|e| e.key.content_eq(&entry.key)),
            };
            let Some(index) = found else {
                if let Some(key) = entry.key.as_scalar() {
                    scalar_index.insert(key.clone(), existing.len());
                }
                existing.push(entry);
                continue;
            };
            path.push(key_segment(&entry.key));
            let result = self.merge_node(&mut existing[index].value, entry.value, source_label, path);
            path.pop();
            result?;
        }
        Ok(())
    }

    fn replace_mismatched(
        self,
        root: &mut YamlNode,
        incoming: YamlNode,
        source_label: &str,
        path: &[String],
    ) -> Result<(), ConfigError> {
        match self {
            MergeStrategy::ErrorOnConflict => {
                let reason = format!("{} vs {}", root.kind_name(), incoming.kind_name());
                Err(conflict(path, reason, root, &incoming, source_label))
            }
            MergeStrategy::Override | MergeStrategy::Append => {
                *root = incoming;
                Ok(())
            }
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let known: Vec<_> = Self::ALL.iter().map(|s| s.name()).collect();
            format!("unknown merge strategy '{s}' (expected one of: {})", known.join(", "))
        })
    }
}

fn key_segment(key: &YamlNode) -> String {
    key.as_str()
        .map_or_else(|| format!("<{}>", key.kind_name()), str::to_string)
}

fn conflict(
    path: &[String],
    reason: String,
    existing: &YamlNode,
    incoming: &YamlNode,
    source_label: &str,
) -> ConfigError {
    let path = if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    };
    let mut incoming_location: SourceInfo = incoming.source_info.clone();
    if incoming_location.source.is_none() {
        incoming_location.source = Some(source_label.to_string());
    }
    ConfigError::Conflict {
        path,
        reason,
        existing: existing.source_info.clone(),
        incoming: incoming_location,
    }
}
