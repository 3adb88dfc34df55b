//! Alias-safe YAML parser that builds `YamlNode` trees.

use crate::node::{NodeValue, Scalar, ScalarType, YamlHashEntry, YamlNode};
use crate::{Error, Result, SourceInfo};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Default bound on aliases that point at sequences or mappings.
pub const DEFAULT_MAX_ALIASES_FOR_COLLECTIONS: usize = 50;

/// Nodes each permitted collection alias may copy, on average.
///
/// The expansion budget of a document is this times
/// [`ParseOptions::max_aliases_for_collections`].
pub const ALIAS_EXPANSION_NODES_PER_ALIAS: usize = 10_000;

const CORE_SCHEMA_HANDLE: &str = "tag:yaml.org,2002:";

/// Options controlling how a document is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of aliases a document may use against non-scalar nodes.
    ///
    /// Each such alias copies a whole subtree, so nested anchors grow the
    /// tree exponentially; exceeding the bound aborts the parse with
    /// [`Error::AliasLimitExceeded`].
    pub max_aliases_for_collections: usize,
}

impl ParseOptions {
    /// Upper bound on the total number of nodes copied by collection aliases.
    ///
    /// Counting alias events alone does not stop a chain of anchors that
    /// each alias the previous one twice, so the copied size is bounded too.
    pub fn max_alias_expanded_nodes(&self) -> usize {
        self.max_aliases_for_collections
            .saturating_mul(ALIAS_EXPANSION_NODES_PER_ALIAS)
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_aliases_for_collections: DEFAULT_MAX_ALIASES_FOR_COLLECTIONS,
        }
    }
}

/// Parse YAML from a string with default options and no source label.
///
/// Returns `Ok(None)` when the input holds no document (empty, comments only)
/// or when the document is a bare null.
///
/// # Example
///
/// ```rust
/// use casc_yaml::parse;
///
/// let yaml = parse("title: My Document").unwrap().unwrap();
/// assert!(yaml.is_mapping());
/// ```
///
/// # Errors
///
/// Returns an error if the YAML is invalid.
pub fn parse(content: &str) -> Result<Option<YamlNode>> {
    parse_impl(content, None, &ParseOptions::default())
}

/// Parse YAML from a string, labelling every node with `source`.
///
/// # Errors
///
/// Returns [`Error::AliasLimitExceeded`] when the document uses more
/// collection aliases than `options` allows, or another variant for any
/// structural problem.
pub fn parse_source(content: &str, source: &str, options: &ParseOptions) -> Result<Option<YamlNode>> {
    parse_impl(content, Some(source), options)
}

/// Read a whole character stream and parse it.
///
/// # Errors
///
/// Returns [`Error::Io`] if the stream cannot be read or is not UTF-8,
/// otherwise the same errors as [`parse_source`].
pub fn parse_reader<R: Read>(mut reader: R, source: &str, options: &ParseOptions) -> Result<Option<YamlNode>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;
    parse_source(&content, source, options)
}

fn parse_impl(content: &str, source: Option<&str>, options: &ParseOptions) -> Result<Option<YamlNode>> {
    let mut parser = Parser::new_from_str(content);
    let mut builder = NodeBuilder::new(source, options);

    // Load every document so that a trailing second document is reported.
    parser.load(&mut builder, true)?;

    builder.result()
}

/// Builder that implements MarkedEventReceiver to construct a YamlNode tree.
struct NodeBuilder {
    source: Option<String>,
    max_aliases: usize,
    max_expanded_nodes: usize,

    /// Stack of collections being constructed
    stack: Vec<BuildNode>,

    /// Anchored subtrees by yaml-rust2 anchor id, with their node counts
    anchors: HashMap<usize, (YamlNode, usize)>,

    non_scalar_aliases: usize,
    expanded_nodes: usize,
    documents: usize,
    root: Option<YamlNode>,

    /// First failure; once set, further events are ignored.
    error: Option<Error>,
}

/// A collection being constructed during parsing.
enum BuildNode {
    Sequence {
        start_marker: Marker,
        anchor_id: usize,
        items: Vec<YamlNode>,
    },
    Mapping {
        start_marker: Marker,
        anchor_id: usize,
        entries: Vec<(YamlNode, Option<YamlNode>)>,
        scalar_keys: HashSet<Scalar>,
    },
}

impl NodeBuilder {
    fn new(source: Option<&str>, options: &ParseOptions) -> Self {
        Self {
            source: source.map(str::to_string),
            max_aliases: options.max_aliases_for_collections,
            max_expanded_nodes: options.max_alias_expanded_nodes(),
            stack: Vec::new(),
            anchors: HashMap::new(),
            non_scalar_aliases: 0,
            expanded_nodes: 0,
            documents: 0,
            root: None,
            error: None,
        }
    }

    fn result(self) -> Result<Option<YamlNode>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.stack.is_empty() {
            return Err(Error::Syntax {
                message: "unexpected end of stream inside a collection".into(),
                location: None,
            });
        }
        tracing::trace!(
            source = self.source.as_deref().unwrap_or("<unknown>"),
            aliases = self.non_scalar_aliases,
            expanded_nodes = self.expanded_nodes,
            "parsed yaml document"
        );
        // A bare null document carries no configuration.
        Ok(self.root.filter(|root| {
            !matches!(&root.value, NodeValue::Scalar(s) if s.ty == ScalarType::Null)
        }))
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn make_source_info(&self, marker: &Marker, len: usize) -> SourceInfo {
        let info = SourceInfo::from_marker(marker, len);
        match &self.source {
            Some(source) => info.with_source(source.clone()),
            None => info,
        }
    }

    fn register_anchor(&mut self, anchor_id: usize, node: &YamlNode) {
        if anchor_id > 0 {
            self.anchors.insert(anchor_id, (node.clone(), node_count(node)));
        }
    }

    fn push_complete(&mut self, node: YamlNode) {
        let Some(parent) = self.stack.last_mut() else {
            self.root = Some(node);
            return;
        };

        let duplicate = match parent {
            BuildNode::Sequence { items, .. } => {
                items.push(node);
                return;
            }
            BuildNode::Mapping {
                entries, scalar_keys, ..
            } => {
                if let Some((_, value)) = entries.last_mut() {
                    if value.is_none() {
                        *value = Some(node);
                        return;
                    }
                }
                // This is a new key
                let unique = match node.as_scalar() {
                    Some(scalar) => scalar_keys.insert(scalar.clone()),
                    None => !entries.iter().any(|(key, _)| key.content_eq(&node)),
                };
                if unique {
                    entries.push((node, None));
                    return;
                }
                node
            }
        };

        let key = duplicate
            .as_str()
            .map_or_else(|| format!("<{}>", duplicate.kind_name()), str::to_string);
        self.fail(Error::DuplicateKey {
            key,
            location: duplicate.source_info,
        });
    }

    fn on_alias(&mut self, anchor_id: usize, marker: &Marker) {
        let Some((is_scalar, size)) = self
            .anchors
            .get(&anchor_id)
            .map(|(target, size)| (target.is_scalar(), *size))
        else {
            let location = self.make_source_info(marker, 0);
            self.fail(Error::UndefinedAlias { location });
            return;
        };

        if !is_scalar {
            self.non_scalar_aliases += 1;
            if self.non_scalar_aliases > self.max_aliases {
                let location = self.make_source_info(marker, 0);
                self.fail(Error::AliasLimitExceeded {
                    max: self.max_aliases,
                    location,
                });
                return;
            }

            self.expanded_nodes = self.expanded_nodes.saturating_add(size);
            if self.expanded_nodes > self.max_expanded_nodes {
                let location = self.make_source_info(marker, 0);
                self.fail(Error::AliasExpansionExceeded {
                    max_nodes: self.max_expanded_nodes,
                    location,
                });
                return;
            }
        }

        if let Some((target, _)) = self.anchors.get(&anchor_id) {
            let node = target.clone();
            self.push_complete(node);
        }
    }

    fn end_sequence(&mut self, marker: &Marker) {
        match self.stack.pop() {
            Some(BuildNode::Sequence {
                start_marker,
                anchor_id,
                items,
            }) => {
                let len = marker.index().saturating_sub(start_marker.index());
                let node = YamlNode::new_sequence(items, self.make_source_info(&start_marker, len));
                self.register_anchor(anchor_id, &node);
                self.push_complete(node);
            }
            _ => self.fail(Error::Syntax {
                message: "sequence end without matching sequence start".into(),
                location: Some(self.make_source_info(marker, 0)),
            }),
        }
    }

    fn end_mapping(&mut self, marker: &Marker) {
        match self.stack.pop() {
            Some(BuildNode::Mapping {
                start_marker,
                anchor_id,
                entries,
                ..
            }) => {
                let len = marker.index().saturating_sub(start_marker.index());
                let source_info = self.make_source_info(&start_marker, len);
                let mut hash_entries = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let Some(value) = value else {
                        self.fail(Error::Syntax {
                            message: "mapping key without a value".into(),
                            location: Some(key.source_info),
                        });
                        return;
                    };
                    hash_entries.push(YamlHashEntry::new(key, value));
                }
                let node = YamlNode::new_mapping(hash_entries, source_info);
                self.register_anchor(anchor_id, &node);
                self.push_complete(node);
            }
            _ => self.fail(Error::Syntax {
                message: "mapping end without matching mapping start".into(),
                location: Some(self.make_source_info(marker, 0)),
            }),
        }
    }
}

impl MarkedEventReceiver for NodeBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }

        match ev {
            Event::Nothing | Event::StreamStart | Event::StreamEnd | Event::DocumentEnd => {}

            Event::DocumentStart => {
                self.documents += 1;
                if self.documents > 1 {
                    let location = self.make_source_info(&marker, 0);
                    self.fail(Error::MultipleDocuments { location });
                }
            }

            Event::Scalar(value, style, anchor_id, tag) => {
                let source_info = self.make_source_info(&marker, value.len());
                let scalar = scalar_from_event(value, style, tag.as_ref());
                let node = YamlNode::new_scalar(scalar, source_info);
                self.register_anchor(anchor_id, &node);
                self.push_complete(node);
            }

            Event::SequenceStart(anchor_id, _tag) => {
                self.stack.push(BuildNode::Sequence {
                    start_marker: marker,
                    anchor_id,
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => self.end_sequence(&marker),

            Event::MappingStart(anchor_id, _tag) => {
                self.stack.push(BuildNode::Mapping {
                    start_marker: marker,
                    anchor_id,
                    entries: Vec::new(),
                    scalar_keys: HashSet::new(),
                });
            }

            Event::MappingEnd => self.end_mapping(&marker),

            Event::Alias(anchor_id) => self.on_alias(anchor_id, &marker),
        }
    }
}

/// Number of nodes in a subtree, keys included.
fn node_count(node: &YamlNode) -> usize {
    match &node.value {
        NodeValue::Scalar(_) => 1,
        NodeValue::Sequence(items) => 1 + items.iter().map(node_count).sum::<usize>(),
        NodeValue::Mapping(entries) => {
            1 + entries
                .iter()
                .map(|entry| node_count(&entry.key) + node_count(&entry.value))
                .sum::<usize>()
        }
    }
}

/// Type a scalar from its event: explicit core tags win, quoted scalars are
/// strings, plain scalars go through resolution.
fn scalar_from_event(value: String, style: TScalarStyle, tag: Option<&Tag>) -> Scalar {
    if let Some(tag) = tag {
        if tag.handle == CORE_SCHEMA_HANDLE || tag.handle == "!!" {
            let ty = match tag.suffix.as_str() {
                "str" => ScalarType::Str,
                "int" => ScalarType::Int,
                "float" => ScalarType::Float,
                "bool" => ScalarType::Bool,
                "null" => ScalarType::Null,
                _ => return Scalar::resolve(value),
            };
            return Scalar::new(value, ty);
        }
        // Application tags are kept as text.
        return Scalar::new(value, ScalarType::Str);
    }

    if style != TScalarStyle::Plain {
        return Scalar::new(value, ScalarType::Str);
    }

    Scalar::resolve(value)
}
