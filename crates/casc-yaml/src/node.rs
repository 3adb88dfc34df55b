//! Generic YAML node tree with source location tracking.

use crate::SourceInfo;
use yaml_rust2::Yaml;

/// A parsed YAML node.
///
/// Nodes form a strict tree: aliases are resolved while parsing by copying
/// the anchored subtree, so no node is ever shared or cyclic. Every node
/// carries the `SourceInfo` of the document it was read from, and that stays
/// true after merging, which makes the tree its own provenance record.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlNode {
    pub value: NodeValue,
    pub source_info: SourceInfo,
}

/// The three shapes a node can take.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(Scalar),
    Sequence(Vec<YamlNode>),
    Mapping(Vec<YamlHashEntry>),
}

/// A key-value pair in a YAML mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct YamlHashEntry {
    pub key: YamlNode,
    pub value: YamlNode,
}

/// Scalar text together with the type the resolver inferred for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scalar {
    pub text: String,
    pub ty: ScalarType,
}

/// Core-schema type of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

impl Scalar {
    pub fn new(text: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            text: text.into(),
            ty,
        }
    }

    /// A scalar typed by the plain-scalar resolution rules.
    pub fn resolve(text: impl Into<String>) -> Self {
        let text = text.into();
        let ty = resolve_plain(&text);
        Self { text, ty }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if self.ty != ScalarType::Bool {
            return None;
        }
        match self.text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Some(true),
            "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if self.ty != ScalarType::Int {
            return None;
        }
        parse_int(&self.text)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.ty {
            ScalarType::Float => parse_float(&self.text),
            ScalarType::Int => parse_int(&self.text).map(|i| i as f64),
            _ => None,
        }
    }

    /// Convert into the equivalent `yaml-rust2` value.
    pub fn to_yaml(&self) -> Yaml {
        match self.ty {
            ScalarType::Null => Yaml::Null,
            ScalarType::Bool => self.as_bool().map_or(Yaml::String(self.text.clone()), Yaml::Boolean),
            ScalarType::Int => self.as_i64().map_or(Yaml::String(self.text.clone()), Yaml::Integer),
            ScalarType::Float => Yaml::Real(self.text.clone()),
            ScalarType::Str => Yaml::String(self.text.clone()),
        }
    }
}

impl YamlNode {
    pub fn new_scalar(scalar: Scalar, source_info: SourceInfo) -> Self {
        Self {
            value: NodeValue::Scalar(scalar),
            source_info,
        }
    }

    pub fn new_sequence(items: Vec<YamlNode>, source_info: SourceInfo) -> Self {
        Self {
            value: NodeValue::Sequence(items),
            source_info,
        }
    }

    pub fn new_mapping(entries: Vec<YamlHashEntry>, source_info: SourceInfo) -> Self {
        Self {
            value: NodeValue::Mapping(entries),
            source_info,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, NodeValue::Scalar(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.value, NodeValue::Sequence(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.value, NodeValue::Mapping(_))
    }

    /// Human-readable name of the node's shape, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.value {
            NodeValue::Scalar(_) => "scalar",
            NodeValue::Sequence(_) => "sequence",
            NodeValue::Mapping(_) => "mapping",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            NodeValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.text.as_str())
    }

    pub fn as_sequence(&self) -> Option<&[YamlNode]> {
        match &self.value {
            NodeValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[YamlHashEntry]> {
        match &self.value {
            NodeValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Vec<YamlHashEntry>> {
        match &mut self.value {
            NodeValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get a value from a mapping by scalar key text.
    pub fn get(&self, key: &str) -> Option<&YamlNode> {
        self.as_mapping()?
            .iter()
            .find(|entry| entry.key.as_str() == Some(key))
            .map(|entry| &entry.value)
    }

    /// Follow a path of mapping keys from this node.
    pub fn get_path(&self, path: &[&str]) -> Option<&YamlNode> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Get a sequence element by index.
    pub fn get_index(&self, index: usize) -> Option<&YamlNode> {
        self.as_sequence()?.get(index)
    }

    /// Number of children (sequence length or mapping entry count).
    pub fn len(&self) -> usize {
        match &self.value {
            NodeValue::Scalar(_) => 0,
            NodeValue::Sequence(items) => items.len(),
            NodeValue::Mapping(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Structural equality that ignores source locations.
    pub fn content_eq(&self, other: &YamlNode) -> bool {
        match (&self.value, &other.value) {
            (NodeValue::Scalar(a), NodeValue::Scalar(b)) => a == b,
            (NodeValue::Sequence(a), NodeValue::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.content_eq(y))
            }
            (NodeValue::Mapping(a), NodeValue::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| {
                        x.key.content_eq(&y.key) && x.value.content_eq(&y.value)
                    })
            }
            _ => false,
        }
    }

    /// Convert into a plain `yaml-rust2` value, dropping source locations.
    pub fn to_yaml(&self) -> Yaml {
        match &self.value {
            NodeValue::Scalar(scalar) => scalar.to_yaml(),
            NodeValue::Sequence(items) => Yaml::Array(items.iter().map(YamlNode::to_yaml).collect()),
            NodeValue::Mapping(entries) => Yaml::Hash(
                entries
                    .iter()
                    .map(|entry| (entry.key.to_yaml(), entry.value.to_yaml()))
                    .collect(),
            ),
        }
    }
}

impl YamlHashEntry {
    pub fn new(key: YamlNode, value: YamlNode) -> Self {
        Self { key, value }
    }
}

/// Infer the type of a plain (unquoted, untagged) scalar.
pub(crate) fn resolve_plain(value: &str) -> ScalarType {
    match value {
        "null" | "Null" | "NULL" | "~" | "" => return ScalarType::Null,
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" | "false"
        | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => {
            return ScalarType::Bool;
        }
        _ => {}
    }

    if parse_int(value).is_some() {
        return ScalarType::Int;
    }

    if parse_float(value).is_some() {
        return ScalarType::Float;
    }

    ScalarType::Str
}

fn parse_int(value: &str) -> Option<i64> {
    let (negative, unsigned) = split_sign(value);
    let (radix, digits) = if let Some(hex) = unsigned.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = unsigned.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = unsigned.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, unsigned)
    };

    let digits = strip_separators(digits)?;
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

/// Split a leading `+` or `-` off a number.
fn split_sign(value: &str) -> (bool, &str) {
    match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    }
}

/// Drop YAML 1.1 `_` digit separators; the number must start with a digit.
fn strip_separators(digits: &str) -> Option<String> {
    if !digits.starts_with(|c: char| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(digits.chars().filter(|&c| c != '_').collect())
}

fn parse_float(value: &str) -> Option<f64> {
    match value {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }
    // Rust also accepts "inf" and "nan"; YAML does not.
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let (_, unsigned) = split_sign(value);
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    value.replace('_', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(text: &str) -> YamlNode {
        YamlNode::new_scalar(Scalar::resolve(text), SourceInfo::default())
    }

    fn mapping(pairs: Vec<(&str, YamlNode)>) -> YamlNode {
        YamlNode::new_mapping(
            pairs
                .into_iter()
                .map(|(k, v)| YamlHashEntry::new(scalar(k), v))
                .collect(),
            SourceInfo::default(),
        )
    }

    #[test]
    fn test_resolve_plain_types() {
        assert_eq!(resolve_plain("~"), ScalarType::Null);
        assert_eq!(resolve_plain("yes"), ScalarType::Bool);
        assert_eq!(resolve_plain("42"), ScalarType::Int);
        assert_eq!(resolve_plain("0x1F"), ScalarType::Int);
        assert_eq!(resolve_plain("3.14"), ScalarType::Float);
        assert_eq!(resolve_plain(".inf"), ScalarType::Float);
        assert_eq!(resolve_plain("nan"), ScalarType::Str);
        assert_eq!(resolve_plain("hello"), ScalarType::Str);
    }

    #[test]
    fn test_signs_and_separators() {
        assert_eq!(resolve_plain("0x-5"), ScalarType::Str);
        assert_eq!(resolve_plain("0o+7"), ScalarType::Str);
        assert_eq!(Scalar::resolve("-0x10").as_i64(), Some(-16));
        assert_eq!(Scalar::resolve("+12").as_i64(), Some(12));
        assert_eq!(Scalar::resolve("1_000").as_i64(), Some(1000));
        assert_eq!(Scalar::resolve("0b1010").as_i64(), Some(10));
        assert_eq!(Scalar::resolve("-9223372036854775808").as_i64(), Some(i64::MIN));
        assert_eq!(Scalar::resolve("1_000.5").as_f64(), Some(1000.5));
        assert_eq!(resolve_plain("_1"), ScalarType::Str);
        assert_eq!(resolve_plain("-"), ScalarType::Str);
        assert_eq!(resolve_plain("2024-01-01"), ScalarType::Str);
    }

    #[test]
    fn test_scalar_to_yaml() {
        assert_eq!(Scalar::resolve("42").to_yaml(), Yaml::Integer(42));
        assert_eq!(Scalar::resolve("off").to_yaml(), Yaml::Boolean(false));
        assert_eq!(Scalar::resolve("null").to_yaml(), Yaml::Null);
        assert_eq!(
            Scalar::new("42", ScalarType::Str).to_yaml(),
            Yaml::String("42".into())
        );
    }

    #[test]
    fn test_get_path() {
        let node = mapping(vec![("jenkins", mapping(vec![("numExecutors", scalar("2"))]))]);
        let found = node.get_path(&["jenkins", "numExecutors"]).unwrap();
        assert_eq!(found.as_scalar().unwrap().as_i64(), Some(2));
        assert!(node.get_path(&["jenkins", "missing"]).is_none());
        assert!(node.get_path(&[]).is_some());
    }

    #[test]
    fn test_content_eq_ignores_source_info() {
        let a = scalar("value");
        let mut b = scalar("value");
        b.source_info = SourceInfo::new(Some("other.yaml".into()), 5, 2, 3, 5);
        assert!(a.content_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_eq_distinguishes_types() {
        let int = scalar("1");
        let string = YamlNode::new_scalar(Scalar::new("1", ScalarType::Str), SourceInfo::default());
        assert!(!int.content_eq(&string));
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(scalar("a").kind_name(), "scalar");
        assert_eq!(mapping(vec![]).kind_name(), "mapping");
        assert_eq!(
            YamlNode::new_sequence(vec![], SourceInfo::default()).kind_name(),
            "sequence"
        );
    }
}
