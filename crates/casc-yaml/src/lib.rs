//! # casc-yaml
//!
//! Alias-safe YAML parsing into source-tracked node trees.
//!
//! Every document is turned into a [`YamlNode`] tree of scalars, sequences and
//! mappings. Anchors and aliases are resolved while parsing by copying the
//! anchored subtree, so consumers always see a plain acyclic tree. Aliases that
//! point at collections are counted and capped
//! ([`ParseOptions::max_aliases_for_collections`]) to stop "billion laughs"
//! style documents from exhausting memory.
//!
//! Each node remembers the label of the source it came from, which lets
//! merged trees report which document contributed a value.
//!
//! ## Example
//!
//! ```rust
//! use casc_yaml::{parse_source, ParseOptions};
//!
//! let content = r#"
//! jenkins:
//!   systemMessage: hello
//! "#;
//!
//! let yaml = parse_source(content, "jenkins.yaml", &ParseOptions::default())
//!     .unwrap()
//!     .unwrap();
//! let message = yaml.get_path(&["jenkins", "systemMessage"]).unwrap();
//! assert_eq!(message.source_info.label(), "jenkins.yaml");
//! ```

mod error;
mod node;
mod parser;
mod source_info;

pub use error::{ALIAS_EXPANSION_MESSAGE, ALIAS_LIMIT_MESSAGE, Error, Result};
pub use node::{NodeValue, Scalar, ScalarType, YamlHashEntry, YamlNode};
pub use parser::{
    ALIAS_EXPANSION_NODES_PER_ALIAS, DEFAULT_MAX_ALIASES_FOR_COLLECTIONS, ParseOptions, parse, parse_reader, parse_source,
};
pub use source_info::SourceInfo;
