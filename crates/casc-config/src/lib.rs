//! Multi-source YAML configuration loading with source tracking.
//!
//! Configuration for a server can be split across many YAML documents: local
//! files, HTTP(S) endpoints, in-memory streams and the bodies of inbound
//! requests. This crate reads them in order, parses each one with the
//! alias-safe parser from `casc-yaml`, and folds them into a single tree.
//!
//! # Key Features
//!
//! - **Bounded aliases**: documents that alias collections more than
//!   [`ConfigurationContext::max_aliases_for_collections`] times are rejected
//!   with a message naming both ways to raise the limit
//! - **Merge strategies**: [`MergeStrategy`] decides what happens when two
//!   sources define the same key
//! - **Remote credentials**: bearer tokens or basic auth for HTTP sources,
//!   read from the environment at every open
//! - **Provenance**: every value in the merged tree remembers its source
//!
//! # Architecture
//!
//! - [`YamlSource`] / [`SourceReader`]: what to read and how to open it
//! - [`read`], [`merge`], [`load_from`]: the load pipeline
//! - [`ModelConverter`]: turns the merged tree into a model, by default a
//!   [`Mapping`] of [`ConfigValue`]s
//!
//! # Example
//!
//! ```rust
//! use casc_config::{ConfigurationContext, YamlSource, load_from};
//!
//! let config = load_from(
//!     vec![
//!         YamlSource::from_bytes("base", "jenkins:\n  numExecutors: 2\n"),
//!         YamlSource::from_bytes("site", "unclassified:\n  location:\n    url: https://ci.example.com/\n"),
//!     ],
//!     &ConfigurationContext::default(),
//! )
//! .unwrap();
//!
//! let executors = config.get_path(&["jenkins", "numExecutors"]).unwrap();
//! assert_eq!(executors.as_scalar().and_then(|s| s.as_i64()), Some(2));
//! ```

mod context;
mod convert;
mod merge;
mod provenance;
mod source;
mod strategy;
mod types;

pub use context::{ConfigurationContext, MAX_ALIASES_ENV, MAX_ALIASES_PROPERTY, MERGE_STRATEGY_ENV};

pub use convert::{MappingConverter, ModelConverter, config_value_from_node};

pub use merge::{load_from, load_from_with, merge, merge_with, read};

pub use provenance::{ProvenanceEntry, provenance, render_provenance};

pub use source::{
    Authorization,
    CONFIG_PASSWORD_ENV,
    CONFIG_TOKEN_ENV,
    CONFIG_USER_ENV,
    CredentialSource,
    Credentials,
    InboundRequest,
    SourceReader,
    SourceStream,
    YamlSource,
};

pub use strategy::MergeStrategy;

pub use types::{ConfigError, ConfigValue, ConfigValueKind, Mapping};
