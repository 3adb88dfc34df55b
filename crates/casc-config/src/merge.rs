//! Multi-source loading: open, parse and fold sources into one tree.
//!
//! Sources are processed strictly in the order given. The first source that
//! produces content becomes the root; every later non-empty source is merged
//! into it with the selected [`MergeStrategy`]. The first failure aborts the
//! whole load.
//!
//! # Example
//!
//! ```rust
//! use casc_config::{ConfigurationContext, SourceReader, YamlSource, load_from_with, MappingConverter};
//!
//! let sources = vec![
//!     YamlSource::from_bytes("base", "jenkins:\n  numExecutors: 2\n"),
//!     YamlSource::from_bytes("extra", "jenkins:\n  systemMessage: hello\n"),
//! ];
//! let config = load_from_with(
//!     sources,
//!     &ConfigurationContext::default(),
//!     &SourceReader::new(),
//!     &MappingConverter,
//! )
//! .unwrap();
//! assert!(config.get_path(&["jenkins", "systemMessage"]).is_some());
//! ```

use crate::context::ConfigurationContext;
use crate::convert::{MappingConverter, ModelConverter};
use crate::source::{SourceReader, YamlSource};
use crate::strategy::MergeStrategy;
use crate::types::{ConfigError, Mapping};
use casc_yaml::YamlNode;
use std::io::Read;

/// Parse one character stream, translating an exceeded alias limit into
/// an error that tells the operator how to raise it.
///
/// # Errors
///
/// [`ConfigError::AliasLimit`] when the document uses too many collection
/// aliases or its aliases copy too many nodes, [`ConfigError::Read`] when the stream fails or is not UTF-8,
/// [`ConfigError::Syntax`] for anything else.
pub fn read<R: Read>(
    source_label: &str,
    reader: R,
    context: &ConfigurationContext,
) -> Result<Option<YamlNode>, ConfigError> {
    match casc_yaml::parse_reader(reader, source_label, &context.parse_options()) {
        Ok(node) => Ok(node),
        Err(
            err @ (casc_yaml::Error::AliasLimitExceeded { .. }
            | casc_yaml::Error::AliasExpansionExceeded { .. }),
        ) => Err(ConfigError::AliasLimit {
            message: err.to_string(),
            env_var: context.max_aliases_env_var.clone(),
            property: context.max_aliases_property.clone(),
        }),
        Err(casc_yaml::Error::Io(cause)) => Err(ConfigError::Read {
            source_label: source_label.to_string(),
            cause,
        }),
        Err(err) => Err(ConfigError::Syntax(err)),
    }
}

/// Merge sources with the strategy named by `context`.
///
/// Returns `None` when the list is empty or every source was empty.
///
/// # Errors
///
/// The first error raised by any source; no partial result is returned.
pub fn merge(
    sources: Vec<YamlSource>,
    context: &ConfigurationContext,
    reader: &SourceReader,
) -> Result<Option<YamlNode>, ConfigError> {
    merge_with(sources, context.strategy(), context, reader)
}

/// Merge sources with an explicit strategy.
///
/// # Errors
///
/// The first error raised by any source; no partial result is returned.
pub fn merge_with(
    sources: Vec<YamlSource>,
    strategy: MergeStrategy,
    context: &ConfigurationContext,
    reader: &SourceReader,
) -> Result<Option<YamlNode>, ConfigError> {
    let mut root: Option<YamlNode> = None;

    for source in sources {
        let label = source.label();
        tracing::debug!(source = %label, strategy = %strategy, "reading configuration source");

        // The stream is consumed by `read` and closed before the next source.
        let stream = reader.open(source)?;
        let node = read(&label, stream, context)?;

        let Some(node) = node else {
            tracing::debug!(source = %label, "configuration source has no content");
            continue;
        };

        if let Some(current) = root.as_mut() {
            strategy.merge(current, node, &label)?;
            tracing::debug!(source = %label, "merged configuration source");
        } else {
            root = Some(node);
        }
    }

    Ok(root)
}

/// Load a configuration mapping from a set of sources, merging documents.
///
/// Credentials for remote sources come from the default environment
/// variables.
///
/// # Errors
///
/// Any error from [`merge`] or from model conversion.
pub fn load_from(sources: Vec<YamlSource>, context: &ConfigurationContext) -> Result<Mapping, ConfigError> {
    load_from_with(sources, context, &SourceReader::new(), &MappingConverter)
}

/// Load with an explicit reader and model converter.
///
/// The converter is called exactly once: `empty()` when there is nothing to
/// load, `convert()` otherwise.
///
/// # Errors
///
/// Any error from [`merge`] or from `converter`.
pub fn load_from_with<C: ModelConverter>(
    sources: Vec<YamlSource>,
    context: &ConfigurationContext,
    reader: &SourceReader,
    converter: &C,
) -> Result<C::Output, ConfigError> {
    if sources.is_empty() {
        return Ok(converter.empty());
    }

    match merge(sources, context, reader)? {
        Some(root) => converter.convert(root),
        None => {
            tracing::warn!("yaml source returned an empty document");
            Ok(converter.empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{provenance, render_provenance};
    use std::cell::Cell;
    use std::io::{self, Write};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inline(name: &str, content: &str) -> YamlSource {
        YamlSource::from_bytes(name, content.to_string())
    }

    fn merge_inline(sources: Vec<YamlSource>) -> Result<Option<YamlNode>, ConfigError> {
        merge(sources, &ConfigurationContext::default(), &SourceReader::new())
    }

    /// A reader that fails on first use and counts drops.
    struct FailingReader {
        drops: Arc<AtomicUsize>,
    }

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
        }
    }

    impl Drop for FailingReader {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_union_keeps_earlier_values() {
        let root = merge_inline(vec![
            inline("a", "shared: 1\nonly_a: x\n"),
            inline("b", "only_b: y\n"),
        ])
        .unwrap()
        .unwrap();

        assert_eq!(root.len(), 3);
        assert_eq!(root.get("shared").unwrap().as_str(), Some("1"));
        assert_eq!(root.get("only_a").unwrap().source_info.label(), "stream a");
        assert_eq!(root.get("only_b").unwrap().source_info.label(), "stream b");
    }

    #[test]
    fn test_single_source_equals_direct_parse() {
        let content = "jenkins:\n  nodes: [a, b]\n  numExecutors: 3\n";
        let merged = merge_inline(vec![inline("only", content)]).unwrap().unwrap();
        let parsed = read("stream only", content.as_bytes(), &ConfigurationContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(merged, parsed);
    }

    #[test]
    fn test_conflicting_sources_fail() {
        let err = merge_inline(vec![inline("a", "k: 1\n"), inline("b", "k: 2\n")]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`k`"));
        assert!(message.contains("stream a"));
        assert!(message.contains("stream b"));
    }

    #[test]
    fn test_identical_values_merge() {
        let root = merge_inline(vec![inline("a", "k: 1\n"), inline("b", "k: 1\n")])
            .unwrap()
            .unwrap();
        assert_eq!(root.get("k").unwrap().as_str(), Some("1"));
    }

    #[test]
    fn test_deep_merge_across_sources() {
        let root = merge_inline(vec![inline("a", "a: {x: 1}\n"), inline("b", "a: {y: 2}\n")])
            .unwrap()
            .unwrap();
        let a = root.get("a").unwrap();
        assert_eq!(a.get("x").unwrap().as_str(), Some("1"));
        assert_eq!(a.get("y").unwrap().as_str(), Some("2"));
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let root = merge_inline(vec![
            inline("empty", ""),
            inline("a", "k: 1\n"),
            inline("comment", "# nothing here\n"),
            inline("b", "j: 2\n"),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_all_empty_is_none() {
        let root = merge_inline(vec![inline("a", ""), inline("b", "---\n")]).unwrap();
        assert!(root.is_none());
    }

    #[test]
    fn test_strategy_from_context() {
        let context = ConfigurationContext::default().with_merge_strategy("override");
        let root = merge(
            vec![inline("a", "k: 1\n"), inline("b", "k: 2\n")],
            &context,
            &SourceReader::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(root.get("k").unwrap().as_str(), Some("2"));
    }

    #[test]
    fn test_alias_limit_error_names_remedies() {
        let context = ConfigurationContext::default().with_max_aliases(1);
        let err = merge(
            vec![inline("bomb", "a: &a [x]\nb: [*a, *a]\n")],
            &context,
            &SourceReader::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::AliasLimit { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Number of aliases for non-scalar nodes exceeds the specified max=1"));
        assert!(message.contains("ENV: CASC_YAML_MAX_ALIASES=\"100\""));
        assert!(message.contains("PROPERTY: -Dcasc.yaml.maxAliasesForCollections=\"100\""));
    }

    #[test]
    fn test_alias_doubling_chain_names_remedies() {
        let mut doc = String::from("l0: &l0 [x]\n");
        for level in 1..=22 {
            doc.push_str(&format!("l{level}: &l{level} [*l{prev}, *l{prev}]\n", prev = level - 1));
        }

        let err = merge_inline(vec![inline("chain", &doc)]).unwrap_err();
        assert!(matches!(err, ConfigError::AliasLimit { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Number of nodes copied by aliases exceeds the specified max=500000"));
        assert!(message.contains("ENV: CASC_YAML_MAX_ALIASES=\"100\""));
    }

    #[test]
    fn test_syntax_error_passes_through() {
        let err = merge_inline(vec![inline("bad", "k: [unclosed\n")]).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(casc_yaml::Error::Syntax { .. })));
    }

    #[test]
    fn test_read_failure_names_source_and_releases_stream() {
        let drops = Arc::new(AtomicUsize::new(0));
        let failing = YamlSource::stream(
            "flaky",
            FailingReader {
                drops: Arc::clone(&drops),
            },
        );
        let err = merge_inline(vec![inline("a", "k: 1\n"), failing, inline("never", "z: 1\n")])
            .unwrap_err();

        match err {
            ConfigError::Read { source_label, .. } => assert_eq!(source_label, "stream flaky"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_utf8_is_read_error() {
        let err = merge_inline(vec![YamlSource::from_bytes("binary", vec![0xff, 0xfe, 0x00])])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_empty_list_is_empty_mapping() {
        let mapping = load_from(Vec::new(), &ConfigurationContext::default()).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_load_from_only_empty_sources_is_empty_mapping() {
        let mapping = load_from(
            vec![inline("a", ""), inline("b", "# comment\n")],
            &ConfigurationContext::default(),
        )
        .unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let extra = dir.path().join("extra.yaml");
        std::fs::File::create(&base)
            .unwrap()
            .write_all(b"jenkins:\n  numExecutors: 2\n")
            .unwrap();
        std::fs::File::create(&extra)
            .unwrap()
            .write_all(b"jenkins:\n  systemMessage: hello\n")
            .unwrap();

        let mapping = load_from(
            vec![YamlSource::path(&base), YamlSource::path(&extra)],
            &ConfigurationContext::default(),
        )
        .unwrap();

        let message = mapping.get_path(&["jenkins", "systemMessage"]).unwrap();
        assert_eq!(message.as_str(), Some("hello"));
        assert_eq!(message.source_info.label(), extra.display().to_string());
    }

    #[test]
    fn test_converter_called_once() {
        struct Counting {
            empty: Cell<usize>,
            convert: Cell<usize>,
        }

        impl ModelConverter for Counting {
            type Output = ();

            fn empty(&self) {
                self.empty.set(self.empty.get() + 1);
            }

            fn convert(&self, _root: YamlNode) -> Result<(), ConfigError> {
                self.convert.set(self.convert.get() + 1);
                Ok(())
            }
        }

        let converter = Counting {
            empty: Cell::new(0),
            convert: Cell::new(0),
        };
        let context = ConfigurationContext::default();
        let reader = SourceReader::new();

        load_from_with(vec![inline("a", "k: 1\n"), inline("b", "j: 1\n")], &context, &reader, &converter)
            .unwrap();
        assert_eq!((converter.empty.get(), converter.convert.get()), (0, 1));

        load_from_with(Vec::new(), &context, &reader, &converter).unwrap();
        assert_eq!((converter.empty.get(), converter.convert.get()), (1, 1));
    }

    #[test]
    fn test_provenance_after_merge() {
        let root = merge_inline(vec![
            inline("base.yaml", "jenkins:\n  numExecutors: 2\n  labels: [linux]\n"),
            inline("override.yaml", "jenkins:\n  systemMessage: hello\n"),
            inline("tools.yaml", "tool:\n  git:\n    installations:\n      - name: default\n"),
        ])
        .unwrap()
        .unwrap();

        insta::assert_snapshot!(render_provenance(&provenance(&root)), @r"
        jenkins.numExecutors <- stream base.yaml
        jenkins.labels[0] <- stream base.yaml
        jenkins.systemMessage <- stream override.yaml
        tool.git.installations[0].name <- stream tools.yaml
        ");
    }
}
