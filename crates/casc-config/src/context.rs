//! Tunables for a load: alias limit, merge strategy and remediation names.

use crate::strategy::MergeStrategy;
use casc_yaml::{DEFAULT_MAX_ALIASES_FOR_COLLECTIONS, ParseOptions};

/// Environment variable read by [`ConfigurationContext::from_env`] for the alias limit.
pub const MAX_ALIASES_ENV: &str = "CASC_YAML_MAX_ALIASES";

/// Property name echoed in the alias-limit remediation message.
pub const MAX_ALIASES_PROPERTY: &str = "casc.yaml.maxAliasesForCollections";

/// Environment variable read by [`ConfigurationContext::from_env`] for the strategy name.
pub const MERGE_STRATEGY_ENV: &str = "CASC_MERGE_STRATEGY";

/// Settings threaded through one load operation.
///
/// Built once at the boundary (usually with [`ConfigurationContext::from_env`])
/// and passed down explicitly; nothing below it reads process state except
/// the credential lookup in [`crate::SourceReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationContext {
    /// Maximum number of aliases a document may use against collections.
    pub max_aliases_for_collections: usize,

    /// Name of the merge strategy; `None` selects the default.
    pub merge_strategy: Option<String>,

    /// Environment variable named in the alias-limit error.
    pub max_aliases_env_var: String,

    /// Property named in the alias-limit error.
    pub max_aliases_property: String,
}

impl Default for ConfigurationContext {
    fn default() -> Self {
        Self {
            max_aliases_for_collections: DEFAULT_MAX_ALIASES_FOR_COLLECTIONS,
            merge_strategy: None,
            max_aliases_env_var: MAX_ALIASES_ENV.to_string(),
            max_aliases_property: MAX_ALIASES_PROPERTY.to_string(),
        }
    }
}

impl ConfigurationContext {
    /// Build a context from `CASC_YAML_MAX_ALIASES` and `CASC_MERGE_STRATEGY`.
    ///
    /// Blank or non-numeric alias limits keep the default.
    pub fn from_env() -> Self {
        let mut context = Self::default();

        if let Some(raw) = non_blank_env(MAX_ALIASES_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(max) => context.max_aliases_for_collections = max,
                Err(_) => tracing::warn!(
                    variable = MAX_ALIASES_ENV,
                    value = %raw,
                    "ignoring invalid alias limit, keeping {}",
                    context.max_aliases_for_collections
                ),
            }
        }

        context.merge_strategy = non_blank_env(MERGE_STRATEGY_ENV);
        context
    }

    pub fn with_max_aliases(mut self, max: usize) -> Self {
        self.max_aliases_for_collections = max;
        self
    }

    pub fn with_merge_strategy(mut self, name: impl Into<String>) -> Self {
        self.merge_strategy = Some(name.into());
        self
    }

    /// Parser options derived from this context.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_aliases_for_collections: self.max_aliases_for_collections,
        }
    }

    /// The strategy selected by name, falling back to the default.
    pub fn strategy(&self) -> MergeStrategy {
        MergeStrategy::resolve(self.merge_strategy.as_deref())
    }
}

pub(crate) fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
