//! Conversion from merged node trees to the configuration model.

use crate::types::{ConfigError, ConfigValue, ConfigValueKind, Mapping};
use casc_yaml::{NodeValue, YamlNode};

/// Turns the final merged tree into a configuration model.
///
/// A load calls exactly one of the two methods, once.
pub trait ModelConverter {
    type Output;

    /// The model for "nothing to load".
    fn empty(&self) -> Self::Output;

    /// Build the model from a merged tree.
    fn convert(&self, root: YamlNode) -> Result<Self::Output, ConfigError>;
}

/// Converts a merged tree into a [`Mapping`] of [`ConfigValue`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingConverter;

impl ModelConverter for MappingConverter {
    type Output = Mapping;

    fn empty(&self) -> Mapping {
        Mapping::empty()
    }

    fn convert(&self, root: YamlNode) -> Result<Mapping, ConfigError> {
        let location = root.source_info.clone();
        match config_value_from_node(root)?.value {
            ConfigValueKind::Mapping(mapping) => Ok(mapping),
            _ => Err(ConfigError::InvalidModel {
                message: "expected a mapping at the document root".into(),
                location,
            }),
        }
    }
}

/// Convert a node and its children into a `ConfigValue`, keeping source info.
///
/// # Errors
///
/// [`ConfigError::InvalidModel`] when a mapping key is not a scalar.
pub fn config_value_from_node(node: YamlNode) -> Result<ConfigValue, ConfigError> {
    let YamlNode { value, source_info } = node;
    match value {
        NodeValue::Scalar(scalar) => Ok(ConfigValue::new_scalar(scalar, source_info)),
        NodeValue::Sequence(items) => {
            let items = items
                .into_iter()
                .map(config_value_from_node)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ConfigValue::new_sequence(items, source_info))
        }
        NodeValue::Mapping(entries) => {
            let mut mapping = Mapping::empty();
            for entry in entries {
                let Some(key) = entry.key.as_str().map(str::to_string) else {
                    return Err(ConfigError::InvalidModel {
                        message: format!("mapping keys must be scalars, found a {}", entry.key.kind_name()),
                        location: entry.key.source_info,
                    });
                };
                mapping.insert(key, config_value_from_node(entry.value)?);
            }
            Ok(ConfigValue::new_mapping(mapping, source_info))
        }
    }
}
