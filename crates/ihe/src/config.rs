//! Normalizer configuration.
//!
//! Resolve this once when the embedding service starts and pass it into [`crate::Normalizer`].
//! Nothing in this crate reads environment variables or files on its own.

use crate::{IheError, IheResult};
use serde::{Deserialize, Serialize};

/// What to do when a registry error list is present but none of its entries can be mapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorListPolicy {
    /// Log the failure and treat the reply as an empty result.
    #[default]
    Silent,
    /// Report one `schema-error` issue describing why the entries could not be mapped.
    Diagnostic,
}

/// Configuration for [`crate::Normalizer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    pub error_list_policy: ErrorListPolicy,
    /// Use the entry's home community id when a document query entry has no
    /// `repositoryUniqueId` slot.
    pub repository_id_fallback: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            error_list_policy: ErrorListPolicy::Silent,
            repository_id_fallback: true,
        }
    }
}

impl NormalizerConfig {
    /// Strictly parse configuration from YAML text.
    ///
    /// # Arguments
    ///
    /// * `yaml_text` - YAML mapping with any subset of the configuration keys.
    ///
    /// # Returns
    ///
    /// Returns the parsed configuration, with omitted keys at their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IheError::Translation`] naming the failing key if a value has the wrong type or
    /// an unknown key is present.
    pub fn from_yaml(yaml_text: &str) -> IheResult<Self> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::default());
        }
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        match serde_path_to_error::deserialize(deserializer) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                Err(IheError::Translation(format!(
                    "normalizer config schema mismatch at {path}: {source}"
                )))
            }
        }
    }
}
