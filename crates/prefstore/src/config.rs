//! Preference store configuration.

use prefstore_core::Limits;
use serde::{Deserialize, Serialize};

/// Replaces sensitive values in filtered bulk reads and cache snapshots.
pub const DEFAULT_REDACTION_MARKER: &str = "***REMOVED SENSITIVE VALUE***";

/// Configuration for a [`PreferenceStore`](crate::PreferenceStore).
///
/// Every field has a default, so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceStoreConfig {
    /// Substituted for sensitive values in filtered reads.
    pub redaction_marker: String,
    /// Longest stored value still copied into the search shadow, in bytes.
    pub index_max_length: usize,
    /// Whether keys written for the first time are searchable.
    pub index_by_default: bool,
    /// Users per store query in `get_values_by_users`.
    pub user_id_chunk_size: usize,
    /// Identifier length limits.
    pub limits: Limits,
}

impl Default for PreferenceStoreConfig {
    fn default() -> Self {
        Self {
            redaction_marker: DEFAULT_REDACTION_MARKER.to_string(),
            index_max_length: 64,
            index_by_default: true,
            user_id_chunk_size: 50,
            limits: Limits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreferenceStoreConfig::default();
        assert_eq!(config.redaction_marker, "***REMOVED SENSITIVE VALUE***");
        assert_eq!(config.index_max_length, 64);
        assert!(config.index_by_default);
        assert_eq!(config.user_id_chunk_size, 50);
        assert_eq!(config.limits.max_app_length, 32);
    }

    #[test]
    fn test_partial_document() {
        let config: PreferenceStoreConfig =
            serde_json::from_str(r#"{"user_id_chunk_size": 10, "limits": {"max_key_length": 16}}"#)
                .unwrap();
        assert_eq!(config.user_id_chunk_size, 10);
        assert_eq!(config.limits.max_key_length, 16);
        assert_eq!(config.limits.max_user_id_length, 64);
        assert_eq!(config.redaction_marker, DEFAULT_REDACTION_MARKER);
    }
}
