//! Identifier validation, applied before any store or cache access.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Maximum identifier lengths, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_user_id_length: usize,
    pub max_app_length: usize,
    pub max_key_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_user_id_length: 64,
            max_app_length: 32,
            max_key_length: 64,
        }
    }
}

impl Limits {
    /// A user id must be non-empty and within bounds.
    pub fn check_user(&self, user_id: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(CoreError::InvalidArgument("userId cannot be empty".into()));
        }
        check_length("userId", user_id, self.max_user_id_length)
    }

    /// An app id must be non-empty and within bounds.
    pub fn check_app(&self, app: &str) -> Result<()> {
        if app.is_empty() {
            return Err(CoreError::InvalidArgument("app cannot be empty".into()));
        }
        check_length("app", app, self.max_app_length)
    }

    /// Keys (and key prefixes) only have a length bound.
    pub fn check_key(&self, key: &str) -> Result<()> {
        check_length("key", key, self.max_key_length)
    }

    /// Check a full `(user, app, key)` triple.
    pub fn check_entry(&self, user_id: &str, app: &str, key: &str) -> Result<()> {
        self.check_user(user_id)?;
        self.check_app(app)?;
        self.check_key(key)
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(CoreError::InvalidArgument(format!(
            "{} is too long ({} > {})",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identifiers_rejected() {
        let limits = Limits::default();
        assert!(limits.check_user("").is_err());
        assert!(limits.check_app("").is_err());
        assert!(limits.check_key("").is_ok());
    }

    #[test]
    fn test_length_limits() {
        let limits = Limits::default();
        assert!(limits.check_user(&"u".repeat(64)).is_ok());
        assert!(limits.check_user(&"u".repeat(65)).is_err());
        assert!(limits.check_app(&"a".repeat(33)).is_err());
        assert!(limits.check_key(&"k".repeat(65)).is_err());
        assert!(limits.check_entry("user1", "app1", "key1").is_ok());
    }
}
