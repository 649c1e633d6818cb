//! The persisted preference row.

use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Bit in the `sensitive_flags` column marking an encrypted value.
pub const FLAG_SENSITIVE: u32 = 1;

/// Bit marking a row whose value is copied into the search shadow.
pub const FLAG_INDEXED: u32 = 2;

/// Returns true if `needle` is set in `flags`.
pub const fn is_flagged(needle: u32, flags: u32) -> bool {
    needle & flags != 0
}

/// One row of the preference table, as the row store sees it.
///
/// `value` is the stored form: for sensitive rows it carries the
/// encryption marker and ciphertext. `indexed` is the plaintext search
/// shadow. It is empty unless the row carries [`FLAG_INDEXED`], and
/// always empty for sensitive rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRow {
    pub user_id: String,
    pub app_id: String,
    pub key: String,
    pub value: String,
    pub value_type: ValueType,
    pub lazy: bool,
    pub flags: u32,
    pub indexed: String,
}

impl PreferenceRow {
    /// Create a non-lazy, non-sensitive, unindexed row.
    pub fn new(
        user_id: impl Into<String>,
        app_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
            key: key.into(),
            value: value.into(),
            value_type,
            lazy: false,
            flags: 0,
            indexed: String::new(),
        }
    }

    /// Set the lazy flag.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Set the raw flags.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the search shadow.
    pub fn indexed(mut self, indexed: impl Into<String>) -> Self {
        self.indexed = indexed.into();
        self
    }

    /// Whether the stored value is encrypted.
    pub fn is_sensitive(&self) -> bool {
        is_flagged(FLAG_SENSITIVE, self.flags)
    }

    /// Set or clear the sensitive bit, leaving other bits untouched.
    pub fn set_sensitive(&mut self, sensitive: bool) {
        if sensitive {
            self.flags |= FLAG_SENSITIVE;
        } else {
            self.flags &= !FLAG_SENSITIVE;
        }
    }

    /// Whether the value is meant to be searchable.
    pub fn is_indexed(&self) -> bool {
        is_flagged(FLAG_INDEXED, self.flags)
    }

    /// Set or clear the indexed bit, leaving other bits untouched.
    ///
    /// The shadow itself is not touched.
    pub fn set_indexed(&mut self, indexed: bool) {
        if indexed {
            self.flags |= FLAG_INDEXED;
        } else {
            self.flags &= !FLAG_INDEXED;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let row = PreferenceRow::new("u", "a", "k", "v", ValueType::String);
        assert!(!row.lazy);
        assert!(!row.is_sensitive());
        assert!(!row.is_indexed());
        assert!(row.indexed.is_empty());
    }

    #[test]
    fn test_flag_bits_are_independent() {
        let mut row = PreferenceRow::new("u", "a", "k", "v", ValueType::String);
        row.set_indexed(true);
        row.set_sensitive(true);
        assert_eq!(row.flags, FLAG_SENSITIVE | FLAG_INDEXED);

        row.set_indexed(false);
        assert_eq!(row.flags, FLAG_SENSITIVE);
        assert!(row.is_sensitive());
        assert!(!row.is_indexed());
    }

    #[test]
    fn test_set_sensitive_preserves_other_bits() {
        let mut row = PreferenceRow::new("u", "a", "k", "v", ValueType::String).flags(0b100);
        row.set_sensitive(true);
        assert_eq!(row.flags, 0b101);
        assert!(row.is_sensitive());

        row.set_sensitive(false);
        assert_eq!(row.flags, 0b100);
        assert!(!row.is_sensitive());
    }
}
