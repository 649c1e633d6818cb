//! RowStore trait: the abstract interface for preference persistence.
//!
//! The facade and cache only ever talk to storage through this trait.
//! Implementations include SQLite (primary) and in-memory.

use prefstore_core::{PreferenceRow, ValueType};

use crate::error::Result;

/// Result of inserting a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// A row with the same `(user_id, app_id, key)` already exists.
    AlreadyExists,
}

/// A value search against the `indexed` shadow column.
///
/// Matches rows whose shadow equals any of `values`. Rows with an empty
/// shadow or the sensitive flag never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub values: Vec<String>,
    pub case_insensitive: bool,
}

impl IndexQuery {
    /// Match one exact value.
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
            case_insensitive: false,
        }
    }

    /// Match any of several values.
    pub fn any_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            case_insensitive: false,
        }
    }

    /// Compare case-insensitively.
    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// Whether a row matches this query.
    pub fn matches(&self, row: &PreferenceRow) -> bool {
        if row.indexed.is_empty() || row.is_sensitive() {
            return false;
        }
        if self.case_insensitive {
            let indexed = row.indexed.to_lowercase();
            self.values.iter().any(|v| v.to_lowercase() == indexed)
        } else {
            self.values.iter().any(|v| *v == row.indexed)
        }
    }
}

/// The RowStore trait: synchronous interface for preference persistence.
///
/// Every method may block on I/O. Failures are returned as-is; the store
/// never retries.
pub trait RowStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Per-user Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a user's rows.
    ///
    /// `Some(lazy)` restricts to one tier; `None` loads both.
    fn load_user_rows(&self, user_id: &str, lazy: Option<bool>) -> Result<Vec<PreferenceRow>>;

    /// Get a single row.
    fn get_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<Option<PreferenceRow>>;

    /// Insert a new row.
    ///
    /// Returns `AlreadyExists` without modifying anything if the triple is taken.
    fn insert_row(&self, row: &PreferenceRow) -> Result<InsertResult>;

    /// Overwrite value, type, lazy, flags and indexed of an existing row.
    ///
    /// Returns false if no row matched.
    fn update_row(&self, row: &PreferenceRow) -> Result<bool>;

    /// Change the lazy flag of one row.
    fn set_lazy(&self, user_id: &str, app_id: &str, key: &str, lazy: bool) -> Result<bool>;

    /// Change the type tag of one row.
    fn set_type(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value_type: ValueType,
    ) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Cross-app / Cross-user Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// All rows of one user holding `key`, in any app, in one tier.
    fn rows_by_user_key(&self, user_id: &str, key: &str, lazy: bool) -> Result<Vec<PreferenceRow>>;

    /// All rows holding `(app_id, key)`, optionally restricted to some users.
    fn rows_by_app_key(
        &self,
        app_id: &str,
        key: &str,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<PreferenceRow>>;

    /// Users whose `(app_id, key)` shadow matches the query, sorted and unique.
    fn search_users(&self, app_id: &str, key: &str, query: &IndexQuery) -> Result<Vec<String>>;

    /// Change the lazy flag of `(app_id, key)` for every user.
    ///
    /// Returns the number of rows changed.
    fn set_lazy_by_app_key(&self, app_id: &str, key: &str, lazy: bool) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Deletion
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete one row.
    fn delete_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<usize>;

    /// Delete `(app_id, key)` for every user.
    fn delete_key(&self, app_id: &str, key: &str) -> Result<usize>;

    /// Delete every row of an app.
    fn delete_app(&self, app_id: &str) -> Result<usize>;

    /// Delete every row of a user.
    fn delete_user(&self, user_id: &str) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Enumeration
    // ─────────────────────────────────────────────────────────────────────────

    /// User ids holding any row, or any row of `app_id`. Sorted and unique.
    fn user_ids(&self, app_id: Option<&str>) -> Result<Vec<String>>;

    /// Apps a user holds rows in. Sorted and unique.
    fn apps(&self, user_id: &str) -> Result<Vec<String>>;

    /// Keys a user holds in an app. Sorted.
    fn keys(&self, user_id: &str, app_id: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(indexed: &str, flags: u32) -> PreferenceRow {
        PreferenceRow::new("u", "a", "k", indexed, ValueType::String)
            .flags(flags)
            .indexed(indexed)
    }

    #[test]
    fn test_exact_match() {
        let query = IndexQuery::exact("Blue");
        assert!(query.matches(&row("Blue", 0)));
        assert!(!query.matches(&row("blue", 0)));
    }

    #[test]
    fn test_case_insensitive_match() {
        let query = IndexQuery::exact("Blue").case_insensitive(true);
        assert!(query.matches(&row("bLUE", 0)));
    }

    #[test]
    fn test_sensitive_and_empty_never_match() {
        let query = IndexQuery::any_of(["", "secret"]);
        assert!(!query.matches(&row("", 0)));
        assert!(!query.matches(&row("secret", prefstore_core::FLAG_SENSITIVE)));
    }
}
