//! Cross-app and cross-user queries.
//!
//! These read the row store directly. They neither consult nor populate
//! the per-user cache, since a single call spans many users.

use std::collections::BTreeMap;

use prefstore_core::{PreferenceRow, TypedValue, ValueType};
use prefstore_store::{IndexQuery, RowStore};

use crate::error::Result;
use crate::preferences::{typed_view, PreferenceStore};

const TRUE_VALUES: [&str; 4] = ["1", "on", "true", "yes"];
const FALSE_VALUES: [&str; 4] = ["0", "off", "false", "no"];

impl<S: RowStore> PreferenceStore<S> {
    /// One user's value of `key` in every app holding it, in one tier.
    ///
    /// With `typed_as`, every value is coerced to that type; values that do
    /// not decode become its zero value. Without it each row decodes under
    /// its own type.
    pub fn get_values_by_apps(
        &self,
        user_id: &str,
        key: &str,
        lazy: bool,
        typed_as: Option<ValueType>,
    ) -> Result<BTreeMap<String, TypedValue>> {
        self.check_user(user_id)?;
        self.check_key(key)?;

        self.store
            .rows_by_user_key(user_id, key, lazy)?
            .iter()
            .map(|row| -> Result<_> { Ok((row.app_id.clone(), self.row_value(row, typed_as)?)) })
            .collect()
    }

    /// Every user's value of `(app, key)`, optionally restricted to `user_ids`.
    ///
    /// Explicit user lists are queried in chunks of
    /// `user_id_chunk_size`.
    pub fn get_values_by_users(
        &self,
        app: &str,
        key: &str,
        typed_as: Option<ValueType>,
        user_ids: Option<&[String]>,
    ) -> Result<BTreeMap<String, TypedValue>> {
        self.check_app_key(app, key)?;

        let rows = match user_ids {
            None => self.store.rows_by_app_key(app, key, None)?,
            Some(ids) => {
                let mut rows = Vec::new();
                for chunk in ids.chunks(self.config.user_id_chunk_size.max(1)) {
                    rows.extend(self.store.rows_by_app_key(app, key, Some(chunk))?);
                }
                rows
            }
        };

        rows.iter()
            .map(|row| -> Result<_> { Ok((row.user_id.clone(), self.row_value(row, typed_as)?)) })
            .collect()
    }

    /// Users whose `(app, key)` value equals `value`.
    pub fn search_users_by_value_string(
        &self,
        app: &str,
        key: &str,
        value: &str,
        case_insensitive: bool,
    ) -> Result<Vec<String>> {
        self.search(
            app,
            key,
            IndexQuery::exact(value).case_insensitive(case_insensitive),
        )
    }

    pub fn search_users_by_value_int(&self, app: &str, key: &str, value: i64) -> Result<Vec<String>> {
        self.search(app, key, IndexQuery::exact(value.to_string()))
    }

    /// Users whose `(app, key)` value spells `value` as a common boolean word.
    pub fn search_users_by_value_bool(
        &self,
        app: &str,
        key: &str,
        value: bool,
    ) -> Result<Vec<String>> {
        let words = if value { TRUE_VALUES } else { FALSE_VALUES };
        self.search(app, key, IndexQuery::any_of(words))
    }

    /// Users whose `(app, key)` value equals any of `values`.
    pub fn search_users_by_values(
        &self,
        app: &str,
        key: &str,
        values: &[String],
    ) -> Result<Vec<String>> {
        self.search(app, key, IndexQuery::any_of(values.iter().cloned()))
    }

    fn search(&self, app: &str, key: &str, query: IndexQuery) -> Result<Vec<String>> {
        self.check_app_key(app, key)?;
        Ok(self.store.search_users(app, key, &query)?)
    }

    fn row_value(&self, row: &PreferenceRow, typed_as: Option<ValueType>) -> Result<TypedValue> {
        let entry = self.entry_from_row(row)?;
        Ok(typed_view(&entry.raw, typed_as.unwrap_or(entry.value_type)))
    }
}
