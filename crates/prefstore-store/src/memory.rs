//! In-memory implementation of the RowStore trait.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Used by tests and by embedders that do not need durability.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use prefstore_core::{PreferenceRow, ValueType};

use crate::error::{Result, StoreError};
use crate::traits::{IndexQuery, InsertResult, RowStore};

type RowKey = (String, String, String);

/// In-memory row store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryRowStore {
    rows: RwLock<BTreeMap<RowKey, PreferenceRow>>,
}

impl MemoryRowStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of rows held.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<RowKey, PreferenceRow>>> {
        self.rows
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<RowKey, PreferenceRow>>> {
        self.rows
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn delete_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&PreferenceRow) -> bool,
    {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|_, row| !predicate(row));
        Ok(before - rows.len())
    }
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn row_key(user_id: &str, app_id: &str, key: &str) -> RowKey {
    (user_id.to_string(), app_id.to_string(), key.to_string())
}

impl RowStore for MemoryRowStore {
    fn load_user_rows(&self, user_id: &str, lazy: Option<bool>) -> Result<Vec<PreferenceRow>> {
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|r| r.user_id == user_id && lazy.map_or(true, |l| r.lazy == l))
            .cloned()
            .collect())
    }

    fn get_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<Option<PreferenceRow>> {
        let rows = self.read()?;
        Ok(rows.get(&row_key(user_id, app_id, key)).cloned())
    }

    fn insert_row(&self, row: &PreferenceRow) -> Result<InsertResult> {
        let mut rows = self.write()?;
        let k = row_key(&row.user_id, &row.app_id, &row.key);
        if rows.contains_key(&k) {
            return Ok(InsertResult::AlreadyExists);
        }
        rows.insert(k, row.clone());
        Ok(InsertResult::Inserted)
    }

    fn update_row(&self, row: &PreferenceRow) -> Result<bool> {
        let mut rows = self.write()?;
        match rows.get_mut(&row_key(&row.user_id, &row.app_id, &row.key)) {
            Some(existing) => {
                *existing = row.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_lazy(&self, user_id: &str, app_id: &str, key: &str, lazy: bool) -> Result<bool> {
        let mut rows = self.write()?;
        match rows.get_mut(&row_key(user_id, app_id, key)) {
            Some(row) => {
                row.lazy = lazy;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_type(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value_type: ValueType,
    ) -> Result<bool> {
        let mut rows = self.write()?;
        match rows.get_mut(&row_key(user_id, app_id, key)) {
            Some(row) => {
                row.value_type = value_type;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn rows_by_user_key(&self, user_id: &str, key: &str, lazy: bool) -> Result<Vec<PreferenceRow>> {
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|r| r.user_id == user_id && r.key == key && r.lazy == lazy)
            .cloned()
            .collect())
    }

    fn rows_by_app_key(
        &self,
        app_id: &str,
        key: &str,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<PreferenceRow>> {
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|r| r.app_id == app_id && r.key == key)
            .filter(|r| user_ids.map_or(true, |ids| ids.contains(&r.user_id)))
            .cloned()
            .collect())
    }

    fn search_users(&self, app_id: &str, key: &str, query: &IndexQuery) -> Result<Vec<String>> {
        let rows = self.read()?;
        let users: BTreeSet<String> = rows
            .values()
            .filter(|r| r.app_id == app_id && r.key == key && query.matches(r))
            .map(|r| r.user_id.clone())
            .collect();
        Ok(users.into_iter().collect())
    }

    fn set_lazy_by_app_key(&self, app_id: &str, key: &str, lazy: bool) -> Result<usize> {
        let mut rows = self.write()?;
        let mut changed = 0;
        for row in rows
            .values_mut()
            .filter(|r| r.app_id == app_id && r.key == key && r.lazy != lazy)
        {
            row.lazy = lazy;
            changed += 1;
        }
        Ok(changed)
    }

    fn delete_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<usize> {
        let mut rows = self.write()?;
        Ok(rows.remove(&row_key(user_id, app_id, key)).map_or(0, |_| 1))
    }

    fn delete_key(&self, app_id: &str, key: &str) -> Result<usize> {
        self.delete_where(|r| r.app_id == app_id && r.key == key)
    }

    fn delete_app(&self, app_id: &str) -> Result<usize> {
        self.delete_where(|r| r.app_id == app_id)
    }

    fn delete_user(&self, user_id: &str) -> Result<usize> {
        self.delete_where(|r| r.user_id == user_id)
    }

    fn user_ids(&self, app_id: Option<&str>) -> Result<Vec<String>> {
        let rows = self.read()?;
        let users: BTreeSet<String> = rows
            .values()
            .filter(|r| app_id.map_or(true, |a| r.app_id == a))
            .map(|r| r.user_id.clone())
            .collect();
        Ok(users.into_iter().collect())
    }

    fn apps(&self, user_id: &str) -> Result<Vec<String>> {
        let rows = self.read()?;
        let apps: BTreeSet<String> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.app_id.clone())
            .collect();
        Ok(apps.into_iter().collect())
    }

    fn keys(&self, user_id: &str, app_id: &str) -> Result<Vec<String>> {
        let rows = self.read()?;
        // BTreeMap order is (user, app, key), so keys come out sorted.
        Ok(rows
            .values()
            .filter(|r| r.user_id == user_id && r.app_id == app_id)
            .map(|r| r.key.clone())
            .collect())
    }
}
