//! A row store wrapper that counts calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use prefstore_core::{PreferenceRow, ValueType};
use prefstore_store::{IndexQuery, InsertResult, Result, RowStore};

/// Call counts per row store method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub load_user_rows: usize,
    pub get_row: usize,
    pub insert_row: usize,
    pub update_row: usize,
    pub set_lazy: usize,
    pub set_type: usize,
    pub rows_by_user_key: usize,
    pub rows_by_app_key: usize,
    pub search_users: usize,
    pub set_lazy_by_app_key: usize,
    pub deletes: usize,
    pub enumerations: usize,
}

impl CallCounts {
    /// Calls that read rows.
    pub fn reads(&self) -> usize {
        self.load_user_rows
            + self.get_row
            + self.rows_by_user_key
            + self.rows_by_app_key
            + self.search_users
            + self.enumerations
    }

    /// Calls that modify rows.
    pub fn writes(&self) -> usize {
        self.insert_row
            + self.update_row
            + self.set_lazy
            + self.set_type
            + self.set_lazy_by_app_key
            + self.deletes
    }
}

#[derive(Debug, Default)]
struct Counters {
    load_user_rows: AtomicUsize,
    get_row: AtomicUsize,
    insert_row: AtomicUsize,
    update_row: AtomicUsize,
    set_lazy: AtomicUsize,
    set_type: AtomicUsize,
    rows_by_user_key: AtomicUsize,
    rows_by_app_key: AtomicUsize,
    search_users: AtomicUsize,
    set_lazy_by_app_key: AtomicUsize,
    deletes: AtomicUsize,
    enumerations: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn read(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Wraps a [`RowStore`] and counts every call made through it.
#[derive(Debug, Default)]
pub struct CountingRowStore<S> {
    inner: S,
    counters: Counters,
}

impl<S: RowStore> CountingRowStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            counters: Counters::default(),
        }
    }

    /// The wrapped store. Calls made on it directly are not counted.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Snapshot of the counts so far.
    pub fn counts(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            load_user_rows: read(&c.load_user_rows),
            get_row: read(&c.get_row),
            insert_row: read(&c.insert_row),
            update_row: read(&c.update_row),
            set_lazy: read(&c.set_lazy),
            set_type: read(&c.set_type),
            rows_by_user_key: read(&c.rows_by_user_key),
            rows_by_app_key: read(&c.rows_by_app_key),
            search_users: read(&c.search_users),
            set_lazy_by_app_key: read(&c.set_lazy_by_app_key),
            deletes: read(&c.deletes),
            enumerations: read(&c.enumerations),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        let c = &self.counters;
        for counter in [
            &c.load_user_rows,
            &c.get_row,
            &c.insert_row,
            &c.update_row,
            &c.set_lazy,
            &c.set_type,
            &c.rows_by_user_key,
            &c.rows_by_app_key,
            &c.search_users,
            &c.set_lazy_by_app_key,
            &c.deletes,
            &c.enumerations,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

impl<S: RowStore> RowStore for CountingRowStore<S> {
    fn load_user_rows(&self, user_id: &str, lazy: Option<bool>) -> Result<Vec<PreferenceRow>> {
        bump(&self.counters.load_user_rows);
        self.inner.load_user_rows(user_id, lazy)
    }

    fn get_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<Option<PreferenceRow>> {
        bump(&self.counters.get_row);
        self.inner.get_row(user_id, app_id, key)
    }

    fn insert_row(&self, row: &PreferenceRow) -> Result<InsertResult> {
        bump(&self.counters.insert_row);
        self.inner.insert_row(row)
    }

    fn update_row(&self, row: &PreferenceRow) -> Result<bool> {
        bump(&self.counters.update_row);
        self.inner.update_row(row)
    }

    fn set_lazy(&self, user_id: &str, app_id: &str, key: &str, lazy: bool) -> Result<bool> {
        bump(&self.counters.set_lazy);
        self.inner.set_lazy(user_id, app_id, key, lazy)
    }

    fn set_type(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value_type: ValueType,
    ) -> Result<bool> {
        bump(&self.counters.set_type);
        self.inner.set_type(user_id, app_id, key, value_type)
    }

    fn rows_by_user_key(&self, user_id: &str, key: &str, lazy: bool) -> Result<Vec<PreferenceRow>> {
        bump(&self.counters.rows_by_user_key);
        self.inner.rows_by_user_key(user_id, key, lazy)
    }

    fn rows_by_app_key(
        &self,
        app_id: &str,
        key: &str,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<PreferenceRow>> {
        bump(&self.counters.rows_by_app_key);
        self.inner.rows_by_app_key(app_id, key, user_ids)
    }

    fn search_users(&self, app_id: &str, key: &str, query: &IndexQuery) -> Result<Vec<String>> {
        bump(&self.counters.search_users);
        self.inner.search_users(app_id, key, query)
    }

    fn set_lazy_by_app_key(&self, app_id: &str, key: &str, lazy: bool) -> Result<usize> {
        bump(&self.counters.set_lazy_by_app_key);
        self.inner.set_lazy_by_app_key(app_id, key, lazy)
    }

    fn delete_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<usize> {
        bump(&self.counters.deletes);
        self.inner.delete_row(user_id, app_id, key)
    }

    fn delete_key(&self, app_id: &str, key: &str) -> Result<usize> {
        bump(&self.counters.deletes);
        self.inner.delete_key(app_id, key)
    }

    fn delete_app(&self, app_id: &str) -> Result<usize> {
        bump(&self.counters.deletes);
        self.inner.delete_app(app_id)
    }

    fn delete_user(&self, user_id: &str) -> Result<usize> {
        bump(&self.counters.deletes);
        self.inner.delete_user(user_id)
    }

    fn user_ids(&self, app_id: Option<&str>) -> Result<Vec<String>> {
        bump(&self.counters.enumerations);
        self.inner.user_ids(app_id)
    }

    fn apps(&self, user_id: &str) -> Result<Vec<String>> {
        bump(&self.counters.enumerations);
        self.inner.apps(user_id)
    }

    fn keys(&self, user_id: &str, app_id: &str) -> Result<Vec<String>> {
        bump(&self.counters.enumerations);
        self.inner.keys(user_id, app_id)
    }
}
