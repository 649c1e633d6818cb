//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. The reference data set is
//! written straight into the row store, the way rows left by an earlier
//! process would look, so tests start with a cold cache.

use std::sync::Arc;

use prefstore::{PreferenceStore, PreferenceStoreConfig, Result};
use prefstore_core::{encode, PreferenceRow, TypedValue, ValueType, FLAG_INDEXED, FLAG_SENSITIVE};
use prefstore_crypto::{ChaChaCipher, SensitiveCipher};
use prefstore_store::{MemoryRowStore, RowStore, SqliteRowStore};
use serde_json::json;

use crate::counting::{CallCounts, CountingRowStore};

/// Secret the fixture cipher key is derived from.
pub const FIXTURE_SECRET: &[u8] = b"prefstore-testkit fixture secret";

/// The preference store a fixture builds over row store `S`.
pub type FixtureStore<S = MemoryRowStore> = PreferenceStore<CountingRowStore<S>>;

/// One seeded preference.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureEntry {
    pub user_id: &'static str,
    pub app: &'static str,
    pub key: &'static str,
    pub value: TypedValue,
    pub lazy: bool,
    pub sensitive: bool,
}

impl FixtureEntry {
    pub fn new(
        user_id: &'static str,
        app: &'static str,
        key: &'static str,
        value: impl Into<TypedValue>,
    ) -> Self {
        Self {
            user_id,
            app,
            key,
            value: value.into(),
            lazy: false,
            sensitive: false,
        }
    }

    /// An untyped entry.
    pub fn mixed(user_id: &'static str, app: &'static str, key: &'static str, value: &str) -> Self {
        Self::new(user_id, app, key, TypedValue::Mixed(value.to_string()))
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// The reference data set.
///
/// Five users. `user1` holds every value type in both tiers, sensitive and
/// not. `only-lazy` holds nothing but lazy entries. `app2/key2` and
/// `app3/key10` are spread over several users for search tests.
pub fn reference_entries() -> Vec<FixtureEntry> {
    use FixtureEntry as E;

    vec![
        // user1 / app1: every type, both tiers
        E::mixed("user1", "app1", "key1", "value1"),
        E::mixed("user1", "app1", "key22", "31"),
        E::new("user1", "app1", "fast_string", "f_value"),
        E::new("user1", "app1", "lazy_string", "l_value").lazy(),
        E::new("user1", "app1", "fast_string_sensitive", "fs_value").sensitive(),
        E::new("user1", "app1", "lazy_string_sensitive", "ls_value").lazy().sensitive(),
        E::new("user1", "app1", "fast_int", 11i64),
        E::new("user1", "app1", "lazy_int", 12i64).lazy(),
        E::new("user1", "app1", "fast_int_sensitive", 2024i64).sensitive(),
        E::new("user1", "app1", "lazy_int_sensitive", 2048i64).lazy().sensitive(),
        E::new("user1", "app1", "fast_float", 3.5f64),
        E::new("user1", "app1", "lazy_float", 3.125f64).lazy(),
        E::new("user1", "app1", "fast_float_sensitive", 1.5f64).sensitive(),
        E::new("user1", "app1", "lazy_float_sensitive", 1.75f64).lazy().sensitive(),
        E::new("user1", "app1", "fast_array", json!({"year": 2024})),
        E::new("user1", "app1", "lazy_array", json!({"month": "October"})).lazy(),
        E::new("user1", "app1", "fast_array_sensitive", json!({"password": "pwd"})).sensitive(),
        E::new("user1", "app1", "lazy_array_sensitive", json!({"password": "qwerty"}))
            .lazy()
            .sensitive(),
        E::new("user1", "app1", "fast_boolean", true),
        E::new("user1", "app1", "fast_boolean_0", false),
        E::new("user1", "app1", "lazy_boolean", true).lazy(),
        E::new("user1", "app1", "lazy_boolean_0", false).lazy(),
        // user1 / app2, app3, only-lazy
        E::new("user1", "app2", "key2", "value2a"),
        E::new("user1", "app2", "key3", "value3").lazy(),
        E::new("user1", "app2", "key4", "value4").sensitive(),
        E::new("user1", "app2", "key8", 11i64),
        E::new("user1", "app2", "key9", "value9a"),
        E::mixed("user1", "app3", "key1", "value123"),
        E::mixed("user1", "app3", "key3", "value3"),
        E::new("user1", "app3", "key8", 12i64).sensitive(),
        E::new("user1", "app3", "key9", "value9b").sensitive(),
        E::new("user1", "app3", "key10", true),
        E::new("user1", "only-lazy", "key1", "value456").lazy(),
        E::new("user1", "only-lazy", "key2", "value2c").lazy().sensitive(),
        E::new("user1", "only-lazy", "key3", 42i64).lazy(),
        E::new("user1", "only-lazy", "key4", 17.42f64).lazy(),
        E::new("user1", "only-lazy", "key5", true).lazy(),
        // user2
        E::mixed("user2", "app1", "1", "value1"),
        E::new("user2", "app1", "2", "value2").lazy().sensitive(),
        E::new("user2", "app1", "3", 17i64).lazy(),
        E::new("user2", "app1", "4", 42i64).sensitive(),
        E::new("user2", "app1", "5", 17.42f64),
        E::new("user2", "app1", "6", true),
        E::new("user2", "app2", "key2", "value2b"),
        E::new("user2", "app2", "key3", "value3").lazy(),
        E::new("user2", "app2", "key4", "value4").sensitive(),
        E::new("user2", "app2", "key8", 12i64),
        E::new("user2", "app3", "key10", false),
        E::new("user2", "only-lazy", "key1", "value1").lazy(),
        // user3
        E::mixed("user3", "app2", "key2", "value2c"),
        E::new("user3", "app2", "key3", "value3").lazy(),
        E::new("user3", "app2", "key4", "value4").sensitive(),
        E::new("user3", "app2", "fast_string_sensitive", "fs_value").sensitive(),
        E::new("user3", "app2", "lazy_string_sensitive", "ls_value").lazy().sensitive(),
        E::new("user3", "only-lazy", "key3", "value3").lazy(),
        // user4
        E::mixed("user4", "app2", "key1", "value1"),
        E::mixed("user4", "app2", "key2", "value2A"),
        E::new("user4", "app2", "key3", "value3").lazy(),
        E::new("user4", "app2", "key4", "value4").sensitive(),
        E::new("user4", "app3", "key10", true),
        E::new("user4", "only-lazy", "key1", 123i64).lazy(),
        // user5
        E::mixed("user5", "app1", "key1", "value1"),
        E::new("user5", "app2", "key8", 12i64),
        E::new("user5", "only-lazy", "key1", "value1").lazy(),
    ]
}

/// Write entries straight into a row store, encrypting sensitive ones.
///
/// Every row is flagged indexed, as keys written through the store are by
/// default.
pub fn seed_rows<S: RowStore>(
    store: &S,
    cipher: &SensitiveCipher,
    entries: &[FixtureEntry],
) -> Result<()> {
    for entry in entries {
        let value_type = entry.value.value_type();
        let raw = encode(&entry.value)?;
        let (stored, indexed, flags) = if entry.sensitive {
            (cipher.wrap(&raw)?, String::new(), FLAG_INDEXED | FLAG_SENSITIVE)
        } else if value_type == ValueType::Array {
            (raw, String::new(), FLAG_INDEXED)
        } else {
            (raw.clone(), raw, FLAG_INDEXED)
        };

        let row = PreferenceRow::new(entry.user_id, entry.app, entry.key, stored, value_type)
            .lazy(entry.lazy)
            .flags(flags)
            .indexed(indexed);
        store.insert_row(&row)?;
    }
    Ok(())
}

/// The cipher every fixture uses.
pub fn fixture_cipher() -> ChaChaCipher {
    ChaChaCipher::from_secret(FIXTURE_SECRET)
}

/// A preference store over a counting row store, in memory unless built
/// with one of the SQLite constructors.
pub struct TestFixture<S: RowStore = MemoryRowStore> {
    pub prefs: FixtureStore<S>,
}

impl TestFixture<MemoryRowStore> {
    /// No rows.
    pub fn new() -> Self {
        Self::with_config(PreferenceStoreConfig::default())
    }

    pub fn with_config(config: PreferenceStoreConfig) -> Self {
        Self::over(MemoryRowStore::new(), config)
    }

    /// The reference data set, with a cold cache and zeroed counters.
    pub fn seeded() -> Result<Self> {
        Self::seeded_with(&reference_entries(), PreferenceStoreConfig::default())
    }

    pub fn seeded_with(entries: &[FixtureEntry], config: PreferenceStoreConfig) -> Result<Self> {
        Self::seeded_over(MemoryRowStore::new(), entries, config)
    }
}

impl TestFixture<SqliteRowStore> {
    /// No rows, over an in-memory SQLite database.
    pub fn sqlite() -> Result<Self> {
        Ok(Self::over(
            SqliteRowStore::open_memory()?,
            PreferenceStoreConfig::default(),
        ))
    }

    /// The reference data set over an in-memory SQLite database.
    pub fn seeded_sqlite() -> Result<Self> {
        Self::seeded_sqlite_with(&reference_entries(), PreferenceStoreConfig::default())
    }

    pub fn seeded_sqlite_with(
        entries: &[FixtureEntry],
        config: PreferenceStoreConfig,
    ) -> Result<Self> {
        Self::seeded_over(SqliteRowStore::open_memory()?, entries, config)
    }
}

impl<S: RowStore> TestFixture<S> {
    /// An empty fixture over `rows`.
    pub fn over(rows: S, config: PreferenceStoreConfig) -> Self {
        Self {
            prefs: PreferenceStore::new(CountingRowStore::new(rows), fixture_cipher(), config),
        }
    }

    /// `entries` written into `rows` before the preference store sees them.
    pub fn seeded_over(
        rows: S,
        entries: &[FixtureEntry],
        config: PreferenceStoreConfig,
    ) -> Result<Self> {
        let cipher = fixture_cipher();
        seed_rows(&rows, &SensitiveCipher::new(Arc::new(cipher.clone())), entries)?;

        Ok(Self {
            prefs: PreferenceStore::new(CountingRowStore::new(rows), cipher, config),
        })
    }

    /// Row store calls made through the preference store so far.
    pub fn counts(&self) -> CallCounts {
        self.prefs.store().counts()
    }

    /// Zero the call counters.
    pub fn reset_counts(&self) {
        self.prefs.store().reset();
    }

    /// The row as persisted, read without touching the counters.
    pub fn stored_row(&self, user_id: &str, app: &str, key: &str) -> Option<PreferenceRow> {
        self.prefs
            .store()
            .inner()
            .get_row(user_id, app, key)
            .ok()
            .flatten()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
