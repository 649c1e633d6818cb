//! The PreferenceStore: typed per-user preferences over a row store.
//!
//! All reads go through the [`CacheManager`]; a user's fast tier is
//! loaded on first access and the lazy tier only when a lazy entry is
//! asked for. Writes go to the row store first and update the cache only
//! after the store accepted them.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use prefstore_core::{
    coerce, decode, encode, is_flagged, resolve_type, PreferenceRow, TypedValue, ValueType,
    FLAG_INDEXED, FLAG_SENSITIVE,
};
use prefstore_crypto::{Cipher, SensitiveCipher};
use prefstore_store::{InsertResult, RowStore};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheManager, CacheStatus, CachedEntry};
use crate::config::PreferenceStoreConfig;
use crate::error::{PrefError, Result};
use crate::value::PreferenceValue;

/// Integers beyond this magnitude get a debug line on write.
const LARGE_INT_THRESHOLD: u64 = 2_000_000_000;

/// Everything known about one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDetails {
    pub user_id: String,
    pub app: String,
    pub key: String,
    /// Decrypted persisted string.
    pub value: String,
    pub value_type: ValueType,
    pub lazy: bool,
    pub sensitive: bool,
    pub indexed: bool,
}

/// The preference store.
///
/// Provides:
/// - Typed getters and setters per `(user, app, key)`
/// - Metadata queries and sensitivity / laziness toggles
/// - Bulk reads, cross-user queries and value search
/// - Deletion at entry, key, app and user scope
pub struct PreferenceStore<S: RowStore> {
    /// The storage backend.
    pub(crate) store: Arc<S>,
    /// Wraps sensitive values.
    pub(crate) cipher: SensitiveCipher,
    /// Configuration.
    pub(crate) config: PreferenceStoreConfig,
    /// Per-user cache and type registry.
    cache: RwLock<CacheManager>,
}

impl<S: RowStore> PreferenceStore<S> {
    /// Create a new preference store.
    pub fn new(store: S, cipher: impl Cipher + 'static, config: PreferenceStoreConfig) -> Self {
        Self {
            store: Arc::new(store),
            cipher: SensitiveCipher::new(Arc::new(cipher)),
            config,
            cache: RwLock::new(CacheManager::new()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PreferenceStoreConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a value in one tier, or `default` if the key is not there.
    ///
    /// The type of `default` is the requested type. A `Mixed` default
    /// returns the raw string of whatever is stored. Any other type must
    /// match the established type of the key.
    pub fn get_typed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: TypedValue,
        lazy: bool,
    ) -> Result<TypedValue> {
        self.check_entry(user_id, app, key)?;
        let requested = default.value_type();

        let Some((_, entry)) = self.cached_entry(user_id, app, key, Some(lazy))? else {
            return Ok(default);
        };
        if requested.is_mixed() {
            return Ok(TypedValue::Mixed(entry.raw));
        }

        let established = self.established_type(app, key, Some(&entry))?;
        if !established.is_mixed() && established != requested {
            warn!(user_id, app, key, %established, %requested, "type conflict on read");
            return Err(PrefError::type_conflict(app, key, established, requested));
        }

        if entry.value_type.is_mixed() {
            Ok(coerce(&entry.raw, requested))
        } else {
            Ok(decode(&entry.raw, requested)?)
        }
    }

    /// Generic typed read.
    pub fn get_value<T: PreferenceValue>(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: T,
        lazy: bool,
    ) -> Result<T> {
        let value = self.get_typed(user_id, app, key, default.into_typed(), lazy)?;
        let found = value.value_type();
        T::from_typed(value).ok_or_else(|| PrefError::type_conflict(app, key, found, T::TYPE))
    }

    pub fn get_value_string(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: &str,
        lazy: bool,
    ) -> Result<String> {
        self.get_value(user_id, app, key, default.to_string(), lazy)
    }

    pub fn get_value_int(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: i64,
        lazy: bool,
    ) -> Result<i64> {
        self.get_value(user_id, app, key, default, lazy)
    }

    pub fn get_value_float(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: f64,
        lazy: bool,
    ) -> Result<f64> {
        self.get_value(user_id, app, key, default, lazy)
    }

    pub fn get_value_bool(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: bool,
        lazy: bool,
    ) -> Result<bool> {
        self.get_value(user_id, app, key, default, lazy)
    }

    pub fn get_value_array(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: serde_json::Value,
        lazy: bool,
    ) -> Result<serde_json::Value> {
        self.get_value(user_id, app, key, default, lazy)
    }

    /// Read the raw string of any entry, regardless of its type.
    ///
    /// `lazy = None` looks in both tiers.
    pub fn get_value_mixed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        default: &str,
        lazy: Option<bool>,
    ) -> Result<String> {
        self.check_entry(user_id, app, key)?;
        Ok(match self.cached_entry(user_id, app, key, lazy)? {
            Some((_, entry)) => entry.raw,
            None => default.to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a value.
    ///
    /// Returns false without touching the store if value, type, laziness
    /// and sensitivity already match. A sensitive entry stays sensitive
    /// even if `sensitive` is false; use [`update_sensitive`] to clear it.
    /// An existing entry keeps its indexed bit; a new one takes
    /// `index_by_default` from the config.
    ///
    /// [`update_sensitive`]: PreferenceStore::update_sensitive
    pub fn set_typed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: TypedValue,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.check_entry(user_id, app, key)?;
        let requested = value.value_type();

        let existing = self.existing_entry(user_id, app, key, lazy)?;
        let established = self.established_type(app, key, existing.as_ref().map(|(_, e)| e))?;
        let resolved = resolve_type(established, requested).map_err(|_| {
            warn!(user_id, app, key, %established, %requested, "type conflict on write");
            PrefError::type_conflict(app, key, established, requested)
        })?;

        let raw = encode(&value)?;
        if requested.is_mixed() && !resolved.is_mixed() && decode(&raw, resolved).is_err() {
            warn!(user_id, app, key, %resolved, "untyped value does not decode as established type");
            return Err(PrefError::type_conflict(app, key, resolved, requested));
        }

        let sensitive = sensitive || existing.as_ref().map_or(false, |(_, e)| e.sensitive);
        if let Some((was_lazy, entry)) = &existing {
            if entry.raw == raw
                && *was_lazy == lazy
                && entry.sensitive == sensitive
                && entry.value_type == resolved
            {
                return Ok(false);
            }
        }

        if let TypedValue::Int(v) = &value {
            if v.unsigned_abs() > LARGE_INT_THRESHOLD {
                debug!(user_id, app, key, "integer value exceeds 32-bit range");
            }
        }

        let stored = if sensitive {
            self.cipher.wrap(&raw)?
        } else {
            raw.clone()
        };
        let indexed = existing
            .as_ref()
            .map_or(self.config.index_by_default, |(_, e)| e.indexed);
        let mut row = PreferenceRow::new(user_id, app, key, stored, resolved).lazy(lazy);
        row.set_sensitive(sensitive);
        row.set_indexed(indexed);
        row.indexed = self.index_for(app, key, &raw, resolved, row.flags);

        match existing {
            None => {
                if self.store.insert_row(&row)? == InsertResult::AlreadyExists {
                    self.store.update_row(&row)?;
                }
            }
            Some(_) => {
                if !self.store.update_row(&row)? {
                    self.store.insert_row(&row)?;
                }
            }
        }

        self.write_cache()?.put(
            user_id,
            app,
            key,
            lazy,
            CachedEntry {
                raw,
                value_type: resolved,
                sensitive,
                indexed,
            },
        );
        Ok(true)
    }

    /// Generic typed write.
    pub fn set_value<T: PreferenceValue>(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: T,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_typed(user_id, app, key, value.into_typed(), lazy, sensitive)
    }

    pub fn set_value_string(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: &str,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_value(user_id, app, key, value.to_string(), lazy, sensitive)
    }

    pub fn set_value_int(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: i64,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_value(user_id, app, key, value, lazy, sensitive)
    }

    pub fn set_value_float(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: f64,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_value(user_id, app, key, value, lazy, sensitive)
    }

    pub fn set_value_bool(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: bool,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_value(user_id, app, key, value, lazy, sensitive)
    }

    pub fn set_value_array(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: serde_json::Value,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_value(user_id, app, key, value, lazy, sensitive)
    }

    /// Untyped write. Keeps the established type of the key, if any.
    pub fn set_value_mixed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value: &str,
        lazy: bool,
        sensitive: bool,
    ) -> Result<bool> {
        self.set_typed(
            user_id,
            app,
            key,
            TypedValue::Mixed(value.to_string()),
            lazy,
            sensitive,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the key exists in the tier `lazy` selects (`None` = either).
    pub fn has_key(&self, user_id: &str, app: &str, key: &str, lazy: Option<bool>) -> Result<bool> {
        self.check_entry(user_id, app, key)?;
        Ok(self.cached_entry(user_id, app, key, lazy)?.is_some())
    }

    pub fn is_sensitive(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: Option<bool>,
    ) -> Result<bool> {
        let (_, entry) = self.require_entry(user_id, app, key, lazy)?;
        Ok(entry.sensitive)
    }

    /// Whether the entry's value is copied into the search shadow.
    pub fn is_indexed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: Option<bool>,
    ) -> Result<bool> {
        let (_, entry) = self.require_entry(user_id, app, key, lazy)?;
        Ok(entry.indexed)
    }

    pub fn is_lazy(&self, user_id: &str, app: &str, key: &str) -> Result<bool> {
        let (lazy, _) = self.require_entry(user_id, app, key, None)?;
        Ok(lazy)
    }

    pub fn get_value_type(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: Option<bool>,
    ) -> Result<ValueType> {
        let (_, entry) = self.require_entry(user_id, app, key, lazy)?;
        Ok(entry.value_type)
    }

    pub fn get_details(&self, user_id: &str, app: &str, key: &str) -> Result<EntryDetails> {
        let (lazy, entry) = self.require_entry(user_id, app, key, None)?;
        Ok(EntryDetails {
            user_id: user_id.to_string(),
            app: app.to_string(),
            key: key.to_string(),
            value: entry.raw,
            value_type: entry.value_type,
            lazy,
            sensitive: entry.sensitive,
            indexed: entry.indexed,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Retag an existing entry.
    ///
    /// The stored value must decode under the new type.
    pub fn update_type(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        value_type: ValueType,
    ) -> Result<bool> {
        let (_, entry) = self.require_entry(user_id, app, key, None)?;
        if entry.value_type == value_type {
            return Ok(false);
        }
        if !value_type.is_mixed() && decode(&entry.raw, value_type).is_err() {
            return Err(PrefError::type_conflict(app, key, entry.value_type, value_type));
        }

        if !self.store.set_type(user_id, app, key, value_type)? {
            return Err(PrefError::unknown_key(user_id, app, key));
        }
        self.write_cache()?.set_type(user_id, app, key, value_type);
        Ok(true)
    }

    /// Encrypt or decrypt one entry at rest.
    ///
    /// Returns false if the key is unknown or already in that state. Only
    /// this entry is invalidated in the cache.
    pub fn update_sensitive(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        sensitive: bool,
    ) -> Result<bool> {
        self.check_entry(user_id, app, key)?;
        match self.cached_entry(user_id, app, key, None)? {
            Some((_, entry)) if entry.sensitive != sensitive => {}
            _ => return Ok(false),
        }

        let Some(row) = self.store.get_row(user_id, app, key)? else {
            return Ok(false);
        };
        let row = self.reseal(row, sensitive)?;
        self.store.update_row(&row)?;

        self.write_cache()?.mark_stale(user_id, app, key);
        Ok(true)
    }

    /// Encrypt or decrypt `(app, key)` for every user, then drop the whole cache.
    ///
    /// The cache is dropped even when a row fails part way, since the rows
    /// before it were already rewritten.
    pub fn update_global_sensitive(&self, app: &str, key: &str, sensitive: bool) -> Result<()> {
        self.check_app_key(app, key)?;
        let changed = self.rewrite_all(app, key, |row| {
            if row.is_sensitive() == sensitive {
                return Ok(None);
            }
            self.reseal(row, sensitive).map(Some)
        })?;
        debug!(app, key, sensitive, changed, "updated sensitivity for all users");
        Ok(())
    }

    /// Add or remove one entry from value search.
    ///
    /// Returns false if the key is unknown or already in that state. The
    /// search shadow is refilled or emptied to match.
    pub fn update_indexed(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        indexed: bool,
    ) -> Result<bool> {
        self.check_entry(user_id, app, key)?;
        match self.cached_entry(user_id, app, key, None)? {
            Some((_, entry)) if entry.indexed != indexed => {}
            _ => return Ok(false),
        }

        let Some(row) = self.store.get_row(user_id, app, key)? else {
            return Ok(false);
        };
        self.store.update_row(&self.reindex(row, indexed))?;

        self.write_cache()?.set_indexed(user_id, app, key, indexed);
        Ok(true)
    }

    /// Add or remove `(app, key)` from value search for every user, then
    /// drop the whole cache.
    pub fn update_global_indexed(&self, app: &str, key: &str, indexed: bool) -> Result<()> {
        self.check_app_key(app, key)?;
        let changed = self.rewrite_all(app, key, |row| {
            if row.is_indexed() == indexed {
                return Ok(None);
            }
            Ok(Some(self.reindex(row, indexed)))
        })?;
        debug!(app, key, indexed, changed, "updated indexing for all users");
        Ok(())
    }

    /// Move one entry between the fast and lazy tiers.
    ///
    /// Returns false if the key is unknown or already in that tier.
    pub fn update_lazy(&self, user_id: &str, app: &str, key: &str, lazy: bool) -> Result<bool> {
        self.check_entry(user_id, app, key)?;
        match self.cached_entry(user_id, app, key, None)? {
            Some((was_lazy, _)) if was_lazy != lazy => {}
            _ => return Ok(false),
        }

        if !self.store.set_lazy(user_id, app, key, lazy)? {
            return Ok(false);
        }
        self.write_cache()?.move_tier(user_id, app, key, lazy);
        Ok(true)
    }

    /// Change the tier of `(app, key)` for every user, then drop the whole cache.
    pub fn update_global_lazy(&self, app: &str, key: &str, lazy: bool) -> Result<()> {
        self.check_app_key(app, key)?;
        let changed = self.store.set_lazy_by_app_key(app, key, lazy)?;
        debug!(app, key, lazy, changed, "updated laziness for all users");
        self.clear_cache_all()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// All values of one app whose key starts with `prefix`, from both tiers.
    ///
    /// With `filtered`, sensitive values are replaced by the redaction marker.
    pub fn get_values(
        &self,
        user_id: &str,
        app: &str,
        prefix: &str,
        filtered: bool,
    ) -> Result<BTreeMap<String, TypedValue>> {
        self.check_user(user_id)?;
        self.check_app(app)?;
        self.check_key(prefix)?;
        self.load_user(user_id)?;

        let cache = self.read_cache()?;
        let mut values = BTreeMap::new();
        for lazy in [false, true] {
            let Some(entries) = cache.app_entries(user_id, app, lazy) else {
                continue;
            };
            for (key, entry) in entries.iter().filter(|(k, _)| k.starts_with(prefix)) {
                values.insert(key.clone(), self.present(entry, filtered));
            }
        }
        Ok(values)
    }

    /// Every value of a user, keyed by app then key.
    pub fn get_all_values(
        &self,
        user_id: &str,
        filtered: bool,
    ) -> Result<BTreeMap<String, BTreeMap<String, TypedValue>>> {
        self.check_user(user_id)?;
        self.load_user(user_id)?;

        let cache = self.read_cache()?;
        let mut values: BTreeMap<String, BTreeMap<String, TypedValue>> = BTreeMap::new();
        for lazy in [false, true] {
            let Some(tier) = cache.tier(user_id, lazy) else {
                continue;
            };
            for (app, entries) in tier {
                let app_values = values.entry(app.clone()).or_default();
                for (key, entry) in entries {
                    app_values.insert(key.clone(), self.present(entry, filtered));
                }
            }
        }
        Ok(values)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deletion
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete one entry.
    pub fn delete_preference(&self, user_id: &str, app: &str, key: &str) -> Result<()> {
        self.check_entry(user_id, app, key)?;
        self.store.delete_row(user_id, app, key)?;
        self.write_cache()?.remove(user_id, app, key);
        Ok(())
    }

    /// Delete `(app, key)` for every user.
    pub fn delete_key(&self, app: &str, key: &str) -> Result<()> {
        self.check_app_key(app, key)?;
        let deleted = self.store.delete_key(app, key)?;
        debug!(app, key, deleted, "deleted key for all users");
        self.clear_cache_all()
    }

    /// Delete every entry of an app for every user.
    pub fn delete_app(&self, app: &str) -> Result<()> {
        self.check_app(app)?;
        let deleted = self.store.delete_app(app)?;
        debug!(app, deleted, "deleted app for all users");
        self.clear_cache_all()
    }

    /// Delete every entry of a user.
    pub fn delete_all_preferences(&self, user_id: &str) -> Result<()> {
        self.check_user(user_id)?;
        let deleted = self.store.delete_user(user_id)?;
        debug!(user_id, deleted, "deleted all preferences of user");
        self.write_cache()?.clear_user(user_id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enumeration
    // ─────────────────────────────────────────────────────────────────────────

    /// Users holding any preference, or any preference of `app`.
    pub fn get_user_ids(&self, app: Option<&str>) -> Result<Vec<String>> {
        if let Some(app) = app {
            self.check_app(app)?;
        }
        Ok(self.store.user_ids(app)?)
    }

    pub fn get_apps(&self, user_id: &str) -> Result<Vec<String>> {
        self.check_user(user_id)?;
        Ok(self.store.apps(user_id)?)
    }

    pub fn get_keys(&self, user_id: &str, app: &str) -> Result<Vec<String>> {
        self.check_user(user_id)?;
        self.check_app(app)?;
        Ok(self.store.keys(user_id, app)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Control
    // ─────────────────────────────────────────────────────────────────────────

    /// Forget one user's cached state, optionally reloading both tiers.
    pub fn clear_cache(&self, user_id: &str, reload: bool) -> Result<()> {
        self.write_cache()?.clear_user(user_id);
        debug!(user_id, reload, "cleared preference cache for user");
        if reload {
            self.load_user(user_id)?;
        }
        Ok(())
    }

    /// Forget all cached state, including established types.
    pub fn clear_cache_all(&self) -> Result<()> {
        self.write_cache()?.clear_all();
        debug!("cleared preference cache");
        Ok(())
    }

    /// Snapshot of the cache. Sensitive values are redacted.
    pub fn status_cache(&self) -> Result<CacheStatus> {
        Ok(self.read_cache()?.status(&self.config.redaction_marker))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn read_cache(&self) -> Result<RwLockReadGuard<'_, CacheManager>> {
        self.cache.read().map_err(|_| PrefError::CachePoisoned)
    }

    fn write_cache(&self) -> Result<RwLockWriteGuard<'_, CacheManager>> {
        self.cache.write().map_err(|_| PrefError::CachePoisoned)
    }

    pub(crate) fn check_user(&self, user_id: &str) -> Result<()> {
        self.config
            .limits
            .check_user(user_id)
            .map_err(PrefError::from_validation)
    }

    pub(crate) fn check_app(&self, app: &str) -> Result<()> {
        self.config
            .limits
            .check_app(app)
            .map_err(PrefError::from_validation)
    }

    pub(crate) fn check_key(&self, key: &str) -> Result<()> {
        self.config
            .limits
            .check_key(key)
            .map_err(PrefError::from_validation)
    }

    pub(crate) fn check_app_key(&self, app: &str, key: &str) -> Result<()> {
        self.check_app(app)?;
        self.check_key(key)
    }

    fn check_entry(&self, user_id: &str, app: &str, key: &str) -> Result<()> {
        self.config
            .limits
            .check_entry(user_id, app, key)
            .map_err(PrefError::from_validation)
    }

    /// Decrypt a stored row into its cached form.
    pub(crate) fn entry_from_row(&self, row: &PreferenceRow) -> Result<CachedEntry> {
        let sensitive = row.is_sensitive();
        let raw = if sensitive {
            self.cipher.unwrap(&row.value)?
        } else {
            row.value.clone()
        };
        Ok(CachedEntry {
            raw,
            value_type: row.value_type,
            sensitive,
            indexed: row.is_indexed(),
        })
    }

    fn ensure_loaded(&self, user_id: &str, lazy: bool) -> Result<()> {
        if self.read_cache()?.is_loaded(user_id, lazy) {
            return Ok(());
        }

        let rows = self.store.load_user_rows(user_id, Some(lazy))?;
        let entries = rows
            .iter()
            .map(|row| -> Result<_> {
                Ok((row.app_id.clone(), row.key.clone(), self.entry_from_row(row)?))
            })
            .collect::<Result<Vec<_>>>()?;
        if lazy {
            debug!(user_id, rows = entries.len(), "loaded lazy preferences");
        } else {
            debug!(user_id, rows = entries.len(), "loaded fast preferences");
        }

        self.write_cache()?.fill(user_id, lazy, entries);
        Ok(())
    }

    fn ensure_tiers(&self, user_id: &str, lazy: Option<bool>) -> Result<()> {
        match lazy {
            Some(lazy) => self.ensure_loaded(user_id, lazy),
            None => {
                self.ensure_loaded(user_id, false)?;
                self.ensure_loaded(user_id, true)
            }
        }
    }

    /// Load both tiers and re-read every stale entry.
    fn load_user(&self, user_id: &str) -> Result<()> {
        self.ensure_tiers(user_id, None)?;
        let stale = self.read_cache()?.stale_entries(user_id);
        for (app, key) in stale {
            self.refresh_entry(user_id, &app, &key)?;
        }
        Ok(())
    }

    fn refresh_entry(&self, user_id: &str, app: &str, key: &str) -> Result<()> {
        let fresh = match self.store.get_row(user_id, app, key)? {
            Some(row) => Some((row.lazy, self.entry_from_row(&row)?)),
            None => None,
        };
        self.write_cache()?.refresh(user_id, app, key, fresh);
        Ok(())
    }

    /// The cached entry in the tier `lazy` selects (`None` = either), with its laziness.
    fn cached_entry(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: Option<bool>,
    ) -> Result<Option<(bool, CachedEntry)>> {
        self.ensure_tiers(user_id, lazy)?;
        if self.read_cache()?.is_stale(user_id, app, key) {
            self.refresh_entry(user_id, app, key)?;
        }

        let cache = self.read_cache()?;
        Ok(match lazy {
            Some(lazy) => cache
                .get(user_id, app, key, lazy)
                .map(|entry| (lazy, entry.clone())),
            None => cache
                .find(user_id, app, key)
                .map(|(lazy, entry)| (lazy, entry.clone())),
        })
    }

    fn require_entry(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: Option<bool>,
    ) -> Result<(bool, CachedEntry)> {
        self.check_entry(user_id, app, key)?;
        self.cached_entry(user_id, app, key, lazy)?
            .ok_or_else(|| PrefError::unknown_key(user_id, app, key))
    }

    /// The entry a write to `lazy` would replace, wherever it lives.
    ///
    /// The other tier is only read from the store when it is not cached.
    fn existing_entry(
        &self,
        user_id: &str,
        app: &str,
        key: &str,
        lazy: bool,
    ) -> Result<Option<(bool, CachedEntry)>> {
        if let Some(found) = self.cached_entry(user_id, app, key, Some(lazy))? {
            return Ok(Some(found));
        }
        if self.read_cache()?.is_loaded(user_id, !lazy) {
            return self.cached_entry(user_id, app, key, Some(!lazy));
        }
        match self.store.get_row(user_id, app, key)? {
            Some(row) => Ok(Some((row.lazy, self.entry_from_row(&row)?))),
            None => Ok(None),
        }
    }

    /// The entry's own type if set, else the type registered for `(app, key)`.
    fn established_type(
        &self,
        app: &str,
        key: &str,
        entry: Option<&CachedEntry>,
    ) -> Result<ValueType> {
        if let Some(entry) = entry {
            if !entry.value_type.is_mixed() {
                return Ok(entry.value_type);
            }
        }
        Ok(self
            .read_cache()?
            .registered_type(app, key)
            .unwrap_or_default())
    }

    /// The search shadow for a plaintext value stored with `flags`.
    fn index_for(
        &self,
        app: &str,
        key: &str,
        raw: &str,
        value_type: ValueType,
        flags: u32,
    ) -> String {
        if !is_flagged(FLAG_INDEXED, flags)
            || is_flagged(FLAG_SENSITIVE, flags)
            || value_type == ValueType::Array
        {
            return String::new();
        }
        if raw.len() > self.config.index_max_length {
            debug!(app, key, length = raw.len(), "value too long to index");
            return String::new();
        }
        raw.to_string()
    }

    /// Re-encrypt or decrypt a stored row.
    fn reseal(&self, mut row: PreferenceRow, sensitive: bool) -> Result<PreferenceRow> {
        let plain = if row.is_sensitive() {
            self.cipher.unwrap(&row.value)?
        } else {
            row.value.clone()
        };
        row.set_sensitive(sensitive);
        row.indexed = self.index_for(&row.app_id, &row.key, &plain, row.value_type, row.flags);
        row.value = if sensitive {
            self.cipher.wrap(&plain)?
        } else {
            plain
        };
        Ok(row)
    }

    /// Set a stored row's indexed bit and rebuild its shadow.
    ///
    /// Sensitive rows never get a shadow, so their value is not decrypted.
    fn reindex(&self, mut row: PreferenceRow, indexed: bool) -> PreferenceRow {
        row.set_indexed(indexed);
        row.indexed = self.index_for(&row.app_id, &row.key, &row.value, row.value_type, row.flags);
        row
    }

    /// Rewrite every row of `(app, key)` that `rewrite` returns a new form
    /// for, then drop the whole cache.
    ///
    /// The cache is dropped on every exit path. Returns the number of rows
    /// rewritten.
    fn rewrite_all<F>(&self, app: &str, key: &str, rewrite: F) -> Result<usize>
    where
        F: Fn(PreferenceRow) -> Result<Option<PreferenceRow>>,
    {
        let outcome = self.rewrite_rows(app, key, rewrite);
        self.clear_cache_all()?;
        outcome
    }

    fn rewrite_rows<F>(&self, app: &str, key: &str, rewrite: F) -> Result<usize>
    where
        F: Fn(PreferenceRow) -> Result<Option<PreferenceRow>>,
    {
        let mut changed = 0usize;
        for row in self.store.rows_by_app_key(app, key, None)? {
            let user_id = row.user_id.clone();
            let row = match rewrite(row) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(err) => {
                    warn!(user_id = %user_id, app, key, changed, error = %err, "bulk rewrite stopped");
                    return Err(err);
                }
            };
            self.store.update_row(&row)?;
            changed += 1;
        }
        Ok(changed)
    }

    fn present(&self, entry: &CachedEntry, filtered: bool) -> TypedValue {
        if filtered && entry.sensitive {
            return TypedValue::String(self.config.redaction_marker.clone());
        }
        typed_view(&entry.raw, entry.value_type)
    }
}

/// Decode leniently, keeping untyped values as raw strings.
pub(crate) fn typed_view(raw: &str, value_type: ValueType) -> TypedValue {
    if value_type.is_mixed() {
        TypedValue::Mixed(raw.to_string())
    } else {
        coerce(raw, value_type)
    }
}
