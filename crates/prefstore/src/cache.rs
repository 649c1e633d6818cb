//! Per-user two-tier preference cache.
//!
//! The cache is pure state: it never touches the row store. The facade
//! reads rows, decrypts them and hands the result to [`CacheManager::fill`].
//!
//! Each user has a fast tier (non-lazy rows, loaded on first access) and a
//! lazy tier (loaded on demand). The two load flags are independent.
//! Alongside the per-user state sits the `value_types` registry, which
//! records the established type of each `(app, key)` across all users.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use prefstore_core::ValueType;
use serde::Serialize;

/// A cached preference. `raw` is the decrypted persisted string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub raw: String,
    pub value_type: ValueType,
    pub sensitive: bool,
    pub indexed: bool,
}

/// `app -> key -> entry`.
pub type Tier = BTreeMap<String, BTreeMap<String, CachedEntry>>;

#[derive(Debug, Default)]
struct UserCache {
    fast_loaded: bool,
    lazy_loaded: bool,
    fast: Tier,
    lazy: Tier,
    /// Entries whose cached form must be re-read before use.
    stale: BTreeSet<(String, String)>,
}

impl UserCache {
    fn tier(&self, lazy: bool) -> &Tier {
        if lazy {
            &self.lazy
        } else {
            &self.fast
        }
    }

    fn tier_mut(&mut self, lazy: bool) -> &mut Tier {
        if lazy {
            &mut self.lazy
        } else {
            &mut self.fast
        }
    }

    fn contains(&self, app: &str, key: &str) -> bool {
        [false, true]
            .iter()
            .any(|&lazy| self.tier(lazy).get(app).map_or(false, |keys| keys.contains_key(key)))
    }

    fn entry_mut(&mut self, app: &str, key: &str) -> Option<&mut CachedEntry> {
        if self.fast.get(app).map_or(false, |keys| keys.contains_key(key)) {
            return self.fast.get_mut(app)?.get_mut(key);
        }
        self.lazy.get_mut(app)?.get_mut(key)
    }

    /// One tier as plain strings, sensitive and stale values replaced by `marker`.
    fn redacted(&self, lazy: bool, marker: &str) -> BTreeMap<String, BTreeMap<String, String>> {
        self.tier(lazy)
            .iter()
            .map(|(app, keys)| {
                let keys = keys
                    .iter()
                    .map(|(key, entry)| {
                        let stale = self.stale.contains(&(app.clone(), key.clone()));
                        let raw = if entry.sensitive || stale {
                            marker.to_string()
                        } else {
                            entry.raw.clone()
                        };
                        (key.clone(), raw)
                    })
                    .collect();
                (app.clone(), keys)
            })
            .collect()
    }

    fn take(&mut self, lazy: bool, app: &str, key: &str) -> Option<CachedEntry> {
        let tier = self.tier_mut(lazy);
        let keys = tier.get_mut(app)?;
        let entry = keys.remove(key);
        if keys.is_empty() {
            tier.remove(app);
        }
        entry
    }
}

/// In-memory cache of user preferences and the process-wide type registry.
#[derive(Debug, Default)]
pub struct CacheManager {
    users: HashMap<String, UserCache>,
    value_types: HashMap<(String, String), ValueType>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a user's tier has been loaded.
    pub fn is_loaded(&self, user_id: &str, lazy: bool) -> bool {
        self.users.get(user_id).map_or(false, |u| {
            if lazy {
                u.lazy_loaded
            } else {
                u.fast_loaded
            }
        })
    }

    /// Populate one tier from freshly read rows and mark it loaded.
    ///
    /// A tier that is already loaded is left alone. Keys already cached in
    /// either tier are skipped: they were put by a write that landed while
    /// the rows were being read, and are newer.
    pub fn fill<I>(&mut self, user_id: &str, lazy: bool, entries: I)
    where
        I: IntoIterator<Item = (String, String, CachedEntry)>,
    {
        let user = self.users.entry(user_id.to_string()).or_default();
        let loaded = if lazy {
            &mut user.lazy_loaded
        } else {
            &mut user.fast_loaded
        };
        if *loaded {
            return;
        }
        *loaded = true;

        for (app, key, entry) in entries {
            if user.contains(&app, &key) {
                continue;
            }
            if !entry.value_type.is_mixed() {
                self.value_types
                    .entry((app.clone(), key.clone()))
                    .or_insert(entry.value_type);
            }
            user.stale.remove(&(app.clone(), key.clone()));
            user.tier_mut(lazy).entry(app).or_default().insert(key, entry);
        }
    }

    /// Look up an entry in one tier.
    pub fn get(&self, user_id: &str, app: &str, key: &str, lazy: bool) -> Option<&CachedEntry> {
        self.users.get(user_id)?.tier(lazy).get(app)?.get(key)
    }

    /// Look up an entry in either tier, returning its laziness.
    pub fn find(&self, user_id: &str, app: &str, key: &str) -> Option<(bool, &CachedEntry)> {
        self.get(user_id, app, key, false)
            .map(|e| (false, e))
            .or_else(|| self.get(user_id, app, key, true).map(|e| (true, e)))
    }

    /// All entries of one app in one tier.
    pub fn app_entries(
        &self,
        user_id: &str,
        app: &str,
        lazy: bool,
    ) -> Option<&BTreeMap<String, CachedEntry>> {
        self.users.get(user_id)?.tier(lazy).get(app)
    }

    /// One full tier of a user, keyed by app.
    pub fn tier(&self, user_id: &str, lazy: bool) -> Option<&Tier> {
        self.users.get(user_id).map(|u| u.tier(lazy))
    }

    /// Store an entry in the given tier, removing it from the other one.
    pub fn put(&mut self, user_id: &str, app: &str, key: &str, lazy: bool, entry: CachedEntry) {
        if !entry.value_type.is_mixed() {
            self.value_types
                .insert((app.to_string(), key.to_string()), entry.value_type);
        }
        let user = self.users.entry(user_id.to_string()).or_default();
        user.take(!lazy, app, key);
        user.stale.remove(&(app.to_string(), key.to_string()));
        user.tier_mut(lazy)
            .entry(app.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    /// Drop one entry from both tiers.
    pub fn remove(&mut self, user_id: &str, app: &str, key: &str) {
        if let Some(user) = self.users.get_mut(user_id) {
            user.take(false, app, key);
            user.take(true, app, key);
            user.stale.remove(&(app.to_string(), key.to_string()));
        }
    }

    /// Move an entry to the other tier. Returns false if it was not cached.
    pub fn move_tier(&mut self, user_id: &str, app: &str, key: &str, lazy: bool) -> bool {
        let Some(user) = self.users.get_mut(user_id) else {
            return false;
        };
        match user.take(!lazy, app, key) {
            Some(entry) => {
                user.tier_mut(lazy)
                    .entry(app.to_string())
                    .or_default()
                    .insert(key.to_string(), entry);
                true
            }
            None => false,
        }
    }

    /// Retag a cached entry and record the type in the registry.
    pub fn set_type(&mut self, user_id: &str, app: &str, key: &str, value_type: ValueType) {
        if !value_type.is_mixed() {
            self.value_types
                .insert((app.to_string(), key.to_string()), value_type);
        }
        if let Some(user) = self.users.get_mut(user_id) {
            for lazy in [false, true] {
                if let Some(entry) = user
                    .tier_mut(lazy)
                    .get_mut(app)
                    .and_then(|keys| keys.get_mut(key))
                {
                    entry.value_type = value_type;
                }
            }
        }
    }

    /// Set the indexed bit of a cached entry.
    pub fn set_indexed(&mut self, user_id: &str, app: &str, key: &str, indexed: bool) {
        if let Some(entry) = self
            .users
            .get_mut(user_id)
            .and_then(|user| user.entry_mut(app, key))
        {
            entry.indexed = indexed;
        }
    }

    /// Flag an entry so its next read goes back to the store.
    pub fn mark_stale(&mut self, user_id: &str, app: &str, key: &str) {
        if let Some(user) = self.users.get_mut(user_id) {
            user.stale.insert((app.to_string(), key.to_string()));
        }
    }

    pub fn is_stale(&self, user_id: &str, app: &str, key: &str) -> bool {
        self.users.get(user_id).map_or(false, |u| {
            u.stale.contains(&(app.to_string(), key.to_string()))
        })
    }

    /// Stale entries of a user.
    pub fn stale_entries(&self, user_id: &str) -> Vec<(String, String)> {
        self.users
            .get(user_id)
            .map(|u| u.stale.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace a stale entry with what the store now holds.
    ///
    /// `None` means the row is gone.
    pub fn refresh(
        &mut self,
        user_id: &str,
        app: &str,
        key: &str,
        fresh: Option<(bool, CachedEntry)>,
    ) {
        self.remove(user_id, app, key);
        if let Some((lazy, entry)) = fresh {
            self.put(user_id, app, key, lazy, entry);
        }
    }

    /// The established type of `(app, key)`, if any user has one cached.
    pub fn registered_type(&self, app: &str, key: &str) -> Option<ValueType> {
        self.value_types
            .get(&(app.to_string(), key.to_string()))
            .copied()
    }

    /// Forget one user. The type registry is kept.
    pub fn clear_user(&mut self, user_id: &str) {
        self.users.remove(user_id);
    }

    /// Forget everything, including the type registry.
    pub fn clear_all(&mut self) {
        self.users.clear();
        self.value_types.clear();
    }

    /// Number of users with any cached state.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// An owned snapshot with sensitive values replaced by `redaction_marker`.
    ///
    /// Stale entries are redacted too: their sensitivity may have changed.
    pub fn status(&self, redaction_marker: &str) -> CacheStatus {
        let users = self
            .users
            .iter()
            .map(|(user_id, user)| {
                let status = UserCacheStatus {
                    fast_loaded: user.fast_loaded,
                    lazy_loaded: user.lazy_loaded,
                    fast: user.redacted(false, redaction_marker),
                    lazy: user.redacted(true, redaction_marker),
                };
                (user_id.clone(), status)
            })
            .collect();

        let mut value_types: BTreeMap<String, BTreeMap<String, ValueType>> = BTreeMap::new();
        for ((app, key), ty) in &self.value_types {
            value_types
                .entry(app.clone())
                .or_default()
                .insert(key.clone(), *ty);
        }

        CacheStatus { users, value_types }
    }
}

/// Immutable snapshot of the cache, for introspection and tests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CacheStatus {
    pub users: BTreeMap<String, UserCacheStatus>,
    /// `app -> key -> type`.
    pub value_types: BTreeMap<String, BTreeMap<String, ValueType>>,
}

/// One user's slice of a [`CacheStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UserCacheStatus {
    pub fast_loaded: bool,
    pub lazy_loaded: bool,
    /// `app -> key -> raw value`.
    pub fast: BTreeMap<String, BTreeMap<String, String>>,
    pub lazy: BTreeMap<String, BTreeMap<String, String>>,
}

impl CacheStatus {
    pub fn user(&self, user_id: &str) -> Option<&UserCacheStatus> {
        self.users.get(user_id)
    }
}
