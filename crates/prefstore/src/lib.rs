//! # Prefstore
//!
//! A typed, cached, multi-tenant preference store. Every preference is
//! addressed by `(user, app, key)`, carries a type tag, and may be lazy
//! (loaded on demand) or sensitive (encrypted at rest).
//!
//! ## Overview
//!
//! - **Typed values**: the first typed write establishes a key's type;
//!   later writes of another type fail with [`PrefError::TypeConflict`]
//! - **Two-tier cache**: a user's fast entries load in one read on first
//!   access, lazy entries only when asked for
//! - **Sensitive values**: encrypted in the row store, redacted in
//!   filtered bulk reads and excluded from value search
//! - **Cross-user queries**: bulk reads and search go straight to the store
//! - **Indexed values**: only entries flagged indexed are searchable; new
//!   keys follow `index_by_default`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefstore::{PreferenceStore, PreferenceStoreConfig};
//! use prefstore::crypto::ChaChaCipher;
//! use prefstore::store::SqliteRowStore;
//!
//! fn example() -> prefstore::Result<()> {
//!     let rows = SqliteRowStore::open("preferences.db")?;
//!     let cipher = ChaChaCipher::from_secret(b"instance secret");
//!     let prefs = PreferenceStore::new(rows, cipher, PreferenceStoreConfig::default());
//!
//!     prefs.set_value_string("alice", "theme", "color", "dark", false, false)?;
//!     prefs.set_value_string("alice", "mail", "password", "hunter2", true, true)?;
//!
//!     assert_eq!(prefs.get_value_string("alice", "theme", "color", "light", false)?, "dark");
//!     assert!(prefs.is_sensitive("alice", "mail", "password", None)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `prefstore::core` - value types, rows and the codec
//! - `prefstore::store` - the row store trait, SQLite and in-memory stores
//! - `prefstore::crypto` - ciphers for sensitive values

pub mod cache;
pub mod config;
pub mod error;
pub mod preferences;
pub mod search;
pub mod value;

// Re-export component crates
pub use prefstore_core as core;
pub use prefstore_crypto as crypto;
pub use prefstore_store as store;

// Re-export main types for convenience
pub use cache::{CacheManager, CacheStatus, CachedEntry, UserCacheStatus};
pub use config::{PreferenceStoreConfig, DEFAULT_REDACTION_MARKER};
pub use error::{PrefError, Result};
pub use preferences::{EntryDetails, PreferenceStore};
pub use value::PreferenceValue;

pub use prefstore_core::{TypedValue, ValueType};
