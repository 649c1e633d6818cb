//! # Prefstore Store
//!
//! Row store abstraction for the preference store. Provides a trait-based
//! interface for row persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts preference persistence behind the
//! [`RowStore`] trait, keeping the cache and facade storage-agnostic. The
//! primary implementation is [`SqliteRowStore`], with [`MemoryRowStore`]
//! for tests and embedding.
//!
//! ## Key Types
//!
//! - [`RowStore`] - The trait for all row operations
//! - [`SqliteRowStore`] - SQLite-based persistent storage
//! - [`MemoryRowStore`] - In-memory storage
//! - [`InsertResult`] - Result of inserting a row
//! - [`IndexQuery`] - A value search against the `indexed` shadow column
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefstore_core::{PreferenceRow, ValueType};
//! use prefstore_store::{InsertResult, RowStore, SqliteRowStore};
//!
//! let store = SqliteRowStore::open("preferences.db").unwrap();
//! let row = PreferenceRow::new("alice", "files", "sort", "name", ValueType::String);
//! assert_eq!(store.insert_row(&row).unwrap(), InsertResult::Inserted);
//! ```
//!
//! ## Design Notes
//!
//! - **Unique rows**: `(user_id, app_id, key)` is unique; inserting an
//!   existing triple returns `AlreadyExists` and leaves the row untouched.
//! - **Opaque values**: the store never encodes, decodes, encrypts or
//!   decrypts; it persists exactly the strings it is given.
//! - **Search by shadow**: value search only looks at `indexed`, and never
//!   matches sensitive rows.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryRowStore;
pub use sqlite::SqliteRowStore;
pub use traits::{IndexQuery, InsertResult, RowStore};
