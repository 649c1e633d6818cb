//! # Prefstore Core
//!
//! Pure primitives for the preference store: value types, persisted rows,
//! and the value codec.
//!
//! This crate contains no I/O, no storage, no encryption. It is pure
//! computation over the data model shared by every other prefstore crate.
//!
//! ## Key Types
//!
//! - [`ValueType`] - The type tag persisted with every preference
//! - [`TypedValue`] - A decoded preference value
//! - [`PreferenceRow`] - One persisted `(user, app, key)` row
//! - [`Limits`] - Identifier length limits enforced before any I/O
//!
//! ## Codec
//!
//! Values are persisted as strings. See the [`codec`] module for the exact
//! mapping, including the legacy boolean rule (`"0"` is false, any other
//! non-empty string is true).

pub mod codec;
pub mod error;
pub mod row;
pub mod types;
pub mod validation;

pub use codec::{coerce, decode, decode_bool, encode, resolve_type};
pub use error::{CoreError, Result};
pub use row::{is_flagged, PreferenceRow, FLAG_INDEXED, FLAG_SENSITIVE};
pub use types::{TypedValue, ValueType};
pub use validation::Limits;
