//! # Prefstore Testkit
//!
//! Testing utilities for the preference store.
//!
//! This crate provides:
//!
//! - **Call counting**: [`CountingRowStore`] wraps any row store and counts
//!   the calls made through it, so cache behaviour can be asserted
//! - **Fixtures**: a seeded reference data set of five users across several
//!   apps, covering every value type, both tiers and sensitive entries
//! - **Generators**: proptest strategies for identifiers and typed values
//!
//! ## Test Fixtures
//!
//! ```rust
//! use prefstore_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::seeded().unwrap();
//! let prefs = &fixture.prefs;
//! assert_eq!(prefs.get_value_string("user1", "app1", "fast_string", "", false).unwrap(), "f_value");
//! assert_eq!(prefs.store().counts().load_user_rows, 1);
//! ```

pub mod counting;
pub mod fixtures;
pub mod generators;

pub use counting::{CallCounts, CountingRowStore};
pub use fixtures::{reference_entries, FixtureEntry, TestFixture};
