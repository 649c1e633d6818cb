//! Cross-app, cross-user and value-search queries.
//!
//! Every scenario runs once over the in-memory row store and once over
//! in-memory SQLite, so both backends answer the same queries the same way.

use prefstore::store::RowStore;
use prefstore::{PreferenceStoreConfig, TypedValue, ValueType};
use prefstore_testkit::{reference_entries, FixtureEntry, TestFixture};

fn users(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Generates one test per backend for each `check => fixture => test` line.
///
/// A check is a generic function taking the fixture it runs on; `fixture`
/// is `seeded` for the reference data set or `empty` for no rows.
macro_rules! on_both_backends {
    ($($check:ident => $seed:ident => $test:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[test]
                fn $test() {
                    $check(&on_both_backends!(@memory $seed));
                }
            )*
        }

        mod sqlite {
            use super::*;
            $(
                #[test]
                fn $test() {
                    $check(&on_both_backends!(@sqlite $seed));
                }
            )*
        }
    };
    (@memory seeded) => { TestFixture::seeded().unwrap() };
    (@memory empty) => { TestFixture::new() };
    (@sqlite seeded) => { TestFixture::seeded_sqlite().unwrap() };
    (@sqlite empty) => { TestFixture::sqlite().unwrap() };
}

on_both_backends! {
    values_by_apps_decrypts_sensitive_rows => seeded => test_values_by_apps_decrypts_sensitive_rows,
    values_by_apps_coerces_to_requested_type => seeded => test_values_by_apps_coerces_to_requested_type,
    values_by_apps_stays_in_one_tier => seeded => test_values_by_apps_stays_in_one_tier,
    values_by_users => seeded => test_values_by_users,
    values_by_users_with_user_filter => seeded => test_values_by_users_with_user_filter,
    cross_user_queries_bypass_cache => seeded => test_cross_user_queries_bypass_cache,
    search_string => seeded => test_search_string,
    search_skips_sensitive_rows => seeded => test_search_skips_sensitive_rows,
    search_int => seeded => test_search_int,
    search_values => seeded => test_search_values,
    search_bool => seeded => test_search_bool,
    search_skips_unindexed_keys => seeded => test_search_skips_unindexed_keys,
    search_bool_matches_word_forms => empty => test_search_bool_matches_word_forms,
    search_folds_non_ascii_case => empty => test_search_folds_non_ascii_case,
}

// ─────────────────────────────────────────────────────────────────────────────
// Bulk Reads
// ─────────────────────────────────────────────────────────────────────────────

fn values_by_apps_decrypts_sensitive_rows<S: RowStore>(f: &TestFixture<S>) {
    let values = f.prefs.get_values_by_apps("user1", "key8", false, None).unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values["app2"], TypedValue::Int(11));
    assert_eq!(values["app3"], TypedValue::Int(12));
}

fn values_by_apps_coerces_to_requested_type<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    let as_string = p
        .get_values_by_apps("user1", "key8", false, Some(ValueType::String))
        .unwrap();
    assert_eq!(as_string["app2"], TypedValue::String("11".into()));
    assert_eq!(as_string["app3"], TypedValue::String("12".into()));

    let as_int = p
        .get_values_by_apps("user1", "key9", false, Some(ValueType::Int))
        .unwrap();
    assert_eq!(as_int["app2"], TypedValue::Int(0));
    assert_eq!(as_int["app3"], TypedValue::Int(0));
}

fn values_by_apps_stays_in_one_tier<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    let fast = p.get_values_by_apps("user1", "key1", false, None).unwrap();
    assert_eq!(fast.keys().cloned().collect::<Vec<_>>(), users(&["app1", "app3"]));

    let lazy = p.get_values_by_apps("user1", "key1", true, None).unwrap();
    assert_eq!(lazy.keys().cloned().collect::<Vec<_>>(), users(&["only-lazy"]));
    assert_eq!(lazy["only-lazy"], TypedValue::String("value456".into()));
}

fn values_by_users<S: RowStore>(f: &TestFixture<S>) {
    let values = f.prefs.get_values_by_users("app2", "key2", None, None).unwrap();

    assert_eq!(values.len(), 4);
    assert_eq!(values["user1"], TypedValue::String("value2a".into()));
    assert_eq!(values["user2"], TypedValue::String("value2b".into()));
    assert_eq!(values["user3"], TypedValue::Mixed("value2c".into()));
    assert_eq!(values["user4"], TypedValue::Mixed("value2A".into()));

    let ints = f
        .prefs
        .get_values_by_users("app2", "key8", Some(ValueType::Int), None)
        .unwrap();
    assert_eq!(ints["user1"], TypedValue::Int(11));
    assert_eq!(ints["user2"], TypedValue::Int(12));
    assert_eq!(ints["user5"], TypedValue::Int(12));
}

fn values_by_users_with_user_filter<S: RowStore>(f: &TestFixture<S>) {
    let ids = users(&["user1", "user3", "user9"]);
    let values = f
        .prefs
        .get_values_by_users("app2", "key2", None, Some(&ids))
        .unwrap();

    assert_eq!(values.keys().cloned().collect::<Vec<_>>(), users(&["user1", "user3"]));
    assert_eq!(f.counts().rows_by_app_key, 1);
}

fn cross_user_queries_bypass_cache<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    p.get_values_by_users("app2", "key2", None, None).unwrap();
    p.get_values_by_apps("user1", "key8", false, None).unwrap();
    p.search_users_by_value_string("app2", "key2", "value2a", false).unwrap();

    assert!(p.status_cache().unwrap().users.is_empty());
    assert_eq!(f.counts().load_user_rows, 0);
}

#[test]
fn test_values_by_users_chunks_user_ids() {
    let config = PreferenceStoreConfig {
        user_id_chunk_size: 2,
        ..Default::default()
    };
    let ids = users(&["user1", "user2", "user3", "user4", "user5"]);

    let memory = TestFixture::seeded_with(&reference_entries(), config.clone()).unwrap();
    let sqlite = TestFixture::seeded_sqlite_with(&reference_entries(), config).unwrap();

    let from_memory = memory
        .prefs
        .get_values_by_users("app2", "key2", None, Some(&ids))
        .unwrap();
    let from_sqlite = sqlite
        .prefs
        .get_values_by_users("app2", "key2", None, Some(&ids))
        .unwrap();

    assert_eq!(from_memory.len(), 4);
    assert_eq!(from_memory, from_sqlite);
    assert_eq!(memory.counts().rows_by_app_key, 3);
    assert_eq!(sqlite.counts().rows_by_app_key, 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Search
// ─────────────────────────────────────────────────────────────────────────────

fn search_string<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    assert_eq!(
        p.search_users_by_value_string("app2", "key2", "value2a", false).unwrap(),
        users(&["user1"])
    );
    assert_eq!(
        p.search_users_by_value_string("app2", "key2", "value2A", false).unwrap(),
        users(&["user4"])
    );
    assert_eq!(
        p.search_users_by_value_string("app2", "key2", "value2A", true).unwrap(),
        users(&["user1", "user4"])
    );
}

fn search_skips_sensitive_rows<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    assert!(p.search_users_by_value_int("app3", "key8", 12).unwrap().is_empty());
    assert!(p
        .search_users_by_value_string("app2", "key4", "value4", false)
        .unwrap()
        .is_empty());
}

fn search_int<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    assert_eq!(
        p.search_users_by_value_int("app2", "key8", 12).unwrap(),
        users(&["user2", "user5"])
    );
    assert_eq!(
        p.search_users_by_value_int("only-lazy", "key1", 123).unwrap(),
        users(&["user4"])
    );
}

fn search_values<S: RowStore>(f: &TestFixture<S>) {
    let values = users(&["value2a", "value2b"]);
    assert_eq!(
        f.prefs.search_users_by_values("app2", "key2", &values).unwrap(),
        users(&["user1", "user2"])
    );
}

fn search_bool<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    assert_eq!(
        p.search_users_by_value_bool("app3", "key10", true).unwrap(),
        users(&["user1", "user4"])
    );
    assert_eq!(
        p.search_users_by_value_bool("app3", "key10", false).unwrap(),
        users(&["user2"])
    );
}

fn search_skips_unindexed_keys<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    assert!(p.update_indexed("user1", "app2", "key2", false).unwrap());
    assert_eq!(
        p.search_users_by_value_string("app2", "key2", "VALUE2A", true).unwrap(),
        users(&["user4"])
    );

    p.update_global_indexed("app2", "key2", false).unwrap();
    assert!(p
        .search_users_by_value_string("app2", "key2", "value2A", true)
        .unwrap()
        .is_empty());

    p.update_global_indexed("app2", "key2", true).unwrap();
    assert_eq!(
        p.search_users_by_value_string("app2", "key2", "value2A", true).unwrap(),
        users(&["user1", "user4"])
    );
}

fn search_bool_matches_word_forms<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    p.set_value_mixed("alice", "flags", "beta", "yes", false, false).unwrap();
    p.set_value_mixed("bob", "flags", "beta", "on", false, false).unwrap();
    p.set_value_mixed("carol", "flags", "beta", "off", false, false).unwrap();
    p.set_value_bool("dave", "flags", "beta", true, false, false).unwrap();

    assert_eq!(
        p.search_users_by_value_bool("flags", "beta", true).unwrap(),
        users(&["alice", "bob", "dave"])
    );
    assert_eq!(
        p.search_users_by_value_bool("flags", "beta", false).unwrap(),
        users(&["carol"])
    );
}

fn search_folds_non_ascii_case<S: RowStore>(f: &TestFixture<S>) {
    let p = &f.prefs;

    p.set_value_string("u1", "profile", "city", "Élan", false, false).unwrap();
    p.set_value_string("u2", "profile", "city", "ÉLAN", false, false).unwrap();
    p.set_value_string("u3", "profile", "city", "Zürich", false, false).unwrap();

    assert_eq!(
        p.search_users_by_value_string("profile", "city", "Élan", false).unwrap(),
        users(&["u1"])
    );
    assert_eq!(
        p.search_users_by_value_string("profile", "city", "élan", true).unwrap(),
        users(&["u1", "u2"])
    );
    assert_eq!(
        p.search_users_by_value_string("profile", "city", "ZÜRICH", true).unwrap(),
        users(&["u3"])
    );
}

#[test]
fn test_update_indexed_empties_stored_shadow() {
    let entries = vec![FixtureEntry::new("u1", "app", "k", "v")];
    let f = TestFixture::seeded_sqlite_with(&entries, PreferenceStoreConfig::default()).unwrap();

    assert!(f.prefs.is_indexed("u1", "app", "k", None).unwrap());
    assert!(f.prefs.update_indexed("u1", "app", "k", false).unwrap());
    let row = f.stored_row("u1", "app", "k").unwrap();
    assert!(!row.is_indexed());
    assert!(row.indexed.is_empty());
}
