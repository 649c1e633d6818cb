//! SQLite implementation of the RowStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite behind a mutex; every call blocks the calling thread for the
//! duration of the statement.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use prefstore_core::{CoreError, PreferenceRow, ValueType, FLAG_SENSITIVE};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{IndexQuery, InsertResult, RowStore};

const ROW_COLUMNS: &str =
    "userid, appid, configkey, configvalue, type, lazy, sensitive_flags, indexed";

/// SQL function folding text the same way `str::to_lowercase` does.
///
/// SQLite's own `LOWER` only folds ASCII.
const FOLD_FUNCTION: &str = "prefstore_fold";

/// SQLite-based row store.
///
/// Thread-safe via internal Mutex.
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(format!("connection mutex: {}", e)))?;
        f(&conn)
    }

    fn query_rows(&self, sql: &str, values: Vec<rusqlite::types::Value>) -> Result<Vec<PreferenceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_preference)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn query_strings(&self, sql: &str, values: Vec<rusqlite::types::Value>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let out = stmt
                .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(out)
        })
    }

    fn execute(&self, sql: &str, values: Vec<rusqlite::types::Value>) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute(sql, params_from_iter(values))?))
    }
}

/// Register the scalar functions the queries rely on.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
    )?;
    Ok(())
}

// Helper to convert a row to PreferenceRow
fn row_to_preference(row: &rusqlite::Row<'_>) -> rusqlite::Result<PreferenceRow> {
    let type_raw: i64 = row.get("type")?;
    let value_type = ValueType::from_i64(type_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Integer,
            Box::new(CoreError::UnknownValueType(type_raw)),
        )
    })?;

    Ok(PreferenceRow {
        user_id: row.get("userid")?,
        app_id: row.get("appid")?,
        key: row.get("configkey")?,
        value: row.get("configvalue")?,
        value_type,
        lazy: row.get("lazy")?,
        flags: row.get("sensitive_flags")?,
        indexed: row.get("indexed")?,
    })
}

fn text(s: &str) -> rusqlite::types::Value {
    rusqlite::types::Value::Text(s.to_string())
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

impl RowStore for SqliteRowStore {
    fn load_user_rows(&self, user_id: &str, lazy: Option<bool>) -> Result<Vec<PreferenceRow>> {
        match lazy {
            Some(lazy) => self.query_rows(
                &format!(
                    "SELECT {} FROM preferences WHERE userid = ?1 AND lazy = ?2",
                    ROW_COLUMNS
                ),
                vec![text(user_id), rusqlite::types::Value::Integer(lazy as i64)],
            ),
            None => self.query_rows(
                &format!("SELECT {} FROM preferences WHERE userid = ?1", ROW_COLUMNS),
                vec![text(user_id)],
            ),
        }
    }

    fn get_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<Option<PreferenceRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM preferences
                     WHERE userid = ?1 AND appid = ?2 AND configkey = ?3",
                    ROW_COLUMNS
                ),
                params![user_id, app_id, key],
                row_to_preference,
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    fn insert_row(&self, row: &PreferenceRow) -> Result<InsertResult> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO preferences (
                    userid, appid, configkey, configvalue, type, lazy, sensitive_flags, indexed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.user_id,
                    row.app_id,
                    row.key,
                    row.value,
                    row.value_type.to_i64(),
                    row.lazy,
                    row.flags,
                    row.indexed,
                ],
            )?;

            if inserted == 0 {
                Ok(InsertResult::AlreadyExists)
            } else {
                Ok(InsertResult::Inserted)
            }
        })
    }

    fn update_row(&self, row: &PreferenceRow) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE preferences
                 SET configvalue = ?4, type = ?5, lazy = ?6, sensitive_flags = ?7, indexed = ?8
                 WHERE userid = ?1 AND appid = ?2 AND configkey = ?3",
                params![
                    row.user_id,
                    row.app_id,
                    row.key,
                    row.value,
                    row.value_type.to_i64(),
                    row.lazy,
                    row.flags,
                    row.indexed,
                ],
            )?;
            Ok(updated > 0)
        })
    }

    fn set_lazy(&self, user_id: &str, app_id: &str, key: &str, lazy: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE preferences SET lazy = ?4
                 WHERE userid = ?1 AND appid = ?2 AND configkey = ?3",
                params![user_id, app_id, key, lazy],
            )?;
            Ok(updated > 0)
        })
    }

    fn set_type(
        &self,
        user_id: &str,
        app_id: &str,
        key: &str,
        value_type: ValueType,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE preferences SET type = ?4
                 WHERE userid = ?1 AND appid = ?2 AND configkey = ?3",
                params![user_id, app_id, key, value_type.to_i64()],
            )?;
            Ok(updated > 0)
        })
    }

    fn rows_by_user_key(&self, user_id: &str, key: &str, lazy: bool) -> Result<Vec<PreferenceRow>> {
        self.query_rows(
            &format!(
                "SELECT {} FROM preferences
                 WHERE userid = ?1 AND configkey = ?2 AND lazy = ?3
                 ORDER BY appid",
                ROW_COLUMNS
            ),
            vec![
                text(user_id),
                text(key),
                rusqlite::types::Value::Integer(lazy as i64),
            ],
        )
    }

    fn rows_by_app_key(
        &self,
        app_id: &str,
        key: &str,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<PreferenceRow>> {
        let mut values = vec![text(app_id), text(key)];
        let mut sql = format!(
            "SELECT {} FROM preferences WHERE appid = ?1 AND configkey = ?2",
            ROW_COLUMNS
        );

        if let Some(ids) = user_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND userid IN ({})", placeholders(3, ids.len())));
            values.extend(ids.iter().map(|id| text(id)));
        }
        sql.push_str(" ORDER BY userid");

        self.query_rows(&sql, values)
    }

    fn search_users(&self, app_id: &str, key: &str, query: &IndexQuery) -> Result<Vec<String>> {
        if query.values.is_empty() {
            return Ok(Vec::new());
        }

        let column = if query.case_insensitive {
            format!("{}(indexed)", FOLD_FUNCTION)
        } else {
            "indexed".to_string()
        };
        let sql = format!(
            "SELECT DISTINCT userid FROM preferences
             WHERE appid = ?1 AND configkey = ?2
               AND indexed <> ''
               AND (sensitive_flags & {}) = 0
               AND {} IN ({})
             ORDER BY userid",
            FLAG_SENSITIVE,
            column,
            placeholders(3, query.values.len())
        );

        let mut values = vec![text(app_id), text(key)];
        values.extend(query.values.iter().map(|v| {
            if query.case_insensitive {
                text(&v.to_lowercase())
            } else {
                text(v)
            }
        }));

        self.query_strings(&sql, values)
    }

    fn set_lazy_by_app_key(&self, app_id: &str, key: &str, lazy: bool) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE preferences SET lazy = ?3
                 WHERE appid = ?1 AND configkey = ?2 AND lazy <> ?3",
                params![app_id, key, lazy],
            )?)
        })
    }

    fn delete_row(&self, user_id: &str, app_id: &str, key: &str) -> Result<usize> {
        self.execute(
            "DELETE FROM preferences WHERE userid = ?1 AND appid = ?2 AND configkey = ?3",
            vec![text(user_id), text(app_id), text(key)],
        )
    }

    fn delete_key(&self, app_id: &str, key: &str) -> Result<usize> {
        self.execute(
            "DELETE FROM preferences WHERE appid = ?1 AND configkey = ?2",
            vec![text(app_id), text(key)],
        )
    }

    fn delete_app(&self, app_id: &str) -> Result<usize> {
        self.execute(
            "DELETE FROM preferences WHERE appid = ?1",
            vec![text(app_id)],
        )
    }

    fn delete_user(&self, user_id: &str) -> Result<usize> {
        self.execute(
            "DELETE FROM preferences WHERE userid = ?1",
            vec![text(user_id)],
        )
    }

    fn user_ids(&self, app_id: Option<&str>) -> Result<Vec<String>> {
        match app_id {
            Some(app_id) => self.query_strings(
                "SELECT DISTINCT userid FROM preferences WHERE appid = ?1 ORDER BY userid",
                vec![text(app_id)],
            ),
            None => self.query_strings(
                "SELECT DISTINCT userid FROM preferences ORDER BY userid",
                Vec::new(),
            ),
        }
    }

    fn apps(&self, user_id: &str) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT DISTINCT appid FROM preferences WHERE userid = ?1 ORDER BY appid",
            vec![text(user_id)],
        )
    }

    fn keys(&self, user_id: &str, app_id: &str) -> Result<Vec<String>> {
        self.query_strings(
            "SELECT configkey FROM preferences WHERE userid = ?1 AND appid = ?2 ORDER BY configkey",
            vec![text(user_id), text(app_id)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<PreferenceRow> {
        vec![
            PreferenceRow::new("user1", "app1", "key1", "Value1", ValueType::String)
                .indexed("Value1"),
            PreferenceRow::new("user1", "app1", "lazy1", "12", ValueType::Int).lazy(true),
            PreferenceRow::new("user2", "app1", "key1", "value1", ValueType::String)
                .indexed("value1"),
            PreferenceRow::new("user3", "app1", "key1", "$enc$value1", ValueType::String)
                .flags(FLAG_SENSITIVE),
        ]
    }

    fn seeded() -> SqliteRowStore {
        let store = SqliteRowStore::open_memory().unwrap();
        for row in sample() {
            store.insert_row(&row).unwrap();
        }
        store
    }

    #[test]
    fn test_insert_and_get() {
        let store = seeded();
        let row = store.get_row("user1", "app1", "lazy1").unwrap().unwrap();
        assert_eq!(row.value, "12");
        assert_eq!(row.value_type, ValueType::Int);
        assert!(row.lazy);

        assert!(store.get_row("user1", "app1", "missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_existing_returns_already_exists() {
        let store = seeded();
        let dup = PreferenceRow::new("user1", "app1", "key1", "changed", ValueType::String);
        assert_eq!(store.insert_row(&dup).unwrap(), InsertResult::AlreadyExists);
        let row = store.get_row("user1", "app1", "key1").unwrap().unwrap();
        assert_eq!(row.value, "Value1");
    }

    #[test]
    fn test_update_row_overwrites() {
        let store = seeded();
        let updated = PreferenceRow::new("user1", "app1", "key1", "new", ValueType::String)
            .lazy(true)
            .flags(FLAG_SENSITIVE);
        assert!(store.update_row(&updated).unwrap());
        assert_eq!(store.get_row("user1", "app1", "key1").unwrap().unwrap(), updated);
    }

    #[test]
    fn test_tier_loading() {
        let store = seeded();
        assert_eq!(store.load_user_rows("user1", Some(false)).unwrap().len(), 1);
        assert_eq!(store.load_user_rows("user1", Some(true)).unwrap().len(), 1);
        assert_eq!(store.load_user_rows("user1", None).unwrap().len(), 2);
    }

    #[test]
    fn test_search_case_insensitive_and_sensitive_exclusion() {
        let store = seeded();

        let exact = store
            .search_users("app1", "key1", &IndexQuery::exact("value1"))
            .unwrap();
        assert_eq!(exact, vec!["user2"]);

        let folded = store
            .search_users(
                "app1",
                "key1",
                &IndexQuery::exact("VALUE1").case_insensitive(true),
            )
            .unwrap();
        assert_eq!(folded, vec!["user1", "user2"]);
    }

    #[test]
    fn test_search_case_insensitive_folds_non_ascii() {
        let store = SqliteRowStore::open_memory().unwrap();
        let row = PreferenceRow::new("u1", "app", "k", "Élan", ValueType::String).indexed("Élan");
        store.insert_row(&row).unwrap();

        for needle in ["Élan", "élan", "ÉLAN"] {
            let found = store
                .search_users("app", "k", &IndexQuery::exact(needle).case_insensitive(true))
                .unwrap();
            assert_eq!(found, vec!["u1"], "needle {}", needle);
        }
        assert!(store
            .search_users("app", "k", &IndexQuery::exact("élan"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rows_by_app_key_with_user_filter() {
        let store = seeded();
        let ids = vec!["user1".to_string(), "user3".to_string()];
        let rows = store.rows_by_app_key("app1", "key1", Some(&ids)).unwrap();
        let users: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["user1", "user3"]);

        assert!(store.rows_by_app_key("app1", "key1", Some(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_global_lazy_counts_changed_rows() {
        let store = seeded();
        assert_eq!(store.set_lazy_by_app_key("app1", "key1", true).unwrap(), 3);
        assert_eq!(store.set_lazy_by_app_key("app1", "key1", true).unwrap(), 0);
    }

    #[test]
    fn test_enumeration_and_deletes() {
        let store = seeded();
        assert_eq!(store.user_ids(None).unwrap(), vec!["user1", "user2", "user3"]);
        assert_eq!(store.apps("user1").unwrap(), vec!["app1"]);
        assert_eq!(store.keys("user1", "app1").unwrap(), vec!["key1", "lazy1"]);

        assert_eq!(store.delete_key("app1", "key1").unwrap(), 3);
        assert_eq!(store.user_ids(Some("app1")).unwrap(), vec!["user1"]);
        assert_eq!(store.delete_user("user1").unwrap(), 1);
        assert!(store.user_ids(None).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        {
            let store = SqliteRowStore::open(&path).unwrap();
            store
                .insert_row(&PreferenceRow::new("u", "a", "k", "v", ValueType::String))
                .unwrap();
        }

        let store = SqliteRowStore::open(&path).unwrap();
        assert_eq!(store.get_row("u", "a", "k").unwrap().unwrap().value, "v");
    }
}
