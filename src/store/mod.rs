//! Versioned save database
//!
//! Every collection is one SQLite table holding JSON snapshots keyed by the
//! record's `id` field. The database lives at `~/.idlecraft/save.db` unless
//! configured otherwise.

pub mod export;
mod migrations;
pub mod snapshot;

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Rejection, StoreError};

pub use migrations::{LATEST_VERSION, MIGRATIONS, Migration, migrate};

/// Named collections of the save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    GameState,
    Settings,
    Skills,
    Shop,
    Events,
    Achievements,
    DailyTasks,
    Notifications,
    Pets,
    Equipment,
    Exploration,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::GameState,
        Collection::Settings,
        Collection::Skills,
        Collection::Shop,
        Collection::Events,
        Collection::Achievements,
        Collection::DailyTasks,
        Collection::Notifications,
        Collection::Pets,
        Collection::Equipment,
        Collection::Exploration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::GameState => "gameState",
            Collection::Settings => "settings",
            Collection::Skills => "skills",
            Collection::Shop => "shop",
            Collection::Events => "events",
            Collection::Achievements => "achievements",
            Collection::DailyTasks => "dailyTasks",
            Collection::Notifications => "notifications",
            Collection::Pets => "pets",
            Collection::Equipment => "equipment",
            Collection::Exploration => "exploration",
        }
    }
}

impl FromStr for Collection {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Rejection::not_found("Collection", s))
    }
}

/// Shared handle to the save database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    version: u32,
}

impl Store {
    /// Open or create the save at `path`, upgrading it to `version`
    pub fn open(path: &Path, version: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!(path = %path.display(), version, "Opening save database");
        Self::from_connection(conn, version)
    }

    /// Open a throwaway in-memory save (tests, dry runs)
    pub fn open_in_memory(version: u32) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, version)
    }

    fn from_connection(mut conn: Connection, version: u32) -> Result<Self, StoreError> {
        migrations::ensure_meta(&conn)?;
        let stored = migrations::stored_version(&conn)?;
        if stored > version {
            return Err(StoreError::VersionTooNew {
                stored,
                requested: version,
            });
        }
        migrations::migrate(&mut conn, stored, version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            version,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Schema version the store was opened with
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Collections present in the database
    pub fn collections(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        migrations::list_collections(&conn)
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let conn = self.conn()?;
        get_on(&conn, collection, key)
    }

    /// Every record of a collection, ordered by key
    pub fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        self.get_all_values(collection)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    /// Every record of a collection as raw JSON
    pub fn get_all_values(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn()?;
        get_all_on(&conn, collection)
    }

    /// Insert or replace a record, returning its key
    pub fn put<T: Serialize>(&self, collection: Collection, record: &T) -> Result<String, StoreError> {
        let value = serde_json::to_value(record)?;
        let conn = self.conn()?;
        put_on(&conn, collection, &value)
    }

    pub fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        delete_on(&conn, collection, key)
    }

    pub fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(&format!(r#"DELETE FROM "{}""#, collection.as_str()), [])?;
        Ok(())
    }

    /// Run several writes in one transaction.
    ///
    /// Nothing is committed when the closure returns an error.
    pub fn batch<R>(
        &self,
        f: impl FnOnce(&Batch<'_>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let result = f(&Batch { conn: &*tx })?;
        tx.commit()?;
        Ok(result)
    }

    /// Run raw SQL against the save
    #[cfg(test)]
    pub(crate) fn execute_sql(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Empty every collection (keeps the schema)
    pub fn reset_all(&self) -> Result<(), StoreError> {
        let names = self.collections()?;
        self.batch(|tx| {
            for name in &names {
                tx.conn.execute(&format!(r#"DELETE FROM "{name}""#), [])?;
            }
            Ok(())
        })?;
        debug!("Save database reset");
        Ok(())
    }
}

/// Write handle inside [`Store::batch`]
pub struct Batch<'a> {
    conn: &'a Connection,
}

impl Batch<'_> {
    pub fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        get_on(self.conn, collection, key)
    }

    pub fn put<T: Serialize>(&self, collection: Collection, record: &T) -> Result<String, StoreError> {
        put_on(self.conn, collection, &serde_json::to_value(record)?)
    }

    pub fn put_value(&self, collection: Collection, record: &Value) -> Result<String, StoreError> {
        put_on(self.conn, collection, record)
    }

    pub fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        delete_on(self.conn, collection, key)
    }
}

/// Extract the key of a record: its `id` field, string or integer
pub fn record_key(collection: Collection, record: &Value) -> Result<String, StoreError> {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MissingKey {
            collection: collection.as_str(),
        }),
    }
}

fn get_on<T: DeserializeOwned>(
    conn: &Connection,
    collection: Collection,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            &format!(r#"SELECT body FROM "{}" WHERE id = ?1"#, collection.as_str()),
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

fn get_all_on(conn: &Connection, collection: Collection) -> Result<Vec<Value>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT body FROM "{}" ORDER BY id"#,
        collection.as_str()
    ))?;
    let bodies = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(StoreError::from))
        .collect()
}

fn put_on(conn: &Connection, collection: Collection, record: &Value) -> Result<String, StoreError> {
    let key = record_key(collection, record)?;
    conn.execute(
        &format!(
            r#"INSERT INTO "{}" (id, body, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at"#,
            collection.as_str()
        ),
        rusqlite::params![key, serde_json::to_string(record)?, Utc::now().timestamp_millis()],
    )?;
    Ok(key)
}

fn delete_on(conn: &Connection, collection: Collection, key: &str) -> Result<(), StoreError> {
    conn.execute(
        &format!(r#"DELETE FROM "{}" WHERE id = ?1"#, collection.as_str()),
        [key],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Skill {
        id: String,
        level: u32,
    }

    #[test]
    fn put_get_roundtrip_and_overwrite() {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let key = store
            .put(Collection::Skills, &Skill { id: "mining".into(), level: 1 })
            .unwrap();
        assert_eq!(key, "mining");

        store
            .put(Collection::Skills, &Skill { id: "mining".into(), level: 3 })
            .unwrap();
        let loaded: Option<Skill> = store.get(Collection::Skills, "mining").unwrap();
        assert_eq!(loaded, Some(Skill { id: "mining".into(), level: 3 }));
        assert_eq!(store.get_all::<Skill>(Collection::Skills).unwrap().len(), 1);
    }

    #[test]
    fn numeric_keys_are_accepted() {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let key = store
            .put(Collection::Exploration, &json!({"id": 4, "unlocked": true}))
            .unwrap();
        assert_eq!(key, "4");
        let v: Option<Value> = store.get(Collection::Exploration, "4").unwrap();
        assert_eq!(v.unwrap()["unlocked"], json!(true));
    }

    #[test]
    fn records_without_id_are_rejected() {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let err = store
            .put(Collection::Settings, &json!({"volume": 3}))
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { collection: "settings" }));
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        let result = store.batch(|tx| {
            tx.put(Collection::Pets, &json!({"id": "p1"}))?;
            tx.put(Collection::Pets, &json!({"name": "no key"}))?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(store.get_all_values(Collection::Pets).unwrap().is_empty());
    }

    #[test]
    fn delete_clear_and_reset() {
        let store = Store::open_in_memory(LATEST_VERSION).unwrap();
        store.put(Collection::Pets, &json!({"id": "a"})).unwrap();
        store.put(Collection::Pets, &json!({"id": "b"})).unwrap();
        store.put(Collection::Equipment, &json!({"id": "sword"})).unwrap();

        store.delete(Collection::Pets, "a").unwrap();
        assert_eq!(store.get_all_values(Collection::Pets).unwrap().len(), 1);

        store.clear(Collection::Pets).unwrap();
        assert!(store.get_all_values(Collection::Pets).unwrap().is_empty());

        store.reset_all().unwrap();
        assert!(store.get_all_values(Collection::Equipment).unwrap().is_empty());
        assert_eq!(store.collections().unwrap().len(), Collection::ALL.len());
    }

    #[test]
    fn reopening_upgrades_without_losing_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("save.db");

        {
            let store = Store::open(&path, 3).unwrap();
            assert!(!store.collections().unwrap().contains(&"pets".to_string()));
            store
                .put(Collection::Skills, &Skill { id: "combat".into(), level: 2 })
                .unwrap();
        }

        let store = Store::open(&path, LATEST_VERSION).unwrap();
        assert_eq!(store.version(), LATEST_VERSION);
        let collections = store.collections().unwrap();
        assert!(collections.contains(&"pets".to_string()));
        assert!(collections.contains(&"exploration".to_string()));
        let skill: Option<Skill> = store.get(Collection::Skills, "combat").unwrap();
        assert_eq!(skill.map(|s| s.level), Some(2));
    }

    #[test]
    fn opening_with_older_version_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("save.db");
        Store::open(&path, LATEST_VERSION).unwrap();

        match Store::open(&path, 2) {
            Err(StoreError::VersionTooNew { stored, requested }) => {
                assert_eq!(stored, LATEST_VERSION);
                assert_eq!(requested, 2);
            }
            other => panic!("expected VersionTooNew, got {:?}", other.map(|s| s.version())),
        }
    }

    #[test]
    fn collection_names_roundtrip() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>(), Ok(c));
        }
        assert!("nope".parse::<Collection>().is_err());
    }
}
