//! Ordered schema migrations for the save database
//!
//! Each step is keyed by the version it produces and only ever creates
//! collections (`CREATE TABLE IF NOT EXISTS`), so a step can run twice
//! without harm and skipping versions lands on the same schema as upgrading
//! one version at a time.

use rusqlite::Connection;
use tracing::debug;

use super::Collection;
use crate::error::StoreError;

/// Highest schema version this build knows how to produce
pub const LATEST_VERSION: u32 = 5;

/// One schema upgrade step
#[derive(Debug)]
pub struct Migration {
    /// Version this step produces
    pub version: u32,
    pub description: &'static str,
    /// Collections that must exist once this step has run
    pub collections: &'static [Collection],
}

impl Migration {
    fn apply(&self, conn: &Connection) -> Result<(), StoreError> {
        for collection in self.collections {
            create_collection(conn, *collection)?;
        }
        if self.collections.contains(&Collection::GameState) {
            conn.execute_batch(
                r#"CREATE INDEX IF NOT EXISTS idx_game_state_updated ON "gameState"(updated_at);"#,
            )?;
        }
        Ok(())
    }
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "core game state and settings",
        collections: &[Collection::GameState, Collection::Settings],
    },
    Migration {
        // Older saves could miss the settings store; re-assert it
        version: 2,
        description: "settings",
        collections: &[Collection::Settings],
    },
    Migration {
        version: 3,
        description: "skills, shop, events, achievements, daily tasks, notifications",
        collections: &[
            Collection::Skills,
            Collection::Shop,
            Collection::Events,
            Collection::Achievements,
            Collection::DailyTasks,
            Collection::Notifications,
        ],
    },
    Migration {
        version: 4,
        description: "pets",
        collections: &[Collection::Pets],
    },
    Migration {
        version: 5,
        description: "equipment and exploration",
        collections: &[Collection::Equipment, Collection::Exploration],
    },
];

/// SQL for the version bookkeeping table
const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);
"#;

pub(crate) fn ensure_meta(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(META_SQL)?;
    Ok(())
}

/// Version currently recorded in the database (0 for a fresh file)
pub(crate) fn stored_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

pub(crate) fn create_collection(conn: &Connection, collection: Collection) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{}" (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );"#,
        collection.as_str()
    ))?;
    Ok(())
}

/// Collection tables present in the database, sorted by name
pub(crate) fn list_collections(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' \
         AND name != 'schema_version' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Apply every step with `old < version <= new`, in order.
///
/// `old >= new` is a no-op. Each step commits on its own, so an interrupted
/// upgrade resumes from the last completed step on the next open.
pub fn migrate(conn: &mut Connection, old: u32, new: u32) -> Result<u32, StoreError> {
    if old >= new {
        return Ok(old);
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > old && m.version <= new) {
        let tx = conn.transaction()?;
        step.apply(&tx)?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            [step.version],
        )?;
        tx.commit()?;
        debug!(version = step.version, "Applied migration: {}", step.description);
    }

    // Versions beyond the known table still get recorded
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        [new],
    )?;
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_meta(&conn).unwrap();
        conn
    }

    #[test]
    fn steps_are_ordered_and_end_at_latest() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
        assert_eq!(versions.last().copied(), Some(LATEST_VERSION));
    }

    #[test]
    fn skipping_versions_matches_sequential_upgrades() {
        for start in 0..LATEST_VERSION {
            for target in start + 1..=LATEST_VERSION {
                let mut stepwise = fresh();
                migrate(&mut stepwise, 0, start).unwrap();
                for v in start..target {
                    migrate(&mut stepwise, v, v + 1).unwrap();
                }

                let mut jumped = fresh();
                migrate(&mut jumped, 0, start).unwrap();
                migrate(&mut jumped, start, target).unwrap();

                assert_eq!(
                    list_collections(&stepwise).unwrap(),
                    list_collections(&jumped).unwrap(),
                    "{start} -> {target}"
                );
            }
        }
    }

    #[test]
    fn rerunning_a_step_is_harmless() {
        let mut conn = fresh();
        migrate(&mut conn, 0, 3).unwrap();
        conn.execute(
            r#"INSERT INTO "skills" (id, body, updated_at) VALUES ('mining', '{"id":"mining"}', 1)"#,
            [],
        )
        .unwrap();

        // Pretend the version row was lost and run everything again
        migrate(&mut conn, 0, 3).unwrap();

        let count: i64 = conn
            .query_row(r#"SELECT COUNT(*) FROM "skills""#, [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn same_version_is_noop() {
        let mut conn = fresh();
        migrate(&mut conn, 0, 2).unwrap();
        let before = list_collections(&conn).unwrap();
        assert_eq!(migrate(&mut conn, 2, 2).unwrap(), 2);
        assert_eq!(list_collections(&conn).unwrap(), before);
        assert_eq!(before, vec!["gameState".to_string(), "settings".to_string()]);
    }

    #[test]
    fn records_target_version() {
        let mut conn = fresh();
        migrate(&mut conn, 0, LATEST_VERSION).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), LATEST_VERSION);
        assert_eq!(list_collections(&conn).unwrap().len(), Collection::ALL.len());
    }
}
