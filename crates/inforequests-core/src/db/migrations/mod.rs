//! Versioned schema upgrades, tracked in `PRAGMA user_version` and mirrored
//! into `store_meta.schema_version`.

use super::schema;
use rusqlite::{Connection, types::Type};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "core tables and snapshot triggers",
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        name: "lookup indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version a fully migrated store reports.
pub const LATEST_SCHEMA_VERSION: u32 = MIGRATIONS[MIGRATIONS.len() - 1].version;

/// The schema version recorded in the database file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or holds a negative or
/// oversized value.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(err)))
}

/// Bring the schema up to [`LATEST_SCHEMA_VERSION`], one transaction per
/// step. Steps at or below the recorded version are skipped.
///
/// # Errors
///
/// Returns an error if a step fails; earlier steps stay applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let start = current_schema_version(conn)?;

    let mut reached = start;
    for step in MIGRATIONS.iter().filter(|m| m.version > start) {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", i64::from(step.version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step.version)],
        )?;
        tx.commit()?;
        tracing::debug!(version = step.version, name = step.name, "applied migration");
        reached = step.version;
    }

    Ok(reached)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn has(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            params![kind, name],
            |row| row.get(0),
        )
    }

    #[test]
    fn fresh_database_reaches_latest_version() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(current_schema_version(&conn)?, 0);

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        let tables = [
            "obligees",
            "obligee_snapshots",
            "inforequests",
            "messages",
            "recipients",
            "branches",
            "actions",
            "action_drafts",
            "store_meta",
        ];
        for table in tables {
            assert!(has(&conn, "table", table)?, "table {table} not created");
        }
        for index in schema::REQUIRED_INDEXES {
            assert!(has(&conn, "index", index)?, "index {index} not created");
        }
        Ok(())
    }

    #[test]
    fn second_run_changes_nothing() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let (rows, recorded): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), MAX(schema_version) FROM store_meta",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!(rows, 1);
        assert_eq!(recorded, i64::from(LATEST_SCHEMA_VERSION));
        Ok(())
    }

    #[test]
    fn version_one_store_gains_the_indexes() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        assert!(!has(&conn, "index", "idx_branches_inforequest")?);

        assert_eq!(migrate(&mut conn)?, 2);
        assert!(has(&conn, "index", "idx_branches_inforequest")?);
        Ok(())
    }
}
