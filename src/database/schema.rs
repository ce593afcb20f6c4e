/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all database tables and handles
 * schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL mode for better concurrency and crash recovery
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS transcription_jobs (
            id TEXT PRIMARY KEY,
            media_path TEXT NOT NULL,
            language_hint TEXT,
            status TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0,
            transcript_text TEXT,
            detected_language TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status ON transcription_jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_media ON transcription_jobs(media_path);
        "#,
    )?;

    // series_key '' marks a global entry; source_term_key is the
    // lower-cased merge key the resolver uses.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS glossary_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            series_key TEXT NOT NULL DEFAULT '',
            source_term TEXT NOT NULL,
            source_term_key TEXT NOT NULL,
            target_term TEXT NOT NULL,
            notes TEXT,
            updated_at TEXT NOT NULL,
            UNIQUE(series_key, source_term_key)
        );

        CREATE INDEX IF NOT EXISTS idx_glossary_series ON glossary_entries(series_key);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS provider_health (
            name TEXT PRIMARY KEY,
            total_searches INTEGER NOT NULL DEFAULT 0,
            successful_downloads INTEGER NOT NULL DEFAULT 0,
            auto_disabled INTEGER NOT NULL DEFAULT 0,
            cooldown_until TEXT,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    // Add migration steps here as the schema evolves
    if from_version < SCHEMA_VERSION {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            from_version
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn create_test_connection() -> Connection {
        Connection::open_in_memory().expect("Failed to create in-memory database")
    }

    #[test]
    fn test_initializeSchema_withFreshDatabase_shouldCreateAllTables() {
        let conn = create_test_connection();

        initialize_schema(&conn).expect("Failed to initialize schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"transcription_jobs".to_string()));
        assert!(tables.contains(&"glossary_entries".to_string()));
        assert!(tables.contains(&"provider_health".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_initializeSchema_calledTwice_shouldBeIdempotent() {
        let conn = create_test_connection();

        initialize_schema(&conn).expect("First initialization failed");
        initialize_schema(&conn).expect("Second initialization failed");

        let version = get_schema_version(&conn).expect("Failed to get version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_getSchemaVersion_withFreshDatabase_shouldReturnZero() {
        let conn = create_test_connection();
        let version = get_schema_version(&conn).expect("Failed to get version");
        assert_eq!(version, 0);
    }

    #[test]
    fn test_glossaryUniqueness_shouldRejectDuplicateKeysPerScope() {
        let conn = create_test_connection();
        initialize_schema(&conn).expect("Failed to initialize schema");

        conn.execute(
            "INSERT INTO glossary_entries (series_key, source_term, source_term_key, target_term, updated_at)
             VALUES ('', 'Sensei', 'sensei', 'Meister', datetime('now'))",
            [],
        )
        .expect("First insert failed");

        // Same key in the same scope must conflict
        let duplicate = conn.execute(
            "INSERT INTO glossary_entries (series_key, source_term, source_term_key, target_term, updated_at)
             VALUES ('', 'SENSEI', 'sensei', 'Lehrer', datetime('now'))",
            [],
        );
        assert!(duplicate.is_err());

        // Same key in a different series scope is fine
        conn.execute(
            "INSERT INTO glossary_entries (series_key, source_term, source_term_key, target_term, updated_at)
             VALUES ('some-show', 'Sensei', 'sensei', 'Lehrer', datetime('now'))",
            [],
        )
        .expect("Per-series insert failed");
    }
}
