/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::health::ProviderHealthStat;
use crate::transcription::TranscriptionJob;
use crate::translation::{GlossaryEntry, GlossaryScope};

use super::connection::DatabaseConnection;
use super::models::{JobRecord, JobStats};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    // =========================================================================
    // Transcription Job Operations
    // =========================================================================

    /// Save a transcription job, inserting or replacing by id
    pub async fn save_job(&self, job: &TranscriptionJob) -> Result<()> {
        let record = JobRecord::from_job(job);

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO transcription_jobs (
                        id, media_path, language_hint, status, progress,
                        transcript_text, detected_language, error, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        record.id,
                        record.media_path,
                        record.language_hint,
                        record.status.to_string(),
                        record.progress,
                        record.transcript_text,
                        record.detected_language,
                        record.error,
                        record.created_at,
                        record.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Get a persisted job by id
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT id, media_path, language_hint, status, progress,
                               transcript_text, detected_language, error, created_at, updated_at
                        FROM transcription_jobs WHERE id = ?1
                        "#,
                        [id],
                        job_from_row,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
    }

    /// List all persisted jobs, oldest first
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, media_path, language_hint, status, progress,
                           transcript_text, detected_language, error, created_at, updated_at
                    FROM transcription_jobs ORDER BY created_at ASC
                    "#,
                )?;

                let records = stmt
                    .query_map([], job_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(records)
            })
            .await
    }

    /// Delete a persisted job. Returns true if a row was removed.
    pub async fn delete_job(&self, job_id: Uuid) -> Result<bool> {
        let id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM transcription_jobs WHERE id = ?1", [id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Aggregate counts of persisted jobs per status
    pub async fn job_stats(&self) -> Result<JobStats> {
        self.db
            .execute_async(|conn| {
                let mut stats = JobStats::default();

                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM transcription_jobs GROUP BY status",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;

                for row in rows {
                    let (status, count) = row?;
                    stats.total += count;
                    match status.as_str() {
                        "queued" => stats.queued = count,
                        "running" => stats.running = count,
                        "done" => stats.done = count,
                        "failed" => stats.failed = count,
                        other => debug!("Ignoring unknown persisted job status: {}", other),
                    }
                }

                Ok(stats)
            })
            .await
    }

    // =========================================================================
    // Glossary Operations
    // =========================================================================

    /// Insert or replace a glossary entry
    ///
    /// `series_key` must be given for series-scoped entries and absent for
    /// global ones. Terms are keyed case-insensitively within a scope, so
    /// saving "SENSEI" replaces an existing "sensei".
    pub async fn save_glossary_entry(
        &self,
        entry: &GlossaryEntry,
        series_key: Option<&str>,
    ) -> Result<()> {
        let scope_key = match (entry.scope, series_key) {
            (GlossaryScope::Global, None) => String::new(),
            (GlossaryScope::Series, Some(key)) if !key.is_empty() => key.to_string(),
            (GlossaryScope::Global, Some(_)) => {
                return Err(anyhow::anyhow!(
                    "Global glossary entry cannot carry a series key"
                ));
            }
            (GlossaryScope::Series, _) => {
                return Err(anyhow::anyhow!(
                    "Series glossary entry requires a series key"
                ));
            }
        };

        let entry = entry.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO glossary_entries (
                        series_key, source_term, source_term_key, target_term, notes, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(series_key, source_term_key) DO UPDATE SET
                        source_term = excluded.source_term,
                        target_term = excluded.target_term,
                        notes = excluded.notes,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        scope_key,
                        entry.source_term,
                        entry.source_term.to_lowercase(),
                        entry.target_term,
                        entry.notes,
                        entry.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Load all global glossary entries
    pub async fn global_glossary(&self) -> Result<Vec<GlossaryEntry>> {
        self.load_glossary(String::new(), GlossaryScope::Global).await
    }

    /// Load the glossary entries of one series
    pub async fn series_glossary(&self, series_key: &str) -> Result<Vec<GlossaryEntry>> {
        self.load_glossary(series_key.to_string(), GlossaryScope::Series)
            .await
    }

    async fn load_glossary(
        &self,
        series_key: String,
        scope: GlossaryScope,
    ) -> Result<Vec<GlossaryEntry>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT source_term, target_term, notes, updated_at
                    FROM glossary_entries WHERE series_key = ?1
                    ORDER BY source_term_key ASC
                    "#,
                )?;

                let entries = stmt
                    .query_map([series_key], |row| glossary_from_row(row, scope))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(entries)
            })
            .await
    }

    /// Delete a glossary entry by term. Returns true if a row was removed.
    pub async fn delete_glossary_entry(
        &self,
        series_key: Option<&str>,
        source_term: &str,
    ) -> Result<bool> {
        let scope_key = series_key.unwrap_or_default().to_string();
        let term_key = source_term.to_lowercase();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM glossary_entries WHERE series_key = ?1 AND source_term_key = ?2",
                    params![scope_key, term_key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    // =========================================================================
    // Provider Health Operations
    // =========================================================================

    /// Persist the current health counters, replacing stored values per name
    pub async fn save_health_stats(
        &self,
        stats: &HashMap<String, ProviderHealthStat>,
    ) -> Result<()> {
        let stats: Vec<ProviderHealthStat> = stats.values().cloned().collect();

        self.db
            .execute_async(move |conn| {
                for stat in &stats {
                    conn.execute(
                        r#"
                        INSERT OR REPLACE INTO provider_health (
                            name, total_searches, successful_downloads,
                            auto_disabled, cooldown_until, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
                        "#,
                        params![
                            stat.name,
                            stat.total_searches as i64,
                            stat.successful_downloads as i64,
                            stat.auto_disabled,
                            stat.cooldown_until.map(|t| t.to_rfc3339()),
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    /// Load persisted health counters, for seeding the tracker on startup
    pub async fn load_health_stats(&self) -> Result<Vec<ProviderHealthStat>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT name, total_searches, successful_downloads, auto_disabled, cooldown_until
                    FROM provider_health ORDER BY name ASC
                    "#,
                )?;

                let stats = stmt
                    .query_map([], health_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(stats)
            })
            .await
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        media_path: row.get(1)?,
        language_hint: row.get(2)?,
        status: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or(crate::transcription::JobStatus::Failed),
        progress: row.get(4)?,
        transcript_text: row.get(5)?,
        detected_language: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn glossary_from_row(row: &Row<'_>, scope: GlossaryScope) -> rusqlite::Result<GlossaryEntry> {
    Ok(GlossaryEntry {
        source_term: row.get(0)?,
        target_term: row.get(1)?,
        notes: row.get(2)?,
        scope,
        updated_at: parse_timestamp(&row.get::<_, String>(3)?),
    })
}

fn health_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderHealthStat> {
    Ok(ProviderHealthStat {
        name: row.get(0)?,
        total_searches: row.get::<_, i64>(1)? as u64,
        successful_downloads: row.get::<_, i64>(2)? as u64,
        auto_disabled: row.get(3)?,
        cooldown_until: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_timestamp(&s)),
    })
}

// Timestamps are written by this crate as RFC 3339; an unparseable value
// means the row was edited by hand, so fall back to now rather than
// poisoning the whole query.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
