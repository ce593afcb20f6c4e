/*!
 * Database module for persistent pipeline state.
 *
 * This module provides SQLite-based persistence for:
 * - Transcription job history, so job status survives restarts
 * - Glossary entries, global and per series
 * - Provider health counters, for seeding the tracker on startup
 */

pub mod schema;
pub mod connection;
pub mod repository;
pub mod models;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{JobRecord, JobStats};
pub use repository::Repository;
