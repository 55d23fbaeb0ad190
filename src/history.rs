//! Dictation history persisted in SQLite.
//!
//! One row per completed dictation: the raw transcript, the final inserted
//! text, the language diagnostics and the app that received the paste.
//! History writes are fire-and-forget from the pipeline's point of view, so
//! a broken database never blocks dictation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A dictation about to be recorded.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub raw_text: String,
    pub final_text: String,
    pub detected_language: Option<String>,
    pub confidence: Option<f32>,
    pub output_mode: String,
    pub source_app: Option<String>,
}

/// A stored dictation row.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: i64,
    /// UTC timestamp in ISO-8601 form, assigned by the database.
    pub created_at: String,
    pub raw_text: String,
    pub final_text: String,
    pub detected_language: Option<String>,
    pub confidence: Option<f32>,
    pub output_mode: String,
    pub source_app: Option<String>,
}

/// Aggregate history statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStats {
    pub total_count: i64,
    pub latest_created_at: String,
    pub latest_source_app: String,
    pub top_source_app: String,
    pub top_source_app_count: i64,
}

// ---------------------------------------------------------------------------
// HistorySink
// ---------------------------------------------------------------------------

/// Write side of the history store, as seen by the pipeline worker.
pub trait HistorySink: Send + Sync {
    fn add(&self, transcript: &NewTranscript) -> Result<(), HistoryError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn HistorySink>) {}
};

/// Sink that drops every record.  Used when the database cannot be opened so
/// dictation keeps working without history.
pub struct NoopHistory;

impl HistorySink for NoopHistory {
    fn add(&self, _transcript: &NewTranscript) -> Result<(), HistoryError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TranscriptHistory
// ---------------------------------------------------------------------------

/// SQLite-backed history store.
pub struct TranscriptHistory {
    conn: Mutex<Connection>,
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        raw_text: row.get(2)?,
        final_text: row.get(3)?,
        detected_language: row.get(4)?,
        confidence: row.get(5)?,
        output_mode: row.get(6)?,
        source_app: row.get(7)?,
    })
}

impl TranscriptHistory {
    /// Open (creating if needed) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5_000)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transcripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                final_text TEXT NOT NULL,
                detected_language TEXT,
                confidence REAL,
                output_mode TEXT NOT NULL,
                source_app TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_transcripts_created_at
            ON transcripts (created_at DESC);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.search("", limit, 0)
    }

    /// Substring search across raw text, final text and source app.
    /// An empty query matches everything.
    pub fn search(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let conn = self.lock();
        let query = query.trim();

        let rows = if query.is_empty() {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, raw_text, final_text, detected_language,
                        confidence, output_mode, source_app
                 FROM transcripts
                 ORDER BY id DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let mapped = stmt.query_map(params![limit, offset], record_from_row)?;
            mapped.collect::<Result<Vec<_>, _>>()?
        } else {
            let like = format!("%{query}%");
            let mut stmt = conn.prepare(
                "SELECT id, created_at, raw_text, final_text, detected_language,
                        confidence, output_mode, source_app
                 FROM transcripts
                 WHERE raw_text LIKE ?1
                    OR final_text LIKE ?1
                    OR COALESCE(source_app, '') LIKE ?1
                 ORDER BY id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let mapped = stmt.query_map(params![like, limit, offset], record_from_row)?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };

        Ok(rows)
    }

    /// Delete one record by id.  Unknown ids are a no-op.
    pub fn delete(&self, id: i64) -> Result<(), HistoryError> {
        let conn = self.lock();
        conn.execute("DELETE FROM transcripts WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Aggregate statistics for the settings/stats surface.
    pub fn stats(&self) -> Result<HistoryStats, HistoryError> {
        let conn = self.lock();

        let total_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transcripts", [], |row| row.get(0))?;

        let latest: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT created_at, source_app FROM transcripts ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let top: Option<(String, i64)> = conn
            .query_row(
                "SELECT COALESCE(source_app, 'Unknown') AS app_name, COUNT(*) AS n
                 FROM transcripts
                 GROUP BY app_name
                 ORDER BY n DESC
                 LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (latest_created_at, latest_source_app) = match latest {
            Some((created_at, app)) => (created_at, app.unwrap_or_else(|| "Unknown".to_string())),
            None => (String::new(), "Unknown".to_string()),
        };
        let (top_source_app, top_source_app_count) =
            top.unwrap_or_else(|| ("Unknown".to_string(), 0));

        Ok(HistoryStats {
            total_count,
            latest_created_at,
            latest_source_app,
            top_source_app,
            top_source_app_count,
        })
    }
}

impl HistorySink for TranscriptHistory {
    fn add(&self, transcript: &NewTranscript) -> Result<(), HistoryError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO transcripts (
                created_at, raw_text, final_text, detected_language,
                confidence, output_mode, source_app
             )
             VALUES (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transcript.raw_text,
                transcript.final_text,
                transcript.detected_language,
                transcript.confidence,
                transcript.output_mode,
                transcript.source_app,
            ],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, TranscriptHistory) {
        let dir = tempfile::tempdir().unwrap();
        let history = TranscriptHistory::open(&dir.path().join("history.sqlite3")).unwrap();
        (dir, history)
    }

    fn sample(final_text: &str, source_app: Option<&str>) -> NewTranscript {
        NewTranscript {
            raw_text: format!("raw {final_text}"),
            final_text: final_text.to_string(),
            detected_language: Some("en".to_string()),
            confidence: Some(0.92),
            output_mode: "english".to_string(),
            source_app: source_app.map(str::to_string),
        }
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("history.sqlite3");
        let history = TranscriptHistory::open(&nested).unwrap();
        assert_eq!(history.stats().unwrap().total_count, 0);
    }

    #[test]
    fn add_then_recent_round_trips_fields() {
        let (_dir, history) = open_temp();
        history.add(&sample("Hello there.", Some("Notes"))).unwrap();

        let records = history.recent(10).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.final_text, "Hello there.");
        assert_eq!(record.raw_text, "raw Hello there.");
        assert_eq!(record.detected_language.as_deref(), Some("en"));
        assert_eq!(record.output_mode, "english");
        assert_eq!(record.source_app.as_deref(), Some("Notes"));
        assert!(!record.created_at.is_empty());
    }

    #[test]
    fn recent_is_newest_first() {
        let (_dir, history) = open_temp();
        for text in ["first", "second", "third"] {
            history.add(&sample(text, None)).unwrap();
        }

        let records = history.recent(10).unwrap();
        let texts: Vec<_> = records.iter().map(|r| r.final_text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
    }

    #[test]
    fn recent_respects_limit() {
        let (_dir, history) = open_temp();
        for i in 0..5 {
            history.add(&sample(&format!("entry {i}"), None)).unwrap();
        }
        assert_eq!(history.recent(2).unwrap().len(), 2);
    }

    #[test]
    fn search_matches_raw_final_and_app() {
        let (_dir, history) = open_temp();
        history.add(&sample("shopping list", Some("Notes"))).unwrap();
        history.add(&sample("meeting recap", Some("Mail"))).unwrap();

        let by_final = history.search("shopping", 10, 0).unwrap();
        assert_eq!(by_final.len(), 1);

        let by_app = history.search("Mail", 10, 0).unwrap();
        assert_eq!(by_app.len(), 1);
        assert_eq!(by_app[0].final_text, "meeting recap");

        let by_raw = history.search("raw meeting", 10, 0).unwrap();
        assert_eq!(by_raw.len(), 1);
    }

    #[test]
    fn search_empty_query_returns_everything() {
        let (_dir, history) = open_temp();
        history.add(&sample("one", None)).unwrap();
        history.add(&sample("two", None)).unwrap();
        assert_eq!(history.search("  ", 10, 0).unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_record() {
        let (_dir, history) = open_temp();
        history.add(&sample("to be deleted", None)).unwrap();
        let id = history.recent(1).unwrap()[0].id;

        history.delete(id).unwrap();
        assert!(history.recent(10).unwrap().is_empty());

        // Deleting again is a no-op.
        history.delete(id).unwrap();
    }

    #[test]
    fn stats_on_empty_store() {
        let (_dir, history) = open_temp();
        let stats = history.stats().unwrap();
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.latest_created_at, "");
        assert_eq!(stats.latest_source_app, "Unknown");
        assert_eq!(stats.top_source_app, "Unknown");
        assert_eq!(stats.top_source_app_count, 0);
    }

    #[test]
    fn stats_reports_totals_and_top_app() {
        let (_dir, history) = open_temp();
        history.add(&sample("a", Some("Notes"))).unwrap();
        history.add(&sample("b", Some("Notes"))).unwrap();
        history.add(&sample("c", Some("Mail"))).unwrap();
        history.add(&sample("d", None)).unwrap();

        let stats = history.stats().unwrap();
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.top_source_app, "Notes");
        assert_eq!(stats.top_source_app_count, 2);
        // The last insert had no source app.
        assert_eq!(stats.latest_source_app, "Unknown");
        assert!(!stats.latest_created_at.is_empty());
    }

    #[test]
    fn noop_history_accepts_everything() {
        let sink = NoopHistory;
        assert!(sink.add(&sample("ignored", None)).is_ok());
    }
}
