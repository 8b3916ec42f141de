//! SQLite storage backend for annotations, palette and handoff slot

use super::traits::{
    AnnotationStore, HandoffSlot, OpenStore, PaletteStore, StorageError, StorageResult,
};
use crate::annotation::{Annotation, MarkerPalette, NoteId, RawAnnotation, PALETTE_KEY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Settings key of the cross-chapter handoff slot
pub const HANDOFF_KEY: &str = "jump-handoff";

/// Marker given to stored records that never had one
pub const LEGACY_MARKER: &str = "📝";

const SELECT_COLUMNS: &str = "SELECT note_id, work_id, chapter_id, chapter_name, title, author, fandom,
        text, start_paragraph, end_paragraph, marker, note, created_ms
 FROM annotations";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HandoffOut<'a> {
    written_at: i64,
    record: &'a Annotation,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandoffIn {
    written_at: i64,
    record: RawAnnotation,
}

/// SQLite-backed annotation store
///
/// One table of records keyed by note id, with secondary indexes on work
/// and chapter, plus a small key/value table for the palette and the
/// handoff slot. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    legacy_marker: String,
}

impl SqliteStore {
    /// Initialize the database schema
    ///
    /// 1. Create base tables (the pre-anchor layout) - safe for existing DBs
    /// 2. Run migrations to add the anchor columns
    /// 3. Create indexes
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS annotations (
                note_id TEXT PRIMARY KEY,
                work_id TEXT NOT NULL,
                chapter_id TEXT NOT NULL,
                chapter_name TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                fandom TEXT NOT NULL DEFAULT '',
                text TEXT NOT NULL DEFAULT '',
                marker TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                created_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Self::migrate_add_anchor_columns(conn)?;

        conn.execute_batch(
            r#"
            CREATE INDEX IF NOT EXISTS idx_annotations_work
                ON annotations(work_id);
            CREATE INDEX IF NOT EXISTS idx_annotations_chapter
                ON annotations(chapter_id);
            "#,
        )?;

        Ok(())
    }

    /// Migration: add paragraph-anchor columns to databases written before
    /// anchors existed. Old rows keep NULL anchors.
    fn migrate_add_anchor_columns(conn: &Connection) -> StorageResult<()> {
        let has_anchor: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('annotations') WHERE name = 'start_paragraph'",
            [],
            |row| row.get(0),
        )?;

        if !has_anchor {
            conn.execute("ALTER TABLE annotations ADD COLUMN start_paragraph INTEGER", [])?;
            conn.execute("ALTER TABLE annotations ADD COLUMN end_paragraph INTEGER", [])?;
        }

        Ok(())
    }

    /// Use `marker` for stored records that have none
    pub fn with_legacy_marker(mut self, marker: impl Into<String>) -> Self {
        self.legacy_marker = marker.into();
        self
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            legacy_marker: LEGACY_MARKER.to_string(),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<RawAnnotation> {
        Ok(RawAnnotation {
            note_id: row.get(0)?,
            work_id: row.get(1)?,
            chapter_id: row.get(2)?,
            chapter_name: row.get(3)?,
            title: row.get(4)?,
            author: row.get(5)?,
            fandom: row.get(6)?,
            text: row.get(7)?,
            start_paragraph_index: row.get(8)?,
            end_paragraph_index: row.get(9)?,
            marker: row.get(10)?,
            note: row.get(11)?,
            time: row.get(12)?,
        })
    }

    /// Normalize raw rows, dropping (and logging) any that cannot be read
    fn normalize_rows(&self, rows: Vec<RawAnnotation>) -> Vec<Annotation> {
        rows.into_iter()
            .filter_map(|raw| {
                let id = raw.note_id.clone().unwrap_or_default();
                match raw.normalize(&self.legacy_marker) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(note_id = %id, error = %e, "skipping unreadable annotation row");
                        None
                    }
                }
            })
            .collect()
    }

    fn select(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<Vec<Annotation>> {
        let conn = self.lock()?;
        let sql = format!("{} {}", SELECT_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, Self::row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        Ok(self.normalize_rows(rows))
    }

    fn upsert(&self, record: &Annotation) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO annotations (note_id, work_id, chapter_id, chapter_name, title, author,
                                     fandom, text, start_paragraph, end_paragraph, marker, note,
                                     created_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(note_id) DO UPDATE SET
                work_id = excluded.work_id,
                chapter_id = excluded.chapter_id,
                chapter_name = excluded.chapter_name,
                title = excluded.title,
                author = excluded.author,
                fandom = excluded.fandom,
                text = excluded.text,
                start_paragraph = excluded.start_paragraph,
                end_paragraph = excluded.end_paragraph,
                marker = excluded.marker,
                note = excluded.note,
                created_ms = excluded.created_ms
            "#,
            params![
                record.note_id.as_str(),
                record.work_id,
                record.chapter_id,
                record.chapter_name,
                record.title,
                record.author,
                record.fandom,
                record.text,
                record.anchor.map(|a| a.start() as i64),
                record.anchor.map(|a| a.end() as i64),
                record.marker,
                record.note,
                record.time.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, note_id: &NoteId) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM annotations WHERE note_id = ?1", params![note_id.as_str()])?;
        Ok(())
    }

    fn read_setting(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_setting(&self, key: &str, value_json: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO settings (key, value_json) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json
            "#,
            params![key, value_json],
        )?;
        Ok(())
    }

    /// Read and clear a setting in one transaction
    fn take_setting(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = tx
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        tx.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(value)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl AnnotationStore for SqliteStore {
    async fn insert(&self, record: &Annotation) -> StorageResult<()> {
        self.upsert(record)
    }

    async fn update(&self, record: &Annotation) -> StorageResult<()> {
        self.upsert(record)
    }

    async fn delete(&self, note_id: &NoteId) -> StorageResult<()> {
        self.remove(note_id)
    }

    async fn get(&self, note_id: &NoteId) -> StorageResult<Option<Annotation>> {
        let mut found = self.select("WHERE note_id = ?1", &[&note_id.as_str()])?;
        Ok(found.pop())
    }

    async fn query_by_work(&self, work_id: &str) -> StorageResult<Vec<Annotation>> {
        self.select("WHERE work_id = ?1", &[&work_id])
    }

    async fn query_by_chapter(&self, work_id: &str, chapter_id: &str) -> StorageResult<Vec<Annotation>> {
        self.select("WHERE chapter_id = ?1 AND work_id = ?2", &[&chapter_id, &work_id])
    }

    async fn query_all(&self) -> StorageResult<Vec<Annotation>> {
        self.select("", &[])
    }
}

#[async_trait]
impl PaletteStore for SqliteStore {
    async fn load_palette(&self) -> StorageResult<Option<MarkerPalette>> {
        match self.read_setting(PALETTE_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_palette(&self, palette: &MarkerPalette) -> StorageResult<()> {
        let json = serde_json::to_string(palette)?;
        self.write_setting(PALETTE_KEY, &json)
    }
}

#[async_trait]
impl HandoffSlot for SqliteStore {
    async fn put_handoff(&self, record: &Annotation) -> StorageResult<()> {
        let json = serde_json::to_string(&HandoffOut {
            written_at: Utc::now().timestamp_millis(),
            record,
        })?;
        self.write_setting(HANDOFF_KEY, &json)
    }

    async fn take_handoff(&self, max_age: chrono::Duration) -> StorageResult<Option<Annotation>> {
        let Some(json) = self.take_setting(HANDOFF_KEY)? else {
            return Ok(None);
        };
        let payload: HandoffIn = serde_json::from_str(&json)?;
        let written_at = DateTime::from_timestamp_millis(payload.written_at).unwrap_or_default();
        if Utc::now() - written_at > max_age {
            tracing::debug!("discarding expired jump handoff");
            return Ok(None);
        }
        Ok(self.normalize_rows(vec![payload.record]).pop())
    }
}
