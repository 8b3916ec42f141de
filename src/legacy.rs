//! Import and export of annotation files
//!
//! Two shapes are accepted on import: the old flat blob keyed by work
//!
//! ```json
//! {"works": {"123": {"workId": "123", "author": "..", "title": "..", "fandom": "..",
//!   "notes": [{"id": "..", "text": "..", "note": "..", "time": 1700000000000}]}}}
//! ```
//!
//! and the array written by [`export_json`]. Blob notes carry no paragraph
//! indices, so they import unanchored: listed in summaries, never drawn.

use crate::annotation::{Annotation, RawAnnotation};
use crate::storage::{AnnotationStore, StorageError};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("unreadable import file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Blob(LegacyBlob),
    Records(Vec<RawAnnotation>),
}

#[derive(Debug, Deserialize)]
struct LegacyBlob {
    works: BTreeMap<String, LegacyWork>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyWork {
    work_id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    fandom: Option<String>,
    notes: Vec<RawAnnotation>,
}

/// What an import did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Entries that could not be normalized (no id, no work)
    pub skipped: usize,
}

/// Parse an import file into canonical records.
///
/// Returns the records and the number of entries that had to be dropped.
pub fn parse_import(json: &str, fallback_marker: &str) -> Result<(Vec<Annotation>, usize), LegacyError> {
    let raws = match serde_json::from_str::<ImportFile>(json)? {
        ImportFile::Records(raws) => raws,
        ImportFile::Blob(blob) => blob
            .works
            .into_iter()
            .flat_map(|(key, work)| {
                let work_id = work.work_id.filter(|w| !w.is_empty()).unwrap_or(key);
                let (title, author, fandom) = (work.title, work.author, work.fandom);
                work.notes.into_iter().map(move |mut raw| {
                    raw.work_id = raw.work_id.or_else(|| Some(work_id.clone()));
                    raw.title = raw.title.or_else(|| title.clone());
                    raw.author = raw.author.or_else(|| author.clone());
                    raw.fandom = raw.fandom.or_else(|| fandom.clone());
                    raw
                })
            })
            .collect(),
    };

    let mut records = Vec::with_capacity(raws.len());
    let mut skipped = 0;
    for raw in raws {
        match raw.normalize(fallback_marker) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping import entry");
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

/// Parse `json` and write every record to `store`.
///
/// Records are upserted by note id, so importing the same file twice
/// leaves one copy of each note.
pub async fn import<S>(store: &S, json: &str, fallback_marker: &str) -> Result<ImportReport, LegacyError>
where
    S: AnnotationStore + ?Sized,
{
    let (records, skipped) = parse_import(json, fallback_marker)?;
    for record in &records {
        store.insert(record).await?;
    }
    tracing::info!(imported = records.len(), skipped, "import finished");
    Ok(ImportReport {
        imported: records.len(),
        skipped,
    })
}

/// Every record as a pretty JSON array, oldest first
pub fn export_json(records: &[Annotation]) -> Result<String, serde_json::Error> {
    let mut ordered: Vec<&Annotation> = records.iter().collect();
    ordered.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.note_id.cmp(&b.note_id)));
    serde_json::to_string_pretty(&ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Anchor, ChapterInfo, WorkInfo, SINGLE_CHAPTER_ID, UNKNOWN_FANDOM};
    use crate::storage::MemoryStore;

    const BLOB: &str = r#"{
        "works": {
            "4242": {
                "workId": "4242",
                "author": "someone",
                "title": "A Long Road",
                "notes": [
                    {"id": "n1", "text": "first line", "note": "lovely", "time": 1700000000000},
                    {"id": "n2", "text": "second line", "note": "", "time": 1700000005000},
                    {"text": "no id", "time": 1700000009000}
                ]
            },
            "77": {
                "notes": [{"id": "n3", "text": "short", "time": 1700000001000}]
            }
        }
    }"#;

    #[test]
    fn test_blob_notes_inherit_work_metadata() {
        let (records, skipped) = parse_import(BLOB, "📝").unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(records.len(), 3);

        let n1 = records.iter().find(|r| r.note_id.as_str() == "n1").unwrap();
        assert_eq!(n1.work_id, "4242");
        assert_eq!(n1.title, "A Long Road");
        assert_eq!(n1.fandom, UNKNOWN_FANDOM);
        assert_eq!(n1.chapter_id, SINGLE_CHAPTER_ID);
        assert_eq!(n1.marker, "📝");
        assert_eq!(n1.note, "lovely");
        assert!(n1.anchor.is_none());
        assert_eq!(n1.time.timestamp_millis(), 1_700_000_000_000);

        // work id falls back to the map key
        let n3 = records.iter().find(|r| r.note_id.as_str() == "n3").unwrap();
        assert_eq!(n3.work_id, "77");
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(parse_import("{\"works\": 3}", "x"), Err(LegacyError::Parse(_))));
        assert!(parse_import("not json", "x").is_err());
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let store = MemoryStore::new();
        let first = import(&store, BLOB, "📝").await.unwrap();
        assert_eq!(
            first,
            ImportReport {
                imported: 3,
                skipped: 1
            }
        );
        import(&store, BLOB, "📝").await.unwrap();
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_export_then_import_keeps_anchors() {
        let record = Annotation::create(
            &WorkInfo::new("9").with_title("T"),
            &ChapterInfo::new("12", "Chapter 2"),
            "quoted",
            Anchor::new(3, 5).unwrap(),
            "🔥",
        )
        .with_note("a note");
        let json = export_json(std::slice::from_ref(&record)).unwrap();
        assert!(json.contains("\"startParagraphIndex\": 3"));

        let store = MemoryStore::new();
        import(&store, &json, "📝").await.unwrap();
        let back = store.get(&record.note_id).await.unwrap().unwrap();
        assert_eq!(back.anchor, record.anchor);
        assert_eq!(back.note, "a note");
        assert_eq!(back.marker, "🔥");
    }
}
