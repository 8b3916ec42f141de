//! The annotation record and the identity types around it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;
use uuid::Uuid;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const UNKNOWN_FANDOM: &str = "Unknown Fandom";

/// Chapter id used for works published as a single chapter
pub const SINGLE_CHAPTER_ID: &str = "0";

/// Unique, generation-ordered identifier of an annotation
///
/// New ids are UUIDv7 strings, so lexical order follows creation order.
/// Ids written by older tools are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Create a fresh id
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Paragraph-index range an annotation is attached to, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Anchor {
    #[serde(rename = "startParagraphIndex")]
    start: usize,
    #[serde(rename = "endParagraphIndex")]
    end: usize,
}

impl Anchor {
    /// `None` if `start > end`
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Anchor covering both indices, in either order
    pub fn spanning(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn contains(&self, paragraph: usize) -> bool {
        self.paragraphs().contains(&paragraph)
    }

    pub fn paragraphs(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// The work being read, as the host page describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkInfo {
    pub work_id: String,
    pub title: String,
    pub author: String,
    pub fandom: String,
}

impl WorkInfo {
    /// Work with placeholder metadata
    pub fn new(work_id: impl Into<String>) -> Self {
        Self {
            work_id: work_id.into(),
            title: UNKNOWN_TITLE.into(),
            author: UNKNOWN_AUTHOR.into(),
            fandom: UNKNOWN_FANDOM.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_fandom(mut self, fandom: impl Into<String>) -> Self {
        self.fandom = fandom.into();
        self
    }
}

/// The chapter currently rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInfo {
    pub chapter_id: String,
    pub chapter_name: String,
}

impl ChapterInfo {
    pub fn new(chapter_id: impl Into<String>, chapter_name: impl Into<String>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            chapter_name: chapter_name.into(),
        }
    }

    /// The only chapter of a single-chapter work
    pub fn single() -> Self {
        Self::new(SINGLE_CHAPTER_ID, "Chapter 1")
    }
}

/// A reader's annotation on a span of paragraphs
///
/// `note_id`, `work_id`, `chapter_id` and `time` never change after creation.
/// `anchor` is `None` only for records carried over from tools that stored
/// no paragraph indices; such records are listed but never rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub note_id: NoteId,
    pub work_id: String,
    pub chapter_id: String,
    pub chapter_name: String,
    pub title: String,
    pub author: String,
    pub fandom: String,
    pub text: String,
    #[serde(flatten)]
    pub anchor: Option<Anchor>,
    pub marker: String,
    pub note: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

impl Annotation {
    /// New record with a fresh id, an empty note and the current time
    /// (millisecond precision, as persisted)
    pub fn create(
        work: &WorkInfo,
        chapter: &ChapterInfo,
        text: impl Into<String>,
        anchor: Anchor,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            note_id: NoteId::generate(),
            work_id: work.work_id.clone(),
            chapter_id: chapter.chapter_id.clone(),
            chapter_name: chapter.chapter_name.clone(),
            title: work.title.clone(),
            author: work.author.clone(),
            fandom: work.fandom.clone(),
            text: text.into(),
            anchor: Some(anchor),
            marker: marker.into(),
            note: String::new(),
            time: now_millis(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn work(&self) -> WorkInfo {
        WorkInfo {
            work_id: self.work_id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            fandom: self.fandom.clone(),
        }
    }

    pub fn chapter(&self) -> ChapterInfo {
        ChapterInfo::new(self.chapter_id.clone(), self.chapter_name.clone())
    }

    /// True if the note text is empty (a bare marker)
    pub fn is_bare(&self) -> bool {
        self.note.is_empty()
    }

    pub fn belongs_to(&self, work_id: &str, chapter_id: &str) -> bool {
        self.work_id == work_id && self.chapter_id == chapter_id
    }
}

/// Why a stored record could not be turned into an `Annotation`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// An annotation as read from storage or an import file, before normalization
///
/// Every field is optional: records written by different iterations of the
/// tool carry different subsets. `normalize` is the only place those
/// differences are reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAnnotation {
    #[serde(alias = "id")]
    pub note_id: Option<String>,
    pub work_id: Option<String>,
    pub chapter_id: Option<String>,
    pub chapter_name: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub fandom: Option<String>,
    pub text: Option<String>,
    pub start_paragraph_index: Option<i64>,
    pub end_paragraph_index: Option<i64>,
    #[serde(alias = "emoji")]
    pub marker: Option<String>,
    pub note: Option<String>,
    pub time: Option<i64>,
}

impl RawAnnotation {
    /// Fill defaults and validate, producing the canonical record.
    ///
    /// `fallback_marker` is used for records that never had a marker.
    pub fn normalize(self, fallback_marker: &str) -> Result<Annotation, NormalizeError> {
        let note_id = non_empty(self.note_id).ok_or(NormalizeError::MissingField("noteId"))?;
        let work_id = non_empty(self.work_id).ok_or(NormalizeError::MissingField("workId"))?;
        let single = ChapterInfo::single();

        Ok(Annotation {
            note_id: NoteId::from(note_id),
            work_id,
            chapter_id: non_empty(self.chapter_id).unwrap_or(single.chapter_id),
            chapter_name: non_empty(self.chapter_name).unwrap_or(single.chapter_name),
            title: non_empty(self.title).unwrap_or_else(|| UNKNOWN_TITLE.into()),
            author: non_empty(self.author).unwrap_or_else(|| UNKNOWN_AUTHOR.into()),
            fandom: non_empty(self.fandom).unwrap_or_else(|| UNKNOWN_FANDOM.into()),
            text: self.text.unwrap_or_default(),
            anchor: normalize_anchor(self.start_paragraph_index, self.end_paragraph_index),
            marker: non_empty(self.marker).unwrap_or_else(|| fallback_marker.to_string()),
            note: self.note.unwrap_or_default(),
            time: self
                .time
                .and_then(DateTime::from_timestamp_millis)
                .unwrap_or_default(),
        })
    }
}

impl From<&Annotation> for RawAnnotation {
    fn from(record: &Annotation) -> Self {
        Self {
            note_id: Some(record.note_id.to_string()),
            work_id: Some(record.work_id.clone()),
            chapter_id: Some(record.chapter_id.clone()),
            chapter_name: Some(record.chapter_name.clone()),
            title: Some(record.title.clone()),
            author: Some(record.author.clone()),
            fandom: Some(record.fandom.clone()),
            text: Some(record.text.clone()),
            start_paragraph_index: record.anchor.map(|a| a.start() as i64),
            end_paragraph_index: record.anchor.map(|a| a.end() as i64),
            marker: Some(record.marker.clone()),
            note: Some(record.note.clone()),
            time: Some(record.time.timestamp_millis()),
        }
    }
}

fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A lone index anchors a single paragraph; reversed ends are swapped;
/// negative indices anchor nothing.
fn normalize_anchor(start: Option<i64>, end: Option<i64>) -> Option<Anchor> {
    let index = |v: i64| usize::try_from(v).ok();
    match (start, end) {
        (Some(s), Some(e)) => Some(Anchor::spanning(index(s)?, index(e)?)),
        (Some(x), None) | (None, Some(x)) => {
            let i = index(x)?;
            Some(Anchor::spanning(i, i))
        }
        (None, None) => None,
    }
}
