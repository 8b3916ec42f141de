//! Annotation data model

mod palette;
mod record;
mod summary;

pub use palette::{MarkerPalette, DEFAULT_MARKERS, PALETTE_KEY};
pub use record::{
    Anchor, Annotation, ChapterInfo, NormalizeError, NoteId, RawAnnotation, WorkInfo,
    SINGLE_CHAPTER_ID, UNKNOWN_AUTHOR, UNKNOWN_FANDOM, UNKNOWN_TITLE,
};
pub use summary::{ChapterSummary, NotesSummary, WorkSummary};
