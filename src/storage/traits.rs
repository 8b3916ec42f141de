//! Storage trait definitions

use crate::annotation::{Annotation, MarkerPalette, NoteId};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Keyed, indexed persistence of annotation records
///
/// Every operation may suspend. A write is visible in full or not at all.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Write a new record. An existing record with the same id is overwritten.
    async fn insert(&self, record: &Annotation) -> StorageResult<()>;

    /// Overwrite a record by id, creating it if absent
    async fn update(&self, record: &Annotation) -> StorageResult<()>;

    /// Remove a record. Removing an unknown id is not an error.
    async fn delete(&self, note_id: &NoteId) -> StorageResult<()>;

    /// Load one record by id
    async fn get(&self, note_id: &NoteId) -> StorageResult<Option<Annotation>>;

    /// All records of a work, in no particular order
    async fn query_by_work(&self, work_id: &str) -> StorageResult<Vec<Annotation>>;

    /// All records of one chapter of a work, in no particular order
    async fn query_by_chapter(&self, work_id: &str, chapter_id: &str) -> StorageResult<Vec<Annotation>> {
        let mut records = self.query_by_work(work_id).await?;
        records.retain(|r| r.chapter_id == chapter_id);
        Ok(records)
    }

    /// Every record of every work
    async fn query_all(&self) -> StorageResult<Vec<Annotation>>;
}

/// Persistence of the marker palette, independent of annotations
#[async_trait]
pub trait PaletteStore: Send + Sync {
    /// The saved palette, or `None` if none was ever saved
    async fn load_palette(&self) -> StorageResult<Option<MarkerPalette>>;

    async fn save_palette(&self, palette: &MarkerPalette) -> StorageResult<()>;

    /// Read-modify-write: append `marker` and save. Returns the new palette.
    ///
    /// When no palette was ever saved, `seed` is the starting point.
    async fn add_marker(&self, marker: &str, seed: &MarkerPalette) -> StorageResult<MarkerPalette> {
        let mut palette = self.load_palette().await?.unwrap_or_else(|| seed.clone());
        if palette.add(marker) {
            self.save_palette(&palette).await?;
        }
        Ok(palette)
    }

    /// Read-modify-write: remove `marker` and save. Returns the new palette.
    async fn remove_marker(&self, marker: &str, seed: &MarkerPalette) -> StorageResult<MarkerPalette> {
        let mut palette = self.load_palette().await?.unwrap_or_else(|| seed.clone());
        if palette.remove(marker) {
            self.save_palette(&palette).await?;
        }
        Ok(palette)
    }
}

/// Single-slot payload carried across a chapter navigation
#[async_trait]
pub trait HandoffSlot: Send + Sync {
    /// Fill the slot, replacing whatever was there
    async fn put_handoff(&self, record: &Annotation) -> StorageResult<()>;

    /// Empty the slot, returning its payload if it was written within `max_age`
    async fn take_handoff(&self, max_age: chrono::Duration) -> StorageResult<Option<Annotation>>;
}

/// Everything the controller needs from storage
pub trait NoteStore: AnnotationStore + PaletteStore + HandoffSlot {}

impl<T: AnnotationStore + PaletteStore + HandoffSlot> NoteStore for T {}

/// Extension trait for opening stores from paths
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
