//! Storage backends for annotations
//!
//! Backends implement the `AnnotationStore`, `PaletteStore` and
//! `HandoffSlot` traits. `SqliteStore` is the persistent implementation;
//! `MemoryStore` keeps everything in process.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, HANDOFF_KEY, LEGACY_MARKER};
pub use traits::{
    AnnotationStore, HandoffSlot, NoteStore, OpenStore, PaletteStore, StorageError, StorageResult,
};
