//! Marginalia: paragraph-anchored annotations for paginated fiction
//!
//! A reader selects a span of a chapter, picks a marker glyph, and
//! optionally writes a note. Annotations are anchored by paragraph index
//! within the chapter's content container, persisted in an indexed store,
//! and redrawn as side marks, a marker, and a note label on every load.
//!
//! # Core Concepts
//!
//! - **Locator**: resolves a selection to a paragraph-index `Anchor`
//! - **Store**: async, indexed persistence of annotations, palette and jump handoff
//! - **Renderer**: draws annotations onto an overlay `Surface`
//! - **Controller**: selection state machine and the create / edit / delete / jump flows
//!
//! # Example
//!
//! ```
//! use marginalia::{ChapterInfo, ChapterPage, Controller, ControllerSettings, MemoryStore, WorkInfo};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let page = ChapterPage::from_paragraphs(WorkInfo::new("123"), ChapterInfo::single(), &["Once.", "Twice."]);
//! let controller = Controller::load(page, Arc::new(MemoryStore::new()), ControllerSettings::default()).await;
//! assert_eq!(controller.paragraphs().len(), 2);
//! # });
//! ```

pub mod annotation;
pub mod config;
pub mod controller;
pub mod document;
pub mod legacy;
pub mod locator;
pub mod render;
pub mod storage;

pub use annotation::{
    Anchor, Annotation, ChapterInfo, MarkerPalette, NoteId, NotesSummary, RawAnnotation, WorkInfo,
};
pub use config::{Config, ConfigError};
pub use controller::{AnnotateError, Controller, ControllerSettings, Jump, MarkerPicker, SelectionState};
pub use document::{parse_work_path, BoundaryPoint, ChapterPage, DocumentTree, HostPage, ParagraphEnumeration};
pub use locator::{locate, resolve_anchor, LocatedSelection, SelectionRange};
pub use render::{EditCommit, EditStart, MenuAction, Renderer, Surface};
pub use storage::{
    AnnotationStore, HandoffSlot, MemoryStore, NoteStore, OpenStore, PaletteStore, SqliteStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
