//! Shared fixtures for marginalia integration tests
//!
//! Pages built from plain paragraphs, controllers over them, and a store
//! whose writes can be switched off.

#![allow(dead_code)]

use async_trait::async_trait;
use marginalia::annotation::MarkerPalette;
use marginalia::{
    Annotation, AnnotationStore, ChapterInfo, ChapterPage, Controller, ControllerSettings, HandoffSlot, HostPage,
    MemoryStore, NoteId, NoteStore, OpenStore, PaletteStore, SelectionRange, SqliteStore, StorageError,
    StorageResult, WorkInfo,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const WORK_ID: &str = "4242";

pub fn work() -> WorkInfo {
    WorkInfo::new(WORK_ID)
        .with_title("A Long Road")
        .with_author("someone")
        .with_fandom("Somewhere")
}

pub fn chapter(id: &str) -> ChapterInfo {
    ChapterInfo::new(id, format!("Chapter {}", id))
}

pub fn paragraph_text(chapter: &str, index: usize) -> String {
    format!("Paragraph {} of chapter {} goes on for a while.", index, chapter)
}

/// A chapter page with `n` plain paragraphs
pub fn chapter_page(chapter_id: &str, n: usize) -> ChapterPage {
    let texts: Vec<String> = (0..n).map(|i| paragraph_text(chapter_id, i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    ChapterPage::from_paragraphs(work(), chapter(chapter_id), &refs)
}

/// Append a plain paragraph to the page's content
pub fn append_paragraph(page: &mut ChapterPage, text: &str) {
    let root = page.content_root();
    let tree = page.tree_mut();
    let p = tree.append_element(root, "p", &[]);
    tree.append_text(p, text);
}

pub fn settings() -> ControllerSettings {
    ControllerSettings::default()
}

pub async fn load<S: NoteStore + ?Sized>(page: ChapterPage, store: Arc<S>) -> Controller<ChapterPage, S> {
    Controller::load(page, store, settings()).await
}

/// Whole-paragraph selection over `first..=last` of the controller's page
pub fn select<S: NoteStore + ?Sized>(
    controller: &Controller<ChapterPage, S>,
    first: usize,
    last: usize,
) -> SelectionRange {
    SelectionRange::over_paragraphs(controller.host().tree(), controller.paragraphs(), first, last)
        .expect("paragraphs exist")
}

/// Select and pick a marker in one go
pub async fn annotate<S: NoteStore + ?Sized>(
    controller: &mut Controller<ChapterPage, S>,
    first: usize,
    last: usize,
    marker: &str,
) -> NoteId {
    let range = select(controller, first, last);
    controller.on_selection_change(Some(&range)).expect("selection resolves");
    controller.choose_marker(marker).await.expect("annotation created")
}

/// On-disk SQLite store in a fresh temp dir
pub fn temp_sqlite() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("marginalia.db")).expect("open store");
    (dir, store)
}

pub fn reopen(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("marginalia.db")).expect("reopen store")
}

/// In-memory store whose writes fail while `failing` is set
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AnnotationStore for FlakyStore {
    async fn insert(&self, record: &Annotation) -> StorageResult<()> {
        self.check()?;
        self.inner.insert(record).await
    }

    async fn update(&self, record: &Annotation) -> StorageResult<()> {
        self.check()?;
        self.inner.update(record).await
    }

    async fn delete(&self, note_id: &NoteId) -> StorageResult<()> {
        self.check()?;
        self.inner.delete(note_id).await
    }

    async fn get(&self, note_id: &NoteId) -> StorageResult<Option<Annotation>> {
        self.inner.get(note_id).await
    }

    async fn query_by_work(&self, work_id: &str) -> StorageResult<Vec<Annotation>> {
        self.inner.query_by_work(work_id).await
    }

    async fn query_all(&self) -> StorageResult<Vec<Annotation>> {
        self.inner.query_all().await
    }
}

#[async_trait]
impl PaletteStore for FlakyStore {
    async fn load_palette(&self) -> StorageResult<Option<MarkerPalette>> {
        self.inner.load_palette().await
    }

    async fn save_palette(&self, palette: &MarkerPalette) -> StorageResult<()> {
        self.check()?;
        self.inner.save_palette(palette).await
    }
}

#[async_trait]
impl HandoffSlot for FlakyStore {
    async fn put_handoff(&self, record: &Annotation) -> StorageResult<()> {
        self.check()?;
        self.inner.put_handoff(record).await
    }

    async fn take_handoff(&self, max_age: chrono::Duration) -> StorageResult<Option<Annotation>> {
        self.inner.take_handoff(max_age).await
    }
}
