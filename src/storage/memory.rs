//! In-memory storage backend
//!
//! Records live in a concurrent map keyed by note id, with index maps from
//! work id and chapter id to note ids. Nothing survives the process.

use super::traits::{AnnotationStore, HandoffSlot, PaletteStore, StorageError, StorageResult};
use crate::annotation::{Annotation, MarkerPalette, NoteId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory annotation store with work and chapter indexes
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<NoteId, Annotation>,
    by_work: DashMap<String, HashSet<NoteId>>,
    by_chapter: DashMap<String, HashSet<NoteId>>,
    palette: Mutex<Option<MarkerPalette>>,
    handoff: Mutex<Option<(DateTime<Utc>, Annotation)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn unindex(&self, record: &Annotation) {
        Self::drop_id(&self.by_work, &record.work_id, &record.note_id);
        Self::drop_id(&self.by_chapter, &record.chapter_id, &record.note_id);
    }

    fn drop_id(index: &DashMap<String, HashSet<NoteId>>, key: &str, note_id: &NoteId) {
        if let Some(mut ids) = index.get_mut(key) {
            ids.remove(note_id);
        }
        // the shard guard above is released before this takes it again
        index.remove_if(key, |_, ids| ids.is_empty());
    }

    fn upsert(&self, record: &Annotation) {
        // the record swap is a single map write; readers see old or new, never a mix
        if let Some(previous) = self.records.insert(record.note_id.clone(), record.clone()) {
            if previous.work_id != record.work_id || previous.chapter_id != record.chapter_id {
                self.unindex(&previous);
            }
        }
        self.by_work
            .entry(record.work_id.clone())
            .or_default()
            .insert(record.note_id.clone());
        self.by_chapter
            .entry(record.chapter_id.clone())
            .or_default()
            .insert(record.note_id.clone());
    }

    fn collect(&self, ids: Vec<NoteId>, keep: impl Fn(&Annotation) -> bool) -> Vec<Annotation> {
        ids.iter()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .filter(|r| keep(r))
            .collect()
    }

    fn ids_in(index: &DashMap<String, HashSet<NoteId>>, key: &str) -> Vec<NoteId> {
        index
            .get(key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn insert(&self, record: &Annotation) -> StorageResult<()> {
        self.upsert(record);
        Ok(())
    }

    async fn update(&self, record: &Annotation) -> StorageResult<()> {
        self.upsert(record);
        Ok(())
    }

    async fn delete(&self, note_id: &NoteId) -> StorageResult<()> {
        if let Some((_, record)) = self.records.remove(note_id) {
            self.unindex(&record);
        }
        Ok(())
    }

    async fn get(&self, note_id: &NoteId) -> StorageResult<Option<Annotation>> {
        Ok(self.records.get(note_id).map(|r| r.clone()))
    }

    async fn query_by_work(&self, work_id: &str) -> StorageResult<Vec<Annotation>> {
        let ids = Self::ids_in(&self.by_work, work_id);
        Ok(self.collect(ids, |r| r.work_id == work_id))
    }

    async fn query_by_chapter(&self, work_id: &str, chapter_id: &str) -> StorageResult<Vec<Annotation>> {
        let ids = Self::ids_in(&self.by_chapter, chapter_id);
        Ok(self.collect(ids, |r| r.belongs_to(work_id, chapter_id)))
    }

    async fn query_all(&self) -> StorageResult<Vec<Annotation>> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}

#[async_trait]
impl PaletteStore for MemoryStore {
    async fn load_palette(&self) -> StorageResult<Option<MarkerPalette>> {
        let palette = self.palette.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(palette.clone())
    }

    async fn save_palette(&self, palette: &MarkerPalette) -> StorageResult<()> {
        let mut slot = self.palette.lock().map_err(|_| StorageError::LockPoisoned)?;
        *slot = Some(palette.clone());
        Ok(())
    }
}

#[async_trait]
impl HandoffSlot for MemoryStore {
    async fn put_handoff(&self, record: &Annotation) -> StorageResult<()> {
        let mut slot = self.handoff.lock().map_err(|_| StorageError::LockPoisoned)?;
        *slot = Some((Utc::now(), record.clone()));
        Ok(())
    }

    async fn take_handoff(&self, max_age: chrono::Duration) -> StorageResult<Option<Annotation>> {
        let taken = self
            .handoff
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .take();
        Ok(taken
            .filter(|(written_at, _)| Utc::now() - *written_at <= max_age)
            .map(|(_, record)| record))
    }
}
