//! Renderer: draw annotations against the current paragraph enumeration,
//! and handle marker and note interaction
//!
//! Anchors persist only as paragraph indices, so every load replays
//! `render` for every stored record of the chapter. There is no
//! incremental restore.

use super::surface::{ElementId, MarkerMenu, OverlayKind, RenderHandles, Surface};
use crate::annotation::{Annotation, NoteId};
use crate::document::ParagraphEnumeration;
use crate::storage::{AnnotationStore, StorageResult};

/// Entries of the marker context menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Remove the note from storage and from the page
    Delete,
    /// Show or hide the note text (view only, not persisted)
    ToggleNote,
}

/// Result of a click on a note label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStart {
    Started,
    /// An editor is already open for this note; nothing changed
    AlreadyEditing,
    NotRendered,
}

/// Result of committing an inline edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommit {
    Saved(Annotation),
    NotEditing,
}

/// Outcome of a full replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub rendered: Vec<NoteId>,
    /// Records whose anchor does not fit the current enumeration
    pub skipped: Vec<NoteId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    /// Draw one record: a span mark on every paragraph of its anchor, and a
    /// marker glyph plus note label at the end paragraph.
    ///
    /// Returns `None`, drawing nothing, if the record has no anchor or its
    /// anchor addresses paragraphs the enumeration does not have. Drawing a
    /// record that is already drawn replaces its elements.
    pub fn render(
        &self,
        record: &Annotation,
        paragraphs: &ParagraphEnumeration,
        surface: &mut Surface,
    ) -> Option<RenderHandles> {
        let Some(anchor) = record.anchor else {
            tracing::debug!(note_id = %record.note_id, "annotation has no anchor; not rendered");
            return None;
        };
        if !paragraphs.covers(&anchor) {
            tracing::debug!(
                note_id = %record.note_id,
                end = anchor.end(),
                paragraphs = paragraphs.len(),
                "stale anchor; skipping this render pass"
            );
            return None;
        }

        surface.remove_tagged(&record.note_id);
        for paragraph in anchor.paragraphs() {
            surface.add(&record.note_id, OverlayKind::SpanMark { paragraph });
        }
        let end = anchor.end();
        let slot = surface.next_slot(end);
        let marker = surface.add(
            &record.note_id,
            OverlayKind::MarkerGlyph {
                paragraph: end,
                glyph: record.marker.clone(),
                slot,
            },
        );
        let note = surface.add(
            &record.note_id,
            OverlayKind::NoteLabel {
                paragraph: end,
                text: record.note.clone(),
                visible: true,
            },
        );
        let handles = RenderHandles { marker, note };
        surface.register(record.clone(), handles);
        Some(handles)
    }

    /// Replay `render` for every record, oldest first
    pub fn render_all(
        &self,
        records: &[Annotation],
        paragraphs: &ParagraphEnumeration,
        surface: &mut Surface,
    ) -> RenderReport {
        let mut ordered: Vec<&Annotation> = records.iter().collect();
        ordered.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.note_id.cmp(&b.note_id)));

        let mut report = RenderReport::default();
        for record in ordered {
            match self.render(record, paragraphs, surface) {
                Some(_) => report.rendered.push(record.note_id.clone()),
                None => report.skipped.push(record.note_id.clone()),
            }
        }
        report
    }

    /// Click on a marker glyph: open the menu bound to its note, replacing
    /// any open menu. Returns `None` if `marker` is not a marker glyph.
    pub fn open_menu<'s>(&self, surface: &'s mut Surface, marker: ElementId) -> Option<&'s MarkerMenu> {
        let element = surface.element(marker)?;
        if !matches!(element.kind, OverlayKind::MarkerGlyph { .. }) {
            return None;
        }
        let menu = MarkerMenu {
            note_id: element.note_id.clone(),
            marker,
        };
        surface.set_menu(Some(menu));
        surface.menu()
    }

    pub fn close_menu(&self, surface: &mut Surface) {
        surface.set_menu(None);
    }

    /// Run a menu entry against the note the open menu is bound to.
    /// Returns false if no menu is open.
    pub async fn apply_menu<S>(&self, store: &S, surface: &mut Surface, action: MenuAction) -> StorageResult<bool>
    where
        S: AnnotationStore + ?Sized,
    {
        let Some(menu) = surface.menu().cloned() else {
            return Ok(false);
        };
        surface.set_menu(None);
        match action {
            MenuAction::Delete => self.delete(store, surface, &menu.note_id).await,
            MenuAction::ToggleNote => Ok(self.toggle_note(surface, &menu.note_id).is_some()),
        }
    }

    /// Delete a note from storage, then remove every element tagged with it.
    ///
    /// If storage rejects the delete the page is left untouched.
    pub async fn delete<S>(&self, store: &S, surface: &mut Surface, note_id: &NoteId) -> StorageResult<bool>
    where
        S: AnnotationStore + ?Sized,
    {
        store.delete(note_id).await?;
        let removed = surface.remove_tagged(note_id);
        tracing::info!(note_id = %note_id, removed, "annotation deleted");
        Ok(removed > 0)
    }

    /// Flip note-text visibility. Returns the new visibility, or `None` if
    /// the note is not rendered.
    pub fn toggle_note(&self, surface: &mut Surface, note_id: &NoteId) -> Option<bool> {
        let handle = surface.rendered(note_id)?.handles.note;
        match &mut surface.element_mut(handle)?.kind {
            OverlayKind::NoteLabel { visible, .. } | OverlayKind::NoteEditor { visible, .. } => {
                *visible = !*visible;
                Some(*visible)
            }
            _ => None,
        }
    }

    /// Click on a note label: swap it for an editor seeded with the note.
    /// A second click while editing is a no-op.
    pub fn begin_edit(&self, surface: &mut Surface, note_id: &NoteId) -> EditStart {
        let Some(handle) = surface.rendered(note_id).map(|n| n.handles.note) else {
            return EditStart::NotRendered;
        };
        let Some(element) = surface.element_mut(handle) else {
            return EditStart::NotRendered;
        };
        let editor = match &element.kind {
            OverlayKind::NoteEditor { .. } => return EditStart::AlreadyEditing,
            OverlayKind::NoteLabel { paragraph, text, visible } => OverlayKind::NoteEditor {
                paragraph: *paragraph,
                draft: text.clone(),
                visible: *visible,
            },
            _ => return EditStart::NotRendered,
        };
        element.kind = editor;
        EditStart::Started
    }

    /// Replace the editor's draft text. Returns false if not editing.
    pub fn set_draft(&self, surface: &mut Surface, note_id: &NoteId, text: &str) -> bool {
        let Some(handle) = surface.rendered(note_id).map(|n| n.handles.note) else {
            return false;
        };
        match surface.element_mut(handle).map(|e| &mut e.kind) {
            Some(OverlayKind::NoteEditor { draft, .. }) => {
                *draft = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// Commit the editor (on blur or confirm): write the full record through
    /// `update`, then restore the label.
    ///
    /// On storage failure the label is restored with the previous text and
    /// the error is returned.
    pub async fn commit_edit<S>(&self, store: &S, surface: &mut Surface, note_id: &NoteId) -> StorageResult<EditCommit>
    where
        S: AnnotationStore + ?Sized,
    {
        let Some(rendered) = surface.rendered(note_id) else {
            return Ok(EditCommit::NotEditing);
        };
        let handle = rendered.handles.note;
        let mut record = rendered.record.clone();
        let draft = match surface.element(handle).map(|e| &e.kind) {
            Some(OverlayKind::NoteEditor { draft, .. }) => draft.trim().to_string(),
            _ => return Ok(EditCommit::NotEditing),
        };
        let previous = std::mem::replace(&mut record.note, draft);

        let result = store.update(&record).await;
        let shown = match &result {
            Ok(()) => record.note.clone(),
            Err(_) => previous,
        };
        restore_label(surface, handle, shown);
        result?;

        if let Some(rendered) = surface.rendered_mut(note_id) {
            rendered.record = record.clone();
        }
        tracing::info!(note_id = %note_id, "note updated");
        Ok(EditCommit::Saved(record))
    }

    /// Close the editor without saving
    pub fn cancel_edit(&self, surface: &mut Surface, note_id: &NoteId) -> bool {
        let Some(rendered) = surface.rendered(note_id) else {
            return false;
        };
        let handle = rendered.handles.note;
        let text = rendered.record.note.clone();
        if !surface.is_editing(note_id) {
            return false;
        }
        restore_label(surface, handle, text);
        true
    }

    /// Change a note's marker glyph, writing the full record through `update`.
    /// Returns the saved record, or `None` if the note is not rendered.
    pub async fn change_marker<S>(
        &self,
        store: &S,
        surface: &mut Surface,
        note_id: &NoteId,
        glyph: &str,
    ) -> StorageResult<Option<Annotation>>
    where
        S: AnnotationStore + ?Sized,
    {
        let Some(rendered) = surface.rendered(note_id) else {
            return Ok(None);
        };
        let handle = rendered.handles.marker;
        let mut record = rendered.record.clone();
        record.marker = glyph.to_string();
        store.update(&record).await?;

        if let Some(OverlayKind::MarkerGlyph { glyph: shown, .. }) = surface.element_mut(handle).map(|e| &mut e.kind) {
            *shown = record.marker.clone();
        }
        if let Some(rendered) = surface.rendered_mut(note_id) {
            rendered.record = record.clone();
        }
        tracing::info!(note_id = %note_id, marker = %record.marker, "marker changed");
        Ok(Some(record))
    }
}

fn restore_label(surface: &mut Surface, handle: ElementId, text: String) {
    if let Some(element) = surface.element_mut(handle) {
        let (paragraph, visible) = match &element.kind {
            OverlayKind::NoteEditor { paragraph, visible, .. }
            | OverlayKind::NoteLabel { paragraph, visible, .. } => (*paragraph, *visible),
            _ => return,
        };
        element.kind = OverlayKind::NoteLabel {
            paragraph,
            text,
            visible,
        };
    }
}
