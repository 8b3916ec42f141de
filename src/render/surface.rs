//! Overlay surface: the visual elements layered over the rendered chapter
//!
//! Every element is tagged with the note id it belongs to, so removing a
//! note removes exactly its elements. Paragraph highlighting is derived
//! from the span marks still present, never stored separately.

use crate::annotation::{Annotation, NoteId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Identity of an overlay element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// What an overlay element shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayKind {
    /// Side marking on one paragraph of an annotated span
    SpanMark { paragraph: usize },
    /// Clickable marker glyph; `slot` orders markers sharing a paragraph
    MarkerGlyph {
        paragraph: usize,
        glyph: String,
        slot: usize,
    },
    /// Note text shown after the end paragraph
    NoteLabel {
        paragraph: usize,
        text: String,
        visible: bool,
    },
    /// Editable field standing in for a note label while editing
    NoteEditor {
        paragraph: usize,
        draft: String,
        visible: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayElement {
    pub id: ElementId,
    pub note_id: NoteId,
    pub kind: OverlayKind,
}

/// Handles to the interactive elements of one rendered note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderHandles {
    pub marker: ElementId,
    pub note: ElementId,
}

/// A note as currently drawn: the record it was drawn from and its handles
#[derive(Debug, Clone)]
pub struct RenderedNote {
    pub record: Annotation,
    pub handles: RenderHandles,
}

/// Context menu opened from a marker glyph, bound to one note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMenu {
    pub note_id: NoteId,
    pub marker: ElementId,
}

/// All overlay state for one page load
#[derive(Debug, Default)]
pub struct Surface {
    elements: BTreeMap<ElementId, OverlayElement>,
    notes: HashMap<NoteId, RenderedNote>,
    next_id: u64,
    menu: Option<MarkerMenu>,
    focus: Option<NoteId>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, note_id: &NoteId, kind: OverlayKind) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(
            id,
            OverlayElement {
                id,
                note_id: note_id.clone(),
                kind,
            },
        );
        id
    }

    pub fn element(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.get(&id)
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut OverlayElement> {
        self.elements.get_mut(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &OverlayElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements tagged with `note_id`
    pub fn tagged<'a>(&'a self, note_id: &'a NoteId) -> impl Iterator<Item = &'a OverlayElement> + 'a {
        self.elements.values().filter(move |e| &e.note_id == note_id)
    }

    /// Remove every element tagged with `note_id`, and any menu or focus on it.
    /// Returns how many elements were removed.
    pub fn remove_tagged(&mut self, note_id: &NoteId) -> usize {
        let before = self.elements.len();
        self.elements.retain(|_, e| &e.note_id != note_id);
        self.notes.remove(note_id);
        if self.menu.as_ref().is_some_and(|m| &m.note_id == note_id) {
            self.menu = None;
        }
        if self.focus.as_ref() == Some(note_id) {
            self.focus = None;
        }
        before - self.elements.len()
    }

    pub(crate) fn register(&mut self, record: Annotation, handles: RenderHandles) {
        self.notes
            .insert(record.note_id.clone(), RenderedNote { record, handles });
    }

    pub fn rendered(&self, note_id: &NoteId) -> Option<&RenderedNote> {
        self.notes.get(note_id)
    }

    pub(crate) fn rendered_mut(&mut self, note_id: &NoteId) -> Option<&mut RenderedNote> {
        self.notes.get_mut(note_id)
    }

    pub fn rendered_ids(&self) -> impl Iterator<Item = &NoteId> {
        self.notes.keys()
    }

    /// True if any annotation currently marks `paragraph`
    pub fn is_highlighted(&self, paragraph: usize) -> bool {
        self.elements
            .values()
            .any(|e| matches!(e.kind, OverlayKind::SpanMark { paragraph: p } if p == paragraph))
    }

    pub fn highlighted_paragraphs(&self) -> BTreeSet<usize> {
        self.elements
            .values()
            .filter_map(|e| match e.kind {
                OverlayKind::SpanMark { paragraph } => Some(paragraph),
                _ => None,
            })
            .collect()
    }

    /// Marker glyphs placed at `paragraph`, in slot order
    pub fn markers_at(&self, paragraph: usize) -> Vec<&OverlayElement> {
        let mut markers: Vec<(usize, &OverlayElement)> = self
            .elements
            .values()
            .filter_map(|e| match &e.kind {
                OverlayKind::MarkerGlyph { paragraph: p, slot, .. } if *p == paragraph => Some((*slot, e)),
                _ => None,
            })
            .collect();
        markers.sort_by_key(|(slot, _)| *slot);
        markers.into_iter().map(|(_, e)| e).collect()
    }

    /// Lowest marker slot not in use at `paragraph`
    pub fn next_slot(&self, paragraph: usize) -> usize {
        let used: BTreeSet<usize> = self
            .elements
            .values()
            .filter_map(|e| match &e.kind {
                OverlayKind::MarkerGlyph { paragraph: p, slot, .. } if *p == paragraph => Some(*slot),
                _ => None,
            })
            .collect();
        (0..).find(|s| !used.contains(s)).unwrap_or(used.len())
    }

    /// The note text a reader would see for `note_id`: `None` when the note
    /// is not rendered, hidden, being edited, or empty.
    pub fn visible_note_text(&self, note_id: &NoteId) -> Option<&str> {
        let note = self.notes.get(note_id)?;
        match &self.elements.get(&note.handles.note)?.kind {
            OverlayKind::NoteLabel { text, visible: true, .. } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_editing(&self, note_id: &NoteId) -> bool {
        self.notes
            .get(note_id)
            .and_then(|n| self.elements.get(&n.handles.note))
            .is_some_and(|e| matches!(e.kind, OverlayKind::NoteEditor { .. }))
    }

    pub fn menu(&self) -> Option<&MarkerMenu> {
        self.menu.as_ref()
    }

    pub(crate) fn set_menu(&mut self, menu: Option<MarkerMenu>) {
        self.menu = menu;
    }

    /// The note the reader was sent to, if any
    pub fn focus(&self) -> Option<&NoteId> {
        self.focus.as_ref()
    }

    pub(crate) fn set_focus(&mut self, note_id: Option<NoteId>) {
        self.focus = note_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_tagged_only_touches_that_note() {
        let mut surface = Surface::new();
        let a = NoteId::from("a");
        let b = NoteId::from("b");
        surface.add(&a, OverlayKind::SpanMark { paragraph: 1 });
        surface.add(&a, OverlayKind::SpanMark { paragraph: 2 });
        surface.add(&b, OverlayKind::SpanMark { paragraph: 2 });

        assert_eq!(surface.remove_tagged(&a), 2);
        assert_eq!(surface.remove_tagged(&a), 0);
        assert!(!surface.is_highlighted(1));
        assert!(surface.is_highlighted(2));
        assert_eq!(surface.tagged(&b).count(), 1);
    }

    #[test]
    fn test_next_slot_reuses_gaps() {
        let mut surface = Surface::new();
        let a = NoteId::from("a");
        let b = NoteId::from("b");
        let glyph = |slot| OverlayKind::MarkerGlyph {
            paragraph: 4,
            glyph: "❤".into(),
            slot,
        };
        surface.add(&a, glyph(0));
        surface.add(&b, glyph(1));
        assert_eq!(surface.next_slot(4), 2);
        assert_eq!(surface.next_slot(5), 0);

        surface.remove_tagged(&a);
        assert_eq!(surface.next_slot(4), 0);
        assert_eq!(surface.markers_at(4).len(), 1);
    }

    #[test]
    fn test_menu_and_focus_cleared_with_their_note() {
        let mut surface = Surface::new();
        let a = NoteId::from("a");
        let marker = surface.add(
            &a,
            OverlayKind::MarkerGlyph {
                paragraph: 0,
                glyph: "x".into(),
                slot: 0,
            },
        );
        surface.set_menu(Some(MarkerMenu {
            note_id: a.clone(),
            marker,
        }));
        surface.set_focus(Some(a.clone()));
        surface.remove_tagged(&a);
        assert!(surface.menu().is_none());
        assert!(surface.focus().is_none());
    }
}
