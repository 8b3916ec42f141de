//! Controller: selection state, marker picker, and the create / load /
//! edit / delete / jump flows
//!
//! One controller lives for one page load. Navigating to another chapter
//! drops it; only the store (and the single-slot jump handoff) survive.

use crate::annotation::{Anchor, Annotation, MarkerPalette, NoteId, NotesSummary};
use crate::document::{HostPage, ParagraphEnumeration};
use crate::locator::{locate, LocatedSelection, SelectionRange};
use crate::render::{EditCommit, EditStart, ElementId, MarkerMenu, MenuAction, RenderReport, Renderer, Surface};
use crate::storage::{NoteStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

/// Why an annotation action did not take effect
///
/// Whatever the error, the controller is left consistent: no picker is
/// left dangling and no marker is drawn for a record that was not stored.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("selection is not inside chapter content")]
    AnchorUnresolved,

    #[error("anchor of {0} does not fit the current chapter")]
    StaleAnchor(NoteId),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("no selection is waiting for a marker")]
    NoPendingSelection,

    #[error("marker must not be blank")]
    BlankMarker,

    #[error("note {0} is not rendered on this page")]
    NotRendered(NoteId),

    #[error("page does not identify a work and chapter")]
    MissingPageIdentity,
}

/// Identity of one shown marker picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickerId(u64);

/// The marker picker shown for a pending selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPicker {
    pub id: PickerId,
    pub anchor: Anchor,
    pub text: String,
    pub markers: Vec<String>,
}

/// A resolved selection waiting for a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub selection: LocatedSelection,
    pub picker: PickerId,
}

/// Selection state of a page. `committed` and `abandoned` both return to `Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selected(PendingSelection),
}

/// Inputs to the selection state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionInput {
    /// The selection changed; `None` if it was cleared or did not resolve
    Changed(Option<LocatedSelection>),
    /// The picker was closed without a choice
    Dismissed,
    /// A marker was picked
    Chosen(String),
}

/// What the controller must do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Nothing,
    ShowPicker(PickerId),
    ReplacePicker { closed: PickerId, shown: PickerId },
    ClosePicker(PickerId),
    Commit { selection: LocatedSelection, marker: String },
}

impl SelectionState {
    /// The transition function. `fresh` is the id to give a newly shown picker.
    ///
    /// Each change fully supersedes the previous pending selection: at most
    /// one picker is ever live.
    pub fn next(self, input: SelectionInput, fresh: PickerId) -> (SelectionState, Effect) {
        use SelectionInput::*;
        use SelectionState::*;

        match (self, input) {
            (Idle, Changed(Some(selection))) => (
                Selected(PendingSelection {
                    selection,
                    picker: fresh,
                }),
                Effect::ShowPicker(fresh),
            ),
            (Selected(old), Changed(Some(selection))) => (
                Selected(PendingSelection {
                    selection,
                    picker: fresh,
                }),
                Effect::ReplacePicker {
                    closed: old.picker,
                    shown: fresh,
                },
            ),
            (Selected(old), Changed(None)) | (Selected(old), Dismissed) => {
                (Idle, Effect::ClosePicker(old.picker))
            }
            (Selected(old), Chosen(marker)) => (
                Idle,
                Effect::Commit {
                    selection: old.selection,
                    marker,
                },
            ),
            (Idle, _) => (Idle, Effect::Nothing),
        }
    }
}

/// Where a jump to an annotation leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jump {
    /// The annotation is on this page and now has focus
    Here(NoteId),
    /// The annotation is in another chapter; the host should navigate there.
    /// The record waits in the handoff slot for the next load.
    Navigate { work_id: String, chapter_id: String },
}

/// Tunables of a controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// How long a jump handoff stays valid
    pub handoff_ttl: chrono::Duration,
    /// Palette saved on first use when none is stored
    pub seed_palette: MarkerPalette,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            handoff_ttl: chrono::Duration::seconds(60),
            seed_palette: MarkerPalette::default(),
        }
    }
}

/// Owns the transient state of one page load
pub struct Controller<H, S: ?Sized> {
    host: H,
    store: Arc<S>,
    settings: ControllerSettings,
    renderer: Renderer,
    surface: Surface,
    paragraphs: ParagraphEnumeration,
    state: SelectionState,
    picker: Option<MarkerPicker>,
    palette: MarkerPalette,
    next_picker: u64,
    pending_focus: Option<Annotation>,
    last_report: RenderReport,
}

impl<H, S> Controller<H, S>
where
    H: HostPage,
    S: NoteStore + ?Sized,
{
    /// Load a page: enumerate its paragraphs, replay every stored annotation
    /// of the current chapter, and consume any jump handoff.
    ///
    /// Storage failures are logged; the page then simply shows fewer notes.
    pub async fn load(host: H, store: Arc<S>, settings: ControllerSettings) -> Self {
        let palette = match store.load_palette().await {
            Ok(Some(palette)) => palette,
            Ok(None) => {
                let seed = settings.seed_palette.clone();
                if let Err(e) = store.save_palette(&seed).await {
                    tracing::warn!(error = %e, "could not save initial marker palette");
                }
                seed
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load marker palette; using defaults");
                settings.seed_palette.clone()
            }
        };

        let pending_focus = match store.take_handoff(settings.handoff_ttl).await {
            Ok(handoff) => handoff,
            Err(e) => {
                tracing::warn!(error = %e, "could not read jump handoff");
                None
            }
        };

        let mut controller = Self {
            paragraphs: host.paragraphs(),
            host,
            store,
            settings,
            renderer: Renderer::new(),
            surface: Surface::new(),
            state: SelectionState::Idle,
            picker: None,
            palette,
            next_picker: 0,
            pending_focus,
            last_report: RenderReport::default(),
        };
        controller.replay().await;
        controller
    }

    /// Re-read the page after its content changed (late load, DOM mutation):
    /// discard the overlay and any pending selection, then replay.
    pub async fn refresh(&mut self) {
        self.paragraphs = self.host.paragraphs();
        self.surface = Surface::new();
        self.state = SelectionState::Idle;
        self.picker = None;
        self.replay().await;
    }

    async fn replay(&mut self) {
        let (Some(work), Some(chapter)) = (self.host.work(), self.host.chapter()) else {
            self.last_report = RenderReport::default();
            return;
        };
        let records = match self.store.query_by_chapter(&work.work_id, &chapter.chapter_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, work = %work.work_id, chapter = %chapter.chapter_id, "could not load annotations");
                Vec::new()
            }
        };
        self.last_report = self.renderer.render_all(&records, &self.paragraphs, &mut self.surface);
        tracing::debug!(
            rendered = self.last_report.rendered.len(),
            skipped = self.last_report.skipped.len(),
            "annotations replayed"
        );

        if let Some(target) = self.pending_focus.take() {
            if !target.belongs_to(&work.work_id, &chapter.chapter_id) {
                tracing::debug!(note_id = %target.note_id, "jump handoff is for another chapter; dropped");
            } else if self.surface.rendered(&target.note_id).is_some() {
                self.surface.set_focus(Some(target.note_id.clone()));
            } else {
                // only stored records are drawn; the note may be deleted or its
                // paragraphs not loaded yet, so try again on the next refresh
                self.pending_focus = Some(target);
            }
        }
    }

    // --- Selection ---

    /// Handle a selection change. Any shown picker is replaced or closed.
    ///
    /// Returns the new picker, or `AnchorUnresolved` if the selection is
    /// empty or not inside chapter content.
    pub fn on_selection_change(&mut self, range: Option<&SelectionRange>) -> Result<&MarkerPicker, AnnotateError> {
        let located = range.and_then(|r| locate(self.host.tree(), r, &self.paragraphs));
        if range.is_some() && located.is_none() {
            tracing::debug!("selection does not resolve to chapter paragraphs");
        }
        self.apply(SelectionInput::Changed(located));
        self.picker.as_ref().ok_or(AnnotateError::AnchorUnresolved)
    }

    /// Close the picker without choosing
    pub fn dismiss_picker(&mut self) {
        self.apply(SelectionInput::Dismissed);
    }

    /// Pick a marker for the pending selection: store the new record, then
    /// draw it. Nothing is drawn if the store rejects the record.
    pub async fn choose_marker(&mut self, marker: &str) -> Result<NoteId, AnnotateError> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(AnnotateError::BlankMarker);
        }
        match self.apply(SelectionInput::Chosen(marker.to_string())) {
            Some((selection, marker)) => self.commit(selection, marker).await,
            None => Err(AnnotateError::NoPendingSelection),
        }
    }

    /// Run one transition and carry out its picker effects. Returns the
    /// selection to commit, if the transition committed one.
    fn apply(&mut self, input: SelectionInput) -> Option<(LocatedSelection, String)> {
        let fresh = PickerId(self.next_picker);
        let state = std::mem::take(&mut self.state);
        let (state, effect) = state.next(input, fresh);
        self.state = state;

        match effect {
            Effect::Nothing => None,
            Effect::ShowPicker(id) | Effect::ReplacePicker { shown: id, .. } => {
                self.next_picker += 1;
                if let SelectionState::Selected(pending) = &self.state {
                    self.picker = Some(MarkerPicker {
                        id,
                        anchor: pending.selection.anchor,
                        text: pending.selection.text.clone(),
                        markers: self.palette.markers().to_vec(),
                    });
                }
                None
            }
            Effect::ClosePicker(_) => {
                self.picker = None;
                None
            }
            Effect::Commit { selection, marker } => {
                self.picker = None;
                Some((selection, marker))
            }
        }
    }

    async fn commit(&mut self, selection: LocatedSelection, marker: String) -> Result<NoteId, AnnotateError> {
        // identity is read now, not at selection time
        let (Some(work), Some(chapter)) = (self.host.work(), self.host.chapter()) else {
            return Err(AnnotateError::MissingPageIdentity);
        };
        let record = Annotation::create(&work, &chapter, selection.text, selection.anchor, marker);

        if let Err(e) = self.store.insert(&record).await {
            tracing::warn!(error = %e, "could not store new annotation");
            return Err(e.into());
        }
        tracing::info!(note_id = %record.note_id, work = %record.work_id, chapter = %record.chapter_id, "annotation created");

        match self.renderer.render(&record, &self.paragraphs, &mut self.surface) {
            Some(_) => Ok(record.note_id),
            None => Err(AnnotateError::StaleAnchor(record.note_id)),
        }
    }

    // --- Marker menu and note editing ---

    /// Click on a marker glyph
    pub fn open_menu(&mut self, marker: ElementId) -> Option<&MarkerMenu> {
        self.renderer.open_menu(&mut self.surface, marker)
    }

    pub fn close_menu(&mut self) {
        self.renderer.close_menu(&mut self.surface);
    }

    /// Run an entry of the open marker menu. Returns false if no menu is open.
    pub async fn apply_menu(&mut self, action: MenuAction) -> Result<bool, AnnotateError> {
        self.renderer
            .apply_menu(self.store.as_ref(), &mut self.surface, action)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, ?action, "marker menu action failed");
                AnnotateError::from(e)
            })
    }

    /// Delete a note from storage and from the page
    pub async fn delete_note(&mut self, note_id: &NoteId) -> Result<(), AnnotateError> {
        match self.renderer.delete(self.store.as_ref(), &mut self.surface, note_id).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, note_id = %note_id, "could not delete annotation");
                Err(e.into())
            }
        }
    }

    pub fn toggle_note(&mut self, note_id: &NoteId) -> Option<bool> {
        self.renderer.toggle_note(&mut self.surface, note_id)
    }

    /// Click on a note label
    pub fn begin_edit(&mut self, note_id: &NoteId) -> EditStart {
        self.renderer.begin_edit(&mut self.surface, note_id)
    }

    /// Typing into an open editor
    pub fn set_draft(&mut self, note_id: &NoteId, text: &str) -> bool {
        self.renderer.set_draft(&mut self.surface, note_id, text)
    }

    /// Blur or confirm of an open editor
    pub async fn commit_edit(&mut self, note_id: &NoteId) -> Result<EditCommit, AnnotateError> {
        self.renderer
            .commit_edit(self.store.as_ref(), &mut self.surface, note_id)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, note_id = %note_id, "could not save note");
                AnnotateError::from(e)
            })
    }

    pub fn cancel_edit(&mut self, note_id: &NoteId) -> bool {
        self.renderer.cancel_edit(&mut self.surface, note_id)
    }

    pub async fn change_marker(&mut self, note_id: &NoteId, glyph: &str) -> Result<Annotation, AnnotateError> {
        let glyph = glyph.trim();
        if glyph.is_empty() {
            return Err(AnnotateError::BlankMarker);
        }
        match self
            .renderer
            .change_marker(self.store.as_ref(), &mut self.surface, note_id, glyph)
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AnnotateError::NotRendered(note_id.clone())),
            Err(e) => {
                tracing::warn!(error = %e, note_id = %note_id, "could not change marker");
                Err(e.into())
            }
        }
    }

    // --- Navigation ---

    /// Bring an annotation into focus, here or after navigating to its chapter
    pub async fn jump_to(&mut self, record: &Annotation) -> Result<Jump, AnnotateError> {
        let here = match (self.host.work(), self.host.chapter()) {
            (Some(work), Some(chapter)) => record.belongs_to(&work.work_id, &chapter.chapter_id),
            _ => false,
        };
        if here {
            if self.surface.rendered(&record.note_id).is_none() {
                return Err(AnnotateError::StaleAnchor(record.note_id.clone()));
            }
            self.surface.set_focus(Some(record.note_id.clone()));
            return Ok(Jump::Here(record.note_id.clone()));
        }

        if let Err(e) = self.store.put_handoff(record).await {
            tracing::warn!(error = %e, note_id = %record.note_id, "could not write jump handoff");
            return Err(e.into());
        }
        Ok(Jump::Navigate {
            work_id: record.work_id.clone(),
            chapter_id: record.chapter_id.clone(),
        })
    }

    // --- Palette ---

    pub async fn add_marker(&mut self, marker: &str) -> Result<&MarkerPalette, AnnotateError> {
        let palette = self.store.add_marker(marker, &self.settings.seed_palette).await.map_err(|e| {
            tracing::warn!(error = %e, "could not add marker");
            AnnotateError::from(e)
        })?;
        self.set_palette(palette);
        Ok(&self.palette)
    }

    pub async fn remove_marker(&mut self, marker: &str) -> Result<&MarkerPalette, AnnotateError> {
        let palette = self.store.remove_marker(marker, &self.settings.seed_palette).await.map_err(|e| {
            tracing::warn!(error = %e, "could not remove marker");
            AnnotateError::from(e)
        })?;
        self.set_palette(palette);
        Ok(&self.palette)
    }

    fn set_palette(&mut self, palette: MarkerPalette) {
        if let Some(picker) = self.picker.as_mut() {
            picker.markers = palette.markers().to_vec();
        }
        self.palette = palette;
    }

    // --- Reads ---

    /// Every annotation of every work, grouped for the notes panel
    pub async fn summary(&self) -> Result<NotesSummary, AnnotateError> {
        Ok(NotesSummary::build(self.store.query_all().await?))
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the page; call [`Controller::refresh`] afterwards
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn paragraphs(&self) -> &ParagraphEnumeration {
        &self.paragraphs
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn picker(&self) -> Option<&MarkerPicker> {
        self.picker.as_ref()
    }

    pub fn palette(&self) -> &MarkerPalette {
        &self.palette
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// What the last replay drew and skipped
    pub fn last_report(&self) -> &RenderReport {
        &self.last_report
    }

    pub fn focus(&self) -> Option<&NoteId> {
        self.surface.focus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(start: usize, end: usize) -> LocatedSelection {
        LocatedSelection {
            anchor: Anchor::new(start, end).unwrap(),
            text: "words".into(),
        }
    }

    #[test]
    fn test_idle_selection_shows_picker() {
        let (state, effect) = SelectionState::Idle.next(SelectionInput::Changed(Some(located(0, 0))), PickerId(1));
        assert!(matches!(state, SelectionState::Selected(ref p) if p.picker == PickerId(1)));
        assert_eq!(effect, Effect::ShowPicker(PickerId(1)));
    }

    #[test]
    fn test_new_selection_replaces_picker() {
        let (state, _) = SelectionState::Idle.next(SelectionInput::Changed(Some(located(0, 0))), PickerId(1));
        let (state, effect) = state.next(SelectionInput::Changed(Some(located(2, 3))), PickerId(2));
        assert_eq!(
            effect,
            Effect::ReplacePicker {
                closed: PickerId(1),
                shown: PickerId(2)
            }
        );
        let SelectionState::Selected(pending) = state else {
            panic!("expected a pending selection");
        };
        assert_eq!(pending.selection, located(2, 3));
    }

    #[test]
    fn test_cleared_selection_abandons() {
        let (state, _) = SelectionState::Idle.next(SelectionInput::Changed(Some(located(0, 0))), PickerId(1));
        let (state, effect) = state.next(SelectionInput::Changed(None), PickerId(2));
        assert_eq!(state, SelectionState::Idle);
        assert_eq!(effect, Effect::ClosePicker(PickerId(1)));
    }

    #[test]
    fn test_dismiss_abandons() {
        let (state, _) = SelectionState::Idle.next(SelectionInput::Changed(Some(located(0, 0))), PickerId(1));
        let (state, effect) = state.next(SelectionInput::Dismissed, PickerId(2));
        assert_eq!(state, SelectionState::Idle);
        assert_eq!(effect, Effect::ClosePicker(PickerId(1)));
    }

    #[test]
    fn test_choice_commits_latest_selection() {
        let (state, _) = SelectionState::Idle.next(SelectionInput::Changed(Some(located(0, 0))), PickerId(1));
        let (state, _) = state.next(SelectionInput::Changed(Some(located(4, 5))), PickerId(2));
        let (state, effect) = state.next(SelectionInput::Chosen("❤".into()), PickerId(3));
        assert_eq!(state, SelectionState::Idle);
        assert_eq!(
            effect,
            Effect::Commit {
                selection: located(4, 5),
                marker: "❤".into()
            }
        );
    }

    #[test]
    fn test_idle_ignores_everything_but_a_selection() {
        for input in [
            SelectionInput::Changed(None),
            SelectionInput::Dismissed,
            SelectionInput::Chosen("x".into()),
        ] {
            let (state, effect) = SelectionState::Idle.next(input, PickerId(0));
            assert_eq!(state, SelectionState::Idle);
            assert_eq!(effect, Effect::Nothing);
        }
    }
}
