//! Rendering of annotations over the chapter, and their interaction

mod renderer;
mod surface;

pub use renderer::{EditCommit, EditStart, MenuAction, RenderReport, Renderer};
pub use surface::{ElementId, MarkerMenu, OverlayElement, OverlayKind, RenderHandles, RenderedNote, Surface};
