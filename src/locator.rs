//! Locator: turn a live selection into a paragraph-index anchor
//!
//! Each boundary is walked up to its enclosing paragraph block, and that
//! block is looked up in the current enumeration by identity. Selections
//! whose ends do not both land in chapter content resolve to nothing.

use crate::annotation::Anchor;
use crate::document::{BoundaryPoint, DocumentTree, NodeKey, ParagraphEnumeration};

/// A selection range over the rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

impl SelectionRange {
    pub fn new(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Selection covering whole paragraphs `first..=last` of `paragraphs`
    pub fn over_paragraphs(
        tree: &DocumentTree,
        paragraphs: &ParagraphEnumeration,
        first: usize,
        last: usize,
    ) -> Option<Self> {
        let start = paragraphs.get(first)?;
        let end = paragraphs.get(last)?;
        Some(Self::new(
            BoundaryPoint::new(start, 0),
            BoundaryPoint::new(end, tree.children(end).len()),
        ))
    }
}

/// A resolved selection: where it is, and what it said
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSelection {
    pub anchor: Anchor,
    pub text: String,
}

/// Index of the enumerated paragraph holding `node`. A paragraph nested in
/// another one is not enumerated, so the walk goes past it to the outer block.
fn enclosing_paragraph(tree: &DocumentTree, node: NodeKey, paragraphs: &ParagraphEnumeration) -> Option<usize> {
    tree.ancestors(node).find_map(|k| paragraphs.index_of(k))
}

/// Resolve a selection to the paragraph indices of its two ends.
///
/// Returns `None` if either end is not inside a paragraph of
/// `paragraphs`. A selection made backwards still yields `start <= end`.
pub fn resolve_anchor(
    tree: &DocumentTree,
    range: &SelectionRange,
    paragraphs: &ParagraphEnumeration,
) -> Option<Anchor> {
    let start = enclosing_paragraph(tree, range.start.node, paragraphs)?;
    let end = enclosing_paragraph(tree, range.end.node, paragraphs)?;
    Some(Anchor::spanning(start, end))
}

/// Resolve a selection and capture its trimmed text.
///
/// Collapsed or whitespace-only selections locate nothing.
pub fn locate(
    tree: &DocumentTree,
    range: &SelectionRange,
    paragraphs: &ParagraphEnumeration,
) -> Option<LocatedSelection> {
    if range.is_collapsed() {
        return None;
    }
    let anchor = resolve_anchor(tree, range, paragraphs)?;
    let text = tree.text_between(range.start, range.end)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(LocatedSelection {
        anchor,
        text: text.to_string(),
    })
}
