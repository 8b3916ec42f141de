//! Paragraph enumeration: the ordered projection of a chapter's paragraph blocks
//!
//! The enumeration is recomputed on every render pass and is never persisted.
//! Lookup from node to index is by identity, so duplicate paragraph text
//! still resolves to the right position.

use super::tree::{DocumentTree, NodeKey};
use crate::annotation::Anchor;
use std::collections::HashMap;

/// Tag that marks a paragraph block in chapter content
pub const PARAGRAPH_TAG: &str = "p";

/// True if `key` is a paragraph block element
pub fn is_paragraph(tree: &DocumentTree, key: NodeKey) -> bool {
    tree.is_tag(key, PARAGRAPH_TAG)
}

/// Ordered, zero-based list of the paragraph blocks currently rendered
#[derive(Debug, Clone, Default)]
pub struct ParagraphEnumeration {
    blocks: Vec<NodeKey>,
    positions: HashMap<NodeKey, usize>,
}

impl ParagraphEnumeration {
    /// Enumerate every paragraph beneath `content_root` in document order.
    ///
    /// Paragraphs nested inside another paragraph are not separate blocks.
    pub fn collect(tree: &DocumentTree, content_root: NodeKey) -> Self {
        let blocks = tree
            .descendants(content_root)
            .into_iter()
            .filter(|k| is_paragraph(tree, *k))
            .filter(|k| {
                tree.ancestors(*k)
                    .skip(1)
                    .take_while(|a| *a != content_root)
                    .all(|a| !is_paragraph(tree, a))
            })
            .collect();
        Self::from_blocks(blocks)
    }

    pub fn from_blocks(blocks: Vec<NodeKey>) -> Self {
        let positions = blocks.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        Self { blocks, positions }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeKey> {
        self.blocks.get(index).copied()
    }

    /// Position of a paragraph node, by identity
    pub fn index_of(&self, key: NodeKey) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    /// True if both ends of `anchor` address paragraphs in this enumeration
    pub fn covers(&self, anchor: &Anchor) -> bool {
        anchor.end() < self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeKey)> + '_ {
        self.blocks.iter().copied().enumerate()
    }
}
