//! Host page model: document tree, paragraph enumeration, page contract

mod page;
mod paragraphs;
mod tree;

pub use page::{parse_work_path, ChapterPage, HostPage, CONTENT_CLASS};
pub use paragraphs::{is_paragraph, ParagraphEnumeration, PARAGRAPH_TAG};
pub use tree::{Ancestors, BoundaryPoint, DocumentTree, NodeKey, NodeKind};
