//! Host page contract and a concrete chapter page built from Markdown
//!
//! The engine never owns the host page. It asks the page who it is
//! (work and chapter identity) and what it currently shows (the tree and
//! its content root), and it asks again on every load.

use super::paragraphs::ParagraphEnumeration;
use super::tree::{DocumentTree, NodeKey};
use crate::annotation::{ChapterInfo, WorkInfo};
use pulldown_cmark::{Event, Options, Parser, Tag};

/// Class of the element holding chapter content
pub const CONTENT_CLASS: &str = "userstuff";

/// What the engine needs from the page it is embedded in
pub trait HostPage {
    /// Identity and display metadata of the work being read, if this is a work page
    fn work(&self) -> Option<WorkInfo>;

    /// The chapter currently rendered
    fn chapter(&self) -> Option<ChapterInfo>;

    /// The rendered page
    fn tree(&self) -> &DocumentTree;

    /// Element whose paragraphs make up the chapter content
    fn content_root(&self) -> NodeKey;

    /// Fresh paragraph enumeration of the current content
    fn paragraphs(&self) -> ParagraphEnumeration {
        ParagraphEnumeration::collect(self.tree(), self.content_root())
    }
}

/// A rendered chapter: page chrome plus a content block of paragraphs
#[derive(Debug, Clone)]
pub struct ChapterPage {
    work: Option<WorkInfo>,
    chapter: Option<ChapterInfo>,
    tree: DocumentTree,
    content_root: NodeKey,
}

impl ChapterPage {
    /// Render `markdown` as the chapter body, with a preface carrying the
    /// work's title, author, fandom and the chapter name.
    pub fn from_markdown(work: WorkInfo, chapter: ChapterInfo, markdown: &str) -> Self {
        let mut tree = DocumentTree::new();
        let root = tree.root();

        let preface = tree.append_element(root, "div", &["preface"]);
        let title = tree.append_element(preface, "h2", &["title"]);
        tree.append_text(title, work.title.clone());
        let author = tree.append_element(preface, "a", &["author"]);
        tree.append_text(author, work.author.clone());
        let fandom = tree.append_element(preface, "dd", &["fandom"]);
        tree.append_text(fandom, work.fandom.clone());
        let heading = tree.append_element(preface, "h3", &["chapter-title"]);
        tree.append_text(heading, chapter.chapter_name.clone());

        let content_root = tree.append_element(root, "div", &[CONTENT_CLASS]);
        build_content(&mut tree, content_root, markdown);

        Self {
            work: Some(work),
            chapter: Some(chapter),
            tree,
            content_root,
        }
    }

    /// A chapter whose body is exactly the given paragraphs
    pub fn from_paragraphs(work: WorkInfo, chapter: ChapterInfo, paragraphs: &[&str]) -> Self {
        Self::from_markdown(work, chapter, &paragraphs.join("\n\n"))
    }

    /// A page that is not a work page (no identity), e.g. a search listing
    pub fn anonymous(markdown: &str) -> Self {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let content_root = tree.append_element(root, "div", &[CONTENT_CLASS]);
        build_content(&mut tree, content_root, markdown);
        Self {
            work: None,
            chapter: None,
            tree,
            content_root,
        }
    }

    pub fn tree_mut(&mut self) -> &mut DocumentTree {
        &mut self.tree
    }
}

impl HostPage for ChapterPage {
    fn work(&self) -> Option<WorkInfo> {
        self.work.clone()
    }

    fn chapter(&self) -> Option<ChapterInfo> {
        self.chapter.clone()
    }

    fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    fn content_root(&self) -> NodeKey {
        self.content_root
    }
}

fn element_name(tag: &Tag<'_>) -> String {
    match tag {
        Tag::Paragraph => "p".into(),
        Tag::Heading { level, .. } => format!("h{}", *level as u8),
        Tag::BlockQuote => "blockquote".into(),
        Tag::CodeBlock(_) => "pre".into(),
        Tag::List(Some(_)) => "ol".into(),
        Tag::List(None) => "ul".into(),
        Tag::Item => "li".into(),
        Tag::Emphasis => "em".into(),
        Tag::Strong => "strong".into(),
        Tag::Strikethrough => "del".into(),
        Tag::Link { .. } => "a".into(),
        _ => "span".into(),
    }
}

/// Append the Markdown block structure of `markdown` beneath `parent`
fn build_content(tree: &mut DocumentTree, parent: NodeKey, markdown: &str) {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut stack = vec![parent];

    for event in parser {
        let top = *stack.last().unwrap_or(&parent);
        match event {
            Event::Start(tag) => {
                let name = element_name(&tag);
                let key = tree.append_element(top, &name, &[]);
                stack.push(key);
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Event::Text(text) | Event::Code(text) => {
                tree.append_text(top, text.to_string());
            }
            Event::SoftBreak => {
                tree.append_text(top, " ");
            }
            Event::HardBreak => {
                tree.append_text(top, "\n");
            }
            Event::Rule => {
                tree.append_element(top, "hr", &[]);
            }
            _ => {}
        }
    }
}

/// Work and chapter ids from an archive path such as
/// `/works/123/chapters/456`. A work path with no chapter segment is a
/// single-chapter work.
pub fn parse_work_path(path: &str) -> Option<(String, ChapterInfo)> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment != "works" {
            continue;
        }
        let work_id = segments.next().filter(|id| is_numeric(id))?;
        let chapter = match (segments.next(), segments.next()) {
            (Some("chapters"), Some(id)) if is_numeric(id) => {
                ChapterInfo::new(id, format!("Chapter {}", id))
            }
            _ => ChapterInfo::single(),
        };
        return Some((work_id.to_string(), chapter));
    }
    None
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
