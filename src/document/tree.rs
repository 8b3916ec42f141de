//! Arena document tree: the rendered host page the engine reads from
//!
//! Nodes are addressed by `NodeKey`, which is an identity, not a position:
//! two paragraphs with identical text still have distinct keys.

use std::collections::HashMap;

/// Identity of a node within one `DocumentTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String, classes: Vec<String> },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// A boundary of a selection: a text node and a character offset into it,
/// or an element and a child offset (the point before `children[offset]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    pub node: NodeKey,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeKey, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Ordered tree of elements and text, rooted at a `body` element
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<NodeData>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Element {
                    tag: "body".into(),
                    classes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeKey {
        NodeKey(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root always exists
        false
    }

    /// Append an element as the last child of `parent`
    pub fn append_element(&mut self, parent: NodeKey, tag: &str, classes: &[&str]) -> NodeKey {
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_string(),
                classes: classes.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    /// Append a text node as the last child of `parent`
    pub fn append_text(&mut self, parent: NodeKey, text: impl Into<String>) -> NodeKey {
        self.push(parent, NodeKind::Text(text.into()))
    }

    fn push(&mut self, parent: NodeKey, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(key);
        }
        key
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        key.0 < self.nodes.len()
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(key.0).map(|n| &n.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key.0).and_then(|n| n.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(key.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// True if `key` is an element with the given tag
    pub fn is_tag(&self, key: NodeKey, tag: &str) -> bool {
        matches!(self.kind(key), Some(NodeKind::Element { tag: t, .. }) if t == tag)
    }

    pub fn has_class(&self, key: NodeKey, class: &str) -> bool {
        matches!(self.kind(key), Some(NodeKind::Element { classes, .. }) if classes.iter().any(|c| c == class))
    }

    /// Iterate from `key` up to the root, starting with `key` itself
    pub fn ancestors(&self, key: NodeKey) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.contains(key).then_some(key),
        }
    }

    /// True if `node` is `ancestor` or lies beneath it
    pub fn is_inclusive_descendant(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        self.ancestors(node).any(|k| k == ancestor)
    }

    /// All nodes beneath `key` in document order, `key` first
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            for child in self.children(k).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Concatenated text of every text node beneath `key`
    pub fn text_content(&self, key: NodeKey) -> String {
        self.descendants(key)
            .into_iter()
            .filter_map(|k| match self.kind(k) {
                Some(NodeKind::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The literal text between two boundary points, in document order.
    ///
    /// Returns `None` if either point names a node outside the tree.
    pub fn text_between(&self, start: BoundaryPoint, end: BoundaryPoint) -> Option<String> {
        let spans = self.text_spans();
        let a = self.text_position(&spans, start)?;
        let b = self.text_position(&spans, end)?;
        let (from, to) = if a <= b { (a, b) } else { (b, a) };
        let full: String = self.text_content(self.root());
        Some(full.chars().skip(from).take(to - from).collect())
    }

    /// Character span `[start, end)` of each subtree in the concatenated text
    fn text_spans(&self) -> HashMap<NodeKey, (usize, usize)> {
        let mut spans = HashMap::with_capacity(self.nodes.len());
        let mut cursor = 0usize;
        self.span_walk(self.root(), &mut cursor, &mut spans);
        spans
    }

    fn span_walk(&self, key: NodeKey, cursor: &mut usize, spans: &mut HashMap<NodeKey, (usize, usize)>) {
        let start = *cursor;
        if let Some(NodeKind::Text(t)) = self.kind(key) {
            *cursor += t.chars().count();
        }
        for child in self.children(key) {
            self.span_walk(*child, cursor, spans);
        }
        spans.insert(key, (start, *cursor));
    }

    fn text_position(&self, spans: &HashMap<NodeKey, (usize, usize)>, point: BoundaryPoint) -> Option<usize> {
        let (start, end) = *spans.get(&point.node)?;
        match self.kind(point.node)? {
            NodeKind::Text(_) => Some(start + point.offset.min(end - start)),
            NodeKind::Element { .. } => match self.children(point.node).get(point.offset) {
                Some(child) => spans.get(child).map(|(s, _)| *s),
                None => Some(end),
            },
        }
    }
}

/// Iterator returned by `DocumentTree::ancestors`
pub struct Ancestors<'a> {
    tree: &'a DocumentTree,
    next: Option<NodeKey>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DocumentTree, NodeKey, NodeKey, NodeKey) {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let content = tree.append_element(root, "div", &["userstuff"]);
        let p1 = tree.append_element(content, "p", &[]);
        tree.append_text(p1, "Hello ");
        let em = tree.append_element(p1, "em", &[]);
        let t_em = tree.append_text(em, "brave");
        tree.append_text(p1, " world.");
        let p2 = tree.append_element(content, "p", &[]);
        let t2 = tree.append_text(p2, "Second line.");
        let _ = t2;
        (tree, p1, t_em, p2)
    }

    #[test]
    fn test_ancestors_start_with_self_and_end_at_root() {
        let (tree, p1, t_em, _) = sample();
        let chain: Vec<NodeKey> = tree.ancestors(t_em).collect();
        assert_eq!(chain.first(), Some(&t_em));
        assert!(chain.contains(&p1));
        assert_eq!(chain.last(), Some(&tree.root()));
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let (tree, p1, _, p2) = sample();
        assert_eq!(tree.text_content(p1), "Hello brave world.");
        assert_eq!(tree.text_content(p2), "Second line.");
    }

    #[test]
    fn test_text_between_text_points() {
        let (tree, _, t_em, _) = sample();
        let text = tree
            .text_between(BoundaryPoint::new(t_em, 1), BoundaryPoint::new(t_em, 4))
            .unwrap();
        assert_eq!(text, "rav");
    }

    #[test]
    fn test_text_between_element_points_spans_paragraphs() {
        let (tree, p1, _, p2) = sample();
        let text = tree
            .text_between(BoundaryPoint::new(p1, 0), BoundaryPoint::new(p2, 1))
            .unwrap();
        assert_eq!(text, "Hello brave world.Second line.");
    }

    #[test]
    fn test_text_between_is_order_insensitive() {
        let (tree, _, t_em, p2) = sample();
        let forward = tree
            .text_between(BoundaryPoint::new(t_em, 0), BoundaryPoint::new(p2, 0))
            .unwrap();
        let backward = tree
            .text_between(BoundaryPoint::new(p2, 0), BoundaryPoint::new(t_em, 0))
            .unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, "brave world.");
    }

    #[test]
    fn test_text_offset_is_clamped() {
        let (tree, _, t_em, _) = sample();
        let text = tree
            .text_between(BoundaryPoint::new(t_em, 2), BoundaryPoint::new(t_em, 99))
            .unwrap();
        assert_eq!(text, "ave");
    }

    #[test]
    fn test_unknown_node_yields_none() {
        let (tree, p1, _, _) = sample();
        let bogus = NodeKey(10_000);
        assert!(tree
            .text_between(BoundaryPoint::new(p1, 0), BoundaryPoint::new(bogus, 0))
            .is_none());
        assert_eq!(tree.ancestors(bogus).count(), 0);
    }
}
