//! Region descriptors: the uniform surface binders render into.
//!
//! A binding targets either a single element (its content being the
//! element's children) or a *virtual region*: a run of siblings scoped by
//! a start/end comment-marker pair when no single wrapping element is
//! available. [`Region`] abstracts over both so binders manipulate content
//! without caring which form they were bound to.

use super::tree::{Document, NodeId};

/// The node range one binding owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// A single element; content is its child list.
    Element(NodeId),
    /// A sibling run strictly between two marker nodes.
    Virtual {
        /// The parent of the sibling run.
        parent: NodeId,
        /// The opening marker.
        start: NodeId,
        /// The closing marker.
        end: NodeId,
    },
}

impl Region {
    /// The node that carries this region's binding metadata: the element
    /// itself, or the start marker of a virtual region.
    pub fn owner(&self) -> NodeId {
        match self {
            Region::Element(element) => *element,
            Region::Virtual { start, .. } => *start,
        }
    }

    /// The element, when the region is a single element.
    pub fn element(&self) -> Option<NodeId> {
        match self {
            Region::Element(element) => Some(*element),
            Region::Virtual { .. } => None,
        }
    }

    /// The content nodes currently inside the region, in order.
    pub fn content(&self, doc: &Document) -> Vec<NodeId> {
        match self {
            Region::Element(element) => doc.children(*element),
            Region::Virtual { parent, start, end } => {
                let children = doc.children(*parent);
                let Some(start_index) = children.iter().position(|&c| c == *start) else {
                    return Vec::new();
                };
                let Some(end_index) = children.iter().position(|&c| c == *end) else {
                    return Vec::new();
                };
                if start_index + 1 >= end_index {
                    return Vec::new();
                }
                children[start_index + 1..end_index].to_vec()
            }
        }
    }

    /// Insert `node` at content position `index`.
    pub fn insert(&self, doc: &Document, index: usize, node: NodeId) {
        match self {
            Region::Element(element) => {
                doc.insert_child(*element, index, node);
            }
            Region::Virtual { parent, start, .. } => {
                let Some(start_index) = doc.child_index(*parent, *start) else {
                    return;
                };
                doc.insert_child(*parent, start_index + 1 + index, node);
            }
        }
    }

    /// Delete every content node (and its subtree) from the document.
    pub fn clear(&self, doc: &Document) {
        for node in self.content(doc) {
            doc.remove_subtree(node);
        }
    }

    /// Replace the content with a single node.
    pub fn replace_content(&self, doc: &Document, node: NodeId) {
        self.clear(doc);
        self.insert(doc, 0, node);
    }

    /// Whether the region is still attached to the live document.
    pub fn is_attached(&self, doc: &Document) -> bool {
        doc.is_attached(self.owner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_region_content() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let a = doc.create_text("a");
        doc.append_child(doc.root(), div);
        doc.append_child(div, a);

        let region = Region::Element(div);
        assert_eq!(region.content(&doc), vec![a]);
        assert_eq!(region.owner(), div);
        assert!(region.is_attached(&doc));
    }

    #[test]
    fn test_virtual_region_content_between_markers() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);

        let before = doc.create_text("before");
        let start = doc.create_comment("bind text: x");
        let inside = doc.create_text("inside");
        let end = doc.create_comment("/bind");
        let after = doc.create_text("after");
        for node in [before, start, inside, end, after] {
            doc.append_child(parent, node);
        }

        let region = Region::Virtual { parent, start, end };
        assert_eq!(region.content(&doc), vec![inside]);
        assert_eq!(region.owner(), start);
    }

    #[test]
    fn test_virtual_region_insert_offsets_past_marker() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);

        let start = doc.create_comment("bind");
        let end = doc.create_comment("/bind");
        doc.append_child(parent, start);
        doc.append_child(parent, end);

        let region = Region::Virtual { parent, start, end };
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        region.insert(&doc, 0, a);
        region.insert(&doc, 1, b);

        assert_eq!(region.content(&doc), vec![a, b]);
        assert_eq!(doc.children(parent), vec![start, a, b, end]);
    }

    #[test]
    fn test_clear_removes_only_region_content() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);

        let keep = doc.create_text("keep");
        let start = doc.create_comment("bind");
        let drop_me = doc.create_text("drop");
        let end = doc.create_comment("/bind");
        for node in [keep, start, drop_me, end] {
            doc.append_child(parent, node);
        }

        let region = Region::Virtual { parent, start, end };
        region.clear(&doc);

        assert!(doc.contains(keep));
        assert!(!doc.contains(drop_me));
        assert_eq!(doc.children(parent), vec![keep, start, end]);
    }

    #[test]
    fn test_replace_content() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.append_child(doc.root(), div);
        doc.append_child(div, doc.create_text("old"));

        let region = Region::Element(div);
        region.replace_content(&doc, doc.create_text("new"));
        assert_eq!(doc.text_content(div), "new");
        assert_eq!(region.content(&doc).len(), 1);
    }
}
