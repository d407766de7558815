//! The retained document tree.
//!
//! [`Document`] is an arena of nodes standing in for the DOM at the binding
//! engine's interface boundary: elements with attributes and classes, text,
//! raw markup, and comment nodes (which double as virtual-region markers).
//! Nodes are identified by stable [`NodeId`] keys; a node is *attached* when
//! it is reachable from the document root.
//!
//! Binding metadata lives in a side table keyed by `NodeId` (see
//! `crate::bind`), never injected into the nodes themselves, and per-node
//! input listeners let two-way binders observe synthetic user edits
//! dispatched through [`Document::dispatch_input`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use slotmap::{SlotMap, new_key_type};

use crate::bind::meta::NodeBindings;

new_key_type! {
    /// A stable identifier for a node in a [`Document`].
    ///
    /// Ids remain valid until the node is removed from the arena; a removed
    /// node's id never aliases a later node.
    pub struct NodeId;
}

/// The shape of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// An element with a tag name.
    Element(String),
    /// A text node.
    Text(String),
    /// Raw markup content, kept opaque.
    Markup(String),
    /// A comment; also used as virtual-region markers.
    Comment(String),
}

struct NodeData {
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            classes: BTreeSet::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A synthetic user edit dispatched at an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// The element's text value was edited.
    Edited(String),
    /// The element's checked state was toggled.
    Toggled(bool),
}

/// Identifier for an attached input listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputListenerId(u64);

type InputSlot = Arc<dyn Fn(&InputEvent) + Send + Sync>;

struct InputHook {
    id: InputListenerId,
    slot: InputSlot,
}

pub(crate) struct DocInner {
    nodes: RwLock<SlotMap<NodeId, NodeData>>,
    root: NodeId,
    pub(crate) bindings: Mutex<HashMap<NodeId, NodeBindings>>,
    input: Mutex<HashMap<NodeId, Vec<InputHook>>>,
    next_input_id: AtomicU64,
}

/// A cheaply clonable handle to a document tree.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Arc<DocInner>,
}

/// Non-owning document handle for listener closures, so stored callbacks
/// never keep the document alive through itself.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocInner>,
}

impl WeakDocument {
    /// Upgrade to a strong handle if the document is still alive.
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Document {
    /// A document containing only its root node.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new(NodeKind::Document));
        Self {
            inner: Arc::new(DocInner {
                nodes: RwLock::new(nodes),
                root,
                bindings: Mutex::new(HashMap::new()),
                input: Mutex::new(HashMap::new()),
                next_input_id: AtomicU64::new(1),
            }),
        }
    }

    /// Downgrade to a non-owning handle.
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    /// Create a detached element.
    pub fn create_element(&self, tag: impl Into<String>) -> NodeId {
        self.insert_node(NodeKind::Element(tag.into()))
    }

    /// Create a detached text node.
    pub fn create_text(&self, content: impl Into<String>) -> NodeId {
        self.insert_node(NodeKind::Text(content.into()))
    }

    /// Create a detached raw-markup node.
    pub fn create_markup(&self, content: impl Into<String>) -> NodeId {
        self.insert_node(NodeKind::Markup(content.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&self, content: impl Into<String>) -> NodeId {
        self.insert_node(NodeKind::Comment(content.into()))
    }

    fn insert_node(&self, kind: NodeKind) -> NodeId {
        self.inner.nodes.write().insert(NodeData::new(kind))
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Append `child` as the last child of `parent`. The child is detached
    /// from any previous parent first. Returns `false` if either node is
    /// missing or the move would create a cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` among `parent`'s children at `index` (clamped to the
    /// child count). Returns `false` if either node is missing or the move
    /// would create a cycle.
    pub fn insert_child(&self, parent: NodeId, index: usize, child: NodeId) -> bool {
        let mut nodes = self.inner.nodes.write();
        if !nodes.contains_key(parent) || !nodes.contains_key(child) {
            return false;
        }
        // Reject attaching a node beneath itself.
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                tracing::warn!(target: "weft::dom", "rejected insert that would create a cycle");
                return false;
            }
            cursor = nodes.get(current).and_then(|d| d.parent);
        }
        detach_in(&mut nodes, child);
        if let Some(data) = nodes.get_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = nodes.get_mut(parent) {
            let index = index.min(data.children.len());
            data.children.insert(index, child);
        }
        true
    }

    /// Detach a node from its parent, keeping it (and its subtree) alive in
    /// the arena. Detached subtrees serve as templates for structural
    /// binders.
    pub fn detach(&self, node: NodeId) {
        detach_in(&mut self.inner.nodes.write(), node);
    }

    /// Detach a node and delete its entire subtree from the arena, dropping
    /// any input listeners attached within it. Binding metadata is *not*
    /// torn down here; `remove_bindings` does that, and the lazy collection
    /// path reclaims anything that slipped through.
    pub fn remove_subtree(&self, node: NodeId) {
        let ids = self.descendants(node);
        if ids.is_empty() {
            return;
        }
        {
            let mut nodes = self.inner.nodes.write();
            detach_in(&mut nodes, node);
            for id in &ids {
                nodes.remove(*id);
            }
        }
        let mut input = self.inner.input.lock();
        for id in &ids {
            input.remove(id);
        }
    }

    /// The node's children, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .read()
            .get(node)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    /// The node's parent, if attached to one.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.nodes.read().get(node).and_then(|d| d.parent)
    }

    /// Position of `child` within `parent`'s children.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.inner
            .nodes
            .read()
            .get(parent)
            .and_then(|d| d.children.iter().position(|&c| c == child))
    }

    /// Whether the node still exists in the arena.
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.nodes.read().contains_key(node)
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let nodes = self.inner.nodes.read();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.inner.root {
                return true;
            }
            cursor = match nodes.get(current) {
                Some(data) => data.parent,
                None => return false,
            };
        }
        false
    }

    /// The node and all its descendants, preorder.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.read();
        let mut result = Vec::new();
        collect_preorder(&nodes, node, &mut result);
        result
    }

    // =========================================================================
    // Node content
    // =========================================================================

    /// The node's kind.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.nodes.read().get(node).map(|d| d.kind.clone())
    }

    /// The tag name, for element nodes.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// The comment text, for comment nodes.
    pub fn comment_text(&self, node: NodeId) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Set an attribute.
    pub fn set_attribute(&self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(data) = self.inner.nodes.write().get_mut(node) {
            data.attributes.insert(name.into(), value.into());
        }
    }

    /// Read an attribute.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .nodes
            .read()
            .get(node)
            .and_then(|d| d.attributes.get(name).cloned())
    }

    /// Whether the attribute is present (regardless of value).
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner
            .nodes
            .read()
            .get(node)
            .is_some_and(|d| d.attributes.contains_key(name))
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(data) = self.inner.nodes.write().get_mut(node) {
            data.attributes.remove(name);
        }
    }

    /// Add a CSS class.
    pub fn add_class(&self, node: NodeId, class: impl Into<String>) {
        if let Some(data) = self.inner.nodes.write().get_mut(node) {
            data.classes.insert(class.into());
        }
    }

    /// Remove a CSS class.
    pub fn remove_class(&self, node: NodeId, class: &str) {
        if let Some(data) = self.inner.nodes.write().get_mut(node) {
            data.classes.remove(class);
        }
    }

    /// Whether the class is present.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.inner
            .nodes
            .read()
            .get(node)
            .is_some_and(|d| d.classes.contains(class))
    }

    /// The node's classes, sorted.
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.inner
            .nodes
            .read()
            .get(node)
            .map(|d| d.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Concatenated content of the node's text descendants (preorder).
    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.read();
        let mut ids = Vec::new();
        collect_preorder(&nodes, node, &mut ids);
        let mut out = String::new();
        for id in ids {
            if let Some(NodeData {
                kind: NodeKind::Text(text),
                ..
            }) = nodes.get(id)
            {
                out.push_str(text);
            }
        }
        out
    }

    /// Deep-copy a subtree, returning the detached copy's root. Attributes
    /// and classes are copied; binding metadata and input listeners are
    /// not.
    pub fn clone_subtree(&self, node: NodeId) -> Option<NodeId> {
        let snapshot = {
            let nodes = self.inner.nodes.read();
            snapshot_subtree(&nodes, node)?
        };
        let mut nodes = self.inner.nodes.write();
        Some(instantiate_subtree(&mut nodes, &snapshot, None))
    }

    // =========================================================================
    // Input events
    // =========================================================================

    /// Attach a listener for synthetic input events at `node`.
    pub fn add_input_listener<F>(&self, node: NodeId, listener: F) -> InputListenerId
    where
        F: Fn(&InputEvent) + Send + Sync + 'static,
    {
        let id = InputListenerId(self.inner.next_input_id.fetch_add(1, Ordering::SeqCst));
        self.inner.input.lock().entry(node).or_default().push(InputHook {
            id,
            slot: Arc::new(listener),
        });
        id
    }

    /// Remove an input listener. Returns `true` if it was attached.
    pub fn remove_input_listener(&self, node: NodeId, id: InputListenerId) -> bool {
        let mut input = self.inner.input.lock();
        if let Some(hooks) = input.get_mut(&node) {
            let before = hooks.len();
            hooks.retain(|h| h.id != id);
            if hooks.is_empty() {
                input.remove(&node);
            }
            return before > 0;
        }
        false
    }

    /// The number of input listeners attached at `node`.
    pub fn input_listener_count(&self, node: NodeId) -> usize {
        self.inner.input.lock().get(&node).map(Vec::len).unwrap_or(0)
    }

    /// Dispatch a synthetic user edit to the listeners at `node`, against a
    /// snapshot of the listener list.
    pub fn dispatch_input(&self, node: NodeId, event: &InputEvent) {
        let slots: Vec<InputSlot> = self
            .inner
            .input
            .lock()
            .get(&node)
            .map(|hooks| hooks.iter().map(|h| h.slot.clone()).collect())
            .unwrap_or_default();
        tracing::trace!(target: "weft::dom", listeners = slots.len(), ?event, "dispatching input");
        for slot in slots {
            slot(event);
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Debug dump of the subtree below `node` (the whole tree for the
    /// root), one line per node.
    pub fn dump_tree(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.read();
        let mut out = String::new();
        dump_recursive(&nodes, node, 0, &mut out);
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn detach_in(nodes: &mut SlotMap<NodeId, NodeData>, node: NodeId) {
    let Some(parent) = nodes.get(node).and_then(|d| d.parent) else {
        return;
    };
    if let Some(parent_data) = nodes.get_mut(parent) {
        parent_data.children.retain(|&c| c != node);
    }
    if let Some(data) = nodes.get_mut(node) {
        data.parent = None;
    }
}

fn collect_preorder(nodes: &SlotMap<NodeId, NodeData>, node: NodeId, out: &mut Vec<NodeId>) {
    let Some(data) = nodes.get(node) else {
        return;
    };
    out.push(node);
    for &child in &data.children {
        collect_preorder(nodes, child, out);
    }
}

struct SubtreeSnapshot {
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    children: Vec<SubtreeSnapshot>,
}

fn snapshot_subtree(nodes: &SlotMap<NodeId, NodeData>, node: NodeId) -> Option<SubtreeSnapshot> {
    let data = nodes.get(node)?;
    Some(SubtreeSnapshot {
        kind: data.kind.clone(),
        attributes: data.attributes.clone(),
        classes: data.classes.clone(),
        children: data
            .children
            .iter()
            .filter_map(|&child| snapshot_subtree(nodes, child))
            .collect(),
    })
}

fn instantiate_subtree(
    nodes: &mut SlotMap<NodeId, NodeData>,
    snapshot: &SubtreeSnapshot,
    parent: Option<NodeId>,
) -> NodeId {
    let mut data = NodeData::new(snapshot.kind.clone());
    data.attributes = snapshot.attributes.clone();
    data.classes = snapshot.classes.clone();
    data.parent = parent;
    let id = nodes.insert(data);
    for child_snapshot in &snapshot.children {
        let child = instantiate_subtree(nodes, child_snapshot, Some(id));
        if let Some(data) = nodes.get_mut(id) {
            data.children.push(child);
        }
    }
    id
}

fn dump_recursive(nodes: &SlotMap<NodeId, NodeData>, node: NodeId, depth: usize, out: &mut String) {
    let Some(data) = nodes.get(node) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let label = match &data.kind {
        NodeKind::Document => "#document".to_string(),
        NodeKind::Element(tag) => {
            let mut label = format!("<{tag}");
            for (name, value) in &data.attributes {
                let _ = write!(label, " {name}={value:?}");
            }
            if !data.classes.is_empty() {
                let classes: Vec<&str> = data.classes.iter().map(String::as_str).collect();
                let _ = write!(label, " class={:?}", classes.join(" "));
            }
            label.push('>');
            label
        }
        NodeKind::Text(text) => format!("{text:?}"),
        NodeKind::Markup(markup) => format!("markup {markup:?}"),
        NodeKind::Comment(text) => format!("<!--{text}-->"),
    };
    let _ = writeln!(out, "{indent}{label}");
    for &child in &data.children {
        dump_recursive(nodes, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_and_attachment() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        let text = doc.create_text("hi");

        assert!(!doc.is_attached(div));
        assert!(doc.append_child(doc.root(), div));
        assert!(doc.append_child(div, span));
        assert!(doc.append_child(span, text));

        assert!(doc.is_attached(text));
        assert_eq!(doc.parent(span), Some(div));
        assert_eq!(doc.children(div), vec![span]);
        assert_eq!(doc.child_index(div, span), Some(0));
    }

    #[test]
    fn test_insert_child_orders_siblings() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        doc.append_child(doc.root(), ul);

        let a = doc.create_element("li");
        let c = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(ul, a);
        doc.append_child(ul, c);
        doc.insert_child(ul, 1, b);

        assert_eq!(doc.children(ul), vec![a, b, c]);
    }

    #[test]
    fn test_cycle_rejected() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, inner);

        assert!(!doc.append_child(inner, outer));
        assert_eq!(doc.parent(outer), Some(doc.root()));
    }

    #[test]
    fn test_detach_keeps_subtree_alive() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let text = doc.create_text("kept");
        doc.append_child(doc.root(), div);
        doc.append_child(div, text);

        doc.detach(div);
        assert!(!doc.is_attached(div));
        assert!(doc.contains(div));
        assert_eq!(doc.text_content(div), "kept");
    }

    #[test]
    fn test_remove_subtree_deletes_nodes_and_hooks() {
        let doc = Document::new();
        let div = doc.create_element("div");
        let input = doc.create_element("input");
        doc.append_child(doc.root(), div);
        doc.append_child(div, input);
        doc.add_input_listener(input, |_| {});

        doc.remove_subtree(div);
        assert!(!doc.contains(div));
        assert!(!doc.contains(input));
        assert_eq!(doc.input_listener_count(input), 0);
    }

    #[test]
    fn test_attributes_and_classes() {
        let doc = Document::new();
        let el = doc.create_element("a");

        doc.set_attribute(el, "href", "#top");
        assert_eq!(doc.attribute(el, "href").unwrap(), "#top");
        assert!(doc.has_attribute(el, "href"));

        doc.remove_attribute(el, "href");
        assert!(!doc.has_attribute(el, "href"));

        doc.add_class(el, "active");
        assert!(doc.has_class(el, "active"));
        doc.remove_class(el, "active");
        assert!(!doc.has_class(el, "active"));
    }

    #[test]
    fn test_text_content_concatenates() {
        let doc = Document::new();
        let p = doc.create_element("p");
        let b = doc.create_element("b");
        doc.append_child(doc.root(), p);
        doc.append_child(p, doc.create_text("Hello "));
        doc.append_child(p, b);
        doc.append_child(b, doc.create_text("World"));

        assert_eq!(doc.text_content(p), "Hello World");
    }

    #[test]
    fn test_clone_subtree_copies_content_not_listeners() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "bind", "text: name");
        doc.add_class(div, "row");
        doc.append_child(div, doc.create_text("body"));
        doc.add_input_listener(div, |_| {});

        let copy = doc.clone_subtree(div).unwrap();
        assert_ne!(copy, div);
        assert!(doc.parent(copy).is_none());
        assert_eq!(doc.attribute(copy, "bind").unwrap(), "text: name");
        assert!(doc.has_class(copy, "row"));
        assert_eq!(doc.text_content(copy), "body");
        assert_eq!(doc.input_listener_count(copy), 0);
    }

    #[test]
    fn test_input_dispatch_and_removal() {
        let doc = Document::new();
        let input = doc.create_element("input");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        let id = doc.add_input_listener(input, move |ev| {
            recv.lock().push(ev.clone());
        });

        doc.dispatch_input(input, &InputEvent::Edited("abc".into()));
        assert_eq!(seen.lock().len(), 1);

        assert!(doc.remove_input_listener(input, id));
        doc.dispatch_input(input, &InputEvent::Toggled(true));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_dump_tree_mentions_structure() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "id", "main");
        doc.append_child(doc.root(), div);
        doc.append_child(div, doc.create_text("hi"));

        let dump = doc.dump_tree(doc.root());
        assert!(dump.contains("#document"));
        assert!(dump.contains("<div"));
        assert!(dump.contains("\"hi\""));
    }
}
