//! Structural binders: conditional (`if`) and repeating (`foreach`).
//!
//! Structural binders own their generated content. At `start` they lift the
//! region's current children out of the tree as a template; afterwards they
//! instantiate clones of that template and drive the registry over the
//! inserted content themselves; the registry never recurses into a
//! structural binding's children. Tearing content down always removes its
//! bindings first, so no orphaned binding survives a toggle or a collection
//! mutation.
//!
//! The repeating binder keeps one fragment per collection item and
//! subscribes to the collection's four lifecycle signals; the connection
//! handles are binder-private state in the metadata bucket.

use weft_core::{ConnectionId, ListDelta, ObservableList, Value};

use crate::bind::binder::{BindCtx, Binder, BindingInfo, ListChange};
use crate::bind::registry;
use crate::dom::{Document, NodeId};
use crate::error::BindError;

/// Conditional renderer: truthy renders the captured template, falsy clears
/// it (and removes every binding established inside).
#[derive(Default)]
pub struct IfBinder {
    template: Vec<NodeId>,
    rendered: Vec<NodeId>,
    shown: bool,
}

impl Binder for IfBinder {
    fn is_structural(&self) -> bool {
        true
    }

    fn start(&mut self, ctx: &mut BindCtx<'_>) -> Result<(), BindError> {
        let content = ctx.info.region.content(ctx.doc);
        for node in &content {
            ctx.doc.detach(*node);
        }
        self.template = content;
        Ok(())
    }

    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let want = ctx.info.effective_truth(new.as_ref());
        if want && !self.shown {
            let mut clones = Vec::with_capacity(self.template.len());
            for (index, template) in self.template.iter().enumerate() {
                if let Some(clone) = ctx.doc.clone_subtree(*template) {
                    ctx.info.region.insert(ctx.doc, index, clone);
                    clones.push(clone);
                }
            }
            for clone in &clones {
                registry::bind_subtree(ctx.doc, ctx.binders, ctx.scopes, *clone)?;
            }
            self.rendered = clones;
            self.shown = true;
        } else if !want && self.shown {
            for node in self.rendered.drain(..) {
                registry::remove_bindings(ctx.doc, node);
                ctx.doc.remove_subtree(node);
            }
            self.shown = false;
        }
        Ok(())
    }

    fn stop(&mut self, doc: &Document, _info: &BindingInfo) {
        // Generated content's bindings must not outlive this binding; the
        // nodes themselves stay for whoever is tearing the tree down.
        for node in self.rendered.drain(..) {
            registry::remove_bindings(doc, node);
        }
        self.shown = false;
        for template in self.template.drain(..) {
            doc.remove_subtree(template);
        }
    }
}

struct Row {
    item: Value,
    nodes: Vec<NodeId>,
}

struct Hooks {
    list: ObservableList,
    added: ConnectionId,
    removed: ConnectionId,
    reset: ConnectionId,
    sorted: ConnectionId,
}

/// Repeating renderer: one template instantiation per collection item,
/// kept in sync through the collection's lifecycle signals.
#[derive(Default)]
pub struct RepeatBinder {
    template: Vec<NodeId>,
    rows: Vec<Row>,
    hooks: Option<Hooks>,
}

impl Binder for RepeatBinder {
    fn is_structural(&self) -> bool {
        true
    }

    fn start(&mut self, ctx: &mut BindCtx<'_>) -> Result<(), BindError> {
        let content = ctx.info.region.content(ctx.doc);
        for node in &content {
            ctx.doc.detach(*node);
        }
        self.template = content;
        Ok(())
    }

    /// The bound value itself changed: re-render against the new
    /// collection (or clear, when the value is not a collection).
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        self.disconnect();
        let count = self.rows.len();
        self.remove_rows(ctx.doc, 0, count);
        if let Some(Value::List(list)) = new {
            for (index, item) in list.items().into_iter().enumerate() {
                self.insert_row(ctx, index, item)?;
            }
            self.connect(ctx, &list);
        }
        Ok(())
    }

    fn collection_changed(
        &mut self,
        ctx: &mut BindCtx<'_>,
        change: &ListChange,
    ) -> Result<(), BindError> {
        match change {
            ListChange::Added { index, items } => {
                for (offset, item) in items.iter().enumerate() {
                    self.insert_row(ctx, index + offset, item.clone())?;
                }
            }
            ListChange::Removed { index, items } => {
                self.remove_rows(ctx.doc, *index, items.len());
            }
            ListChange::Reset => {
                let count = self.rows.len();
                self.remove_rows(ctx.doc, 0, count);
                let Some(list) = self.hooks.as_ref().map(|h| h.list.clone()) else {
                    return Ok(());
                };
                for (index, item) in list.items().into_iter().enumerate() {
                    self.insert_row(ctx, index, item)?;
                }
            }
            ListChange::Sorted => self.reorder(ctx),
        }
        Ok(())
    }

    fn stop(&mut self, doc: &Document, _info: &BindingInfo) {
        self.disconnect();
        for row in self.rows.drain(..) {
            for node in row.nodes {
                registry::remove_bindings(doc, node);
            }
        }
        for template in self.template.drain(..) {
            doc.remove_subtree(template);
        }
    }
}

impl RepeatBinder {
    /// Instantiate the template for `item` and bind it with the item as the
    /// innermost scope.
    fn insert_row(
        &mut self,
        ctx: &mut BindCtx<'_>,
        row_index: usize,
        item: Value,
    ) -> Result<(), BindError> {
        let row_index = row_index.min(self.rows.len());
        let node_offset: usize = self.rows[..row_index].iter().map(|r| r.nodes.len()).sum();

        let mut nodes = Vec::with_capacity(self.template.len());
        for (offset, template) in self.template.iter().enumerate() {
            if let Some(clone) = ctx.doc.clone_subtree(*template) {
                ctx.info.region.insert(ctx.doc, node_offset + offset, clone);
                nodes.push(clone);
            }
        }

        match &item {
            Value::Entity(entity) => {
                let mut scopes = ctx.scopes.to_vec();
                scopes.push(entity.clone());
                for node in &nodes {
                    registry::bind_subtree(ctx.doc, ctx.binders, &scopes, *node)?;
                }
            }
            _ => {
                tracing::warn!(
                    target: "weft::bind",
                    "repeat item is not an entity; rendering its template without bindings"
                );
            }
        }

        self.rows.insert(row_index, Row { item, nodes });
        Ok(())
    }

    /// Unbind and remove `count` fragments starting at `index`.
    fn remove_rows(&mut self, doc: &Document, index: usize, count: usize) {
        let end = (index + count).min(self.rows.len());
        if index >= end {
            return;
        }
        for row in self.rows.drain(index..end) {
            for node in row.nodes {
                registry::remove_bindings(doc, node);
                doc.remove_subtree(node);
            }
        }
    }

    /// Reorder existing fragments to match the collection's new item order,
    /// matching by item identity, without re-instantiation.
    fn reorder(&mut self, ctx: &mut BindCtx<'_>) {
        let Some(order) = self.hooks.as_ref().map(|h| h.list.items()) else {
            return;
        };
        for row in &self.rows {
            for node in &row.nodes {
                ctx.doc.detach(*node);
            }
        }
        let mut remaining: Vec<Row> = std::mem::take(&mut self.rows);
        let mut reordered = Vec::with_capacity(order.len());
        let mut offset = 0usize;
        for item in &order {
            let Some(position) = remaining.iter().position(|r| r.item.identical(item)) else {
                continue;
            };
            let row = remaining.remove(position);
            for node in &row.nodes {
                ctx.info.region.insert(ctx.doc, offset, *node);
                offset += 1;
            }
            reordered.push(row);
        }
        // Fragments whose items are gone entirely; a pure sort never takes
        // this path.
        for row in remaining {
            for node in row.nodes {
                registry::remove_bindings(ctx.doc, node);
                ctx.doc.remove_subtree(node);
            }
        }
        self.rows = reordered;
    }

    /// Subscribe the four collection lifecycle signals, routing each back
    /// through the registry so re-entrant metadata access stays safe.
    fn connect(&mut self, ctx: &BindCtx<'_>, list: &ObservableList) {
        let owner = ctx.info.region.owner();
        let key = ctx.info.bucket_key();
        let signals = list.signals();

        let added = {
            let doc = ctx.doc.downgrade();
            let binders = ctx.binders.clone();
            let key = key.clone();
            signals.added.connect(move |delta: &ListDelta| {
                if let Some(doc) = doc.upgrade() {
                    let change = ListChange::Added {
                        index: delta.index,
                        items: delta.items.clone(),
                    };
                    registry::dispatch_collection(&doc, &binders, owner, &key, &change);
                }
            })
        };
        let removed = {
            let doc = ctx.doc.downgrade();
            let binders = ctx.binders.clone();
            let key = key.clone();
            signals.removed.connect(move |delta: &ListDelta| {
                if let Some(doc) = doc.upgrade() {
                    let change = ListChange::Removed {
                        index: delta.index,
                        items: delta.items.clone(),
                    };
                    registry::dispatch_collection(&doc, &binders, owner, &key, &change);
                }
            })
        };
        let reset = {
            let doc = ctx.doc.downgrade();
            let binders = ctx.binders.clone();
            let key = key.clone();
            signals.reset.connect(move |()| {
                if let Some(doc) = doc.upgrade() {
                    registry::dispatch_collection(&doc, &binders, owner, &key, &ListChange::Reset);
                }
            })
        };
        let sorted = {
            let doc = ctx.doc.downgrade();
            let binders = ctx.binders.clone();
            let key = key.clone();
            signals.sorted.connect(move |()| {
                if let Some(doc) = doc.upgrade() {
                    registry::dispatch_collection(&doc, &binders, owner, &key, &ListChange::Sorted);
                }
            })
        };

        self.hooks = Some(Hooks {
            list: list.clone(),
            added,
            removed,
            reset,
            sorted,
        });
    }

    fn disconnect(&mut self) {
        if let Some(hooks) = self.hooks.take() {
            let signals = hooks.list.signals();
            signals.added.disconnect(hooks.added);
            signals.removed.disconnect(hooks.removed);
            signals.reset.disconnect(hooks.reset);
            signals.sorted.disconnect(hooks.sorted);
        }
    }
}
