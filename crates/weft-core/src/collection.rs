//! Ordered observable collections.
//!
//! [`ObservableList`] is the collection shape repeat binders consume: an
//! ordered list of [`Value`]s that fires one of four lifecycle signals on
//! every mutation: `added`, `removed`, `reset`, `sorted`. Consumers keep
//! the [`ConnectionId`](crate::ConnectionId)s returned by the signals and
//! disconnect them when they stop observing.
//!
//! Mutations notify *after* the items have been updated, so slots observe
//! the post-mutation state.
//!
//! # Example
//!
//! ```
//! use weft_core::{ObservableList, Value};
//!
//! let crew = ObservableList::from_items(["Picard", "Riker"]);
//! crew.signals().added.connect(|delta| {
//!     println!("{} item(s) at {}", delta.items.len(), delta.index);
//! });
//! crew.add(Value::from("Data"));
//! assert_eq!(crew.len(), 3);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::signal::Signal;
use crate::value::Value;

/// Payload of the `added` and `removed` lifecycle signals.
#[derive(Clone, Debug)]
pub struct ListDelta {
    /// Index the items were inserted at or removed from.
    pub index: usize,
    /// The affected items, in order.
    pub items: Vec<Value>,
}

/// The four lifecycle signals an ordered collection emits.
pub struct ListSignals {
    /// Items were inserted.
    pub added: Signal<ListDelta>,
    /// Items were removed.
    pub removed: Signal<ListDelta>,
    /// The entire item set was replaced.
    pub reset: Signal<()>,
    /// Existing items were reordered in place.
    pub sorted: Signal<()>,
}

impl ListSignals {
    fn new() -> Self {
        Self {
            added: Signal::new(),
            removed: Signal::new(),
            reset: Signal::new(),
            sorted: Signal::new(),
        }
    }
}

struct ListInner {
    items: RwLock<Vec<Value>>,
    signals: ListSignals,
}

/// A cheaply clonable handle to an ordered observable collection.
///
/// Like [`Entity`](crate::Entity), identity is handle identity
/// ([`ObservableList::ptr_eq`]): two lists with equal contents are still
/// different values to the binding engine.
#[derive(Clone)]
pub struct ObservableList {
    inner: Arc<ListInner>,
}

impl ObservableList {
    /// An empty list.
    pub fn new() -> Self {
        Self::from_items(Vec::<Value>::new())
    }

    /// A list seeded with items; no signal fires for the seeds.
    pub fn from_items<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            inner: Arc::new(ListInner {
                items: RwLock::new(items.into_iter().map(Into::into).collect()),
                signals: ListSignals::new(),
            }),
        }
    }

    /// Handle identity.
    pub fn ptr_eq(a: &ObservableList, b: &ObservableList) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// The lifecycle signals.
    pub fn signals(&self) -> &ListSignals {
        &self.inner.signals
    }

    /// The number of items.
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// The item at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.read().get(index).cloned()
    }

    /// A snapshot of the items, in order.
    pub fn items(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    /// Index of the first item identical to `value`.
    pub fn position_identical(&self, value: &Value) -> Option<usize> {
        self.inner
            .items
            .read()
            .iter()
            .position(|item| item.identical(value))
    }

    /// Append an item; fires `added`.
    pub fn add(&self, item: impl Into<Value>) {
        let item = item.into();
        let index = {
            let mut items = self.inner.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        tracing::trace!(target: "weft_core::collection", index, "item appended");
        self.inner.signals.added.emit(ListDelta {
            index,
            items: vec![item],
        });
    }

    /// Insert an item at `index`; fires `added`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: impl Into<Value>) {
        let item = item.into();
        self.inner.items.write().insert(index, item.clone());
        tracing::trace!(target: "weft_core::collection", index, "item inserted");
        self.inner.signals.added.emit(ListDelta {
            index,
            items: vec![item],
        });
    }

    /// Remove and return the item at `index`; fires `removed`.
    ///
    /// Out-of-range indices are a silent no-op returning `None`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut items = self.inner.items.write();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        tracing::trace!(target: "weft_core::collection", index, "item removed");
        self.inner.signals.removed.emit(ListDelta {
            index,
            items: vec![removed.clone()],
        });
        Some(removed)
    }

    /// Replace the entire item set; fires `reset`.
    pub fn reset<I, V>(&self, items: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        *self.inner.items.write() = items.into_iter().map(Into::into).collect();
        tracing::trace!(target: "weft_core::collection", len = self.len(), "list reset");
        self.inner.signals.reset.emit(());
    }

    /// Remove every item; fires `reset`.
    pub fn clear(&self) {
        self.reset(Vec::<Value>::new());
    }

    /// Sort the items in place with `compare`; fires `sorted`.
    ///
    /// The sort is stable, so consumers reordering rendered fragments by
    /// item identity observe a deterministic order for equal keys.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> std::cmp::Ordering,
    {
        self.inner.items.write().sort_by(compare);
        tracing::trace!(target: "weft_core::collection", "list sorted");
        self.inner.signals.sorted.emit(());
    }
}

impl Default for ObservableList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_add_fires_added_after_mutation() {
        let list = ObservableList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        let observed = list.clone();
        list.signals().added.connect(move |delta| {
            // Slots observe the post-mutation state.
            recv.lock().push((delta.index, observed.len()));
        });

        list.add("a");
        list.add("b");
        assert_eq!(*seen.lock(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_insert_at_index() {
        let list = ObservableList::from_items(["a", "c"]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        list.signals().added.connect(move |delta| {
            recv.lock().push(delta.index);
        });

        list.insert(1, "b");
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(list.get(1).unwrap().display_text(), "b");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_reports_removed_item() {
        let list = ObservableList::from_items(["a", "b", "c"]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        list.signals().removed.connect(move |delta| {
            recv.lock()
                .push((delta.index, delta.items[0].display_text()));
        });

        let removed = list.remove(1).unwrap();
        assert_eq!(removed.display_text(), "b");
        assert_eq!(*seen.lock(), vec![(1, "b".to_string())]);

        // Out of range is a silent no-op.
        assert!(list.remove(10).is_none());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_reset_replaces_items() {
        let list = ObservableList::from_items(["a"]);
        let count = Arc::new(Mutex::new(0));

        let recv = count.clone();
        list.signals().reset.connect(move |()| *recv.lock() += 1);

        list.reset(["x", "y"]);
        assert_eq!(*count.lock(), 1);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().display_text(), "x");
    }

    #[test]
    fn test_sort_by_fires_sorted() {
        let list = ObservableList::from_items(["c", "a", "b"]);
        let count = Arc::new(Mutex::new(0));

        let recv = count.clone();
        list.signals().sorted.connect(move |()| *recv.lock() += 1);

        list.sort_by(|a, b| a.display_text().cmp(&b.display_text()));
        assert_eq!(*count.lock(), 1);
        assert_eq!(
            list.items()
                .iter()
                .map(Value::display_text)
                .collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_position_identical_uses_handle_identity() {
        let shared = crate::entity::Entity::new();
        let list = ObservableList::from_items([
            Value::from(crate::entity::Entity::new()),
            Value::from(shared.clone()),
        ]);

        assert_eq!(list.position_identical(&Value::from(shared)), Some(1));
        assert_eq!(
            list.position_identical(&Value::from(crate::entity::Entity::new())),
            None
        );
    }
}
