//! Per-node binding metadata.
//!
//! The document keeps a side table from [`NodeId`] to that node's binding
//! buckets, never a property injected onto the node itself. One bucket
//! exists per distinct `(binder key, chain path)` combination on a node; a
//! bucket owns the binder instance, its chain subscription, and a weak
//! back-reference to the bound entity (a relation, never ownership; the
//! entity outlives the binding).
//!
//! The invariant the registry maintains: a bucket exists *iff* its chain
//! subscription is active. Every teardown path detaches the subscription
//! when it drops the bucket, and [`ChainSubscription`] detaching on drop
//! backstops the pairing.

use std::collections::HashMap;

use weft_core::{ChainSubscription, WeakEntity};

use crate::bind::binder::{Binder, BindingInfo};
use crate::dom::{Document, NodeId};

/// Key of one bucket: `(binder key, chain path)`.
pub(crate) type BucketKey = (String, String);

/// One active binding on one node.
pub(crate) struct BindingBucket {
    pub(crate) binder: Box<dyn Binder>,
    pub(crate) subscription: Option<ChainSubscription>,
    pub(crate) entity: WeakEntity,
    pub(crate) scopes: Vec<WeakEntity>,
    pub(crate) info: BindingInfo,
}

/// All buckets for one node.
#[derive(Default)]
pub(crate) struct NodeBindings {
    pub(crate) buckets: HashMap<BucketKey, BindingBucket>,
}

impl Document {
    /// Insert a bucket, lazily creating the node's table entry.
    pub(crate) fn put_bucket(&self, node: NodeId, key: BucketKey, bucket: BindingBucket) {
        self.inner
            .bindings
            .lock()
            .entry(node)
            .or_default()
            .buckets
            .insert(key, bucket);
    }

    /// Remove and return one bucket. Update dispatch takes the bucket out
    /// for the duration of the hook call so re-entrant binding work never
    /// observes the metadata table mid-mutation.
    pub(crate) fn take_bucket(&self, node: NodeId, key: &BucketKey) -> Option<BindingBucket> {
        let mut bindings = self.inner.bindings.lock();
        let entry = bindings.get_mut(&node)?;
        let bucket = entry.buckets.remove(key);
        if entry.buckets.is_empty() {
            bindings.remove(&node);
        }
        bucket
    }

    /// Remove and return every bucket attached to a node.
    pub(crate) fn take_node_bindings(&self, node: NodeId) -> Option<NodeBindings> {
        self.inner.bindings.lock().remove(&node)
    }

    /// The number of buckets on a node.
    pub fn binding_count(&self, node: NodeId) -> usize {
        self.inner
            .bindings
            .lock()
            .get(&node)
            .map(|b| b.buckets.len())
            .unwrap_or(0)
    }

    /// Whether any binding metadata exists anywhere in the document. Useful
    /// for leak assertions in tests and diagnostics.
    pub fn has_any_bindings(&self) -> bool {
        !self.inner.bindings.lock().is_empty()
    }
}
