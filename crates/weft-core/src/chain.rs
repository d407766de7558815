//! Dotted-path subscriptions across nested entities.
//!
//! [`bind_chain`] attaches a handler to a path like `friend.firstName` so
//! the handler fires whenever the *effective leaf value* changes, whether
//! because the leaf attribute itself changed, or because an intermediate
//! entity in the path was replaced.
//!
//! One listener is attached per hop: the hops from the root through the
//! second-to-last segment carry rewiring listeners, and the final segment
//! carries the leaf listener. When the entity at hop *i* is replaced, the
//! rewiring listener detaches everything downstream of *i*, re-attaches it
//! beneath the new occupant, and invokes the handler once with the old and
//! new effective leaf values. After any sequence of replacements the live
//! listener set is exactly what a fresh [`bind_chain`] against the current
//! chain state would produce: no duplicates, no orphans.
//!
//! Subscriptions detach on [`ChainSubscription::unbind`] or on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::entity::Entity;
use crate::error::CoreError;
use crate::event::{Event, ListenerId, change_event_name};
use crate::value::Value;

/// The payload passed to a chain handler: old/new effective leaf values.
///
/// Either side is `None` when the path did not resolve (an intermediate hop
/// was missing or not an entity).
#[derive(Clone, Debug)]
pub struct ChainEvent {
    /// The bound path.
    pub path: String,
    /// Effective leaf value before the change.
    pub old: Option<Value>,
    /// Effective leaf value after the change.
    pub new: Option<Value>,
}

/// Handler invoked when the effective leaf value of a bound path changes.
pub type ChainHandler = Arc<dyn Fn(&ChainEvent) + Send + Sync>;

struct Hop {
    entity: Entity,
    listener: ListenerId,
}

struct ChainCore {
    segments: Vec<String>,
    handler: ChainHandler,
    /// One slot per segment; `None` where the path currently stops short
    /// (an intermediate value is missing or not an entity).
    hops: Mutex<Vec<Option<Hop>>>,
    active: AtomicBool,
}

impl ChainCore {
    fn path(&self) -> String {
        self.segments.join(".")
    }
}

/// An active chain subscription.
///
/// Dropping the subscription (or calling [`unbind`](Self::unbind)) detaches
/// the listener at every hop, the exact structural inverse of
/// [`bind_chain`].
pub struct ChainSubscription {
    core: Arc<ChainCore>,
}

impl ChainSubscription {
    /// The bound path.
    pub fn path(&self) -> String {
        self.core.path()
    }

    /// Whether the subscription still holds listeners.
    pub fn is_active(&self) -> bool {
        self.core.active.load(Ordering::SeqCst)
    }

    /// Detach from every hop's current occupant.
    pub fn unbind(&self) {
        if !self.core.active.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(target: "weft_core::chain", path = %self.core.path(), "unbinding chain");
        let mut hops = self.core.hops.lock();
        for slot in hops.iter_mut() {
            if let Some(hop) = slot.take() {
                hop.entity.detach(hop.listener);
            }
        }
    }
}

impl Drop for ChainSubscription {
    fn drop(&mut self) {
        self.unbind();
    }
}

/// Subscribe `handler` to changes of the effective value at `path` below
/// `root`.
///
/// The handler is *not* invoked for the initial value; callers establish
/// initial state themselves (the binding registry does so via the binder's
/// update hook).
///
/// Returns an error for an empty path or a path with an empty segment.
pub fn bind_chain(
    root: &Entity,
    path: &str,
    handler: ChainHandler,
) -> Result<ChainSubscription, CoreError> {
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    if path.is_empty() || segments.iter().any(String::is_empty) {
        return Err(CoreError::EmptyChainPath {
            path: path.to_string(),
        });
    }
    let hop_count = segments.len();
    let core = Arc::new(ChainCore {
        segments,
        handler,
        hops: Mutex::new((0..hop_count).map(|_| None).collect()),
        active: AtomicBool::new(true),
    });
    tracing::trace!(target: "weft_core::chain", path = %core.path(), "binding chain");
    attach_from(&core, root.clone(), 0);
    Ok(ChainSubscription { core })
}

/// Attach listeners for hops `start..`, descending from `entity`.
fn attach_from(core: &Arc<ChainCore>, entity: Entity, start: usize) {
    let last = core.segments.len() - 1;
    let mut current = Some(entity);
    for i in start..core.segments.len() {
        let Some(entity) = current.take() else {
            break;
        };
        let segment = &core.segments[i];
        let event = change_event_name(segment);
        let weak = Arc::downgrade(core);
        let listener = if i == last {
            entity.on(&event, move |ev| {
                if let Some(core) = weak.upgrade() {
                    if core.active.load(Ordering::SeqCst) {
                        leaf_changed(&core, ev);
                    }
                }
            })
        } else {
            entity.on(&event, move |ev| {
                if let Some(core) = weak.upgrade() {
                    if core.active.load(Ordering::SeqCst) {
                        rewire(&core, i, ev);
                    }
                }
            })
        };
        core.hops.lock()[i] = Some(Hop {
            entity: entity.clone(),
            listener,
        });
        if i < last {
            current = match entity.get(segment) {
                Some(Value::Entity(next)) => Some(next),
                _ => None,
            };
        }
    }
}

fn leaf_changed(core: &Arc<ChainCore>, ev: &Event) {
    (core.handler)(&ChainEvent {
        path: core.path(),
        old: ev.get("old").cloned(),
        new: ev.get("new").cloned(),
    });
}

/// The entity at hop `index` changed value: re-attach everything downstream
/// beneath the new occupant, then report the new effective leaf value.
fn rewire(core: &Arc<ChainCore>, index: usize, ev: &Event) {
    tracing::trace!(
        target: "weft_core::chain",
        path = %core.path(),
        hop = index,
        "intermediate hop replaced, rewiring"
    );
    {
        let mut hops = core.hops.lock();
        for slot in hops[index + 1..].iter_mut() {
            if let Some(hop) = slot.take() {
                hop.entity.detach(hop.listener);
            }
        }
    }
    if let Some(Value::Entity(next)) = ev.get("new") {
        attach_from(core, next.clone(), index + 1);
    }

    let rest = &core.segments[index + 1..];
    (core.handler)(&ChainEvent {
        path: core.path(),
        old: descend(ev.get("old"), rest),
        new: descend(ev.get("new"), rest),
    });
}

/// Effective value of `rest` beneath `value`.
fn descend(value: Option<&Value>, rest: &[String]) -> Option<Value> {
    if rest.is_empty() {
        return value.cloned();
    }
    match value {
        Some(Value::Entity(entity)) => entity.get(&rest.join(".")),
        _ => None,
    }
}
