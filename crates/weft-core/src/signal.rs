//! Typed signal/slot notification.
//!
//! [`Signal<Args>`] is the non-phased notification primitive: a set of
//! connected slots invoked in order when the signal is emitted. It backs the
//! observable collection's lifecycle notifications; the string-named,
//! cancellable before/on/after pipeline lives in [`crate::event`] and
//! [`crate::entity`].
//!
//! Emission iterates a snapshot of the connection list taken at emit time,
//! so a slot connected or disconnected during dispatch never affects the
//! in-flight emission.
//!
//! # Example
//!
//! ```
//! use weft_core::Signal;
//!
//! let renamed = Signal::<String>::new();
//! let id = renamed.connect(|name| println!("renamed to {name}"));
//! renamed.emit("output.log".to_string());
//! renamed.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Returned by [`Signal::connect`]; pass it to [`Signal::disconnect`]
    /// to remove that slot.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A typed signal with multiple connected slots.
///
/// All connections are direct: slots run synchronously on the emitting
/// call stack, in connection order. This core is single-threaded and
/// cooperative, so there is no queued delivery.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    /// Whether emission is temporarily suppressed.
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot, returning an id for later disconnection.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Connect a slot that disconnects automatically when the returned
    /// guard is dropped.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard { signal: self, id }
    }

    /// Disconnect a slot by id. Returns `true` if it was connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect every slot.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// The number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Suppress or re-enable emission.
    ///
    /// While blocked, [`emit`](Self::emit) does nothing. Useful during batch
    /// updates to avoid cascading notifications.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether emission is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invoke every connected slot with `args`.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "weft_core::signal", "signal blocked, skipping emit");
            return;
        }
        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: "weft_core::signal", slot_count = slots.len(), "emitting signal");
        for slot in slots {
            slot(&args);
        }
    }
}

/// A connection that disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`]; borrows the signal, so the guard
/// cannot outlive it.
pub struct ConnectionGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<'_, Args> {
    /// The underlying connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<'_, Args> {
    fn drop(&mut self) {
        self.signal.disconnect(self.id);
    }
}
