//! Named events with a cancellable before/on/after pipeline.
//!
//! Every [`Entity`](crate::Entity) carries a listener table keyed by event
//! name. Each event has three phases:
//!
//! - **before**: listeners receive `&mut Event` and may call
//!   [`Event::prevent_default`] to cancel the default action (and the on
//!   and after phases).
//! - **on**: ordinary notification, after the event is final.
//! - **after**: runs once the default action has completed; for deferred
//!   dispatch this is postponed until the caller completes the
//!   [`AfterGate`](crate::entity::AfterGate).
//!
//! Dispatch iterates snapshots of the listener lists taken at fire time, so
//! listeners attached or detached during dispatch never affect the pass in
//! flight. Attribute changes are ordinary events named by
//! [`change_event_name`] with `old`/`new`/`name` entries in the info map.

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use crate::value::Value;

new_key_type! {
    /// A unique identifier for an attached event listener.
    ///
    /// Returned by `Entity::before`/`on`/`after`; pass it to
    /// `Entity::detach` to remove the listener. The id encodes which phase
    /// it belongs to, so a single detach entry point suffices.
    pub struct ListenerId;
}

/// Event fired on the entity when a validator rejects a proposed value.
/// Info: `name`, `attempted`.
pub const INVALID_EVENT: &str = "invalid";

/// Side-channel event fired on the entity when a listener panics.
/// Info: `event`, `message`.
pub const LISTENER_ERROR_EVENT: &str = "listenerError";

/// The change event name for an attribute, e.g. `firstName` →
/// `firstNameChange`.
pub fn change_event_name(attribute: &str) -> String {
    format!("{attribute}Change")
}

/// The phase a listener is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Runs first; may cancel via [`Event::prevent_default`].
    Before,
    /// Runs once the event is final, before the default action.
    On,
    /// Runs after the default action completes.
    After,
}

impl Phase {
    fn index(self) -> usize {
        match self {
            Phase::Before => 0,
            Phase::On => 1,
            Phase::After => 2,
        }
    }
}

/// A dispatched event.
///
/// The info map carries event-specific payload values; attribute-change
/// events populate `name`, `old` (absent on first assignment), and `new`.
/// Only before-phase listeners observe the event mutably.
#[derive(Clone, Debug)]
pub struct Event {
    name: String,
    info: HashMap<String, Value>,
    prevented: bool,
}

impl Event {
    /// Create an event with an empty info map.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: HashMap::new(),
            prevented: false,
        }
    }

    /// Builder-style info entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an info entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.info.get(key)
    }

    /// Insert or replace an info entry. Only meaningful from before-phase
    /// listeners; later phases see the event immutably.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.info.insert(key.into(), value.into());
    }

    /// Cancel the default action and the remaining phases.
    ///
    /// Only honored during the before phase; once dispatch proceeds past
    /// it, the event is final for this firing.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    /// Whether a before-phase listener cancelled this event.
    pub fn is_prevented(&self) -> bool {
        self.prevented
    }
}

/// A before-phase slot: may mutate the event.
pub type BeforeSlot = Arc<dyn Fn(&mut Event) + Send + Sync>;
/// An on/after-phase slot: observes the final event.
pub type NotifySlot = Arc<dyn Fn(&Event) + Send + Sync>;

pub(crate) enum Slot {
    Before(BeforeSlot),
    Notify(NotifySlot),
}

struct ListenerEntry {
    event: String,
    phase: Phase,
    slot: Slot,
}

/// Per-entity listener storage: event name → ordered id lists per phase,
/// with the slots themselves in a slotmap for O(1) detach by id.
#[derive(Default)]
pub(crate) struct ListenerTable {
    slots: SlotMap<ListenerId, ListenerEntry>,
    index: HashMap<String, [Vec<ListenerId>; 3]>,
}

impl ListenerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&mut self, event: &str, phase: Phase, slot: Slot) -> ListenerId {
        let id = self.slots.insert(ListenerEntry {
            event: event.to_string(),
            phase,
            slot,
        });
        self.index.entry(event.to_string()).or_default()[phase.index()].push(id);
        id
    }

    pub(crate) fn detach(&mut self, id: ListenerId) -> bool {
        let Some(entry) = self.slots.remove(id) else {
            return false;
        };
        if let Some(lists) = self.index.get_mut(&entry.event) {
            lists[entry.phase.index()].retain(|&other| other != id);
        }
        true
    }

    /// Clone the slots attached to one phase, in attachment order.
    pub(crate) fn snapshot_before(&self, event: &str) -> Vec<BeforeSlot> {
        self.ids(event, Phase::Before)
            .iter()
            .filter_map(|id| match &self.slots.get(*id)?.slot {
                Slot::Before(slot) => Some(slot.clone()),
                Slot::Notify(_) => None,
            })
            .collect()
    }

    /// Clone the on- or after-phase slots, in attachment order.
    pub(crate) fn snapshot_notify(&self, event: &str, phase: Phase) -> Vec<NotifySlot> {
        self.ids(event, phase)
            .iter()
            .filter_map(|id| match &self.slots.get(*id)?.slot {
                Slot::Notify(slot) => Some(slot.clone()),
                Slot::Before(_) => None,
            })
            .collect()
    }

    fn ids(&self, event: &str, phase: Phase) -> &[ListenerId] {
        self.index
            .get(event)
            .map(|lists| lists[phase.index()].as_slice())
            .unwrap_or(&[])
    }

    /// Total listener count for an event across all phases.
    pub(crate) fn count(&self, event: &str) -> usize {
        self.index
            .get(event)
            .map(|lists| lists.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_name() {
        assert_eq!(change_event_name("firstName"), "firstNameChange");
    }

    #[test]
    fn test_event_info() {
        let mut ev = Event::new("save").with("count", 3);
        assert_eq!(ev.name(), "save");
        assert!(matches!(ev.get("count"), Some(Value::Int(3))));
        assert!(ev.get("missing").is_none());

        ev.set("count", 4);
        assert!(matches!(ev.get("count"), Some(Value::Int(4))));
    }

    #[test]
    fn test_prevent_default() {
        let mut ev = Event::new("save");
        assert!(!ev.is_prevented());
        ev.prevent_default();
        assert!(ev.is_prevented());
    }

    #[test]
    fn test_table_attach_detach() {
        let mut table = ListenerTable::new();
        let id = table.attach("save", Phase::On, Slot::Notify(Arc::new(|_| {})));

        assert_eq!(table.count("save"), 1);
        assert_eq!(table.snapshot_notify("save", Phase::On).len(), 1);
        assert_eq!(table.snapshot_notify("save", Phase::After).len(), 0);

        assert!(table.detach(id));
        assert!(!table.detach(id));
        assert_eq!(table.count("save"), 0);
    }

    #[test]
    fn test_snapshots_preserve_attachment_order() {
        let mut table = ListenerTable::new();
        table.attach("tick", Phase::On, Slot::Notify(Arc::new(|_| {})));
        table.attach("tick", Phase::Before, Slot::Before(Arc::new(|_| {})));
        table.attach("tick", Phase::On, Slot::Notify(Arc::new(|_| {})));

        assert_eq!(table.snapshot_notify("tick", Phase::On).len(), 2);
        assert_eq!(table.snapshot_before("tick").len(), 1);
        assert_eq!(table.count("tick"), 3);
    }
}
