//! Poll scheduling for timer-driven computed attributes.
//!
//! Attributes declared with [`poll_every`](crate::AttributeDef::poll_every)
//! recompute on an interval in addition to their dependency notifications.
//! This core has no event loop of its own (application bootstrap is an
//! external concern), so the host drives the scheduler by calling
//! [`PollHub::pump`] from wherever its loop lives. Due entries recompute
//! through the ordinary change pipeline, exactly as a dependency
//! notification would.
//!
//! Timers are kept in a min-heap ordered by next fire time; pumping pops
//! everything due, reschedules it one interval out, and then recomputes
//! outside the scheduler lock.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::entity::{Entity, WeakEntity};
use crate::error::TimerError;

new_key_type! {
    /// A unique identifier for a registered poll timer.
    pub struct PollId;
}

struct PollEntry {
    target: WeakEntity,
    attribute: String,
    interval: Duration,
}

/// An entry in the scheduling queue (min-heap by fire time).
#[derive(Clone, Copy)]
struct QueueEntry {
    id: PollId,
    fire_at: Instant,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap (BinaryHeap is a max-heap).
        other.fire_at.cmp(&self.fire_at)
    }
}

#[derive(Default)]
struct HubState {
    entries: SlotMap<PollId, PollEntry>,
    queue: BinaryHeap<QueueEntry>,
}

/// The process-wide poll scheduler.
///
/// Entities register their polled attributes at construction and cancel
/// them on destroy; the host calls [`pump`](Self::pump) to fire whatever is
/// due.
pub struct PollHub {
    state: Mutex<HubState>,
}

impl PollHub {
    /// A fresh, empty scheduler. Entities register with the
    /// [global hub](hub); standalone hubs are mainly useful for tests and
    /// embedders with their own pump cadence.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState::default()),
        }
    }

    pub(crate) fn register(&self, entity: &Entity, attribute: &str, interval: Duration) -> PollId {
        let mut state = self.state.lock();
        let id = state.entries.insert(PollEntry {
            target: entity.downgrade(),
            attribute: attribute.to_string(),
            interval,
        });
        state.queue.push(QueueEntry {
            id,
            fire_at: Instant::now() + interval,
        });
        tracing::trace!(target: "weft_core::poll", ?interval, attribute, "registered poll timer");
        id
    }

    /// Cancel a timer. Stale queue records are discarded lazily at pump
    /// time.
    pub fn cancel(&self, id: PollId) -> Result<(), TimerError> {
        match self.state.lock().entries.remove(id) {
            Some(_) => Ok(()),
            None => Err(TimerError::InvalidTimerId),
        }
    }

    /// The number of live timers.
    pub fn timer_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// When the earliest live timer is due, if any. Useful for hosts that
    /// sleep between pumps.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut state = self.state.lock();
        // Drop queue records whose timers were cancelled.
        while let Some(head) = state.queue.peek() {
            if state.entries.contains_key(head.id) {
                return Some(head.fire_at);
            }
            state.queue.pop();
        }
        None
    }

    /// Recompute every attribute whose timer is due, rescheduling each one
    /// interval out. Returns the number of recomputations performed.
    pub fn pump(&self) -> usize {
        self.pump_at(Instant::now())
    }

    fn pump_at(&self, now: Instant) -> usize {
        let mut due: Vec<(Entity, String)> = Vec::new();
        {
            let mut state = self.state.lock();
            while let Some(head) = state.queue.peek() {
                if head.fire_at > now {
                    break;
                }
                let QueueEntry { id, .. } = state.queue.pop().expect("peeked entry");
                let mut retire = false;
                let job = match state.entries.get(id) {
                    Some(entry) => match entry.target.upgrade() {
                        Some(entity) => Some((entity, entry.attribute.clone(), entry.interval)),
                        None => {
                            // The entity is gone; retire the timer.
                            retire = true;
                            None
                        }
                    },
                    // Cancelled: the queue record is stale.
                    None => None,
                };
                if retire {
                    state.entries.remove(id);
                }
                if let Some((entity, attribute, interval)) = job {
                    due.push((entity, attribute));
                    state.queue.push(QueueEntry {
                        id,
                        fire_at: now + interval,
                    });
                }
            }
        }
        // Recompute outside the scheduler lock: the change pipeline may run
        // arbitrary listeners, including ones that register or cancel
        // timers.
        let count = due.len();
        if count > 0 {
            tracing::trace!(target: "weft_core::poll", count, "pumping due poll timers");
        }
        for (entity, attribute) in due {
            entity.refresh_computed(&attribute);
        }
        count
    }
}

impl Default for PollHub {
    fn default() -> Self {
        Self::new()
    }
}

static HUB: OnceLock<PollHub> = OnceLock::new();

/// The global poll scheduler.
pub fn hub() -> &'static PollHub {
    HUB.get_or_init(PollHub::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeDef, EntityType};
    use crate::event::change_event_name;
    use crate::value::Value;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// An entity whose `now` getter mirrors a shared counter. No
    /// `poll_every` here: tests register with their own hub so the global
    /// scheduler stays out of the picture.
    fn clock(ticks: Arc<Mutex<i64>>) -> Entity {
        EntityType::builder("clock")
            .attr(
                "now",
                AttributeDef::new()
                    .with_getter(move |_| Value::from(*ticks.lock()))
                    .read_only(),
            )
            .build()
            .create()
    }

    #[test]
    fn test_pump_recomputes_due_timer() {
        let hub = PollHub::new();
        let ticks = Arc::new(Mutex::new(0i64));
        let entity = clock(ticks.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recv = seen.clone();
        entity.on(&change_event_name("now"), move |ev| {
            recv.lock().push(ev.get("new").unwrap().display_text());
        });

        let start = Instant::now();
        hub.register(&entity, "now", Duration::from_millis(10));

        *ticks.lock() = 5;
        assert_eq!(hub.pump_at(start + Duration::from_millis(11)), 1);
        assert_eq!(*seen.lock(), vec!["5".to_string()]);

        // Rescheduled one interval out: not due again immediately.
        assert_eq!(hub.pump_at(start + Duration::from_millis(15)), 0);
        assert_eq!(hub.pump_at(start + Duration::from_millis(25)), 1);
    }

    #[test]
    fn test_recompute_is_noop_when_value_unchanged() {
        let hub = PollHub::new();
        let ticks = Arc::new(Mutex::new(7i64));
        let entity = clock(ticks);
        // Seed the cache so the first pump has an old value to compare.
        entity.refresh_computed("now");

        let fired = Arc::new(Mutex::new(0));
        let recv = fired.clone();
        entity.on(&change_event_name("now"), move |_| *recv.lock() += 1);

        let start = Instant::now();
        hub.register(&entity, "now", Duration::from_millis(1));
        assert_eq!(hub.pump_at(start + Duration::from_millis(2)), 1);
        // The timer fired, but the unchanged value produced no event.
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn test_cancel_retires_timer() {
        let hub = PollHub::new();
        let entity = clock(Arc::new(Mutex::new(0)));

        let id = hub.register(&entity, "now", Duration::from_secs(1));
        assert_eq!(hub.timer_count(), 1);
        assert!(hub.next_deadline().is_some());

        assert!(hub.cancel(id).is_ok());
        assert_eq!(hub.timer_count(), 0);
        assert!(hub.next_deadline().is_none());
        assert_eq!(hub.cancel(id), Err(TimerError::InvalidTimerId));
    }

    #[test]
    fn test_cancel_unknown_id_errors() {
        let hub = PollHub::new();
        assert_eq!(hub.cancel(PollId::default()), Err(TimerError::InvalidTimerId));
    }

    #[test]
    fn test_dropped_entity_retires_timer() {
        let hub = PollHub::new();
        let entity = clock(Arc::new(Mutex::new(0)));
        hub.register(&entity, "now", Duration::from_millis(1));

        drop(entity);
        let later = Instant::now() + Duration::from_millis(5);
        assert_eq!(hub.pump_at(later), 0);
        assert_eq!(hub.timer_count(), 0);
    }

    #[test]
    fn test_poll_attribute_registers_globally() {
        let ticks = Arc::new(Mutex::new(0i64));
        let moved = ticks.clone();
        let entity = EntityType::builder("polled")
            .attr(
                "now",
                AttributeDef::new()
                    .with_getter(move |_| Value::from(*moved.lock()))
                    .read_only()
                    .poll_every(Duration::from_secs(3600)),
            )
            .build()
            .create();

        // Construction registered with the global hub; destroy cancels.
        assert!(hub().next_deadline().is_some());
        entity.destroy();
    }
}
