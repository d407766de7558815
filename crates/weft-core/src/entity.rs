//! The entity: an attribute store with a cancellable event pipeline.
//!
//! Entities are the data backbone of the binding engine. Each entity owns a
//! flattened map of [`AttributeDef`]s, a values map, and a listener table
//! for named events (see [`crate::event`]). Entities nest (an attribute's
//! value may itself be an entity) and dotted paths like `friend.firstName`
//! descend through the nesting.
//!
//! # Change pipeline
//!
//! [`Entity::set`] runs the before→on→after pipeline for the attribute's
//! change event. A write is a no-op when the attribute is read-only (unless
//! forced), when a validator rejects it (the `invalid` event fires instead),
//! or when the new value is [identical](crate::Value::identical) to the
//! current one; a forced write bypasses the read-only guard but not the
//! identity check.
//!
//! # Listener isolation
//!
//! Listener panics are caught individually, logged, and rerouted to the
//! entity's `listenerError` event; one failing listener never stops its
//! siblings or the default action.
//!
//! # Example
//!
//! ```
//! use weft_core::{AttributeDef, EntityType, Value};
//!
//! let counter = EntityType::builder("counter")
//!     .attr(
//!         "count",
//!         AttributeDef::new()
//!             .with_default(0)
//!             .with_validator(|_, v| matches!(v, Value::Int(n) if *n >= 0)),
//!     )
//!     .build();
//!
//! let c = counter.create();
//! assert!(c.set("count", 3));
//! assert!(!c.set("count", -1)); // rejected by the validator
//! assert_eq!(c.get("count").unwrap().display_text(), "3");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::attribute::{AttributeDef, ChangedCallback, EntityType, MissingResolver};
use crate::event::{
    BeforeSlot, Event, INVALID_EVENT, LISTENER_ERROR_EVENT, ListenerId, ListenerTable, NotifySlot,
    Phase, Slot, change_event_name,
};
use crate::poll::{self, PollId};
use crate::value::Value;

struct EntityInner {
    type_name: String,
    defs: HashMap<String, AttributeDef>,
    resolver: Option<MissingResolver>,
    values: RwLock<HashMap<String, Value>>,
    listeners: Mutex<ListenerTable>,
    poll_ids: Mutex<Vec<PollId>>,
    destroyed: AtomicBool,
}

/// A cheaply clonable handle to one entity instance.
///
/// Identity is handle identity ([`Entity::ptr_eq`]); cloning the handle does
/// not copy the entity.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

/// Non-owning entity handle, used wherever a back-reference must not keep
/// the entity alive (binding metadata, internal dependency listeners).
#[derive(Clone)]
pub struct WeakEntity {
    inner: Weak<EntityInner>,
}

impl WeakEntity {
    /// Upgrade to a strong handle if the entity is still alive.
    pub fn upgrade(&self) -> Option<Entity> {
        self.inner.upgrade().map(|inner| Entity { inner })
    }
}

/// Options for [`Entity::set_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SetOptions {
    /// Commit without running the change pipeline.
    pub silent: bool,
    /// Bypass the read-only guard (but not the identity check).
    pub force: bool,
}

/// Result of [`Entity::dispatch`].
pub enum FireOutcome {
    /// All phases ran to completion.
    Completed,
    /// A before-phase listener cancelled the event.
    Prevented,
    /// The default action ran; the after phase is held by the gate.
    Deferred(AfterGate),
}

/// Actions supplied to [`Entity::dispatch`].
pub struct FireActions<'a> {
    /// Runs after the on phase when the event was not prevented.
    pub default: Option<Box<dyn FnOnce(&Event) + 'a>>,
    /// Runs instead of the default action when the event was prevented.
    pub prevented: Option<Box<dyn FnOnce(&Event) + 'a>>,
    /// Hold the after phase until the caller completes the returned
    /// [`AfterGate`]. Used by callers whose default action finishes
    /// asynchronously (e.g. a network round-trip).
    pub deferred: bool,
}

impl Default for FireActions<'_> {
    fn default() -> Self {
        Self {
            default: None,
            prevented: None,
            deferred: false,
        }
    }
}

/// Holds the after phase of a deferred dispatch.
///
/// The after-listener snapshot was taken at fire time; completing the gate
/// runs it against the final event.
pub struct AfterGate {
    entity: Entity,
    event: Event,
    after: Vec<NotifySlot>,
}

impl AfterGate {
    /// The event the after listeners will observe.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Run the after phase.
    pub fn complete(self) {
        tracing::trace!(
            target: "weft_core::event",
            event = %self.event.name(),
            listeners = self.after.len(),
            "completing deferred after phase"
        );
        for slot in &self.after {
            self.entity
                .invoke_notify_guarded(self.event.name(), slot, &self.event);
        }
    }
}

impl Entity {
    /// An anonymous entity with no declared attributes.
    ///
    /// Useful as a free-form value bag: undeclared attributes may still be
    /// written and observed.
    pub fn new() -> Self {
        Self::from_parts("entity".to_string(), HashMap::new(), None, HashMap::new())
    }

    pub(crate) fn from_type(ty: &EntityType, seeded: HashMap<String, Value>) -> Self {
        Self::from_parts(ty.name().to_string(), ty.flattened(), ty.resolver(), seeded)
    }

    fn from_parts(
        type_name: String,
        defs: HashMap<String, AttributeDef>,
        resolver: Option<MissingResolver>,
        seeded: HashMap<String, Value>,
    ) -> Self {
        let entity = Self {
            inner: Arc::new(EntityInner {
                type_name,
                defs,
                resolver,
                values: RwLock::new(seeded),
                listeners: Mutex::new(ListenerTable::new()),
                poll_ids: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
            }),
        };
        entity.install_computed();
        entity
    }

    /// Wires up computed attributes: seeds their caches, attaches one
    /// internal listener per dependency, and registers poll timers.
    fn install_computed(&self) {
        for (name, def) in &self.inner.defs {
            if let Some(getter) = &def.getter {
                if def.is_computed() || def.poll_interval.is_some() {
                    // Seed the cache so the first recompute can report an
                    // old value.
                    let initial = getter(self);
                    self.inner.values.write().insert(name.clone(), initial);
                }
            }
            for dep in &def.depends_on {
                let weak = self.downgrade();
                let attr = name.clone();
                // After-phase: the recompute must observe the committed
                // dependency value, and the commit is the change event's
                // default action.
                self.after(&change_event_name(dep), move |_| {
                    if let Some(entity) = weak.upgrade() {
                        entity.refresh_computed(&attr);
                    }
                });
            }
            if let Some(interval) = def.poll_interval {
                let id = poll::hub().register(self, name, interval);
                self.inner.poll_ids.lock().push(id);
            }
        }
    }

    /// Handle identity.
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Downgrade to a non-owning handle.
    pub fn downgrade(&self) -> WeakEntity {
        WeakEntity {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The name of the type this entity was created from.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Whether [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Tear down the entity: cancels poll timers, clears every listener,
    /// and drops owned values. Further gets return `None` and sets are
    /// no-ops.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(target: "weft_core::entity", ty = %self.inner.type_name, "destroying entity");
        let ids: Vec<PollId> = std::mem::take(&mut *self.inner.poll_ids.lock());
        for id in ids {
            let _ = poll::hub().cancel(id);
        }
        self.inner.listeners.lock().clear();
        self.inner.values.write().clear();
    }

    // =========================================================================
    // Attribute access
    // =========================================================================

    /// Resolve a dotted attribute path.
    ///
    /// Each non-final segment must resolve to a nested entity or the result
    /// is `None`. The final segment resolves, in order: declared getter,
    /// stored value, declared default, missing-attribute resolver.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut current = self.clone();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segment.is_empty() {
                return None;
            }
            let value = current.get_local(segment);
            if segments.peek().is_none() {
                return value;
            }
            match value {
                Some(Value::Entity(next)) => current = next,
                _ => return None,
            }
        }
        None
    }

    fn get_local(&self, name: &str) -> Option<Value> {
        if self.is_destroyed() {
            return None;
        }
        if let Some(getter) = self.inner.defs.get(name).and_then(|d| d.getter.clone()) {
            return Some(getter(self));
        }
        if let Some(stored) = self.inner.values.read().get(name) {
            return Some(stored.clone());
        }
        if let Some(default) = self.inner.defs.get(name).and_then(|d| d.default.clone()) {
            return Some(default);
        }
        if let Some(resolver) = self.inner.resolver.clone() {
            return resolver(self, name);
        }
        None
    }

    /// The stored-or-default value, without consulting getters. This is the
    /// "current value" the identity check in `set` compares against.
    fn peek(&self, name: &str) -> Option<Value> {
        if let Some(stored) = self.inner.values.read().get(name) {
            return Some(stored.clone());
        }
        self.inner.defs.get(name).and_then(|d| d.default.clone())
    }

    /// Set an attribute, running the change pipeline. See [`set_with`](Self::set_with).
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        self.set_with(name, value, SetOptions::default())
    }

    /// Set an attribute.
    ///
    /// Returns `false` without side effect when the entity is destroyed,
    /// the attribute is read-only and `force` is not set, the value is
    /// identical to the current one, a validator rejects it (the `invalid`
    /// event fires), or a before-phase listener prevents the change.
    /// Otherwise the value is committed (through the pipeline, or directly
    /// when `silent`) and `true` is returned.
    pub fn set_with(&self, name: &str, value: impl Into<Value>, options: SetOptions) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let value = value.into();
        let def = self.inner.defs.get(name);

        if def.is_some_and(|d| d.read_only) && !options.force {
            tracing::trace!(target: "weft_core::entity", attribute = name, "rejecting write to read-only attribute");
            return false;
        }

        let old = self.peek(name);
        if let Some(old) = &old {
            if old.identical(&value) {
                return false;
            }
        }

        if let Some(validator) = def.and_then(|d| d.validator.clone()) {
            if !validator(self, &value) {
                tracing::trace!(target: "weft_core::entity", attribute = name, "validator rejected value");
                self.fire(
                    Event::new(INVALID_EVENT)
                        .with("name", name)
                        .with("attempted", value),
                );
                return false;
            }
        }

        let value = match def.and_then(|d| d.setter.clone()) {
            Some(setter) => setter(self, value),
            None => value,
        };

        if options.silent {
            self.inner.values.write().insert(name.to_string(), value);
            return true;
        }

        self.commit_change(name, old, value)
    }

    /// Recompute a computed/polled attribute and, if its value changed, run
    /// its change pipeline. Invoked by dependency listeners and the poll
    /// scheduler.
    pub(crate) fn refresh_computed(&self, name: &str) {
        if self.is_destroyed() {
            return;
        }
        let Some(getter) = self.inner.defs.get(name).and_then(|d| d.getter.clone()) else {
            return;
        };
        let old = self.inner.values.read().get(name).cloned();
        let new = getter(self);
        if let Some(old_value) = &old {
            if old_value.identical(&new) {
                return;
            }
        }
        tracing::trace!(target: "weft_core::entity", attribute = name, "recomputing derived attribute");
        self.commit_change(name, old, new);
    }

    /// Run the change pipeline for `name`, committing `new` as the default
    /// action and invoking the definition's changed-callback afterwards.
    fn commit_change(&self, name: &str, old: Option<Value>, new: Value) -> bool {
        let mut event = Event::new(change_event_name(name)).with("name", name);
        if let Some(old) = old {
            event = event.with("old", old);
        }
        event = event.with("new", new.clone());

        let this = self.clone();
        let attribute = name.to_string();
        let outcome = self.dispatch(
            event,
            FireActions {
                default: Some(Box::new(move |ev: &Event| {
                    this.inner.values.write().insert(attribute.clone(), new);
                    if let Some(callback) = this
                        .inner
                        .defs
                        .get(&attribute)
                        .and_then(|d| d.on_changed.clone())
                    {
                        this.invoke_changed_guarded(&callback, ev);
                    }
                })),
                prevented: None,
                deferred: false,
            },
        );
        matches!(outcome, FireOutcome::Completed)
    }

    // =========================================================================
    // Event pipeline
    // =========================================================================

    /// Attach a before-phase listener. It observes the event mutably and
    /// may cancel it.
    pub fn before<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .attach(event, Phase::Before, Slot::Before(Arc::new(listener)))
    }

    /// Attach an on-phase listener.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .attach(event, Phase::On, Slot::Notify(Arc::new(listener)))
    }

    /// Attach an after-phase listener.
    pub fn after<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .attach(event, Phase::After, Slot::Notify(Arc::new(listener)))
    }

    /// Detach a listener from any phase. Returns `true` if it was attached.
    pub fn detach(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().detach(id)
    }

    /// Total listener count for an event across all phases.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.lock().count(event)
    }

    /// Fire an event with no default action. Returns `false` if a
    /// before-phase listener prevented it.
    pub fn fire(&self, event: Event) -> bool {
        !matches!(
            self.dispatch(event, FireActions::default()),
            FireOutcome::Prevented
        )
    }

    /// Fire an event with a default action. Returns `true` if the default
    /// action ran.
    pub fn fire_with<F>(&self, event: Event, default: F) -> bool
    where
        F: FnOnce(&Event),
    {
        matches!(
            self.dispatch(
                event,
                FireActions {
                    default: Some(Box::new(default)),
                    prevented: None,
                    deferred: false,
                },
            ),
            FireOutcome::Completed
        )
    }

    /// Full dispatch: before → (prevented? | on → default → after).
    ///
    /// Snapshots of all three listener lists are taken at fire time, so
    /// attach/detach during dispatch never affects the pass in flight. With
    /// `deferred` set, the after phase is returned as an [`AfterGate`] for
    /// the caller to complete once its asynchronous default work finishes.
    pub fn dispatch(&self, mut event: Event, actions: FireActions<'_>) -> FireOutcome {
        let name = event.name().to_string();
        let (before, on, after) = {
            let table = self.inner.listeners.lock();
            (
                table.snapshot_before(&name),
                table.snapshot_notify(&name, Phase::On),
                table.snapshot_notify(&name, Phase::After),
            )
        };
        tracing::trace!(
            target: "weft_core::event",
            event = %name,
            before = before.len(),
            on = on.len(),
            after = after.len(),
            "dispatching"
        );

        for slot in &before {
            self.invoke_before_guarded(&name, slot, &mut event);
        }
        if event.is_prevented() {
            if let Some(prevented) = actions.prevented {
                prevented(&event);
            }
            return FireOutcome::Prevented;
        }
        for slot in &on {
            self.invoke_notify_guarded(&name, slot, &event);
        }
        if let Some(default) = actions.default {
            default(&event);
        }
        if actions.deferred {
            return FireOutcome::Deferred(AfterGate {
                entity: self.clone(),
                event,
                after,
            });
        }
        for slot in &after {
            self.invoke_notify_guarded(&name, slot, &event);
        }
        FireOutcome::Completed
    }

    // =========================================================================
    // Listener isolation
    // =========================================================================

    fn invoke_before_guarded(&self, event_name: &str, slot: &BeforeSlot, event: &mut Event) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| slot(event))) {
            self.report_listener_panic(event_name, payload);
        }
    }

    fn invoke_notify_guarded(&self, event_name: &str, slot: &NotifySlot, event: &Event) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| slot(event))) {
            self.report_listener_panic(event_name, payload);
        }
    }

    fn invoke_changed_guarded(&self, callback: &ChangedCallback, event: &Event) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(self, event))) {
            self.report_listener_panic(event.name(), payload);
        }
    }

    fn report_listener_panic(&self, event_name: &str, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload.as_ref());
        tracing::error!(
            target: "weft_core::event",
            event = %event_name,
            %message,
            "listener panicked; rerouting to the error event"
        );
        // Panics inside error listeners are only logged, never rerouted.
        if event_name != LISTENER_ERROR_EVENT {
            self.fire(
                Event::new(LISTENER_ERROR_EVENT)
                    .with("event", event_name)
                    .with("message", message),
            );
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.inner.type_name)
            .field("attrs", &self.inner.defs.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeDef, EntityType};
    use crate::event::change_event_name;

    fn person_type() -> EntityType {
        EntityType::builder("person")
            .attr("firstName", AttributeDef::new().with_default("William"))
            .attr("lastName", AttributeDef::new().with_default("Riker"))
            .attr(
                "fullName",
                AttributeDef::computed(["firstName", "lastName"], |e| {
                    let first = e.get("firstName").unwrap_or(Value::Null);
                    let last = e.get("lastName").unwrap_or(Value::Null);
                    Value::from(format!("{first} {last}"))
                }),
            )
            .build()
    }

    #[test]
    fn test_get_falls_back_to_default() {
        let p = person_type().create();
        assert_eq!(p.get("firstName").unwrap().display_text(), "William");
        assert!(p.get("unknown").is_none());
    }

    #[test]
    fn test_set_fires_change_with_old_and_new() {
        let p = person_type().create();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        p.on(&change_event_name("firstName"), move |ev| {
            recv.lock().push((
                ev.get("old").unwrap().display_text(),
                ev.get("new").unwrap().display_text(),
            ));
        });

        assert!(p.set("firstName", "Will"));
        assert_eq!(*seen.lock(), vec![("William".into(), "Will".into())]);
    }

    #[test]
    fn test_identical_set_is_a_noop() {
        let p = person_type().create();
        let count = Arc::new(Mutex::new(0));

        let recv = count.clone();
        p.on(&change_event_name("firstName"), move |_| *recv.lock() += 1);

        assert!(!p.set("firstName", "William")); // identical to the default
        assert!(p.set("firstName", "Will"));
        assert!(!p.set("firstName", "Will"));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_validator_rejection_fires_invalid_not_change() {
        let ty = EntityType::builder("guarded")
            .attr(
                "age",
                AttributeDef::new()
                    .with_default(30)
                    .with_validator(|_, v| matches!(v, Value::Int(n) if *n >= 0)),
            )
            .build();
        let e = ty.create();

        let invalid = Arc::new(Mutex::new(Vec::new()));
        let changes = Arc::new(Mutex::new(0));

        let recv = invalid.clone();
        e.on(INVALID_EVENT, move |ev| {
            recv.lock()
                .push(ev.get("attempted").unwrap().display_text());
        });
        let recv = changes.clone();
        e.on(&change_event_name("age"), move |_| *recv.lock() += 1);

        assert!(!e.set("age", -5));
        assert_eq!(e.get("age").unwrap().display_text(), "30");
        assert_eq!(*invalid.lock(), vec!["-5".to_string()]);
        assert_eq!(*changes.lock(), 0);
    }

    #[test]
    fn test_read_only_requires_force() {
        let ty = EntityType::builder("fixed")
            .attr("id", AttributeDef::new().with_default(1).read_only())
            .build();
        let e = ty.create();

        assert!(!e.set("id", 2));
        assert_eq!(e.get("id").unwrap().display_text(), "1");

        assert!(e.set_with(
            "id",
            2,
            SetOptions {
                force: true,
                ..Default::default()
            }
        ));
        assert_eq!(e.get("id").unwrap().display_text(), "2");

        // A forced write still honors the identity check.
        assert!(!e.set_with(
            "id",
            2,
            SetOptions {
                force: true,
                ..Default::default()
            }
        ));
    }

    #[test]
    fn test_silent_set_skips_pipeline() {
        let p = person_type().create();
        let count = Arc::new(Mutex::new(0));

        let recv = count.clone();
        p.on(&change_event_name("firstName"), move |_| *recv.lock() += 1);

        assert!(p.set_with(
            "firstName",
            "Tom",
            SetOptions {
                silent: true,
                ..Default::default()
            }
        ));
        assert_eq!(*count.lock(), 0);
        assert_eq!(p.get("firstName").unwrap().display_text(), "Tom");
    }

    #[test]
    fn test_computed_fires_on_dependency_change() {
        let p = person_type().create();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        p.on(&change_event_name("fullName"), move |ev| {
            recv.lock().push((
                ev.get("old").unwrap().display_text(),
                ev.get("new").unwrap().display_text(),
            ));
        });

        assert_eq!(p.get("fullName").unwrap().display_text(), "William Riker");
        p.set("firstName", "Will");

        assert_eq!(
            *seen.lock(),
            vec![("William Riker".into(), "Will Riker".into())]
        );
        assert_eq!(p.get("fullName").unwrap().display_text(), "Will Riker");
    }

    #[test]
    fn test_before_listener_can_prevent_change() {
        let p = person_type().create();
        p.before(&change_event_name("firstName"), |ev| {
            ev.prevent_default();
        });

        assert!(!p.set("firstName", "Q"));
        assert_eq!(p.get("firstName").unwrap().display_text(), "William");
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let p = person_type().create();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let ran = Arc::new(Mutex::new(false));

        let recv = errors.clone();
        p.on(LISTENER_ERROR_EVENT, move |ev| {
            recv.lock().push(ev.get("message").unwrap().display_text());
        });
        p.on(&change_event_name("firstName"), |_| panic!("bad listener"));
        let recv = ran.clone();
        p.on(&change_event_name("firstName"), move |_| {
            *recv.lock() = true
        });

        // The panic is absorbed; the sibling listener and the commit run.
        assert!(p.set("firstName", "Will"));
        assert!(*ran.lock());
        assert_eq!(p.get("firstName").unwrap().display_text(), "Will");
        assert_eq!(*errors.lock(), vec!["bad listener".to_string()]);
    }

    #[test]
    fn test_changed_callback_runs_after_commit() {
        let observed = Arc::new(Mutex::new(String::new()));
        let recv = observed.clone();
        let ty = EntityType::builder("watched")
            .attr(
                "status",
                AttributeDef::new()
                    .with_default("idle")
                    .on_changed(move |entity, _| {
                        *recv.lock() = entity.get("status").unwrap().display_text();
                    }),
            )
            .build();

        let e = ty.create();
        e.set("status", "busy");
        assert_eq!(*observed.lock(), "busy");
    }

    #[test]
    fn test_setter_transforms_value() {
        let ty = EntityType::builder("trimmed")
            .attr(
                "label",
                AttributeDef::new().with_setter(|_, v| match v {
                    Value::Str(s) => Value::from(s.trim().to_string()),
                    other => other,
                }),
            )
            .build();
        let e = ty.create();
        e.set("label", "  hi  ");
        assert_eq!(e.get("label").unwrap().display_text(), "hi");
    }

    #[test]
    fn test_missing_resolver() {
        let ty = EntityType::builder("lazy")
            .resolve_missing(|_, name| Some(Value::from(format!("made:{name}"))))
            .build();
        let e = ty.create();
        assert_eq!(e.get("anything").unwrap().display_text(), "made:anything");
    }

    #[test]
    fn test_nested_path_get() {
        let address = EntityType::builder("address")
            .attr("city", AttributeDef::new().with_default("Valdez"))
            .build();
        let p = person_type().create();
        p.set("home", Value::from(address.create()));

        assert_eq!(p.get("home.city").unwrap().display_text(), "Valdez");
        assert!(p.get("home.city.zip").is_none());
        assert!(p.get("missing.city").is_none());
    }

    #[test]
    fn test_deferred_after_phase() {
        let p = person_type().create();
        let order = Arc::new(Mutex::new(Vec::new()));

        let recv = order.clone();
        p.on("save", move |_| recv.lock().push("on"));
        let recv = order.clone();
        p.after("save", move |_| recv.lock().push("after"));

        let recv = order.clone();
        let outcome = p.dispatch(
            Event::new("save"),
            FireActions {
                default: Some(Box::new(move |_| recv.lock().push("default"))),
                prevented: None,
                deferred: true,
            },
        );

        let FireOutcome::Deferred(gate) = outcome else {
            panic!("expected deferred outcome");
        };
        assert_eq!(*order.lock(), vec!["on", "default"]);
        gate.complete();
        assert_eq!(*order.lock(), vec!["on", "default", "after"]);
    }

    #[test]
    fn test_destroy_clears_listeners() {
        let p = person_type().create();
        p.on("save", |_| {});
        assert_eq!(p.listener_count("save"), 1);

        p.destroy();
        assert!(p.is_destroyed());
        assert_eq!(p.listener_count("save"), 0);
        assert!(p.get("firstName").is_none());
        assert!(!p.set("firstName", "x"));
    }
}
