//! Core systems for weft.
//!
//! This crate provides the reactive substrate of the weft data-binding
//! framework:
//!
//! - **Entities**: attribute stores with plain, validated, and computed
//!   (dependency-derived) attributes
//! - **Event Pipeline**: named events with cancellable before/on/after
//!   phases and per-listener panic isolation
//! - **Signals**: typed, non-phased notification with connection handles
//! - **Chain Binding**: subscriptions across dotted attribute paths that
//!   rewire themselves when intermediate entities are replaced
//! - **Observable Collections**: ordered lists firing the four lifecycle
//!   notifications (added/removed/reset/sorted)
//! - **Poll Scheduling**: interval-driven recomputation of derived
//!   attributes
//!
//! # Attribute Example
//!
//! ```
//! use weft_core::{AttributeDef, EntityType, Value};
//!
//! let person = EntityType::builder("person")
//!     .attr("firstName", AttributeDef::new().with_default("William"))
//!     .attr("lastName", AttributeDef::new().with_default("Riker"))
//!     .attr(
//!         "fullName",
//!         AttributeDef::computed(["firstName", "lastName"], |e| {
//!             Value::from(format!(
//!                 "{} {}",
//!                 e.get("firstName").unwrap_or(Value::Null),
//!                 e.get("lastName").unwrap_or(Value::Null),
//!             ))
//!         }),
//!     )
//!     .build();
//!
//! let p = person.create();
//! assert_eq!(p.get("fullName").unwrap().display_text(), "William Riker");
//!
//! p.set("firstName", "Will");
//! assert_eq!(p.get("fullName").unwrap().display_text(), "Will Riker");
//! ```
//!
//! # Chain Example
//!
//! ```
//! use std::sync::Arc;
//! use weft_core::{AttributeDef, EntityType, Value, chain};
//!
//! let person = EntityType::builder("person")
//!     .attr("firstName", AttributeDef::new())
//!     .attr("friend", AttributeDef::new())
//!     .build();
//!
//! let root = person.create_with([("firstName", "Jean-Luc")]);
//! let friend = person.create_with([("firstName", "William")]);
//! root.set("friend", friend.clone());
//!
//! let sub = chain::bind_chain(
//!     &root,
//!     "friend.firstName",
//!     Arc::new(|ev| {
//!         println!("friend's name is now {:?}", ev.new);
//!     }),
//! )
//! .unwrap();
//!
//! friend.set("firstName", "Will");       // leaf change
//! root.set("friend", person.create());   // hop replacement, also reported
//! sub.unbind();
//! ```

pub mod attribute;
pub mod chain;
pub mod collection;
pub mod entity;
mod error;
pub mod event;
pub mod logging;
pub mod poll;
pub mod signal;
pub mod value;

pub use attribute::{
    AttributeDef, ChangedCallback, EntityType, EntityTypeBuilder, Getter, MissingResolver, Setter,
    Validator,
};
pub use chain::{ChainEvent, ChainHandler, ChainSubscription, bind_chain};
pub use collection::{ListDelta, ListSignals, ObservableList};
pub use entity::{AfterGate, Entity, FireActions, FireOutcome, SetOptions, WeakEntity};
pub use error::{CoreError, Result, TimerError};
pub use event::{
    BeforeSlot, Event, INVALID_EVENT, LISTENER_ERROR_EVENT, ListenerId, NotifySlot, Phase,
    change_event_name,
};
pub use poll::{PollHub, PollId};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use value::Value;
