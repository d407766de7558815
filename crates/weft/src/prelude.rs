//! Convenience re-exports for typical binding work.

pub use crate::bind::{
    BIND_ATTR, Binder, BinderSet, apply_bindings, apply_bindings_with, remove_bindings,
};
pub use crate::dom::{Document, InputEvent, NodeId, NodeKind, Region};
pub use crate::error::BindError;

pub use weft_core::{
    AttributeDef, Entity, EntityType, Event, ObservableList, SetOptions, Signal, Value, bind_chain,
};
