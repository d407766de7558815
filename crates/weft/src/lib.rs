//! Declarative node-tree data binding for the weft framework.
//!
//! This crate keeps a retained node tree synchronized with chains of
//! reactive attributes from [`weft_core`]:
//!
//! - **Node Tree**: a [`Document`] arena of elements, text, markup, and
//!   comment nodes standing in for the DOM at the interface boundary
//! - **Binding Expressions**: a `bind="key: path, …"` mini-language with
//!   `!` (negate), `-` (one-way), and `.class` (class shorthand) operators,
//!   plus comment-delimited virtual regions
//! - **Binders**: pluggable strategies per keyword: `text`, `html`,
//!   `css`, `checked`, `value`, the generic attribute fallback, and the
//!   structural `if`/`foreach` binders that own their generated content
//! - **Lifecycle**: [`apply_bindings`] and [`remove_bindings`] are the two
//!   entry points; bindings for nodes removed behind the registry's back
//!   are reclaimed lazily on their next update
//!
//! # Example
//!
//! ```
//! use weft::prelude::*;
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
//! let model = person.create();
//!
//! let doc = Document::new();
//! let span = doc.create_element("span");
//! doc.set_attribute(span, BIND_ATTR, "text: fullName");
//! doc.append_child(doc.root(), span);
//!
//! apply_bindings(&doc, &model, doc.root()).unwrap();
//! assert_eq!(doc.text_content(span), "William Riker");
//!
//! model.set("firstName", "Will");
//! assert_eq!(doc.text_content(span), "Will Riker");
//!
//! remove_bindings(&doc, doc.root());
//! ```

pub mod bind;
pub mod dom;
mod error;
pub mod prelude;

pub use bind::{
    BIND_ATTR, BindCtx, Binder, BinderSet, BinderSetBuilder, BindingInfo, ListChange,
    apply_bindings, apply_bindings_with, remove_bindings,
};
pub use dom::{Document, InputEvent, InputListenerId, NodeId, NodeKind, Region, WeakDocument};
pub use error::{BindError, Result};

// Re-export the substrate so downstream users need only one dependency.
pub use weft_core as core;
