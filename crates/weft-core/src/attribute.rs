//! Attribute definitions and entity type descriptors.
//!
//! An [`AttributeDef`] declares one attribute of an entity type: its default,
//! an optional validator, optional getter/setter hooks, a read-only flag,
//! computed-attribute dependencies, and an optional poll interval. An
//! [`EntityType`] bundles named definitions and may extend a base type; the
//! chain is flattened least→most specific when an instance is constructed,
//! so later (more specific) definitions override earlier ones of the same
//! name and lookups never walk the chain.
//!
//! Base links are immutable `Arc`s fixed at build time, which makes the
//! extends relation acyclic by construction.
//!
//! # Example
//!
//! ```
//! use weft_core::{AttributeDef, EntityType, Value};
//!
//! let person = EntityType::builder("person")
//!     .attr("firstName", AttributeDef::new().with_default("John"))
//!     .attr("lastName", AttributeDef::new().with_default("Doe"))
//!     .attr(
//!         "fullName",
//!         AttributeDef::computed(["firstName", "lastName"], |e| {
//!             let first = e.get("firstName").unwrap_or(Value::Null);
//!             let last = e.get("lastName").unwrap_or(Value::Null);
//!             Value::from(format!("{first} {last}"))
//!         }),
//!     )
//!     .build();
//!
//! let p = person.create();
//! assert_eq!(p.get("fullName").unwrap().display_text(), "John Doe");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::entity::Entity;
use crate::event::Event;
use crate::value::Value;

/// Accepts or rejects a proposed attribute value.
pub type Validator = Arc<dyn Fn(&Entity, &Value) -> bool + Send + Sync>;
/// Produces an attribute's effective value; computed attributes read their
/// dependencies through the entity handle.
pub type Getter = Arc<dyn Fn(&Entity) -> Value + Send + Sync>;
/// Transforms an accepted value before it is committed.
pub type Setter = Arc<dyn Fn(&Entity, Value) -> Value + Send + Sync>;
/// Invoked after an attribute's change pipeline commits.
pub type ChangedCallback = Arc<dyn Fn(&Entity, &Event) + Send + Sync>;
/// Fallback resolver for attributes with no definition or stored value.
pub type MissingResolver = Arc<dyn Fn(&Entity, &str) -> Option<Value> + Send + Sync>;

/// Declaration of a single attribute.
#[derive(Clone, Default)]
pub struct AttributeDef {
    pub(crate) default: Option<Value>,
    pub(crate) validator: Option<Validator>,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) read_only: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) poll_interval: Option<Duration>,
    pub(crate) on_changed: Option<ChangedCallback>,
}

impl AttributeDef {
    /// A plain writable attribute with no default.
    pub fn new() -> Self {
        Self::default()
    }

    /// A computed attribute: `getter` produces the effective value, and a
    /// change of any dependency re-runs the change pipeline for this name.
    pub fn computed<I, S, F>(depends_on: I, getter: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Entity) -> Value + Send + Sync + 'static,
    {
        Self {
            getter: Some(Arc::new(getter)),
            read_only: true,
            depends_on: depends_on.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the default value returned before any write.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the validator. A rejected write leaves the stored value
    /// untouched and fires the `invalid` event.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Entity, &Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets a custom getter for the effective value.
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Entity) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Sets a transform applied to accepted values before commit.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Entity, Value) -> Value + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Marks the attribute read-only; only a forced write commits.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Additionally recomputes this attribute on a poll timer (see
    /// [`crate::poll`]). Only meaningful with a getter.
    pub fn poll_every(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Registers a callback invoked after this attribute's change pipeline
    /// commits.
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Entity, &Event) + Send + Sync + 'static,
    {
        self.on_changed = Some(Arc::new(callback));
        self
    }

    /// Whether this attribute derives its value from dependencies.
    pub fn is_computed(&self) -> bool {
        !self.depends_on.is_empty()
    }

    /// Whether writes are rejected without `force`.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl fmt::Debug for AttributeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDef")
            .field("default", &self.default)
            .field("read_only", &self.read_only)
            .field("computed", &self.is_computed())
            .field("depends_on", &self.depends_on)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

struct TypeInner {
    name: String,
    base: Option<EntityType>,
    attrs: Vec<(String, AttributeDef)>,
    resolver: Option<MissingResolver>,
}

/// An entity type descriptor: named attribute definitions plus an optional
/// base type.
///
/// Types are cheap handles; [`create`](EntityType::create) is the instance
/// factory.
#[derive(Clone)]
pub struct EntityType {
    inner: Arc<TypeInner>,
}

impl EntityType {
    /// Start building a type.
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.into(),
            base: None,
            attrs: Vec::new(),
            resolver: None,
        }
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Create an instance with no initial values beyond the defaults.
    pub fn create(&self) -> Entity {
        self.create_with(std::iter::empty::<(String, Value)>())
    }

    /// Create an instance, seeding the given attribute values silently
    /// (no change events fire for the seeds).
    pub fn create_with<I, S, V>(&self, values: I) -> Entity
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let seeded = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Entity::from_type(self, seeded)
    }

    /// The definition map flattened least→most specific across the base
    /// chain.
    pub(crate) fn flattened(&self) -> HashMap<String, AttributeDef> {
        let mut map = match &self.inner.base {
            Some(base) => base.flattened(),
            None => HashMap::new(),
        };
        for (name, def) in &self.inner.attrs {
            map.insert(name.clone(), def.clone());
        }
        map
    }

    /// Nearest missing-attribute resolver in the base chain, most specific
    /// first.
    pub(crate) fn resolver(&self) -> Option<MissingResolver> {
        self.inner
            .resolver
            .clone()
            .or_else(|| self.inner.base.as_ref().and_then(EntityType::resolver))
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.inner.name)
            .field("attrs", &self.inner.attrs.len())
            .field("base", &self.inner.base.as_ref().map(EntityType::name))
            .finish()
    }
}

/// Builder for [`EntityType`].
pub struct EntityTypeBuilder {
    name: String,
    base: Option<EntityType>,
    attrs: Vec<(String, AttributeDef)>,
    resolver: Option<MissingResolver>,
}

impl EntityTypeBuilder {
    /// Extend a base type; its definitions apply first and may be
    /// overridden by this type's definitions of the same name.
    pub fn extends(mut self, base: &EntityType) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Declare an attribute.
    pub fn attr(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.attrs.push((name.into(), def));
        self
    }

    /// Install a fallback invoked when `get` finds neither a definition nor
    /// a stored value for a name, e.g. to lazily materialize attributes.
    pub fn resolve_missing<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Entity, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Finish the type.
    pub fn build(self) -> EntityType {
        EntityType {
            inner: Arc::new(TypeInner {
                name: self.name,
                base: self.base,
                attrs: self.attrs,
                resolver: self.resolver,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattening_overrides_base_definitions() {
        let base = EntityType::builder("base")
            .attr("kind", AttributeDef::new().with_default("base"))
            .attr("shared", AttributeDef::new().with_default(1))
            .build();
        let derived = EntityType::builder("derived")
            .extends(&base)
            .attr("kind", AttributeDef::new().with_default("derived"))
            .build();

        let flat = derived.flattened();
        assert_eq!(flat.len(), 2);
        assert_eq!(
            flat["kind"].default.as_ref().unwrap().display_text(),
            "derived"
        );
        assert_eq!(flat["shared"].default.as_ref().unwrap().display_text(), "1");
    }

    #[test]
    fn test_three_level_chain_flattens_most_specific_last() {
        let a = EntityType::builder("a")
            .attr("x", AttributeDef::new().with_default("a"))
            .build();
        let b = EntityType::builder("b")
            .extends(&a)
            .attr("x", AttributeDef::new().with_default("b"))
            .build();
        let c = EntityType::builder("c").extends(&b).build();

        assert_eq!(
            c.flattened()["x"].default.as_ref().unwrap().display_text(),
            "b"
        );
    }

    #[test]
    fn test_resolver_nearest_wins() {
        let base = EntityType::builder("base")
            .resolve_missing(|_, _| Some(Value::from("base")))
            .build();
        let derived = EntityType::builder("derived")
            .extends(&base)
            .resolve_missing(|_, _| Some(Value::from("derived")))
            .build();

        let r = derived.resolver().unwrap();
        let e = derived.create();
        assert_eq!(r(&e, "anything").unwrap().display_text(), "derived");
    }

    #[test]
    fn test_computed_def_is_read_only() {
        let def = AttributeDef::computed(["a"], |_| Value::Null);
        assert!(def.is_computed());
        assert!(def.is_read_only());
    }
}
