//! The variant value type carried by entity attributes and bindings.
//!
//! Attribute stores are dynamically shaped: a single attribute may hold a
//! primitive, a nested [`Entity`], or an [`ObservableList`]. [`Value`] is the
//! closed set of shapes the binding engine understands.
//!
//! Two rules defined here are load-bearing for the rest of the system:
//!
//! - **Identity** ([`Value::identical`]): primitives compare by value (`NaN`
//!   is never identical to anything, including itself), entities and lists
//!   compare by handle identity. `Entity::set` treats an identical write as
//!   a no-op, and chain rewiring relies on replacement being observable:
//!   two structurally equal entities are still *different* values.
//! - **Truthiness** ([`Value::is_truthy`]): `Null`, `false`, `0`, `0.0`,
//!   `NaN`, and `""` are false; everything else (including entities and
//!   lists) is true. Presence-style and conditional binders share this rule.

use std::fmt;

use crate::collection::ObservableList;
use crate::entity::Entity;

/// A dynamically typed attribute value.
#[derive(Clone)]
pub enum Value {
    /// The explicit "no value" value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    Str(String),
    /// A nested entity; attribute paths descend through these.
    Entity(Entity),
    /// An ordered observable collection.
    List(ObservableList),
}

impl Value {
    /// Strict identity test.
    ///
    /// Primitives compare by value; `Entity` and `List` compare by handle
    /// identity (`Arc::ptr_eq`). Values of different shapes are never
    /// identical, and `Float(NaN)` is identical to nothing.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => Entity::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => ObservableList::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The shared falsy-coercion rule used by presence-style and
    /// conditional binders.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => !n.is_nan() && *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Entity(_) | Value::List(_) => true,
        }
    }

    /// Returns the nested entity, if this value is one.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the list, if this value is one.
    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the string slice, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value for display in a text node or attribute.
    ///
    /// `Null` renders as the empty string; entities and lists render as
    /// opaque markers since they have no textual form.
    pub fn display_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Entity(_) => f.write_str("[entity]"),
            Value::List(_) => f.write_str("[list]"),
        }
    }
}

// Entity/list handles are summarized, not recursed into: entities may form
// reference cycles through their values.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Entity(e) => write!(f, "Entity({})", e.type_name()),
            Value::List(l) => write!(f, "List(len={})", l.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Entity> for Value {
    fn from(v: Entity) -> Self {
        Value::Entity(v)
    }
}

impl From<ObservableList> for Value {
    fn from(v: ObservableList) -> Self {
        Value::List(v)
    }
}
