//! The binder strategy interface and the keyword registry.
//!
//! A [`Binder`] synchronizes one [`Region`] with one bound value (or
//! collection). Binders are created per binding from a [`BinderSet`]
//! factory keyed by the binding keyword; an unknown keyword falls back to
//! the generic attribute binder, so new attribute names need no
//! registration.
//!
//! The lifecycle per binding is `start` once, `update` on every upstream
//! change (including once at bind time to establish initial state), and
//! `stop` once on teardown. Structural binders
//! ([`is_structural`](Binder::is_structural)) own the binding of their own
//! generated content; the registry never recurses into their children.
//! Two-way binders declare [`supports_reverse`](Binder::supports_reverse)
//! and attach their write-back input listener in `start`.

use std::collections::HashMap;
use std::sync::Arc;

use weft_core::{Entity, Value};

use crate::bind::value_binders::{
    AttrBinder, CheckedBinder, CssBinder, MarkupBinder, TextBinder, ValueBinder,
};
use crate::bind::structural::{IfBinder, RepeatBinder};
use crate::dom::{Document, Region};
use crate::error::BindError;

/// Everything a binder hook may touch.
pub struct BindCtx<'a> {
    /// The document being rendered into.
    pub doc: &'a Document,
    /// The binder registry, for structural binders re-applying bindings to
    /// generated content.
    pub binders: &'a BinderSet,
    /// The entity the binding's path resolves against.
    pub entity: &'a Entity,
    /// Enclosing structural-binder scopes, outermost first; the last entry
    /// is the innermost scope. Ancestor-scope markers index this chain from
    /// the end.
    pub scopes: &'a [Entity],
    /// The binding's static description.
    pub info: &'a BindingInfo,
}

impl BindCtx<'_> {
    /// The bound element, when the region is a single element.
    pub fn element(&self) -> Option<crate::dom::NodeId> {
        self.info.region.element()
    }
}

/// Static description of one binding on one region.
#[derive(Clone, Debug)]
pub struct BindingInfo {
    /// The canonical binder keyword (`text`, `attr`, `css`, `if`, ...).
    pub keyword: String,
    /// The attribute name (generic attribute binder) or class name (class
    /// binder) this binding targets.
    pub target: Option<String>,
    /// The bound attribute path, ancestor markers stripped.
    pub path: String,
    /// `!` operator.
    pub negate: bool,
    /// `-` operator.
    pub one_way: bool,
    /// The region the binding renders into.
    pub region: Region,
}

impl BindingInfo {
    /// The metadata bucket key for this binding: one bucket exists per
    /// distinct `(binder key, path)` on an element.
    pub fn bucket_key(&self) -> (String, String) {
        let binder_key = match &self.target {
            Some(target) => format!("{}:{target}", self.keyword),
            None => self.keyword.clone(),
        };
        (binder_key, self.path.clone())
    }

    /// The effective truth test shared by presence-style and structural
    /// binders: the falsy rule, flipped by `!`.
    pub fn effective_truth(&self, value: Option<&Value>) -> bool {
        value.is_some_and(Value::is_truthy) != self.negate
    }
}

/// A lifecycle notification from a bound collection.
#[derive(Clone, Debug)]
pub enum ListChange {
    /// Items inserted at `index`.
    Added {
        /// Insertion index.
        index: usize,
        /// The inserted items.
        items: Vec<Value>,
    },
    /// Items removed from `index`.
    Removed {
        /// Removal index.
        index: usize,
        /// The removed items.
        items: Vec<Value>,
    },
    /// The item set was replaced wholesale.
    Reset,
    /// Existing items were reordered in place.
    Sorted,
}

/// A strategy synchronizing one region with one bound value.
pub trait Binder: Send + Sync {
    /// Whether this binder owns (and binds) its own generated content. The
    /// registry does not recurse into the children of a structural binding.
    fn is_structural(&self) -> bool {
        false
    }

    /// Whether this binder writes user edits back into the model. The `-`
    /// operator disables the write-back direction at bind time.
    fn supports_reverse(&self) -> bool {
        false
    }

    /// Called once when the binding is established, before the first
    /// update. Structural binders capture their template here; two-way
    /// binders attach their input listener.
    fn start(&mut self, ctx: &mut BindCtx<'_>) -> Result<(), BindError> {
        let _ = ctx;
        Ok(())
    }

    /// Called with the initial value at bind time and again on every
    /// change of the bound path's effective value.
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError>;

    /// Called when the bound collection fires a lifecycle event. Only
    /// meaningful for collection-consuming binders; the default ignores it.
    fn collection_changed(
        &mut self,
        ctx: &mut BindCtx<'_>,
        change: &ListChange,
    ) -> Result<(), BindError> {
        let _ = (ctx, change);
        Ok(())
    }

    /// Called once on teardown, to detach anything `start` attached and
    /// release binder-private resources. The bound entity may already be
    /// gone, so only the document and the binding description are provided.
    fn stop(&mut self, doc: &Document, info: &BindingInfo) {
        let _ = (doc, info);
    }
}

type BinderFactory = Arc<dyn Fn() -> Box<dyn Binder> + Send + Sync>;

struct BinderSetInner {
    factories: HashMap<String, BinderFactory>,
}

/// The keyword → binder factory registry.
///
/// Cheap to clone; [`BinderSet::default`] carries the builtin set. Custom
/// binders are added with [`with_binder`](BinderSetBuilder::with_binder).
#[derive(Clone)]
pub struct BinderSet {
    inner: Arc<BinderSetInner>,
}

impl BinderSet {
    /// Start from the builtin binders.
    pub fn builder() -> BinderSetBuilder {
        BinderSetBuilder {
            factories: builtin_factories(),
        }
    }

    /// Instantiate the binder for a keyword; unknown keywords get the
    /// generic attribute binder.
    pub fn create(&self, keyword: &str) -> Box<dyn Binder> {
        match self.inner.factories.get(keyword) {
            Some(factory) => factory(),
            None => Box::new(AttrBinder::default()),
        }
    }

    /// Whether the keyword resolves to a registered binder (vs. the
    /// attribute fallback).
    pub fn is_registered(&self, keyword: &str) -> bool {
        self.inner.factories.contains_key(keyword)
    }
}

impl Default for BinderSet {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for a [`BinderSet`].
pub struct BinderSetBuilder {
    factories: HashMap<String, BinderFactory>,
}

impl BinderSetBuilder {
    /// Register (or replace) a binder factory for a keyword.
    pub fn with_binder<F, B>(mut self, keyword: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: Binder + 'static,
    {
        self.factories
            .insert(keyword.into(), Arc::new(move || Box::new(factory())));
        self
    }

    /// Finish the set.
    pub fn build(self) -> BinderSet {
        BinderSet {
            inner: Arc::new(BinderSetInner {
                factories: self.factories,
            }),
        }
    }
}

fn builtin_factories() -> HashMap<String, BinderFactory> {
    let mut factories: HashMap<String, BinderFactory> = HashMap::new();
    factories.insert("text".into(), Arc::new(|| Box::new(TextBinder)));
    factories.insert("html".into(), Arc::new(|| Box::new(MarkupBinder)));
    factories.insert("css".into(), Arc::new(|| Box::new(CssBinder)));
    factories.insert(
        "checked".into(),
        Arc::new(|| Box::new(CheckedBinder::default())),
    );
    factories.insert(
        "value".into(),
        Arc::new(|| Box::new(ValueBinder::default())),
    );
    factories.insert("if".into(), Arc::new(|| Box::new(IfBinder::default())));
    factories.insert(
        "foreach".into(),
        Arc::new(|| Box::new(RepeatBinder::default())),
    );
    factories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keywords_registered() {
        let set = BinderSet::default();
        for keyword in ["text", "html", "css", "checked", "value", "if", "foreach"] {
            assert!(set.is_registered(keyword), "missing builtin {keyword}");
        }
        assert!(!set.is_registered("title"));
    }

    #[test]
    fn test_unknown_keyword_falls_back_to_attr() {
        let set = BinderSet::default();
        let binder = set.create("title");
        assert!(!binder.is_structural());
        assert!(!binder.supports_reverse());
    }

    #[test]
    fn test_structural_flags() {
        let set = BinderSet::default();
        assert!(set.create("if").is_structural());
        assert!(set.create("foreach").is_structural());
        assert!(!set.create("text").is_structural());
    }

    #[test]
    fn test_reverse_flags() {
        let set = BinderSet::default();
        assert!(set.create("checked").supports_reverse());
        assert!(set.create("value").supports_reverse());
        assert!(!set.create("html").supports_reverse());
    }

    #[test]
    fn test_custom_binder_registration() {
        struct NoopBinder;
        impl Binder for NoopBinder {
            fn update(
                &mut self,
                _ctx: &mut BindCtx<'_>,
                _old: Option<Value>,
                _new: Option<Value>,
            ) -> Result<(), BindError> {
                Ok(())
            }
        }

        let set = BinderSet::builder()
            .with_binder("noop", || NoopBinder)
            .build();
        assert!(set.is_registered("noop"));
    }

    #[test]
    fn test_effective_truth_negation() {
        let info = BindingInfo {
            keyword: "attr".into(),
            target: Some("disabled".into()),
            path: "busy".into(),
            negate: true,
            one_way: false,
            region: Region::Element(crate::dom::NodeId::default()),
        };
        assert!(info.effective_truth(None));
        assert!(info.effective_truth(Some(&Value::from(false))));
        assert!(!info.effective_truth(Some(&Value::from("yes"))));
    }
}
