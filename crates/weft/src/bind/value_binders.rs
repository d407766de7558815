//! Value binders: text, markup, attribute presence, class, checked, value.
//!
//! Presence-style binders (attribute, checked, class) share the falsy
//! rule from [`Value::is_truthy`], flipped by the `!` operator. The
//! two-way binders (`checked`, `value`) attach a document input listener in
//! `start` that writes user edits back through `Entity::set`; the `-`
//! operator leaves only the model→view direction wired.

use weft_core::{Entity, Value, WeakEntity};

use crate::bind::binder::{BindCtx, Binder, BindingInfo};
use crate::dom::{Document, InputEvent, InputListenerId, NodeId};
use crate::error::BindError;

/// Renders the bound value as the region's text content.
pub struct TextBinder;

impl Binder for TextBinder {
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let text = new.map(|v| v.display_text()).unwrap_or_default();
        let node = ctx.doc.create_text(text);
        ctx.info.region.replace_content(ctx.doc, node);
        Ok(())
    }
}

/// Renders the bound value as raw markup content.
pub struct MarkupBinder;

impl Binder for MarkupBinder {
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let markup = new.map(|v| v.display_text()).unwrap_or_default();
        let node = ctx.doc.create_markup(markup);
        ctx.info.region.replace_content(ctx.doc, node);
        Ok(())
    }
}

/// The generic attribute binder, the fallback for unknown keywords.
///
/// Presence follows the shared truth test: a falsy value removes the
/// attribute entirely. Truthy values are written as their display text,
/// except `true` (and any negated presence), which writes the empty string
/// in the boolean-attribute convention.
#[derive(Default)]
pub struct AttrBinder;

impl Binder for AttrBinder {
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let Some(element) = ctx.element() else {
            tracing::warn!(target: "weft::bind", "attribute binding on a virtual region is a no-op");
            return Ok(());
        };
        let Some(name) = ctx.info.target.clone() else {
            return Ok(());
        };
        if ctx.info.effective_truth(new.as_ref()) {
            let written = match (&new, ctx.info.negate) {
                (Some(Value::Bool(true)), false) => String::new(),
                (Some(value), false) => value.display_text(),
                _ => String::new(),
            };
            ctx.doc.set_attribute(element, name, written);
        } else {
            ctx.doc.remove_attribute(element, &name);
        }
        Ok(())
    }
}

/// Toggles a CSS class (the `.class` shorthand).
pub struct CssBinder;

impl Binder for CssBinder {
    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let Some(element) = ctx.element() else {
            tracing::warn!(target: "weft::bind", "class binding on a virtual region is a no-op");
            return Ok(());
        };
        let Some(class) = ctx.info.target.clone() else {
            return Ok(());
        };
        if ctx.info.effective_truth(new.as_ref()) {
            ctx.doc.add_class(element, class);
        } else {
            ctx.doc.remove_class(element, &class);
        }
        Ok(())
    }
}

/// Two-way checked-state binder.
#[derive(Default)]
pub struct CheckedBinder {
    listener: Option<(NodeId, InputListenerId)>,
}

impl Binder for CheckedBinder {
    fn supports_reverse(&self) -> bool {
        true
    }

    fn start(&mut self, ctx: &mut BindCtx<'_>) -> Result<(), BindError> {
        if ctx.info.one_way {
            return Ok(());
        }
        let Some(element) = ctx.element() else {
            return Ok(());
        };
        let entity = ctx.entity.downgrade();
        let path = ctx.info.path.clone();
        let negate = ctx.info.negate;
        let id = ctx.doc.add_input_listener(element, move |event| {
            if let InputEvent::Toggled(checked) = event {
                if let Some(entity) = entity.upgrade() {
                    write_back(&entity, &path, Value::from(*checked != negate));
                }
            }
        });
        self.listener = Some((element, id));
        Ok(())
    }

    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let Some(element) = ctx.element() else {
            return Ok(());
        };
        if ctx.info.effective_truth(new.as_ref()) {
            ctx.doc.set_attribute(element, "checked", "");
        } else {
            ctx.doc.remove_attribute(element, "checked");
        }
        Ok(())
    }

    fn stop(&mut self, doc: &Document, _info: &BindingInfo) {
        if let Some((element, id)) = self.listener.take() {
            doc.remove_input_listener(element, id);
        }
    }
}

/// Two-way form-value binder.
#[derive(Default)]
pub struct ValueBinder {
    listener: Option<(NodeId, InputListenerId)>,
}

impl Binder for ValueBinder {
    fn supports_reverse(&self) -> bool {
        true
    }

    fn start(&mut self, ctx: &mut BindCtx<'_>) -> Result<(), BindError> {
        if ctx.info.one_way {
            return Ok(());
        }
        let Some(element) = ctx.element() else {
            return Ok(());
        };
        let entity = ctx.entity.downgrade();
        let path = ctx.info.path.clone();
        let id = ctx.doc.add_input_listener(element, move |event| {
            if let InputEvent::Edited(text) = event {
                if let Some(entity) = entity.upgrade() {
                    write_back(&entity, &path, Value::from(text.clone()));
                }
            }
        });
        self.listener = Some((element, id));
        Ok(())
    }

    fn update(
        &mut self,
        ctx: &mut BindCtx<'_>,
        _old: Option<Value>,
        new: Option<Value>,
    ) -> Result<(), BindError> {
        let Some(element) = ctx.element() else {
            return Ok(());
        };
        let text = new.map(|v| v.display_text()).unwrap_or_default();
        ctx.doc.set_attribute(element, "value", text);
        Ok(())
    }

    fn stop(&mut self, doc: &Document, _info: &BindingInfo) {
        if let Some((element, id)) = self.listener.take() {
            doc.remove_input_listener(element, id);
        }
    }
}

/// Write a user edit back into the model: resolve the owner of the path's
/// final segment, then set it. A broken path drops the edit silently; it
/// is a runtime data condition, not an authoring error.
fn write_back(entity: &Entity, path: &str, value: Value) {
    match path.rsplit_once('.') {
        None => {
            entity.set(path, value);
        }
        Some((prefix, leaf)) => match entity.get(prefix) {
            Some(Value::Entity(owner)) => {
                owner.set(leaf, value);
            }
            _ => {
                tracing::trace!(target: "weft::bind", path, "write-back dropped: path no longer resolves");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::BinderSet;
    use crate::dom::Region;
    use weft_core::{AttributeDef, EntityType};

    fn ctx_parts(path: &str) -> (Document, Entity) {
        let doc = Document::new();
        let entity = EntityType::builder("item")
            .attr(path, AttributeDef::new())
            .build()
            .create();
        (doc, entity)
    }

    fn info(keyword: &str, target: Option<&str>, path: &str, region: Region) -> BindingInfo {
        BindingInfo {
            keyword: keyword.into(),
            target: target.map(Into::into),
            path: path.into(),
            negate: false,
            one_way: false,
            region,
        }
    }

    fn run_update(
        doc: &Document,
        entity: &Entity,
        info: &BindingInfo,
        binder: &mut dyn Binder,
        new: Option<Value>,
    ) {
        let binders = BinderSet::default();
        let scopes = [entity.clone()];
        let mut ctx = BindCtx {
            doc,
            binders: &binders,
            entity,
            scopes: &scopes,
            info,
        };
        binder.update(&mut ctx, None, new).unwrap();
    }

    #[test]
    fn test_text_binder_replaces_content() {
        let (doc, entity) = ctx_parts("name");
        let el = doc.create_element("span");
        doc.append_child(doc.root(), el);
        doc.append_child(el, doc.create_text("stale"));

        let info = info("text", None, "name", Region::Element(el));
        run_update(&doc, &entity, &info, &mut TextBinder, Some("fresh".into()));
        assert_eq!(doc.text_content(el), "fresh");

        run_update(&doc, &entity, &info, &mut TextBinder, None);
        assert_eq!(doc.text_content(el), "");
    }

    #[test]
    fn test_attr_binder_presence() {
        let (doc, entity) = ctx_parts("title");
        let el = doc.create_element("a");
        doc.append_child(doc.root(), el);

        let info = info("attr", Some("title"), "title", Region::Element(el));
        let mut binder = AttrBinder;

        run_update(&doc, &entity, &info, &mut binder, Some("hello".into()));
        assert_eq!(doc.attribute(el, "title").unwrap(), "hello");

        run_update(&doc, &entity, &info, &mut binder, Some("".into()));
        assert!(!doc.has_attribute(el, "title"));

        run_update(&doc, &entity, &info, &mut binder, Some(true.into()));
        assert_eq!(doc.attribute(el, "title").unwrap(), "");
    }

    #[test]
    fn test_attr_binder_negated() {
        let (doc, entity) = ctx_parts("busy");
        let el = doc.create_element("button");
        doc.append_child(doc.root(), el);

        let mut negated = info("attr", Some("disabled"), "busy", Region::Element(el));
        negated.negate = true;
        let mut binder = AttrBinder;

        // busy == false  →  disabled present (as a boolean attribute)
        run_update(&doc, &entity, &negated, &mut binder, Some(false.into()));
        assert_eq!(doc.attribute(el, "disabled").unwrap(), "");

        run_update(&doc, &entity, &negated, &mut binder, Some(true.into()));
        assert!(!doc.has_attribute(el, "disabled"));
    }

    #[test]
    fn test_css_binder_toggles_class() {
        let (doc, entity) = ctx_parts("selected");
        let el = doc.create_element("li");
        doc.append_child(doc.root(), el);

        let info = info("css", Some("active"), "selected", Region::Element(el));
        let mut binder = CssBinder;

        run_update(&doc, &entity, &info, &mut binder, Some(true.into()));
        assert!(doc.has_class(el, "active"));

        run_update(&doc, &entity, &info, &mut binder, Some(0.into()));
        assert!(!doc.has_class(el, "active"));
    }

    #[test]
    fn test_write_back_through_nested_path() {
        let owner = EntityType::builder("owner")
            .attr("name", AttributeDef::new())
            .build()
            .create();
        let root = Entity::new();
        root.set("item", owner.clone());

        write_back(&root, "item.name", Value::from("x"));
        assert_eq!(owner.get("name").unwrap().display_text(), "x");

        // A broken path drops the edit without panicking.
        write_back(&root, "missing.name", Value::from("y"));
    }
}
