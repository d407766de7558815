//! The binding registry: wiring declarative markup to entity chains.
//!
//! [`apply_bindings`] walks a subtree depth-first. Elements carrying a
//! `bind` attribute get one metadata bucket per parsed `key: path` pair; a
//! comment pair `bind …` / `/bind` scopes the same thing across a run of
//! siblings (a virtual region). For each pair the registry wires a chain
//! subscription whose callback re-enters here, runs the binder's `start`
//! hook once and its `update` hook once for initial state, and then (for
//! non-structural binders only) recurses into children. Structural binders
//! own their generated content and drive this module themselves.
//!
//! [`remove_bindings`] is the inverse walk: `stop` every binder, detach its
//! chain subscription, delete the bucket. In addition, *lazy collection*
//! reclaims bindings for nodes removed behind the registry's back: any
//! update arriving at a node no longer attached to the document unbinds
//! that node instead of touching the tree.

use std::sync::Arc;

use weft_core::{ChainEvent, Entity, Value, WeakEntity, bind_chain};

use crate::bind::binder::{BindCtx, BinderSet, BindingInfo, ListChange};
use crate::bind::meta::{BindingBucket, BucketKey};
use crate::bind::parse::{BindingPair, parse_binding_list, parse_key, split_scope_path};
use crate::dom::{Document, NodeId, Region};
use crate::error::BindError;

/// The element attribute holding a binding-expression list.
pub const BIND_ATTR: &str = "bind";

/// Comment text opening a virtual region (followed by the pair list).
const REGION_START: &str = "bind";
/// Comment text closing a virtual region.
const REGION_END: &str = "/bind";

/// Apply bindings below `root` against `entity`, using the builtin binders.
///
/// Returns a [`BindError`] for authoring mistakes discovered synchronously:
/// malformed expressions and unmatched virtual-region markers.
pub fn apply_bindings(doc: &Document, entity: &Entity, root: NodeId) -> Result<(), BindError> {
    apply_bindings_with(doc, &BinderSet::default(), entity, root)
}

/// [`apply_bindings`] with a custom binder set.
pub fn apply_bindings_with(
    doc: &Document,
    binders: &BinderSet,
    entity: &Entity,
    root: NodeId,
) -> Result<(), BindError> {
    bind_subtree(doc, binders, std::slice::from_ref(entity), root)
}

/// Remove every binding at and below `root`: stop hooks run, chain
/// subscriptions detach, buckets are deleted. The nodes themselves are left
/// in place.
pub fn remove_bindings(doc: &Document, root: NodeId) {
    for node in doc.descendants(root) {
        unbind_node(doc, node);
    }
}

/// Depth-first binding walk. `scopes` is the enclosing structural-binder
/// scope chain, innermost last.
pub(crate) fn bind_subtree(
    doc: &Document,
    binders: &BinderSet,
    scopes: &[Entity],
    node: NodeId,
) -> Result<(), BindError> {
    if let Some(source) = doc.attribute(node, BIND_ATTR) {
        let pairs = parse_binding_list(&source)?;
        let structural = bind_region(doc, binders, scopes, Region::Element(node), &pairs)?;
        if structural {
            // A structural binder owns this element's content.
            return Ok(());
        }
    }

    let children = doc.children(node);
    let mut index = 0;
    while index < children.len() {
        let child = children[index];
        if let Some(comment) = doc.comment_text(child) {
            let trimmed = comment.trim().to_string();
            if let Some(expressions) = region_start_expressions(&trimmed) {
                let Some(end_offset) = find_region_end(doc, &children, index + 1) else {
                    return Err(BindError::UnmatchedRegion { marker: trimmed });
                };
                let end = children[end_offset];
                let pairs = parse_binding_list(expressions)?;
                let region = Region::Virtual {
                    parent: node,
                    start: child,
                    end,
                };
                let structural = bind_region(doc, binders, scopes, region, &pairs)?;
                if !structural {
                    for interior in &children[index + 1..end_offset] {
                        bind_subtree(doc, binders, scopes, *interior)?;
                    }
                }
                index = end_offset + 1;
                continue;
            }
            if trimmed == REGION_END {
                return Err(BindError::UnmatchedRegion {
                    marker: REGION_END.to_string(),
                });
            }
        }
        bind_subtree(doc, binders, scopes, child)?;
        index += 1;
    }
    Ok(())
}

/// The expression list of a region-start comment, if it is one.
fn region_start_expressions(comment: &str) -> Option<&str> {
    if comment == REGION_START {
        return Some("");
    }
    comment
        .strip_prefix(REGION_START)
        .and_then(|rest| rest.strip_prefix(' '))
}

/// Offset of the matching end marker among `children`, honoring nesting.
fn find_region_end(doc: &Document, children: &[NodeId], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, child) in children.iter().enumerate().skip(from) {
        let Some(comment) = doc.comment_text(*child) else {
            continue;
        };
        let trimmed = comment.trim();
        if region_start_expressions(trimmed).is_some() {
            depth += 1;
        } else if trimmed == REGION_END {
            if depth == 0 {
                return Some(offset);
            }
            depth -= 1;
        }
    }
    None
}

/// Establish every pair of one region. Returns whether any binder was
/// structural.
fn bind_region(
    doc: &Document,
    binders: &BinderSet,
    scopes: &[Entity],
    region: Region,
    pairs: &[BindingPair],
) -> Result<bool, BindError> {
    let mut structural = false;
    for pair in pairs {
        let key = parse_key(&pair.key)?;
        let (ups, path) = split_scope_path(&pair.expression)?;
        let Some(scope_index) = scopes.len().checked_sub(1 + ups) else {
            return Err(BindError::malformed(
                &pair.expression,
                "ancestor marker escapes the outermost scope",
            ));
        };
        let entity = scopes[scope_index].clone();

        let registered = binders.is_registered(&key.keyword);
        let mut binder = binders.create(&key.keyword);
        structural |= binder.is_structural();
        let info = BindingInfo {
            keyword: if registered {
                key.keyword.clone()
            } else {
                "attr".to_string()
            },
            target: match (&key.class, registered) {
                (Some(class), _) => Some(class.clone()),
                // Unknown keywords are attribute names for the fallback.
                (None, false) => Some(key.keyword.clone()),
                (None, true) => None,
            },
            path: path.clone(),
            negate: key.negate,
            one_way: key.one_way,
            region,
        };
        let bucket_key = info.bucket_key();
        let owner = region.owner();
        tracing::trace!(
            target: "weft::bind",
            keyword = %info.keyword,
            path = %info.path,
            "establishing binding"
        );

        // Wire the chain first; its callback no-ops until the bucket lands
        // in the table, and nothing fires in between.
        let subscription = {
            let doc = doc.downgrade();
            let binders = binders.clone();
            let bucket_key = bucket_key.clone();
            bind_chain(
                &entity,
                &path,
                Arc::new(move |ev: &ChainEvent| {
                    if let Some(doc) = doc.upgrade() {
                        dispatch_update(
                            &doc,
                            &binders,
                            owner,
                            &bucket_key,
                            ev.old.clone(),
                            ev.new.clone(),
                        );
                    }
                }),
            )?
        };

        let mut ctx = BindCtx {
            doc,
            binders,
            entity: &entity,
            scopes,
            info: &info,
        };
        binder.start(&mut ctx)?;
        let initial = entity.get(&path);
        binder.update(&mut ctx, None, initial)?;

        doc.put_bucket(
            owner,
            bucket_key,
            BindingBucket {
                binder,
                subscription: Some(subscription),
                entity: entity.downgrade(),
                scopes: scopes.iter().map(Entity::downgrade).collect(),
                info,
            },
        );
    }
    Ok(structural)
}

/// A chain fired for `(owner, key)`: run the binder's update hook, or,
/// when the node has left the document, collect the node's bindings
/// instead (the lazy reclamation path).
pub(crate) fn dispatch_update(
    doc: &Document,
    binders: &BinderSet,
    owner: NodeId,
    key: &BucketKey,
    old: Option<Value>,
    new: Option<Value>,
) {
    if !doc.is_attached(owner) {
        tracing::trace!(target: "weft::bind", "update against a detached node; collecting its bindings");
        unbind_node(doc, owner);
        return;
    }
    with_bucket(doc, binders, owner, key, |bucket, ctx| {
        if let Err(error) = bucket.binder.update(ctx, old, new) {
            tracing::error!(target: "weft::bind", %error, "binding update failed");
        }
    });
}

/// A bound collection fired a lifecycle event for `(owner, key)`.
pub(crate) fn dispatch_collection(
    doc: &Document,
    binders: &BinderSet,
    owner: NodeId,
    key: &BucketKey,
    change: &ListChange,
) {
    if !doc.is_attached(owner) {
        unbind_node(doc, owner);
        return;
    }
    with_bucket(doc, binders, owner, key, |bucket, ctx| {
        if let Err(error) = bucket.binder.collection_changed(ctx, change) {
            tracing::error!(target: "weft::bind", %error, "collection update failed");
        }
    });
}

/// Take the bucket out of the table for the duration of a hook call, so
/// re-entrant binding work (structural binders re-applying bindings) never
/// observes the table mid-mutation, then put it back.
fn with_bucket(
    doc: &Document,
    binders: &BinderSet,
    owner: NodeId,
    key: &BucketKey,
    hook: impl FnOnce(&mut BindingBucket, &mut BindCtx<'_>),
) {
    let Some(mut bucket) = doc.take_bucket(owner, key) else {
        // Already unbound, or taken by an outer dispatch: a stale firing.
        return;
    };
    let Some(entity) = bucket.entity.upgrade() else {
        teardown_bucket(doc, &mut bucket);
        return;
    };
    let scopes: Vec<Entity> = bucket
        .scopes
        .iter()
        .filter_map(WeakEntity::upgrade)
        .collect();
    if scopes.len() != bucket.scopes.len() {
        // An enclosing scope died; the binding cannot re-render correctly.
        teardown_bucket(doc, &mut bucket);
        return;
    }
    let info = bucket.info.clone();
    let mut ctx = BindCtx {
        doc,
        binders,
        entity: &entity,
        scopes: &scopes,
        info: &info,
    };
    hook(&mut bucket, &mut ctx);
    doc.put_bucket(owner, key.clone(), bucket);
}

/// Stop and detach every bucket of one node.
fn unbind_node(doc: &Document, node: NodeId) {
    let Some(bindings) = doc.take_node_bindings(node) else {
        return;
    };
    tracing::trace!(target: "weft::bind", buckets = bindings.buckets.len(), "unbinding node");
    for (_, mut bucket) in bindings.buckets {
        teardown_bucket(doc, &mut bucket);
    }
}

/// Stop the binder, then detach the chain subscription: a bucket never
/// outlives its subscription or vice versa.
fn teardown_bucket(doc: &Document, bucket: &mut BindingBucket) {
    let info = bucket.info.clone();
    bucket.binder.stop(doc, &info);
    if let Some(subscription) = bucket.subscription.take() {
        subscription.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::AttributeDef;
    use weft_core::EntityType;

    fn entity_with(name: &str, value: &str) -> Entity {
        EntityType::builder("model")
            .attr(name, AttributeDef::new())
            .build()
            .create_with([(name, value)])
    }

    #[test]
    fn test_text_binding_renders_and_tracks() {
        let doc = Document::new();
        let span = doc.create_element("span");
        doc.set_attribute(span, BIND_ATTR, "text: name");
        doc.append_child(doc.root(), span);

        let model = entity_with("name", "Worf");
        apply_bindings(&doc, &model, doc.root()).unwrap();
        assert_eq!(doc.text_content(span), "Worf");

        model.set("name", "Mott");
        assert_eq!(doc.text_content(span), "Mott");
    }

    #[test]
    fn test_unknown_keyword_binds_attribute() {
        let doc = Document::new();
        let link = doc.create_element("a");
        doc.set_attribute(link, BIND_ATTR, "href: target");
        doc.append_child(doc.root(), link);

        let model = entity_with("target", "#ten-forward");
        apply_bindings(&doc, &model, doc.root()).unwrap();
        assert_eq!(doc.attribute(link, "href").unwrap(), "#ten-forward");
    }

    #[test]
    fn test_remove_bindings_detaches_model_listeners() {
        let doc = Document::new();
        let span = doc.create_element("span");
        doc.set_attribute(span, BIND_ATTR, "text: name");
        doc.append_child(doc.root(), span);

        let model = entity_with("name", "Guinan");
        apply_bindings(&doc, &model, doc.root()).unwrap();
        assert_eq!(model.listener_count("nameChange"), 1);
        assert_eq!(doc.binding_count(span), 1);

        remove_bindings(&doc, doc.root());
        assert_eq!(model.listener_count("nameChange"), 0);
        assert_eq!(doc.binding_count(span), 0);
        assert!(!doc.has_any_bindings());
    }

    #[test]
    fn test_virtual_region_binds_between_markers() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);
        let start = doc.create_comment("bind text: name");
        let end = doc.create_comment("/bind");
        doc.append_child(parent, start);
        doc.append_child(parent, end);

        let model = entity_with("name", "Ro");
        apply_bindings(&doc, &model, doc.root()).unwrap();
        assert_eq!(doc.text_content(parent), "Ro");

        model.set("name", "Laren");
        assert_eq!(doc.text_content(parent), "Laren");
    }

    #[test]
    fn test_unmatched_region_start_errors() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);
        doc.append_child(parent, doc.create_comment("bind text: name"));

        let model = entity_with("name", "x");
        assert!(matches!(
            apply_bindings(&doc, &model, doc.root()),
            Err(BindError::UnmatchedRegion { .. })
        ));
    }

    #[test]
    fn test_stray_region_end_errors() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        doc.append_child(doc.root(), parent);
        doc.append_child(parent, doc.create_comment("/bind"));

        let model = entity_with("name", "x");
        assert!(matches!(
            apply_bindings(&doc, &model, doc.root()),
            Err(BindError::UnmatchedRegion { .. })
        ));
    }

    #[test]
    fn test_multiple_pairs_on_one_element() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, BIND_ATTR, "value: name, title: name");
        doc.append_child(doc.root(), input);

        let model = entity_with("name", "Alyssa");
        apply_bindings(&doc, &model, doc.root()).unwrap();

        assert_eq!(doc.binding_count(input), 2);
        assert_eq!(doc.attribute(input, "value").unwrap(), "Alyssa");
        assert_eq!(doc.attribute(input, "title").unwrap(), "Alyssa");
    }
}
