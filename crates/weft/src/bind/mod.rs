//! Declarative data binding over the node tree.

mod binder;
pub(crate) mod meta;
mod parse;
mod registry;
mod structural;
mod value_binders;


pub use binder::{BindCtx, Binder, BinderSet, BinderSetBuilder, BindingInfo, ListChange};
pub use parse::{BindingKey, BindingPair, parse_binding_list, parse_key, split_scope_path};
pub use registry::{BIND_ATTR, apply_bindings, apply_bindings_with, remove_bindings};
pub use structural::{IfBinder, RepeatBinder};
pub use value_binders::{
    AttrBinder, CheckedBinder, CssBinder, MarkupBinder, TextBinder, ValueBinder,
};
