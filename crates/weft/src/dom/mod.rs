//! The retained node tree and region descriptors.

mod region;
mod tree;

pub use region::Region;
pub use tree::{Document, InputEvent, InputListenerId, NodeId, NodeKind, WeakDocument};
