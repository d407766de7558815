//! Logging facilities for the weft core.
//!
//! weft uses the `tracing` crate for instrumentation. To see logs, install a
//! tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! Hot paths (attribute sets, event dispatch, chain rewiring, poll pumping)
//! emit at `trace` level; rerouted listener panics emit at `error` level.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem, e.g.
/// `RUST_LOG=weft_core::chain=trace`.
pub mod targets {
    /// Entity attribute reads/writes and lifecycle.
    pub const ENTITY: &str = "weft_core::entity";
    /// Named-event dispatch (before/on/after pipeline).
    pub const EVENT: &str = "weft_core::event";
    /// Typed signal emission.
    pub const SIGNAL: &str = "weft_core::signal";
    /// Chain subscriptions and rewiring.
    pub const CHAIN: &str = "weft_core::chain";
    /// Observable collection mutations.
    pub const COLLECTION: &str = "weft_core::collection";
    /// Poll scheduler activity.
    pub const POLL: &str = "weft_core::poll";
}
