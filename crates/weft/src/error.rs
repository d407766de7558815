//! Error types for the binding engine.

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindError>;

/// Errors raised synchronously while applying bindings.
///
/// These cover authoring mistakes in the markup: malformed expressions and
/// mismatched virtual-region markers. Runtime data conditions (rejected
/// values, panicking listeners) never surface here; they are absorbed and
/// reported through the entity's event channel.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// A binding expression could not be parsed.
    #[error("malformed binding expression '{source_text}': {message}")]
    MalformedExpression {
        /// The expression as written.
        source_text: String,
        /// What went wrong.
        message: String,
    },

    /// A virtual-region marker without a matching partner.
    #[error("unmatched virtual binding marker '{marker}'")]
    UnmatchedRegion {
        /// The offending marker text.
        marker: String,
    },

    /// Error from the attribute substrate (e.g. an empty chain path).
    #[error(transparent)]
    Core(#[from] weft_core::CoreError),
}

impl BindError {
    pub(crate) fn malformed(source_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedExpression {
            source_text: source_text.into(),
            message: message.into(),
        }
    }
}
