//! TR-007: Code generation errors.
//!
//! Every variant aborts `CodeGenerator::build`; there is no partial output.

use thiserror::Error;

/// Fatal error raised while emitting a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// A call site whose object is not a plain member access. Indicates a
    /// defect in the stage that produced the query context.
    #[error("query '{query}': call to '{method}' is not made through a service member (got {object})")]
    MalformedCallSite {
        query: String,
        method: String,
        object: String,
    },

    /// Two call signatures map onto the same wrapper name with different
    /// request types.
    #[error("wrapper '{wrapper}' is requested for both '{first}' and '{second}' request types")]
    WrapperNameCollision {
        wrapper: String,
        first: String,
        second: String,
    },

    /// A structural type reached emission without a rewritten name.
    #[error("structural type {shape} has no rewritten name")]
    UnmappedStructuralType { shape: String },

    /// The application name cannot be used as a Rust type name.
    #[error("invalid application name '{0}'")]
    InvalidAppName(String),

    /// The expression translator rejected a query body.
    #[error("query '{query}': {message}")]
    Translation { query: String, message: String },
}

impl CodegenError {
    pub(crate) fn translation(query: &str, message: impl Into<String>) -> Self {
        Self::Translation {
            query: query.to_string(),
            message: message.into(),
        }
    }
}
