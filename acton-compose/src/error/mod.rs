//! Error types and error handling

use std::time::Duration;
use thiserror::Error;

use crate::view_tag::ParseError;
use crate::BoxError;

/// Errors aborting a render call
///
/// Every variant is fatal: a render either returns the fully composed output
/// or one of these, never partial output.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// View tag discovery failed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Variable/section interpolation failed
    #[error("interpolation failed on pass {pass}: {source}")]
    Interpolation {
        /// Pass number (1-based)
        pass: usize,
        /// Error from the interpolation layer
        #[source]
        source: BoxError,
    },

    /// A retriever failed to resolve a view tag
    #[error("retriever for <{tag}> failed on `{needle}`: {source}")]
    Retriever {
        /// Tag name
        tag: String,
        /// One raw occurrence of the tag
        needle: String,
        /// Error from the retriever
        #[source]
        source: BoxError,
    },

    /// View tags kept reappearing beyond the pass ceiling
    #[error("view tags still unresolved after {limit} passes, next: `{needle}`")]
    RecursionLimitExceeded {
        /// Configured ceiling
        limit: usize,
        /// One raw occurrence still pending
        needle: String,
    },

    /// The render was cancelled through its token
    #[error("render cancelled")]
    Cancelled,

    /// The render ran past its deadline
    #[error("render exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl ComposeError {
    /// Whether the render was stopped from outside rather than failing
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded(_))
    }
}
