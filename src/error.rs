//! Errors surfaced by `Dict` construction and mutation.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DictError {
    /// The configured allocator refused (or the host could not satisfy) a request.
    #[error("allocation of {bytes} bytes refused")]
    AllocFailed { bytes: usize },

    /// `hash` or `compare` was never supplied to the builder.
    #[error("missing required capability `{0}`")]
    MissingCapability(&'static str),

    /// Swapping the indexing capabilities would strand live entries.
    #[error("cannot replace `{0}` while the dictionary holds entries")]
    NotEmpty(&'static str),

    #[error("invalid load factors: shrink ({shrink}) must be >= 0 and below expand ({expand})")]
    InvalidLoadFactors { expand: f64, shrink: f64 },
}
