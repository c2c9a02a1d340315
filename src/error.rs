//! Error types and handling for Seurat

/// Result type alias for Seurat operations
pub type Result<T> = std::result::Result<T, SeuratError>;

/// Error types for the Seurat stream fabric
///
/// These cover recoverable, caller-facing failures only. Violations of the
/// internal buffer invariants indicate a bug in the fabric itself and abort
/// via assertions instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum SeuratError {
    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Insufficient space for a resize or copy
    #[error("Insufficient space: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },
}

impl SeuratError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient space error
    pub fn insufficient_space(requested: usize, available: usize) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }
}
