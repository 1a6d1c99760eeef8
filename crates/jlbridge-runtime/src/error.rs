//! Error types for the marshaling layer and the session

use crate::ffi::loader::LoadError;
use thiserror::Error;

/// Errors reported by marshaling, unmarshaling and session operations
///
/// All variants are recoverable and surface to the direct caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Dimension mismatch: shape holds {expected} elements, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Failed to allocate {array_type} with dims {dims:?}")]
    AllocationFailed { array_type: String, dims: Vec<usize> },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Length mismatch: container holds {expected} elements, foreign array has {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Julia session is not initialized")]
    NotInitialized,

    #[error("Julia is already initialized in this process")]
    AlreadyInitialized,

    #[error("Julia session has been finalized")]
    Finalized,

    #[error("Function '{name}' not found in module {module}")]
    FunctionNotFound { module: String, name: String },

    #[error("Julia error in {context}: {message}")]
    Eval { context: String, message: String },

    #[error("Null pointer returned by {0}")]
    NullPointer(String),

    #[error("Foreign buffer at {address:#x} is not aligned to {align} bytes")]
    Misaligned { address: usize, align: usize },

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        insta::assert_snapshot!(
            BridgeError::DimensionMismatch { expected: 6, got: 4 }.to_string(),
            @"Dimension mismatch: shape holds 6 elements, got 4"
        );
        insta::assert_snapshot!(
            BridgeError::LengthMismatch { expected: 4, found: 3 }.to_string(),
            @"Length mismatch: container holds 4 elements, foreign array has 3"
        );
        insta::assert_snapshot!(
            BridgeError::TypeMismatch {
                expected: "Float64".to_string(),
                found: "Int64".to_string(),
            }
            .to_string(),
            @"Type mismatch: expected Float64, found Int64"
        );
    }

    #[test]
    fn test_load_error_converts() {
        let err: BridgeError = LoadError::LibraryNotFound("julia".to_string()).into();
        assert!(matches!(err, BridgeError::Load(_)));
        assert_eq!(err.to_string(), "Library not found: julia");
    }
}
