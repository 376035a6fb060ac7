//! Deformation error types.

use std::fmt;

/// Errors that can occur when binding or driving the deformation pipeline.
///
/// These are configuration errors, reported at bind time (or on a per-frame
/// call with mismatched inputs). Per-vertex numeric degeneracy is never an
/// error: degenerate vertices fall back to an identity rotation instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeformError {
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// The number of bone matrices does not match the skin binding.
    BoneCountMismatch {
        /// Bone count expected by the skin binding.
        expected: usize,
        /// Bone count actually provided.
        actual: usize,
    },
    /// The number of per-vertex records does not match the mesh.
    VertexCountMismatch {
        /// Vertex count expected by the mesh.
        expected: usize,
        /// Vertex count actually provided.
        actual: usize,
    },
    /// A deformation backend cannot run (not bound, device lost, ...).
    BackendUnavailable(String),
    /// A serialized cache blob failed validation.
    CorruptCache(String),
}

impl fmt::Display for DeformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::BoneCountMismatch { expected, actual } => {
                write!(f, "bone count mismatch: expected {expected}, got {actual}")
            }
            Self::VertexCountMismatch { expected, actual } => {
                write!(
                    f,
                    "vertex count mismatch: expected {expected}, got {actual}"
                )
            }
            Self::BackendUnavailable(msg) => write!(f, "backend unavailable: {msg}"),
            Self::CorruptCache(msg) => write!(f, "corrupt cache: {msg}"),
        }
    }
}

impl std::error::Error for DeformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeformError::BoneCountMismatch {
            expected: 4,
            actual: 2,
        };
        assert_eq!(err.to_string(), "bone count mismatch: expected 4, got 2");

        let err = DeformError::InvalidParameter("lambda out of range".to_string());
        assert_eq!(err.to_string(), "invalid parameter: lambda out of range");
    }
}
