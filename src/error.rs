// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for mesh repair and boolean operations

use thiserror::Error;

/// Result type alias for CSG operations.
pub type CsgResult<T> = Result<T, CsgError>;

/// Errors raised by repair passes and boolean kernels.
///
/// None of these escape the orchestrator: they are turned into the
/// fallback result for the affected operation.
#[derive(Debug, Error)]
pub enum CsgError {
    /// Half-edge structure is inconsistent.
    #[error("invalid mesh topology: {details}")]
    InvalidTopology { details: String },

    /// A boolean kernel failed.
    #[error("{engine} classification failed: {details}")]
    Classification { engine: &'static str, details: String },

    /// Polygon could not be split into triangles.
    #[error("triangulation failed: {details}")]
    Triangulation { details: String },

    /// An input exceeded a configured ceiling.
    #[error("{what} count {count} exceeds limit {limit}")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Operand is missing or has no meshes.
    #[error("operand is empty")]
    EmptyOperand,
}

impl CsgError {
    pub fn topology(details: impl Into<String>) -> Self {
        Self::InvalidTopology {
            details: details.into(),
        }
    }

    pub fn classification(engine: &'static str, details: impl Into<String>) -> Self {
        Self::Classification {
            engine,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CsgError::classification("bsp", "invalid tolerance 0");
        assert_eq!(err.to_string(), "bsp classification failed: invalid tolerance 0");

        let err = CsgError::LimitExceeded {
            what: "operand vertex",
            count: 4001,
            limit: 4000,
        };
        assert_eq!(err.to_string(), "operand vertex count 4001 exceeds limit 4000");
        let err = CsgError::topology("edge 3 links to a removed edge");
        assert_eq!(err.to_string(), "invalid mesh topology: edge 3 links to a removed edge");
    }
}
