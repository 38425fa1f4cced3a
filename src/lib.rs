// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG
//!
//! Mesh repair and fault-tolerant boolean operations on half-edge meshes.
//! Operands are validated, normalized and simplified before a boolean
//! kernel runs; invalid results are retried with other strategies, and an
//! operation that cannot be computed yields an operand as its fallback
//! result instead of an error.

pub mod cli;
pub mod config;
pub mod csg;
pub mod error;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod repair;
pub mod utils;

pub use config::{CsgOperationParams, GeomSettings};
pub use csg::{
    BatchProcessor, CsgOrchestrator, CsgOutcome, CsgState, EntityJob, MessageLog, Severity, StatusSink,
};
pub use error::{CsgError, CsgResult};
pub use geometry::{BoundingBox, Mesh, MeshSet, MeshStats, PolyhedronBuilder, Primitive};
pub use kernel::{BooleanKernel, BspKernel, ClassificationStrategy, CsgOperation, FragmentKernel};
pub use repair::{MeshNormalizer, MeshSetInfo, MeshValidator};

/// Combine two mesh sets with the default kernels
pub fn compute_boolean(a: &MeshSet, b: &MeshSet, op: CsgOperation, settings: &GeomSettings) -> CsgOutcome {
    CsgOrchestrator::new(settings.clone()).compute(a, b, op)
}

/// Combine `base` with every operand, largest first, with the default kernels
pub fn compute_boolean_many(
    base: &MeshSet,
    operands: &[MeshSet],
    op: CsgOperation,
    settings: &GeomSettings,
) -> CsgOutcome {
    CsgOrchestrator::new(settings.clone()).compute_against_many(base, operands, op, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_basic_subtraction() {
        let a = geometry::primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = geometry::primitives::cuboid(Point3::new(0.5, 0.0, 0.0), Point3::new(1.5, 1.0, 1.0));
        let outcome = compute_boolean(&a, &b, CsgOperation::AMinusB, &GeomSettings::default());
        assert!(outcome.success);
        let result = outcome.result.unwrap();
        assert_relative_eq!(result.volume(), 0.5, epsilon = 1e-6);
    }
}
