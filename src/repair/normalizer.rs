// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Unit-frame normalization for operand pairs
//!
//! A normalizer is computed once from both operands and applied to each of
//! them. Every normalizer carries a unique tag, stored on the mesh set it
//! transformed, so applying it twice or reversing it on a set it never
//! touched are both no-ops.

use crate::geometry::{BoundingBox, MeshSet};
use nalgebra::Vector3;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Extents below this are left untouched
const MIN_EXTENT: f64 = 1e-5;
/// Scales inside this band, bounds included, are treated as unity
const SKIP_SCALE_BAND: (f64, f64) = (0.5, 2.0);
/// Squared distance of the frame center from the origin below which no shift is needed
const SKIP_CENTER_DIST2: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct MeshNormalizer {
    tag: u64,
    center: Vector3<f64>,
    scale: f64,
    active: bool,
}

impl MeshNormalizer {
    /// Frame covering both operands
    pub fn new(a: &MeshSet, b: &MeshSet) -> Self {
        Self::from_boxes(&a.bbox(), &b.bbox())
    }

    pub fn from_boxes(a: &BoundingBox, b: &BoundingBox) -> Self {
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);
        let union = a.union(b);
        if union.is_empty() {
            return Self::inactive(tag);
        }

        let max_extent = union.max_extent();
        let mut scale = if max_extent > MIN_EXTENT && max_extent.is_finite() {
            1.0 / max_extent
        } else {
            1.0
        };
        if (SKIP_SCALE_BAND.0..=SKIP_SCALE_BAND.1).contains(&scale) {
            scale = 1.0;
        }

        let centers: Vec<Vector3<f64>> = [a, b]
            .iter()
            .filter(|bbox| !bbox.is_empty())
            .map(|bbox| bbox.center().coords)
            .collect();
        let center = centers.iter().sum::<Vector3<f64>>() / centers.len() as f64;

        if scale == 1.0 && center.norm_squared() < SKIP_CENTER_DIST2 {
            return Self::inactive(tag);
        }
        debug!(tag, scale, ?center, "normalizing operand pair");
        Self {
            tag,
            center,
            scale,
            active: true,
        }
    }

    /// Normalizer that never changes coordinates
    pub fn identity() -> Self {
        Self::inactive(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }

    fn inactive(tag: u64) -> Self {
        Self {
            tag,
            center: Vector3::zeros(),
            scale: 1.0,
            active: false,
        }
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn is_identity(&self) -> bool {
        !self.active
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn center(&self) -> Vector3<f64> {
        self.center
    }

    /// Map into the unit frame. Sets already carrying this tag are left alone.
    pub fn normalize(&self, mesh_set: &mut MeshSet) {
        if !self.active || mesh_set.normalized_by == Some(self.tag) {
            return;
        }
        mesh_set.transform(&(-self.center), self.scale);
        mesh_set.normalized_by = Some(self.tag);
    }

    /// Tag a set that was computed inside this normalizer's frame
    pub fn mark(&self, mesh_set: &mut MeshSet) {
        if self.active {
            mesh_set.normalized_by = Some(self.tag);
        }
    }

    /// Undo [`normalize`](Self::normalize). Only sets carrying this tag are changed.
    pub fn denormalize(&self, mesh_set: &mut MeshSet) {
        if mesh_set.normalized_by != Some(self.tag) {
            return;
        }
        mesh_set.transform(&(self.center * self.scale), 1.0 / self.scale);
        mesh_set.normalized_by = None;
    }

    /// Convert a tolerance from the unit frame back to model units
    pub fn model_epsilon(&self, eps: f64) -> f64 {
        eps / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_unit_scale_is_skipped() {
        let a = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = primitives::cuboid(Point3::new(0.5, 0.0, 0.0), Point3::new(1.5, 1.0, 1.0));
        let normalizer = MeshNormalizer::new(&a, &b);
        assert!(normalizer.is_identity());

        let mut copy = a.clone();
        normalizer.normalize(&mut copy);
        assert_eq!(copy.vertices, a.vertices);
        assert_eq!(copy.normalized_by, None);
    }

    #[test]
    fn test_scale_band_bounds_are_skipped() {
        for half in [1.0, 0.25] {
            let a = primitives::cuboid(Point3::new(-half, -half, -half), Point3::new(half, half, half));
            let normalizer = MeshNormalizer::new(&a, &a);
            assert!(normalizer.is_identity(), "extent {}", 2.0 * half);
            assert_eq!(normalizer.scale(), 1.0);
        }

        let a = primitives::cuboid(Point3::new(-1.5, -1.5, -1.5), Point3::new(1.5, 1.5, 1.5));
        assert!(!MeshNormalizer::new(&a, &a).is_identity());
    }

    #[test]
    fn test_large_model_round_trip() {
        let a = primitives::cuboid(Point3::new(1000.0, 2000.0, 0.0), Point3::new(1010.0, 2005.0, 3.0));
        let b = primitives::cuboid(Point3::new(1005.0, 2001.0, 1.0), Point3::new(1020.0, 2002.0, 2.0));
        let normalizer = MeshNormalizer::new(&a, &b);
        assert!(!normalizer.is_identity());
        assert_relative_eq!(normalizer.scale(), 1.0 / 20.0);

        let mut copy = a.clone();
        normalizer.normalize(&mut copy);
        assert!(copy.bbox().max_extent() <= 1.0 + 1e-12);
        assert_relative_eq!(copy.volume(), a.volume() / 8000.0, epsilon = 1e-12);

        normalizer.denormalize(&mut copy);
        for (p, q) in copy.vertices.iter().zip(&a.vertices) {
            assert_relative_eq!(*p, *q, epsilon = 1e-9);
        }
        assert_eq!(copy.normalized_by, None);
    }

    #[test]
    fn test_normalize_is_idempotent_per_tag() {
        let a = primitives::cuboid(Point3::new(100.0, 0.0, 0.0), Point3::new(110.0, 10.0, 10.0));
        let normalizer = MeshNormalizer::new(&a, &a);

        let mut once = a.clone();
        normalizer.normalize(&mut once);
        let mut twice = once.clone();
        normalizer.normalize(&mut twice);
        assert_eq!(once.vertices, twice.vertices);

        let other = MeshNormalizer::new(&a, &a);
        let mut untouched = a.clone();
        other.denormalize(&mut untouched);
        assert_eq!(untouched.vertices, a.vertices);
    }

    #[test]
    fn test_model_epsilon() {
        let a = primitives::cuboid(Point3::origin(), Point3::new(100.0, 100.0, 100.0));
        let normalizer = MeshNormalizer::new(&a, &a);
        assert_relative_eq!(normalizer.model_epsilon(1e-7), 1e-5, epsilon = 1e-15);
    }
}
