// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding box utilities

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bbox = Self::empty();
        for point in points {
            bbox.expand_to_include(point);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);

        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut result = *self;
        if !other.is_empty() {
            result.expand_to_include(&other.min);
            result.expand_to_include(&other.max);
        }
        result
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Largest edge length of the box
    pub fn max_extent(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.size().max()
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Overlap test with a tolerance band
    pub fn intersects(&self, other: &BoundingBox, eps: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..3).all(|i| self.min[i] <= other.max[i] + eps && other.min[i] <= self.max[i] + eps)
    }

    /// Largest gap between the boxes along any axis, negative when they overlap on every axis
    pub fn max_axis_separation(&self, other: &BoundingBox) -> f64 {
        (0..3)
            .map(|i| (other.min[i] - self.max[i]).max(self.min[i] - other.max[i]))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// `other` lies inside `self`, with tolerance
    pub fn contains(&self, other: &BoundingBox, eps: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (0..3).all(|i| self.min[i] - eps <= other.min[i] && other.max[i] <= self.max[i] + eps)
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min - other.min).amax() < tolerance && (self.max - other.max).amax() < tolerance
    }

    pub fn expanded(&self, margin: f64) -> BoundingBox {
        let delta = Vector3::repeat(margin);
        BoundingBox::new(self.min - delta, self.max + delta)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_bounding_box() {
        let mut bbox = BoundingBox::empty();
        assert!(bbox.is_empty());
        bbox.expand_to_include(&Point3::new(1.0, 2.0, 3.0));
        bbox.expand_to_include(&Point3::new(-1.0, -2.0, -3.0));

        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.max_extent(), 6.0);
    }

    #[test]
    fn test_intersection_and_separation() {
        let a = unit_box();
        let b = BoundingBox::new(Point3::new(0.5, 0.0, 0.0), Point3::new(1.5, 1.0, 1.0));
        let c = BoundingBox::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));

        assert!(a.intersects(&b, 0.0));
        assert!(a.max_axis_separation(&b) < 0.0);
        assert!(!a.intersects(&c, 1e-6));
        assert!((a.max_axis_separation(&c) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_contains() {
        let outer = unit_box().expanded(1.0);
        assert!(outer.contains(&unit_box(), 0.0));
        assert!(!unit_box().contains(&outer, 0.0));
    }
}
