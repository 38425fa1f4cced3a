// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean classification kernels
//!
//! The orchestrator only sees [`BooleanKernel`]. Two engines ship with the
//! crate: [`BspKernel`], a BSP-tree clipper used first, and
//! [`FragmentKernel`], a split-and-classify engine used as the alternate.

mod bsp;
mod fragment;

pub use bsp::BspKernel;
pub use fragment::FragmentKernel;

use crate::error::{CsgError, CsgResult};
use crate::geometry::MeshSet;
use crate::utils::math::{self, Plane};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boolean operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CsgOperation {
    Union,
    AMinusB,
    BMinusA,
    Intersection,
}

impl CsgOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "union",
            Self::AMinusB => "a-minus-b",
            Self::BMinusA => "b-minus-a",
            Self::Intersection => "intersection",
        }
    }
}

impl fmt::Display for CsgOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CsgOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "union" => Ok(Self::Union),
            "a-minus-b" | "difference" | "subtract" => Ok(Self::AMinusB),
            "b-minus-a" => Ok(Self::BMinusA),
            "intersection" | "intersect" => Ok(Self::Intersection),
            other => Err(format!("unknown boolean operation: {other}")),
        }
    }
}

/// How coplanar and near-coplanar geometry is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStrategy {
    /// Tight tolerance band, cheapest
    Edge,
    /// Widened band, coplanar pieces resolved by normal orientation
    Normal,
}

/// A boolean classification primitive
pub trait BooleanKernel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Combine two closed mesh sets. `eps` is the distance tolerance in the
    /// frame the operands are given in.
    fn compute(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: CsgOperation,
        strategy: ClassificationStrategy,
        eps: f64,
    ) -> CsgResult<MeshSet>;
}

/// Planar convex polygon carried through the kernels
#[derive(Debug, Clone)]
pub(crate) struct Polygon {
    pub points: Vec<Point3<f64>>,
    pub plane: Plane,
}

impl Polygon {
    pub fn flip(&mut self) {
        self.points.reverse();
        self.plane = self.plane.flipped();
    }
}

/// Every face of the set as triangles with their planes. Faces are fanned
/// when convex and ear-clipped otherwise; slivers without a plane are dropped.
pub(crate) fn triangle_polygons(mesh_set: &MeshSet) -> Vec<Polygon> {
    let mut polygons = Vec::new();
    for points in mesh_set.polygon_points() {
        for [a, b, c] in split_face(&points) {
            if let Some(plane) = Plane::from_points(&points[a], &points[b], &points[c]) {
                polygons.push(Polygon {
                    points: vec![points[a], points[b], points[c]],
                    plane,
                });
            }
        }
    }
    polygons
}

fn split_face(points: &[Point3<f64>]) -> Vec<[usize; 3]> {
    if points.len() == 3 {
        return vec![[0, 1, 2]];
    }
    let normal = math::newell_normal(points);
    if normal.norm_squared() == 0.0 {
        return Vec::new();
    }
    ear_clip(&math::project_to_2d(points, &normal)).unwrap_or_default()
}

/// Triangulate a simple polygon given as a 2D loop. Triangles index into
/// `points` and keep the loop's winding.
pub(crate) fn ear_clip(points: &[Point2<f64>]) -> CsgResult<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(CsgError::Triangulation {
            details: format!("polygon has {} points", points.len()),
        });
    }
    let flattened: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    let indices = earcutr::earcut(&flattened, &[], 2).map_err(|err| CsgError::Triangulation {
        details: format!("{err:?}"),
    })?;

    let counter_clockwise = math::signed_area_2d(points) >= 0.0;
    let triangles = indices
        .chunks_exact(3)
        .map(|t| {
            let area = math::signed_area_2d(&[points[t[0]], points[t[1]], points[t[2]]]);
            if area != 0.0 && (area > 0.0) != counter_clockwise {
                [t[0], t[2], t[1]]
            } else {
                [t[0], t[1], t[2]]
            }
        })
        .collect();
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;

    #[test]
    fn test_operation_parsing() {
        assert_eq!("union".parse::<CsgOperation>(), Ok(CsgOperation::Union));
        assert_eq!("A_MINUS_B".parse::<CsgOperation>(), Ok(CsgOperation::AMinusB));
        assert_eq!("b-minus-a".parse::<CsgOperation>(), Ok(CsgOperation::BMinusA));
        assert!("xor".parse::<CsgOperation>().is_err());
        assert_eq!(CsgOperation::AMinusB.to_string(), "a-minus-b");
    }

    #[test]
    fn test_triangle_polygons_of_quad_cube() {
        let cube = primitives::cuboid_quads(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let polygons = triangle_polygons(&cube);
        assert_eq!(polygons.len(), 12);
        let area: f64 = polygons.iter().map(|p| math::polygon_area(&p.points)).sum();
        assert!((area - 6.0).abs() < 1e-12);
    }

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    fn signed_areas(points: &[Point2<f64>], triangles: &[[usize; 3]]) -> Vec<f64> {
        triangles
            .iter()
            .map(|t| math::signed_area_2d(&[points[t[0]], points[t[1]], points[t[2]]]))
            .collect()
    }

    #[test]
    fn test_ear_clip_square() {
        let square = square();
        let triangles = ear_clip(&square).unwrap();
        assert_eq!(triangles.len(), 2);
        let total: f64 = signed_areas(&square, &triangles).iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ear_clip_concave_l_shape() {
        let l = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let triangles = ear_clip(&l).unwrap();
        let areas = signed_areas(&l, &triangles);
        assert!(areas.iter().all(|&area| area > 0.0), "{areas:?}");
        assert!((areas.iter().sum::<f64>() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ear_clip_keeps_clockwise_winding() {
        let mut square = square();
        square.reverse();
        let triangles = ear_clip(&square).unwrap();
        let areas = signed_areas(&square, &triangles);
        assert!(areas.iter().all(|&area| area < 0.0), "{areas:?}");
        assert!((areas.iter().sum::<f64>() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ear_clip_needs_three_points() {
        assert!(ear_clip(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).is_err());
    }
}
