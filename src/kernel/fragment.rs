// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Split-and-classify boolean engine
//!
//! Every polygon of one operand is cut by the planes of the other operand's
//! faces that overlap it. Each resulting fragment is then classified by its
//! centroid: on the other surface (same or opposite orientation), or inside
//! or outside by ray parity.

use super::{triangle_polygons, BooleanKernel, ClassificationStrategy, CsgOperation, Polygon};
use crate::error::{CsgError, CsgResult};
use crate::geometry::{BoundingBox, MeshSet, PolyhedronBuilder};
use crate::utils::math::{self, Plane};
use nalgebra::Point3;
use tracing::debug;

const NORMAL_BAND_FACTOR: f64 = 100.0;

/// Position of a fragment relative to the other solid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Inside,
    Outside,
    /// On the other surface, normals agreeing
    SameBoundary,
    /// On the other surface, normals opposed
    OppositeBoundary,
}

/// Which fragments survive an operation, as (keep from first, keep from second, flip second)
fn keep_rules(op: CsgOperation) -> (fn(Classification) -> bool, fn(Classification) -> bool, bool) {
    use Classification::*;
    match op {
        CsgOperation::Union => (|c| matches!(c, Outside | SameBoundary), |c| c == Outside, false),
        CsgOperation::AMinusB | CsgOperation::BMinusA => {
            (|c| matches!(c, Outside | OppositeBoundary), |c| c == Inside, true)
        }
        CsgOperation::Intersection => (|c| matches!(c, Inside | SameBoundary), |c| c == Inside, false),
    }
}

struct Solid {
    polygons: Vec<Polygon>,
    boxes: Vec<BoundingBox>,
}

impl Solid {
    fn new(mesh_set: &MeshSet) -> Self {
        let polygons = triangle_polygons(mesh_set);
        let boxes = polygons
            .iter()
            .map(|p| BoundingBox::from_points(p.points.iter()))
            .collect();
        Self { polygons, boxes }
    }

    /// Cut `polygon` by the planes of every face whose box touches it
    fn fragment(&self, polygon: &Polygon, eps: f64) -> Vec<Polygon> {
        let bbox = BoundingBox::from_points(polygon.points.iter());
        let mut pieces = vec![polygon.clone()];
        for (other, other_box) in self.polygons.iter().zip(&self.boxes) {
            if !bbox.intersects(other_box, eps) {
                continue;
            }
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                split_by_plane(&other.plane, piece, eps, &mut next);
            }
            pieces = next;
        }
        pieces
    }

    fn classify(&self, fragment: &Polygon, eps: f64) -> Classification {
        let center = math::centroid(&fragment.points);
        for other in &self.polygons {
            if other.plane.distance(&center).abs() <= eps && point_in_triangle(&center, &other.points, eps) {
                return if other.plane.normal.dot(&fragment.plane.normal) > 0.0 {
                    Classification::SameBoundary
                } else {
                    Classification::OppositeBoundary
                };
            }
        }

        let direction = math::parity_ray_direction();
        let hits = self
            .polygons
            .iter()
            .filter(|p| math::ray_hits_triangle(&center, &direction, &p.points, eps))
            .count();
        if hits % 2 == 1 {
            Classification::Inside
        } else {
            Classification::Outside
        }
    }
}

/// Split a convex polygon; pieces on the plane or wholly on one side pass through unchanged
fn split_by_plane(plane: &Plane, polygon: Polygon, eps: f64, out: &mut Vec<Polygon>) {
    let distances: Vec<f64> = polygon.points.iter().map(|p| plane.distance(p)).collect();
    let has_front = distances.iter().any(|&d| d > eps);
    let has_back = distances.iter().any(|&d| d < -eps);
    if !(has_front && has_back) {
        out.push(polygon);
        return;
    }

    let n = polygon.points.len();
    let mut front = Vec::with_capacity(n + 1);
    let mut back = Vec::with_capacity(n + 1);
    for i in 0..n {
        let j = (i + 1) % n;
        let (di, dj) = (distances[i], distances[j]);
        let vi = polygon.points[i];
        if di >= -eps {
            front.push(vi);
        }
        if di <= eps {
            back.push(vi);
        }
        if (di > eps && dj < -eps) || (di < -eps && dj > eps) {
            let v = math::lerp_point(&vi, &polygon.points[j], di / (di - dj));
            front.push(v);
            back.push(v);
        }
    }
    for points in [front, back] {
        if points.len() >= 3 {
            out.push(Polygon {
                points,
                plane: polygon.plane,
            });
        }
    }
}

fn point_in_triangle(p: &Point3<f64>, triangle: &[Point3<f64>], eps: f64) -> bool {
    let [a, b, c] = [&triangle[0], &triangle[1], &triangle[2]];
    let normal = (b - a).cross(&(c - a));
    let area2 = normal.norm();
    if area2 == 0.0 {
        return false;
    }
    // Signed sub-areas over the full area; each edge gets an `eps` band
    let edge_test = |u: &Point3<f64>, v: &Point3<f64>| {
        let edge_len = (v - u).norm();
        (v - u).cross(&(p - u)).dot(&normal) / area2 >= -eps * edge_len
    };
    edge_test(a, b) && edge_test(b, c) && edge_test(c, a)
}

/// Engine that splits both operands against each other and keeps fragments by classification
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentKernel;

impl FragmentKernel {
    pub fn new() -> Self {
        Self
    }
}

impl BooleanKernel for FragmentKernel {
    fn name(&self) -> &'static str {
        "fragment"
    }

    fn compute(
        &self,
        a: &MeshSet,
        b: &MeshSet,
        op: CsgOperation,
        strategy: ClassificationStrategy,
        eps: f64,
    ) -> CsgResult<MeshSet> {
        if !(eps > 0.0 && eps.is_finite()) {
            return Err(CsgError::classification(self.name(), format!("invalid tolerance {eps}")));
        }
        let band = match strategy {
            ClassificationStrategy::Edge => eps,
            ClassificationStrategy::Normal => eps * NORMAL_BAND_FACTOR,
        };

        let (first, second) = match op {
            CsgOperation::BMinusA => (Solid::new(b), Solid::new(a)),
            _ => (Solid::new(a), Solid::new(b)),
        };
        if first.polygons.is_empty() && second.polygons.is_empty() {
            return Err(CsgError::EmptyOperand);
        }
        let (keep_first, keep_second, flip_second) = keep_rules(op);

        let mut builder = PolyhedronBuilder::new(band).with_t_junction_repair();
        let mut kept = 0;
        for polygon in &first.polygons {
            for fragment in second.fragment(polygon, band) {
                if keep_first(second.classify(&fragment, band)) {
                    builder.add_polygon(&fragment.points);
                    kept += 1;
                }
            }
        }
        for polygon in &second.polygons {
            for mut fragment in first.fragment(polygon, band) {
                if keep_second(first.classify(&fragment, band)) {
                    if flip_second {
                        fragment.flip();
                    }
                    builder.add_polygon(&fragment.points);
                    kept += 1;
                }
            }
        }
        debug!(kernel = self.name(), %op, ?strategy, fragments = kept, "fragment classification done");
        Ok(builder.build())
    }
}
