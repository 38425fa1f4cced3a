// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG operations using BSP trees
//!
//! Nodes live in one vector and refer to their children by index, so
//! building, clipping and inverting never recurse.

use super::{triangle_polygons, BooleanKernel, ClassificationStrategy, CsgOperation, Polygon};
use crate::error::{CsgError, CsgResult};
use crate::geometry::{MeshSet, PolyhedronBuilder};
use crate::utils::math::{self, Plane};
use tracing::debug;

/// Coplanarity band multiplier for [`ClassificationStrategy::Normal`]
const NORMAL_BAND_FACTOR: f64 = 100.0;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

/// Where the pieces of a split polygon go
struct SplitTargets<'a> {
    coplanar_front: &'a mut Vec<Polygon>,
    coplanar_back: &'a mut Vec<Polygon>,
    front: &'a mut Vec<Polygon>,
    back: &'a mut Vec<Polygon>,
}

fn split_polygon(plane: &Plane, polygon: Polygon, eps: f64, out: SplitTargets<'_>) {
    let distances: Vec<f64> = polygon.points.iter().map(|p| plane.distance(p)).collect();
    let types: Vec<u8> = distances
        .iter()
        .map(|&d| {
            if d < -eps {
                BACK
            } else if d > eps {
                FRONT
            } else {
                COPLANAR
            }
        })
        .collect();

    match types.iter().fold(COPLANAR, |acc, t| acc | t) {
        COPLANAR => {
            if plane.normal.dot(&polygon.plane.normal) > 0.0 {
                out.coplanar_front.push(polygon);
            } else {
                out.coplanar_back.push(polygon);
            }
        }
        FRONT => out.front.push(polygon),
        BACK => out.back.push(polygon),
        _ => {
            let n = polygon.points.len();
            let mut front = Vec::with_capacity(n + 1);
            let mut back = Vec::with_capacity(n + 1);
            for i in 0..n {
                let j = (i + 1) % n;
                let (ti, tj) = (types[i], types[j]);
                let (vi, vj) = (polygon.points[i], polygon.points[j]);
                if ti != BACK {
                    front.push(vi);
                }
                if ti != FRONT {
                    back.push(vi);
                }
                if ti | tj == SPANNING {
                    let t = distances[i] / (distances[i] - distances[j]);
                    let v = math::lerp_point(&vi, &vj, t);
                    front.push(v);
                    back.push(v);
                }
            }
            if front.len() >= 3 {
                out.front.push(Polygon {
                    points: front,
                    plane: polygon.plane,
                });
            }
            if back.len() >= 3 {
                out.back.push(Polygon {
                    points: back,
                    plane: polygon.plane,
                });
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    plane: Option<Plane>,
    front: Option<usize>,
    back: Option<usize>,
    polygons: Vec<Polygon>,
}

#[derive(Debug, Clone)]
struct BspTree {
    nodes: Vec<Node>,
    eps: f64,
}

impl BspTree {
    fn new(polygons: Vec<Polygon>, eps: f64) -> Self {
        let mut tree = Self {
            nodes: vec![Node::default()],
            eps,
        };
        tree.build(polygons);
        tree
    }

    fn child(&mut self, node: usize, front: bool) -> usize {
        let existing = if front {
            self.nodes[node].front
        } else {
            self.nodes[node].back
        };
        if let Some(child) = existing {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(Node::default());
        if front {
            self.nodes[node].front = Some(child);
        } else {
            self.nodes[node].back = Some(child);
        }
        child
    }

    /// Insert polygons below the root, extending the tree where needed
    fn build(&mut self, polygons: Vec<Polygon>) {
        let mut stack = vec![(0usize, polygons)];
        while let Some((node, polygons)) = stack.pop() {
            let Some(first) = polygons.first() else { continue };
            let plane = *self.nodes[node].plane.get_or_insert(first.plane);

            let mut coplanar = Vec::new();
            let mut coplanar_back = Vec::new();
            let mut front = Vec::new();
            let mut back = Vec::new();
            for polygon in polygons {
                split_polygon(
                    &plane,
                    polygon,
                    self.eps,
                    SplitTargets {
                        coplanar_front: &mut coplanar,
                        coplanar_back: &mut coplanar_back,
                        front: &mut front,
                        back: &mut back,
                    },
                );
            }
            coplanar.append(&mut coplanar_back);
            self.nodes[node].polygons.append(&mut coplanar);

            if !front.is_empty() {
                let child = self.child(node, true);
                stack.push((child, front));
            }
            if !back.is_empty() {
                let child = self.child(node, false);
                stack.push((child, back));
            }
        }
    }

    /// Convert solid space to empty space and empty space to solid space
    fn invert(&mut self) {
        for node in self.nodes.iter_mut() {
            for polygon in node.polygons.iter_mut() {
                polygon.flip();
            }
            node.plane = node.plane.map(|p| p.flipped());
            std::mem::swap(&mut node.front, &mut node.back);
        }
    }

    /// Remove the parts of `polygons` inside this tree's solid
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let mut kept = Vec::new();
        let mut stack = vec![(0usize, polygons)];
        while let Some((node, polygons)) = stack.pop() {
            let Some(plane) = self.nodes[node].plane else {
                kept.extend(polygons);
                continue;
            };
            let mut front = Vec::new();
            let mut back = Vec::new();
            let mut coplanar_front = Vec::new();
            let mut coplanar_back = Vec::new();
            for polygon in polygons {
                split_polygon(
                    &plane,
                    polygon,
                    self.eps,
                    SplitTargets {
                        coplanar_front: &mut coplanar_front,
                        coplanar_back: &mut coplanar_back,
                        front: &mut front,
                        back: &mut back,
                    },
                );
            }
            front.append(&mut coplanar_front);
            back.append(&mut coplanar_back);

            match self.nodes[node].front {
                Some(child) => stack.push((child, front)),
                None => kept.extend(front),
            }
            if let Some(child) = self.nodes[node].back {
                stack.push((child, back));
            }
        }
        kept
    }

    /// Remove the parts of this tree's polygons inside `other`
    fn clip_to(&mut self, other: &BspTree) {
        for node in self.nodes.iter_mut() {
            let polygons = std::mem::take(&mut node.polygons);
            node.polygons = other.clip_polygons(polygons);
        }
    }

    fn into_polygons(self) -> Vec<Polygon> {
        self.nodes.into_iter().flat_map(|node| node.polygons).collect()
    }
}

fn union(mut a: BspTree, mut b: BspTree) -> Vec<Polygon> {
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.into_polygons());
    a.into_polygons()
}

fn subtract(mut a: BspTree, mut b: BspTree) -> Vec<Polygon> {
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.into_polygons());
    a.invert();
    a.into_polygons()
}

fn intersect(mut a: BspTree, mut b: BspTree) -> Vec<Polygon> {
    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.into_polygons());
    a.invert();
    a.into_polygons()
}

/// BSP-tree boolean engine
#[derive(Debug, Clone, Copy, Default)]
pub struct BspKernel;

impl BspKernel {
    pub fn new() -> Self {
        Self
    }
}

impl BooleanKernel for BspKernel {
    fn name(&self) -> &'static str {
        "bsp"
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

        let polygons_a = triangle_polygons(a);
        let polygons_b = triangle_polygons(b);
        if polygons_a.is_empty() && polygons_b.is_empty() {
            return Err(CsgError::EmptyOperand);
        }
        let tree_a = BspTree::new(polygons_a, band);
        let tree_b = BspTree::new(polygons_b, band);

        let polygons = match op {
            CsgOperation::Union => union(tree_a, tree_b),
            CsgOperation::AMinusB => subtract(tree_a, tree_b),
            CsgOperation::BMinusA => subtract(tree_b, tree_a),
            CsgOperation::Intersection => intersect(tree_a, tree_b),
        };
        debug!(kernel = self.name(), %op, ?strategy, polygons = polygons.len(), "bsp classification done");

        let mut builder = PolyhedronBuilder::new(band).with_t_junction_repair();
        for polygon in &polygons {
            builder.add_polygon(&polygon.points);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn unit_cube_at(x: f64) -> MeshSet {
        primitives::cuboid(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
    }

    fn run(op: CsgOperation) -> MeshSet {
        BspKernel
            .compute(&unit_cube_at(0.0), &unit_cube_at(0.5), op, ClassificationStrategy::Edge, 1e-7)
            .unwrap()
    }

    #[test]
    fn test_subtract_overlapping_cubes() {
        let result = run(CsgOperation::AMinusB);
        assert_relative_eq!(result.volume(), 0.5, epsilon = 1e-9);
        assert_eq!(result.num_open_edges(), 0);
    }

    #[test]
    fn test_reverse_subtract() {
        let result = run(CsgOperation::BMinusA);
        assert_relative_eq!(result.volume(), 0.5, epsilon = 1e-9);
        assert_relative_eq!(result.bbox().min.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_union_and_intersection_volumes() {
        assert_relative_eq!(run(CsgOperation::Union).volume(), 1.5, epsilon = 1e-9);
        assert_relative_eq!(run(CsgOperation::Intersection).volume(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_split_keeps_parent_plane() {
        let polygon = Polygon {
            points: vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            plane: Plane::new(nalgebra::Vector3::z(), 0.0),
        };
        let splitter = Plane::new(nalgebra::Vector3::x(), 0.0);
        let (mut cf, mut cb, mut front, mut back) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        split_polygon(
            &splitter,
            polygon,
            1e-9,
            SplitTargets {
                coplanar_front: &mut cf,
                coplanar_back: &mut cb,
                front: &mut front,
                back: &mut back,
            },
        );
        assert_eq!(front.len(), 1);
        assert_eq!(back.len(), 1);
        assert_eq!(front[0].plane.normal, nalgebra::Vector3::z());
        let area = math::polygon_area(&front[0].points) + math::polygon_area(&back[0].points);
        assert_relative_eq!(area, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let cube = unit_cube_at(0.0);
        let result = BspKernel.compute(&cube, &cube, CsgOperation::Union, ClassificationStrategy::Edge, 0.0);
        assert!(result.is_err());
    }
}
