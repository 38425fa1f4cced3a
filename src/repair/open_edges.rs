// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Capping of small planar holes
//!
//! Open edges are chained into loops by endpoint proximity. Each closed,
//! planar loop gets a cap face with the opposite winding, and the whole set
//! is rebuilt so the caps pair with the boundary.

use crate::config::GeomSettings;
use crate::error::CsgResult;
use crate::geometry::{MeshSet, PolyhedronBuilder};
use crate::utils::math::{self, Plane};
use nalgebra::Point3;
use tracing::debug;

/// Closes open boundary loops with planar cap faces
#[derive(Debug, Clone, Copy)]
pub struct OpenEdgeResolver {
    eps: f64,
    max_open_edges: usize,
    max_faces: usize,
    min_faces: usize,
}

impl OpenEdgeResolver {
    pub fn new(settings: &GeomSettings, eps: f64) -> Self {
        Self {
            eps,
            max_open_edges: settings.max_open_edges_to_resolve,
            max_faces: settings.max_faces_to_resolve,
            min_faces: settings.min_faces_to_resolve,
        }
    }

    /// Cap what can be capped; returns the number of caps kept
    pub fn resolve(&self, mesh_set: &mut MeshSet) -> CsgResult<usize> {
        mesh_set.cache_edges();
        let open_before = mesh_set.num_open_edges();
        if open_before == 0 {
            return Ok(0);
        }
        if open_before > self.max_open_edges {
            debug!(open_edges = open_before, limit = self.max_open_edges, "too many open edges to resolve");
            return Ok(0);
        }
        let faces = mesh_set.num_faces();
        if faces > self.max_faces {
            debug!(faces, limit = self.max_faces, "too many faces to resolve open edges");
            return Ok(0);
        }

        let mut caps = Vec::new();
        for mesh in &mesh_set.meshes {
            if mesh.num_faces() < self.min_faces {
                continue;
            }
            let segments: Vec<(Point3<f64>, Point3<f64>)> = mesh
                .open_edges
                .iter()
                .filter(|&&e| mesh.is_edge_alive(e))
                .map(|&e| (mesh_set.vertices[mesh.tail(e)], mesh_set.vertices[mesh.edges[e].vert]))
                .collect();
            for mut boundary in chain_loops(&segments, self.eps) {
                if self.is_cappable(&boundary) {
                    boundary.reverse();
                    caps.push(boundary);
                }
            }
        }
        if caps.is_empty() {
            return Ok(0);
        }

        let mut builder = PolyhedronBuilder::new(self.eps);
        for polygon in mesh_set.polygon_points().iter().chain(&caps) {
            builder.add_polygon(polygon);
        }
        let mut capped = builder.build();
        capped.normalized_by = mesh_set.normalized_by;

        let improved = capped.meshes.len() <= mesh_set.meshes.len()
            && capped.num_closed_edges() >= mesh_set.num_closed_edges()
            && capped.num_open_edges() < open_before;
        if !improved {
            debug!(
                caps = caps.len(),
                open_after = capped.num_open_edges(),
                open_before,
                "capping did not improve the mesh set"
            );
            return Ok(0);
        }
        debug!(caps = caps.len(), open_before, open_after = capped.num_open_edges(), "capped open boundaries");
        *mesh_set = capped;
        Ok(caps.len())
    }

    fn is_cappable(&self, boundary: &[Point3<f64>]) -> bool {
        let Some(plane) = Plane::from_polygon(boundary) else {
            return false;
        };
        let tolerance = self.eps * 10.0;
        boundary.iter().all(|p| plane.distance(p).abs() <= tolerance)
            && math::polygon_area(boundary) > self.eps * self.eps
    }
}

/// Greedily chain segments into closed loops, returning each loop's corners in order.
/// A segment may be walked backwards if only its head meets the chain.
fn chain_loops(segments: &[(Point3<f64>, Point3<f64>)], eps: f64) -> Vec<Vec<Point3<f64>>> {
    let near = |a: &Point3<f64>, b: &Point3<f64>| (a - b).norm() <= eps;
    let mut used = vec![false; segments.len()];
    let mut loops = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (origin, mut end) = segments[start];
        let mut corners = vec![origin];
        let mut closed = false;

        for _ in 0..segments.len() {
            if near(&end, &origin) {
                closed = true;
                break;
            }
            let next = (0..segments.len()).find_map(|j| {
                if used[j] {
                    None
                } else if near(&segments[j].0, &end) {
                    Some((j, segments[j].1))
                } else if near(&segments[j].1, &end) {
                    Some((j, segments[j].0))
                } else {
                    None
                }
            });
            let Some((j, far)) = next else { break };
            used[j] = true;
            corners.push(end);
            end = far;
        }
        if closed && corners.len() >= 3 {
            loops.push(corners);
        }
    }
    loops
}
