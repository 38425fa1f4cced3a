// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Removal of redundant vertices on straight edges

use super::validator::{check_edge_pointers, ValidationParams};
use crate::config::GeomSettings;
use crate::error::{CsgError, CsgResult};
use crate::geometry::{Mesh, MeshSet};
use nalgebra::Point3;
use tracing::debug;

/// Removes degree-2 vertices whose two edges are aligned
#[derive(Debug, Clone, Copy)]
pub struct CollinearMerger {
    tolerance: f64,
}

impl CollinearMerger {
    pub fn new(settings: &GeomSettings) -> Self {
        Self {
            tolerance: settings.collinear_tolerance,
        }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Remove collinear vertices in place, returning how many were removed
    pub fn merge(&self, mesh_set: &mut MeshSet, validation: &ValidationParams) -> CsgResult<usize> {
        let num_vertices = mesh_set.vertices.len();
        for mesh in &mesh_set.meshes {
            check_edge_pointers(mesh, num_vertices, validation.max_loop_edges).map_err(CsgError::topology)?;
        }

        let mut total = 0;
        let MeshSet {
            vertices, meshes, ..
        } = &mut *mesh_set;
        for mesh in meshes.iter_mut() {
            let backup = mesh.clone();
            mesh.cache_edges();
            let open_before = mesh.open_edges.len();

            let removed = self.merge_mesh(mesh, vertices);
            if removed == 0 {
                continue;
            }
            mesh.cache_edges();
            let broken = check_edge_pointers(mesh, num_vertices, validation.max_loop_edges).is_err();
            if broken || mesh.open_edges.len() > open_before {
                debug!(removed, "rolling back collinear merge");
                *mesh = backup;
                continue;
            }
            total += removed;
        }

        if total > 0 {
            mesh_set.compact();
            mesh_set.update_planes();
            debug!(removed = total, "removed collinear vertices");
        }
        Ok(total)
    }

    fn merge_mesh(&self, mesh: &mut Mesh, vertices: &[Point3<f64>]) -> usize {
        let mut removed = 0;
        loop {
            let mut progress = false;
            for e in 0..mesh.edges.len() {
                if mesh.is_edge_alive(e) && self.try_remove_head(mesh, vertices, e) {
                    removed += 1;
                    progress = true;
                }
            }
            if !progress {
                return removed;
            }
        }
    }

    /// Remove the head of `e` if it joins exactly two faces along a straight line
    fn try_remove_head(&self, mesh: &mut Mesh, vertices: &[Point3<f64>], e: usize) -> bool {
        let n = mesh.edges[e].next;
        let (Some(re), Some(rn)) = (mesh.edges[e].rev, mesh.edges[n].rev) else {
            return false;
        };
        if n == e || mesh.edges[rn].next != re {
            return false;
        }
        let (Some(f), Some(g)) = (mesh.edges[e].face, mesh.edges[rn].face) else {
            return false;
        };
        if f == g {
            return false;
        }

        let u = mesh.tail(e);
        let v = mesh.edges[e].vert;
        let w = mesh.edges[n].vert;
        if u == w || u == v || v == w {
            return false;
        }
        let d1 = vertices[v] - vertices[u];
        let d2 = vertices[w] - vertices[v];
        let (l1, l2) = (d1.norm(), d2.norm());
        if l1 == 0.0 || l2 == 0.0 {
            return false;
        }
        let cos = d1.dot(&d2) / (l1 * l2);
        if cos <= 0.0 || (cos - 1.0).abs() >= self.tolerance {
            return false;
        }

        // e: u->v, n: v->w in f; rn: w->v, re: v->u in g
        let after_n = mesh.edges[n].next;
        mesh.edges[e].vert = w;
        mesh.edges[e].next = after_n;
        mesh.edges[after_n].prev = e;

        let after_re = mesh.edges[re].next;
        mesh.edges[rn].vert = u;
        mesh.edges[rn].next = after_re;
        mesh.edges[after_re].prev = rn;

        mesh.kill_edge(n);
        mesh.kill_edge(re);
        mesh.edges[e].rev = Some(rn);
        mesh.edges[rn].rev = Some(e);

        shrink_face(mesh, f, e);
        shrink_face(mesh, g, rn);
        true
    }
}

/// Account for one removed edge of `face`, folding it away if only two edges remain
fn shrink_face(mesh: &mut Mesh, face: usize, survivor: usize) {
    mesh.faces[face].n_edges -= 1;
    mesh.faces[face].edge = Some(survivor);
    if mesh.faces[face].n_edges > 2 {
        return;
    }

    let edges: Vec<usize> = mesh.face_edges(face).collect();
    let outer: Vec<Option<usize>> = edges.iter().map(|&e| mesh.edges[e].rev).collect();
    for &e in &edges {
        mesh.kill_edge(e);
    }
    mesh.kill_face(face);
    if let [Some(a), Some(b)] = outer[..] {
        mesh.edges[a].rev = Some(b);
        mesh.edges[b].rev = Some(a);
    }
}

/// Convenience wrapper using `settings` for tolerance and validation
pub fn merge_collinear_edges(mesh_set: &mut MeshSet, settings: &GeomSettings) -> CsgResult<usize> {
    let validation = ValidationParams::new(settings, settings.csg_epsilon);
    CollinearMerger::new(settings).merge(mesh_set, &validation)
}
