// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Coplanar face merging
//!
//! Each live face seeds a region. Neighbours across `rev` edges that lie on
//! the seed plane are spliced into the seed loop one at a time until no
//! neighbour qualifies. A splice removes one contiguous run of shared edges
//! and relinks the surrounding `next`/`prev` pointers:
//!
//! ```text
//!   f1: p -> [e_a .. e_b] -> n        f2: q -> [r_b .. r_a] -> m
//!   merged: p -> m -> .. -> q -> n -> .. -> p
//! ```

use super::validator::{check_edge_pointers, MeshValidator, ValidationParams};
use crate::config::GeomSettings;
use crate::error::{CsgError, CsgResult};
use crate::geometry::{Mesh, MeshSet};
use crate::utils::math::Plane;
use ahash::AHashSet;
use nalgebra::Point3;
use tracing::{debug, trace};

/// Two faces across one shared edge, `edge` belonging to `face`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AdjacentFacePair {
    face: usize,
    other: usize,
    edge: usize,
}

/// Fuses edge-adjacent coplanar faces into larger polygons
#[derive(Debug, Clone, Copy)]
pub struct CoplanarMerger {
    eps_distance: f64,
    eps_angle: f64,
    max_num_face_edges: usize,
    max_faces: usize,
}

impl CoplanarMerger {
    pub fn new(settings: &GeomSettings) -> Self {
        Self {
            eps_distance: settings.eps_coplanar_distance,
            eps_angle: settings.eps_coplanar_angle,
            max_num_face_edges: settings.max_num_face_edges,
            max_faces: settings.max_faces_to_merge,
        }
    }

    /// Merge in place and return the number of splices kept.
    ///
    /// A mesh whose merge opens edges or corrupts pointers is restored on its
    /// own; if the set as a whole goes from valid to invalid, everything is
    /// restored and zero is returned.
    pub fn merge(&self, mesh_set: &mut MeshSet, validation: &ValidationParams) -> CsgResult<usize> {
        if mesh_set.meshes.is_empty() {
            return Ok(0);
        }
        let validator = MeshValidator::new(*validation);
        let before = validator.check(mesh_set);
        if !before.all_pointers_valid {
            return Err(CsgError::topology(before.details));
        }
        let backup = mesh_set.clone();

        let mut total = 0;
        let num_vertices = mesh_set.vertices.len();
        let MeshSet {
            vertices, meshes, ..
        } = mesh_set;
        for (index, mesh) in meshes.iter_mut().enumerate() {
            let faces = mesh.num_faces();
            if faces > self.max_faces {
                debug!(mesh = index, faces, limit = self.max_faces, "too many faces to merge");
                continue;
            }

            let mesh_backup = mesh.clone();
            let open_before = mesh.open_edges.len();
            let mut snapped = Vec::new();
            let merges = self.merge_mesh(mesh, vertices, &mut snapped);
            if merges == 0 {
                continue;
            }

            mesh.cache_edges();
            let broken = check_edge_pointers(mesh, num_vertices, validation.max_loop_edges).is_err();
            if broken || mesh.open_edges.len() > open_before {
                debug!(mesh = index, merges, "rolling back coplanar merge");
                *mesh = mesh_backup;
                for (v, original) in snapped.into_iter().rev() {
                    vertices[v] = original;
                }
                continue;
            }
            total += merges;
        }

        if total == 0 {
            *mesh_set = backup;
            return Ok(0);
        }
        mesh_set.compact();
        mesh_set.update_planes();

        let after = validator.check(mesh_set);
        if (before.mesh_set_valid && !after.mesh_set_valid) || after.num_open_edges > before.num_open_edges {
            debug!(details = %after.details, "coplanar merge invalidated the mesh set");
            *mesh_set = backup;
            return Ok(0);
        }
        debug!(merges = total, faces_before = before.num_faces, faces_after = after.num_faces, "merged coplanar faces");
        Ok(total)
    }

    fn merge_mesh(
        &self,
        mesh: &mut Mesh,
        vertices: &mut [Point3<f64>],
        snapped: &mut Vec<(usize, Point3<f64>)>,
    ) -> usize {
        mesh.update_planes(vertices);
        let mut merged_faces = Vec::new();
        let mut merges = 0;

        for seed in 0..mesh.faces.len() {
            if !mesh.is_face_alive(seed) {
                continue;
            }
            let plane = mesh.faces[seed].plane;
            if plane.normal.norm_squared() == 0.0 {
                continue;
            }

            let mut grew = false;
            loop {
                let mut progress = false;
                for pair in self.adjacent_pairs(mesh, vertices, seed, &plane) {
                    if !mesh.is_face_alive(pair.other) || !mesh.is_edge_alive(pair.edge) {
                        continue;
                    }
                    match splice(mesh, pair, self.max_num_face_edges) {
                        Ok(()) => {
                            merges += 1;
                            progress = true;
                        }
                        Err(reason) => trace!(face = pair.face, other = pair.other, reason, "splice aborted"),
                    }
                }
                if !progress {
                    break;
                }
                grew = true;
            }
            if grew {
                merged_faces.push(seed);
            }
        }

        for face in merged_faces {
            self.snap_to_plane(mesh, vertices, face, snapped);
        }
        mesh.update_planes(vertices);
        merges
    }

    /// Coplanar neighbours of `face`, one record per neighbouring face
    fn adjacent_pairs(&self, mesh: &Mesh, vertices: &[Point3<f64>], face: usize, plane: &Plane) -> Vec<AdjacentFacePair> {
        let mut seen = AHashSet::new();
        let mut pairs = Vec::new();
        for edge in mesh.face_edges(face) {
            let Some(rev) = mesh.edges[edge].rev else { continue };
            let Some(other) = mesh.edges[rev].face else { continue };
            if other == face || !seen.insert(other) {
                continue;
            }
            if self.is_coplanar(mesh, vertices, other, plane) {
                pairs.push(AdjacentFacePair { face, other, edge });
            }
        }
        pairs
    }

    fn is_coplanar(&self, mesh: &Mesh, vertices: &[Point3<f64>], face: usize, plane: &Plane) -> bool {
        let normal = mesh.faces[face].plane.normal;
        if normal.dot(&plane.normal) <= 1.0 - self.eps_angle {
            return false;
        }
        mesh.face_edges(face)
            .all(|e| plane.distance(&vertices[mesh.edges[e].vert]).abs() <= self.eps_distance)
    }

    fn snap_to_plane(
        &self,
        mesh: &Mesh,
        vertices: &mut [Point3<f64>],
        face: usize,
        snapped: &mut Vec<(usize, Point3<f64>)>,
    ) {
        if !mesh.is_face_alive(face) {
            return;
        }
        let Some(plane) = Plane::from_polygon(&mesh.face_points(face, vertices)) else {
            return;
        };
        for v in mesh.face_vertices(face) {
            let distance = plane.distance(&vertices[v]);
            if distance != 0.0 && distance.abs() <= self.eps_distance {
                snapped.push((v, vertices[v]));
                vertices[v] = plane.project(&vertices[v]);
            }
        }
    }
}

/// Absorb `pair.other` into `pair.face` across the run of shared edges containing `pair.edge`
fn splice(mesh: &mut Mesh, pair: AdjacentFacePair, max_edges: usize) -> Result<(), &'static str> {
    let AdjacentFacePair { face: f1, other: f2, edge } = pair;
    if f1 == f2 {
        return Err("self-adjacent");
    }
    let n1 = mesh.faces[f1].n_edges;
    let n2 = mesh.faces[f2].n_edges;
    let borders_f2 = |mesh: &Mesh, e: usize| mesh.edges[e].rev.and_then(|r| mesh.edges[r].face) == Some(f2);
    if !borders_f2(mesh, edge) {
        return Err("edge does not border the other face");
    }

    let shared = mesh.face_edges(f1).filter(|&e| borders_f2(mesh, e)).count();
    if shared >= n1 || shared >= n2 {
        return Err("face enclosed by its neighbour");
    }

    let mut e_a = edge;
    for _ in 0..n1 {
        let prev = mesh.edges[e_a].prev;
        if !borders_f2(mesh, prev) {
            break;
        }
        e_a = prev;
    }
    let mut run = vec![e_a];
    let mut current = e_a;
    loop {
        let next = mesh.edges[current].next;
        if !borders_f2(mesh, next) {
            break;
        }
        run.push(next);
        current = next;
        if run.len() > n1 {
            return Err("runaway shared run");
        }
    }
    if run.len() != shared {
        return Err("shared edges are not contiguous");
    }

    let revs = run
        .iter()
        .map(|&e| mesh.edges[e].rev)
        .collect::<Option<Vec<usize>>>()
        .ok_or("shared edge lost its reverse")?;
    let k = run.len();
    if revs.windows(2).any(|w| mesh.edges[w[1]].next != w[0]) {
        return Err("shared run is not contiguous in the other face");
    }

    let merged_len = n1 + n2 - 2 * k;
    if merged_len < 3 || merged_len > max_edges {
        return Err("merged face size out of range");
    }

    let e_b = run[k - 1];
    let r_a = revs[0];
    let r_b = revs[k - 1];
    let p = mesh.edges[e_a].prev;
    let n = mesh.edges[e_b].next;
    let q = mesh.edges[r_b].prev;
    let m = mesh.edges[r_a].next;

    let f2_rest = walk(mesh, m, q, n2 - k).ok_or("other face loop is broken")?;
    let f1_rest = walk(mesh, n, p, n1 - k).ok_or("face loop is broken")?;

    let mut heads = AHashSet::with_capacity(merged_len);
    if !f2_rest
        .iter()
        .chain(&f1_rest)
        .all(|&e| heads.insert(mesh.edges[e].vert))
    {
        return Err("merged loop would touch itself");
    }

    mesh.edges[p].next = m;
    mesh.edges[m].prev = p;
    mesh.edges[q].next = n;
    mesh.edges[n].prev = q;
    for &e in &f2_rest {
        mesh.edges[e].face = Some(f1);
    }
    for (&e, &r) in run.iter().zip(&revs) {
        mesh.kill_edge(e);
        mesh.kill_edge(r);
    }
    mesh.faces[f1].edge = Some(p);
    mesh.faces[f1].n_edges = merged_len;
    mesh.kill_face(f2);
    Ok(())
}

/// Edges from `from` to `to` inclusive along `next`, expected to be `len` long
fn walk(mesh: &Mesh, from: usize, to: usize, len: usize) -> Option<Vec<usize>> {
    let mut edges = Vec::with_capacity(len);
    let mut current = from;
    loop {
        edges.push(current);
        if current == to {
            break;
        }
        if edges.len() >= len {
            return None;
        }
        current = mesh.edges[current].next;
    }
    (edges.len() == len).then_some(edges)
}

/// Convenience wrapper using `settings` for both merging and validation
pub fn merge_coplanar_faces(mesh_set: &mut MeshSet, settings: &GeomSettings) -> CsgResult<usize> {
    let validation = ValidationParams::new(settings, settings.csg_epsilon);
    CoplanarMerger::new(settings).merge(mesh_set, &validation)
}
