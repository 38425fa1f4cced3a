// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation and diagnostics
//!
//! Checks run cheapest first and stop at the first failure:
//! emptiness, pointer integrity, degenerate edges, fins, zero-area faces,
//! open edges and finally orientation. Meshes with negative volume are
//! inverted in place.

use crate::config::GeomSettings;
use crate::geometry::{Mesh, MeshSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tolerances and relaxations for one validation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationParams {
    pub epsilon: f64,
    /// Faces below this area count as zero-area
    pub min_face_area: f64,
    /// `1 - |cos|` band for back-to-back faces
    pub fin_angle: f64,
    pub max_loop_edges: usize,
    pub allow_degenerate_edges: bool,
    pub allow_fin_edges: bool,
    pub allow_zero_area_faces: bool,
}

impl ValidationParams {
    pub fn new(settings: &GeomSettings, epsilon: f64) -> Self {
        Self {
            epsilon,
            min_face_area: epsilon * epsilon,
            fin_angle: settings.eps_coplanar_angle.max(1e-9),
            max_loop_edges: settings.max_loop_edges,
            allow_degenerate_edges: false,
            allow_fin_edges: false,
            allow_zero_area_faces: false,
        }
    }

    pub fn allow_degenerate_edges(mut self, allow: bool) -> Self {
        self.allow_degenerate_edges = allow;
        self
    }

    pub fn allow_fin_edges(mut self, allow: bool) -> Self {
        self.allow_fin_edges = allow;
        self
    }
}

/// Diagnostic snapshot of a [`MeshSet`], produced fresh by every validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSetInfo {
    pub num_open_edges: usize,
    pub num_closed_edges: usize,
    pub num_faces: usize,
    pub num_zero_area_faces: usize,
    pub max_edges_per_face: usize,
    pub degenerate_edges: usize,
    pub fin_edges: usize,
    pub fin_faces: usize,
    pub surface_area: f64,
    pub all_pointers_valid: bool,
    pub mesh_set_valid: bool,
    /// First failed check, empty when valid
    pub details: String,
}

impl MeshSetInfo {
    fn fail(mut self, details: impl Into<String>) -> Self {
        self.mesh_set_valid = false;
        self.details = details.into();
        debug!(details = %self.details, "mesh set invalid");
        self
    }
}

impl std::fmt::Display for MeshSetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Valid: {}",
            if self.mesh_set_valid { "yes" } else { "NO" }
        )?;
        if !self.details.is_empty() {
            writeln!(f, "  Reason: {}", self.details)?;
        }
        writeln!(f, "  Faces: {} (max {} edges)", self.num_faces, self.max_edges_per_face)?;
        writeln!(
            f,
            "  Edges: {} closed, {} open",
            self.num_closed_edges, self.num_open_edges
        )?;
        writeln!(
            f,
            "  Degenerate edges: {}, fin edges: {}, fin faces: {}",
            self.degenerate_edges, self.fin_edges, self.fin_faces
        )?;
        writeln!(f, "  Zero-area faces: {}", self.num_zero_area_faces)?;
        write!(f, "  Surface area: {:.6}", self.surface_area)
    }
}

/// Runs the validity checks on a mesh set
#[derive(Debug, Clone, Copy)]
pub struct MeshValidator {
    params: ValidationParams,
}

impl MeshValidator {
    pub fn new(params: ValidationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ValidationParams {
        &self.params
    }

    /// Validate an operand that may be absent
    pub fn check_optional(&self, mesh_set: Option<&mut MeshSet>) -> MeshSetInfo {
        match mesh_set {
            Some(mesh_set) => self.check(mesh_set),
            None => MeshSetInfo::default().fail("mesh set is missing"),
        }
    }

    /// Validate and self-heal orientation
    pub fn check(&self, mesh_set: &mut MeshSet) -> MeshSetInfo {
        let mut info = MeshSetInfo::default();
        if mesh_set.meshes.is_empty() {
            return info.fail("mesh set has no meshes");
        }

        mesh_set.cache_edges();
        info.num_open_edges = mesh_set.num_open_edges();
        info.num_closed_edges = mesh_set.num_closed_edges();
        info.num_faces = mesh_set.num_faces();
        info.max_edges_per_face = mesh_set.max_edges_per_face();

        let num_vertices = mesh_set.vertices.len();
        for (i, mesh) in mesh_set.meshes.iter().enumerate() {
            if let Err(reason) = check_edge_pointers(mesh, num_vertices, self.params.max_loop_edges)
            {
                return info.fail(format!("mesh {i}: {reason}"));
            }
        }
        info.all_pointers_valid = true;
        if info.num_faces == 0 {
            return info.fail("mesh set has no faces");
        }

        let vertices = &mesh_set.vertices;
        for mesh in &mesh_set.meshes {
            info.degenerate_edges += count_degenerate_edges(mesh);
            let (fin_edges, fin_faces) = count_fins(mesh, vertices, &self.params);
            info.fin_edges += fin_edges;
            info.fin_faces += fin_faces;
            for face in mesh.live_faces() {
                let area = mesh.face_area(face, vertices);
                info.surface_area += area;
                if area < self.params.min_face_area {
                    info.num_zero_area_faces += 1;
                }
            }
        }

        if info.degenerate_edges > 0 && !self.params.allow_degenerate_edges {
            let count = info.degenerate_edges;
            return info.fail(format!("{count} degenerate edges"));
        }
        if info.fin_edges > 0 && !self.params.allow_fin_edges {
            let count = info.fin_edges;
            return info.fail(format!("{count} fin edges"));
        }
        if info.num_zero_area_faces > 0 && !self.params.allow_zero_area_faces {
            let count = info.num_zero_area_faces;
            return info.fail(format!("{count} zero-area faces"));
        }
        if info.num_open_edges > 0 {
            let count = info.num_open_edges;
            return info.fail(format!("{count} open edges"));
        }

        if let Err(reason) = ensure_non_negative(mesh_set) {
            return info.fail(reason);
        }

        info.mesh_set_valid = true;
        info
    }
}

/// Verify next/prev/rev round trips, vertex ranges and loop lengths
pub fn check_edge_pointers(mesh: &Mesh, num_vertices: usize, max_loop_edges: usize) -> Result<(), String> {
    let edges = &mesh.edges;
    let n = edges.len();
    let alive = |i: usize| i < n && edges[i].face.is_some();

    for (i, edge) in edges.iter().enumerate() {
        let Some(face) = edge.face else { continue };
        if edge.vert >= num_vertices {
            return Err(format!("edge {i} points to missing vertex {}", edge.vert));
        }
        if !alive(edge.next) || !alive(edge.prev) {
            return Err(format!("edge {i} links to a removed edge"));
        }
        if edges[edge.next].prev != i || edges[edge.prev].next != i {
            return Err(format!("edge {i} next/prev do not round-trip"));
        }
        if !mesh.is_face_alive(face) {
            return Err(format!("edge {i} belongs to removed face {face}"));
        }
        if edges[edge.next].face != Some(face) {
            return Err(format!("edge {i} and its next belong to different faces"));
        }
        if let Some(rev) = edge.rev {
            if !alive(rev) {
                return Err(format!("edge {i} has a removed reverse"));
            }
            if edges[rev].rev != Some(i) {
                return Err(format!("edge {i} reverse does not point back"));
            }
            if !alive(edges[rev].prev) || !alive(edges[rev].next) {
                return Err(format!("edge {i} reverse links to a removed edge"));
            }
            if edges[rev].vert != mesh.tail(i) || mesh.tail(rev) != edge.vert {
                return Err(format!("edge {i} reverse joins different vertices"));
            }
        }
    }

    for (f, face) in mesh.faces.iter().enumerate() {
        let Some(start) = face.edge else { continue };
        if !alive(start) || edges[start].face != Some(f) {
            return Err(format!("face {f} entry edge is not part of it"));
        }
        let mut count = 0;
        let mut current = start;
        loop {
            count += 1;
            if count > max_loop_edges {
                return Err(format!("face {f} loop exceeds {max_loop_edges} edges"));
            }
            current = edges[current].next;
            if current == start {
                break;
            }
        }
        if count != face.n_edges {
            return Err(format!(
                "face {f} has {count} edges in its loop but records {}",
                face.n_edges
            ));
        }
    }
    Ok(())
}

/// Edges whose loop doubles back (spikes), zero-length edges and faces with fewer than three edges
pub fn count_degenerate_edges(mesh: &Mesh) -> usize {
    let mut count = 0;
    for i in mesh.live_edges() {
        let edge = &mesh.edges[i];
        let tail = mesh.tail(i);
        let short_face = edge.face.map_or(false, |f| mesh.faces[f].n_edges < 3);
        if tail == edge.vert || mesh.edges[edge.next].vert == tail || short_face {
            count += 1;
        }
    }
    count
}

/// Closed edges between two back-to-back coincident faces, and faces bounded only by such edges
pub fn count_fins(mesh: &Mesh, vertices: &[nalgebra::Point3<f64>], params: &ValidationParams) -> (usize, usize) {
    let min_area = params.epsilon * 10.0;
    let areas: Vec<f64> = (0..mesh.faces.len())
        .map(|f| {
            if mesh.is_face_alive(f) {
                mesh.face_area(f, vertices)
            } else {
                0.0
            }
        })
        .collect();

    let mut fin_edge = vec![false; mesh.edges.len()];
    let mut fin_edges = 0;
    for i in mesh.live_edges() {
        let Some(rev) = mesh.edges[i].rev else { continue };
        if rev < i {
            continue;
        }
        let (Some(f), Some(g)) = (mesh.edges[i].face, mesh.edges[rev].face) else {
            continue;
        };
        if f == g || areas[f] <= min_area || areas[g] <= min_area {
            continue;
        }
        let pf = &mesh.faces[f].plane;
        let pg = &mesh.faces[g].plane;
        let cos = pf.normal.dot(&pg.normal);
        let same_plane = (pf.offset + pg.offset).abs() <= params.epsilon * 10.0;
        if cos + 1.0 <= params.fin_angle && same_plane {
            fin_edge[i] = true;
            fin_edge[rev] = true;
            fin_edges += 1;
        }
    }

    let fin_faces = mesh
        .live_faces()
        .filter(|&f| mesh.face_edges(f).all(|e| fin_edge[e]))
        .count();
    (fin_edges, fin_faces)
}

/// Invert meshes with negative volume, failing if that does not help.
/// A negative mesh enclosed by a positive one is a cavity and stays as it
/// is; a set whose total volume is negative is turned inside out first.
fn ensure_non_negative(mesh_set: &mut MeshSet) -> Result<(), String> {
    let mut total = 0.0;
    for (i, mesh) in mesh_set.meshes.iter().enumerate() {
        let volume = mesh.signed_volume(&mesh_set.vertices);
        if !volume.is_finite() {
            return Err(format!("mesh {i} volume is not finite"));
        }
        total += volume;
    }
    if total < 0.0 {
        debug!(volume = total, "inverted negatively oriented mesh set");
        mesh_set.invert();
    }

    let flipped: Vec<usize> = (0..mesh_set.meshes.len())
        .filter(|&i| mesh_set.meshes[i].signed_volume(&mesh_set.vertices) < 0.0)
        .filter(|&i| mesh_set.enclosing_mesh(i).is_none())
        .collect();
    let vertices = &mesh_set.vertices;
    for i in flipped {
        let mesh = &mut mesh_set.meshes[i];
        mesh.invert();
        let volume = mesh.signed_volume(vertices);
        if volume < 0.0 {
            return Err(format!("mesh {i} stays negative after inversion"));
        }
        debug!(mesh = i, volume, "inverted negatively oriented mesh");
    }
    Ok(())
}

/// Decide whether `new` is preferable to `before` as boolean input
pub fn is_better_for_bool_op(new: &MeshSetInfo, before: &MeshSetInfo, consider_triangulation: bool) -> bool {
    if new.num_open_edges > before.num_open_edges {
        return false;
    }
    if !new.mesh_set_valid && before.mesh_set_valid {
        return false;
    }

    let fewer_open_edges =
        new.num_open_edges < before.num_open_edges && new.num_open_edges + new.num_closed_edges > 0;
    let degenerate_delta = before.degenerate_edges as i64 - new.degenerate_edges as i64;
    let fin_edge_delta = before.fin_edges as i64 - new.fin_edges as i64;
    let fin_face_delta = before.fin_faces as i64 - new.fin_faces as i64;

    if new.mesh_set_valid {
        if fewer_open_edges {
            return true;
        }
        if new.num_faces < before.num_faces && new.num_faces > 0 {
            return true;
        }
        if consider_triangulation
            && new.max_edges_per_face == 3
            && before.max_edges_per_face > 3
            && new.degenerate_edges <= before.degenerate_edges
        {
            return true;
        }
        let deltas = [degenerate_delta, fin_edge_delta, fin_face_delta];
        if deltas.iter().all(|&d| d >= 0) && deltas.iter().any(|&d| d > 0) {
            return true;
        }
        return false;
    }

    fewer_open_edges && (new.all_pointers_valid || !before.all_pointers_valid)
}
