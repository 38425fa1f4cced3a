// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Half-edge mesh arena
//!
//! Vertices, edges and faces live in flat vectors and refer to each other
//! by index. Removal tombstones an entry (`face == None` for edges,
//! `edge == None` for faces); [`Mesh::compact`] drops the tombstones and
//! rewrites every index.

use super::BoundingBox;
use crate::utils::math::{self, Plane};
use nalgebra::{Point3, Vector3};

/// Directed half-edge. Runs from the head of `prev` to `vert`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfEdge {
    /// Next half-edge in the same face loop
    pub next: usize,
    /// Previous half-edge in the same face loop
    pub prev: usize,
    /// Opposite half-edge on the adjacent face, `None` on an open boundary
    pub rev: Option<usize>,
    /// Vertex this half-edge points to (its head)
    pub vert: usize,
    /// Owning face, `None` once the edge is removed
    pub face: Option<usize>,
}

/// Face loop with a cached plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Any half-edge of the loop, `None` once the face is removed
    pub edge: Option<usize>,
    /// Number of half-edges in the loop
    pub n_edges: usize,
    pub plane: Plane,
}

impl Face {
    pub fn is_alive(&self) -> bool {
        self.edge.is_some()
    }
}

/// Connected set of faces sharing the vertex pool of its [`MeshSet`]
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub edges: Vec<HalfEdge>,
    pub faces: Vec<Face>,
    /// Half-edges without a reverse partner
    pub open_edges: Vec<usize>,
    /// One half-edge per paired edge
    pub closed_edges: Vec<usize>,
    /// Set when the mesh was found inside-out and inverted
    pub is_negative: bool,
}

/// Walks a face loop along `next`, at most `n_edges` steps
pub struct FaceEdges<'a> {
    edges: &'a [HalfEdge],
    current: usize,
    remaining: usize,
}

impl Iterator for FaceEdges<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 || self.current >= self.edges.len() {
            return None;
        }
        let edge = self.current;
        self.current = self.edges[edge].next;
        self.remaining -= 1;
        Some(edge)
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_edge_alive(&self, edge: usize) -> bool {
        self.edges.get(edge).map_or(false, |e| e.face.is_some())
    }

    pub fn is_face_alive(&self, face: usize) -> bool {
        self.faces.get(face).map_or(false, Face::is_alive)
    }

    /// Vertex the half-edge starts from
    pub fn tail(&self, edge: usize) -> usize {
        self.edges[self.edges[edge].prev].vert
    }

    pub fn live_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_alive())
            .map(|(i, _)| i)
    }

    pub fn live_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.face.is_some())
            .map(|(i, _)| i)
    }

    pub fn num_faces(&self) -> usize {
        self.live_faces().count()
    }

    pub fn face_edges(&self, face: usize) -> FaceEdges<'_> {
        let f = &self.faces[face];
        FaceEdges {
            edges: &self.edges,
            current: f.edge.unwrap_or(usize::MAX),
            remaining: if f.edge.is_some() { f.n_edges } else { 0 },
        }
    }

    /// Loop vertex indices in winding order
    pub fn face_vertices(&self, face: usize) -> Vec<usize> {
        self.face_edges(face).map(|e| self.edges[e].vert).collect()
    }

    pub fn face_points(&self, face: usize, vertices: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.face_edges(face)
            .map(|e| vertices[self.edges[e].vert])
            .collect()
    }

    pub fn face_area(&self, face: usize, vertices: &[Point3<f64>]) -> f64 {
        math::polygon_area(&self.face_points(face, vertices))
    }

    /// Recompute the cached plane of one face
    pub fn update_plane(&mut self, face: usize, vertices: &[Point3<f64>]) {
        let points = self.face_points(face, vertices);
        self.faces[face].plane =
            Plane::from_polygon(&points).unwrap_or_else(|| Plane::new(Vector3::zeros(), 0.0));
    }

    pub fn update_planes(&mut self, vertices: &[Point3<f64>]) {
        for face in 0..self.faces.len() {
            if self.faces[face].is_alive() {
                self.update_plane(face, vertices);
            }
        }
    }

    /// Rebuild the open/closed edge caches
    pub fn cache_edges(&mut self) {
        self.open_edges.clear();
        self.closed_edges.clear();
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.face.is_none() {
                continue;
            }
            match edge.rev {
                None => self.open_edges.push(i),
                Some(rev) if i < rev => self.closed_edges.push(i),
                Some(_) => {}
            }
        }
    }

    /// Signed enclosed volume, positive for an outward-facing closed mesh
    pub fn signed_volume(&self, vertices: &[Point3<f64>]) -> f64 {
        let mut volume = 0.0;
        for face in self.live_faces() {
            let points = self.face_points(face, vertices);
            if points.len() < 3 {
                continue;
            }
            let origin = points[0].coords;
            for i in 1..points.len() - 1 {
                volume += origin.dot(&points[i].coords.cross(&points[i + 1].coords));
            }
        }
        volume / 6.0
    }

    pub fn surface_area(&self, vertices: &[Point3<f64>]) -> f64 {
        self.live_faces()
            .map(|face| self.face_area(face, vertices))
            .sum()
    }

    pub fn bbox(&self, vertices: &[Point3<f64>]) -> BoundingBox {
        BoundingBox::from_points(self.live_edges().map(|e| &vertices[self.edges[e].vert]))
    }

    /// Centroid of the first live face, a point on the surface
    pub fn surface_point(&self, vertices: &[Point3<f64>]) -> Option<Point3<f64>> {
        self.live_faces()
            .next()
            .map(|face| math::centroid(&self.face_points(face, vertices)))
    }

    /// Ray-parity inside test over the fanned faces. Undefined for points
    /// on the surface itself.
    pub fn contains_point(&self, point: &Point3<f64>, vertices: &[Point3<f64>]) -> bool {
        let direction = math::parity_ray_direction();
        let mut hits = 0usize;
        for face in self.live_faces() {
            let points = self.face_points(face, vertices);
            for i in 1..points.len().saturating_sub(1) {
                let triangle = [points[0], points[i], points[i + 1]];
                if math::ray_hits_triangle(point, &direction, &triangle, 0.0) {
                    hits += 1;
                }
            }
        }
        hits % 2 == 1
    }

    /// Reverse the winding of every face
    pub fn invert(&mut self) {
        let heads: Vec<usize> = self.edges.iter().map(|e| e.vert).collect();
        for edge in self.edges.iter_mut() {
            if edge.face.is_none() {
                continue;
            }
            edge.vert = heads[edge.prev];
            std::mem::swap(&mut edge.next, &mut edge.prev);
        }
        for face in self.faces.iter_mut() {
            face.plane = face.plane.flipped();
        }
        self.is_negative = !self.is_negative;
    }

    /// Unlink a half-edge from its face loop bookkeeping and tombstone it
    pub(crate) fn kill_edge(&mut self, edge: usize) {
        if let Some(rev) = self.edges[edge].rev.take() {
            if self.edges[rev].rev == Some(edge) {
                self.edges[rev].rev = None;
            }
        }
        self.edges[edge].face = None;
    }

    pub(crate) fn kill_face(&mut self, face: usize) {
        self.faces[face].edge = None;
        self.faces[face].n_edges = 0;
    }

    /// Drop tombstoned edges and faces and rewrite indices
    pub fn compact(&mut self) {
        let mut edge_map = vec![usize::MAX; self.edges.len()];
        let mut edges = Vec::with_capacity(self.edges.len());
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.face.is_some() {
                edge_map[i] = edges.len();
                edges.push(*edge);
            }
        }

        let mut face_map = vec![usize::MAX; self.faces.len()];
        let mut faces = Vec::with_capacity(self.faces.len());
        for (i, face) in self.faces.iter().enumerate() {
            if face.is_alive() {
                face_map[i] = faces.len();
                faces.push(*face);
            }
        }

        let remap = |map: &[usize], idx: usize| map.get(idx).copied().unwrap_or(usize::MAX);
        for edge in edges.iter_mut() {
            edge.next = remap(&edge_map, edge.next);
            edge.prev = remap(&edge_map, edge.prev);
            edge.rev = edge
                .rev
                .map(|r| remap(&edge_map, r))
                .filter(|&r| r != usize::MAX);
            edge.face = edge.face.map(|f| remap(&face_map, f));
        }
        for face in faces.iter_mut() {
            face.edge = face.edge.map(|e| remap(&edge_map, e));
        }

        self.edges = edges;
        self.faces = faces;
        self.cache_edges();
    }

    /// Largest face loop length
    pub fn max_edges_per_face(&self) -> usize {
        self.live_faces()
            .map(|f| self.faces[f].n_edges)
            .max()
            .unwrap_or(0)
    }
}

/// Collection of meshes over one shared vertex pool
#[derive(Debug, Clone, Default)]
pub struct MeshSet {
    pub vertices: Vec<Point3<f64>>,
    pub meshes: Vec<Mesh>,
    /// Id of the normalizer that currently holds this set in its unit frame
    pub normalized_by: Option<u64>,
}

impl MeshSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.num_faces() == 0)
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.meshes.iter().map(Mesh::num_faces).sum()
    }

    pub fn num_open_edges(&self) -> usize {
        self.meshes.iter().map(|m| m.open_edges.len()).sum()
    }

    pub fn num_closed_edges(&self) -> usize {
        self.meshes.iter().map(|m| m.closed_edges.len()).sum()
    }

    pub fn max_edges_per_face(&self) -> usize {
        self.meshes
            .iter()
            .map(Mesh::max_edges_per_face)
            .max()
            .unwrap_or(0)
    }

    pub fn is_triangulated(&self) -> bool {
        self.meshes
            .iter()
            .all(|m| m.live_faces().all(|f| m.faces[f].n_edges == 3))
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter())
    }

    /// Sum of signed mesh volumes
    pub fn volume(&self) -> f64 {
        self.meshes
            .iter()
            .map(|m| m.signed_volume(&self.vertices))
            .sum()
    }

    pub fn surface_area(&self) -> f64 {
        self.meshes
            .iter()
            .map(|m| m.surface_area(&self.vertices))
            .sum()
    }

    /// Face loops as vertex indices, all meshes concatenated
    pub fn polygons(&self) -> Vec<Vec<usize>> {
        self.meshes
            .iter()
            .flat_map(|m| m.live_faces().map(move |f| m.face_vertices(f)))
            .collect()
    }

    /// Face loops as points
    pub fn polygon_points(&self) -> Vec<Vec<Point3<f64>>> {
        self.polygons()
            .into_iter()
            .map(|poly| poly.into_iter().map(|v| self.vertices[v]).collect())
            .collect()
    }

    /// `p' = (p + translation) * scale` for every vertex
    pub fn transform(&mut self, translation: &Vector3<f64>, scale: f64) {
        for p in self.vertices.iter_mut() {
            *p = Point3::from((p.coords + translation) * scale);
        }
        self.update_planes();
    }

    pub fn update_planes(&mut self) {
        let vertices = &self.vertices;
        for mesh in self.meshes.iter_mut() {
            mesh.update_planes(vertices);
        }
    }

    pub fn cache_edges(&mut self) {
        for mesh in self.meshes.iter_mut() {
            mesh.cache_edges();
        }
    }

    /// Copy of the selected meshes with only the vertices they use
    pub fn subset(&self, indices: &[usize]) -> MeshSet {
        let mut subset = MeshSet {
            vertices: self.vertices.clone(),
            meshes: indices.iter().filter_map(|&i| self.meshes.get(i).cloned()).collect(),
            normalized_by: self.normalized_by,
        };
        subset.collect_vertices();
        subset
    }

    /// A positively oriented mesh other than `inner` that surrounds it,
    /// making `inner` a cavity or an island inside a cavity
    pub fn enclosing_mesh(&self, inner: usize) -> Option<usize> {
        let mesh = self.meshes.get(inner)?;
        let bbox = mesh.bbox(&self.vertices);
        let point = mesh.surface_point(&self.vertices)?;
        self.meshes.iter().enumerate().find_map(|(i, other)| {
            let encloses = i != inner
                && other.bbox(&self.vertices).contains(&bbox, 0.0)
                && other.signed_volume(&self.vertices) > 0.0
                && other.contains_point(&point, &self.vertices);
            encloses.then_some(i)
        })
    }

    pub fn invert(&mut self) {
        for mesh in self.meshes.iter_mut() {
            mesh.invert();
        }
    }

    /// Compact every mesh, drop empty meshes and unreferenced vertices
    pub fn compact(&mut self) {
        for mesh in self.meshes.iter_mut() {
            mesh.compact();
        }
        self.meshes.retain(|m| !m.faces.is_empty());
        self.collect_vertices();
    }

    /// Remove vertices no live edge points to
    pub fn collect_vertices(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for mesh in &self.meshes {
            for e in mesh.live_edges() {
                if let Some(flag) = used.get_mut(mesh.edges[e].vert) {
                    *flag = true;
                }
            }
        }
        let mut map = vec![usize::MAX; self.vertices.len()];
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (i, p) in self.vertices.iter().enumerate() {
            if used[i] {
                map[i] = vertices.len();
                vertices.push(*p);
            }
        }
        for mesh in self.meshes.iter_mut() {
            for edge in mesh.edges.iter_mut() {
                edge.vert = map.get(edge.vert).copied().unwrap_or(usize::MAX);
            }
        }
        self.vertices = vertices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_topology() {
        let cube = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(cube.meshes.len(), 1);
        assert_eq!(cube.num_vertices(), 8);
        assert_eq!(cube.num_faces(), 12);
        assert_eq!(cube.num_open_edges(), 0);
        assert_eq!(cube.num_closed_edges(), 18);

        let mesh = &cube.meshes[0];
        for e in mesh.live_edges() {
            let rev = mesh.edges[e].rev.unwrap();
            assert_eq!(mesh.edges[rev].rev, Some(e));
            assert_eq!(mesh.edges[rev].vert, mesh.tail(e));
        }
    }

    #[test]
    fn test_volume_and_area() {
        let cube = primitives::cuboid(Point3::origin(), Point3::new(2.0, 1.0, 1.0));
        assert_relative_eq!(cube.volume(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(cube.surface_area(), 10.0, epsilon = 1e-12);
    }

    fn hollow_box() -> MeshSet {
        let mut polygons = primitives::cuboid(Point3::origin(), Point3::new(3.0, 3.0, 3.0)).polygon_points();
        for mut cavity in primitives::cuboid(Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0)).polygon_points() {
            cavity.reverse();
            polygons.push(cavity);
        }
        MeshSet::from_polygons(&polygons, 1e-9)
    }

    #[test]
    fn test_contains_point() {
        let cube = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mesh = &cube.meshes[0];
        assert!(mesh.contains_point(&Point3::new(0.3, 0.6, 0.2), &cube.vertices));
        assert!(!mesh.contains_point(&Point3::new(1.3, 0.6, 0.2), &cube.vertices));
        assert!(!mesh.contains_point(&Point3::new(-0.5, -0.5, -0.5), &cube.vertices));
    }

    #[test]
    fn test_enclosing_mesh_of_cavity() {
        let hollow = hollow_box();
        assert_eq!(hollow.meshes.len(), 2);
        assert_relative_eq!(hollow.volume(), 26.0, epsilon = 1e-9);

        let (outer, cavity) = if hollow.meshes[0].signed_volume(&hollow.vertices) > 0.0 { (0, 1) } else { (1, 0) };
        assert_eq!(hollow.enclosing_mesh(cavity), Some(outer));
        assert_eq!(hollow.enclosing_mesh(outer), None);

        let mut polygons = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0)).polygon_points();
        polygons.extend(primitives::cuboid(Point3::new(2.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0)).polygon_points());
        let apart = MeshSet::from_polygons(&polygons, 1e-9);
        assert_eq!(apart.meshes.len(), 2);
        assert_eq!(apart.enclosing_mesh(0), None);
        assert_eq!(apart.enclosing_mesh(1), None);

        let shell = hollow.subset(&[cavity]);
        assert_eq!(shell.meshes.len(), 1);
        assert_eq!(shell.num_vertices(), 8);
        assert_relative_eq!(shell.volume(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invert_flips_volume() {
        let mut cube = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        cube.invert();
        assert_relative_eq!(cube.volume(), -1.0, epsilon = 1e-12);
        assert!(cube.meshes[0].is_negative);

        let mesh = &cube.meshes[0];
        for e in mesh.live_edges() {
            let next = mesh.edges[e].next;
            assert_eq!(mesh.edges[next].prev, e);
            let rev = mesh.edges[e].rev.unwrap();
            assert_eq!(mesh.edges[rev].vert, mesh.tail(e));
        }
    }

    #[test]
    fn test_compact_drops_tombstones() {
        let mut cube = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mesh = &mut cube.meshes[0];
        let face_edges: Vec<usize> = mesh.face_edges(0).collect();
        for e in face_edges {
            mesh.kill_edge(e);
        }
        mesh.kill_face(0);
        cube.compact();

        assert_eq!(cube.num_faces(), 11);
        assert_eq!(cube.num_open_edges(), 3);
        assert_eq!(cube.meshes[0].edges.len(), 33);
    }

    #[test]
    fn test_transform() {
        let mut cube = primitives::cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        cube.transform(&Vector3::new(1.0, 0.0, 0.0), 2.0);
        let bbox = cube.bbox();
        assert_relative_eq!(bbox.min.x, 2.0);
        assert_relative_eq!(bbox.max.x, 4.0);
        assert_relative_eq!(cube.volume(), 8.0, epsilon = 1e-9);
    }
}
