// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon soup to half-edge [`MeshSet`] conversion
//!
//! Points are welded through a hash grid with cell size `eps`, so two
//! points closer than `eps` always land in neighbouring cells.
//! Half-edges are paired by `(tail, head)` lookup; an edge used more than
//! once in the same direction is non-manifold and stays open.

use super::halfedge::{Face, HalfEdge, Mesh, MeshSet};
use crate::utils::math::Plane;
use ahash::AHashMap;
use nalgebra::{Point3, Vector3};

type CellKey = (i64, i64, i64);

/// Accumulates welded points and face loops, then builds a [`MeshSet`]
#[derive(Debug, Clone)]
pub struct PolyhedronBuilder {
    eps: f64,
    points: Vec<Point3<f64>>,
    grid: AHashMap<CellKey, Vec<usize>>,
    faces: Vec<Vec<usize>>,
    repair_t_junctions: bool,
}

impl PolyhedronBuilder {
    pub fn new(eps: f64) -> Self {
        Self {
            eps: if eps > 0.0 { eps } else { f64::EPSILON },
            points: Vec::new(),
            grid: AHashMap::new(),
            faces: Vec::new(),
            repair_t_junctions: false,
        }
    }

    /// Split face edges at welded points lying on them
    pub fn with_t_junction_repair(mut self) -> Self {
        self.repair_t_junctions = true;
        self
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    fn cell(&self, p: &Point3<f64>) -> CellKey {
        (
            (p.x / self.eps).floor() as i64,
            (p.y / self.eps).floor() as i64,
            (p.z / self.eps).floor() as i64,
        )
    }

    /// Add a point, returning the index of an existing point within `eps` if any
    pub fn add_point(&mut self, p: Point3<f64>) -> usize {
        let (cx, cy, cz) = self.cell(&p);
        let eps2 = self.eps * self.eps;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = (cx + dx, cy + dy, cz + dz);
                    if let Some(bucket) = self.grid.get(&key) {
                        for &idx in bucket {
                            if (self.points[idx] - p).norm_squared() <= eps2 {
                                return idx;
                            }
                        }
                    }
                }
            }
        }
        let idx = self.points.len();
        self.points.push(p);
        self.grid.entry((cx, cy, cz)).or_default().push(idx);
        idx
    }

    /// Add a face loop of point indices. Consecutive duplicates are removed;
    /// returns `false` if fewer than three distinct vertices remain.
    pub fn add_face(&mut self, indices: &[usize]) -> bool {
        match clean_loop(indices) {
            Some(face) => {
                self.faces.push(face);
                true
            }
            None => false,
        }
    }

    /// Add a polygon given by its corner points
    pub fn add_polygon(&mut self, points: &[Point3<f64>]) -> bool {
        let indices: Vec<usize> = points.iter().map(|p| self.add_point(*p)).collect();
        self.add_face(&indices)
    }

    /// Build the half-edge structure
    pub fn build(self) -> MeshSet {
        let PolyhedronBuilder {
            eps,
            points,
            faces,
            repair_t_junctions,
            ..
        } = self;

        let faces = if repair_t_junctions {
            split_t_junctions(&points, faces, eps)
        } else {
            faces
        };

        let (edges, face_heads) = link_faces(&faces);
        let components = face_components(&edges, &face_heads, faces.len());

        let mut mesh_set = MeshSet {
            vertices: points,
            meshes: Vec::with_capacity(components.len()),
            normalized_by: None,
        };
        for component in components {
            mesh_set
                .meshes
                .push(extract_mesh(&edges, &faces, &face_heads, &component));
        }
        mesh_set.collect_vertices();
        mesh_set.update_planes();
        mesh_set
    }
}

/// Convenience: weld and build from point loops
impl MeshSet {
    pub fn from_polygons(polygons: &[Vec<Point3<f64>>], eps: f64) -> MeshSet {
        let mut builder = PolyhedronBuilder::new(eps);
        for polygon in polygons {
            builder.add_polygon(polygon);
        }
        builder.build()
    }
}

fn clean_loop(indices: &[usize]) -> Option<Vec<usize>> {
    let mut face: Vec<usize> = Vec::with_capacity(indices.len());
    for &idx in indices {
        if face.last() != Some(&idx) {
            face.push(idx);
        }
    }
    while face.len() > 1 && face.first() == face.last() {
        face.pop();
    }
    if face.len() < 3 {
        return None;
    }
    Some(face)
}

fn split_t_junctions(points: &[Point3<f64>], faces: Vec<Vec<usize>>, eps: f64) -> Vec<Vec<usize>> {
    let mut used = vec![false; points.len()];
    for face in &faces {
        for &v in face {
            used[v] = true;
        }
    }
    let mut by_x: Vec<usize> = (0..points.len()).filter(|&i| used[i]).collect();
    by_x.sort_by(|&a, &b| points[a].x.total_cmp(&points[b].x));

    let mut result = Vec::with_capacity(faces.len());
    for face in faces {
        let n = face.len();
        let mut expanded = Vec::with_capacity(n);
        for i in 0..n {
            let a = face[i];
            let b = face[(i + 1) % n];
            expanded.push(a);

            let pa = points[a];
            let pb = points[b];
            let dir = pb - pa;
            let len2 = dir.norm_squared();
            if len2 <= eps * eps {
                continue;
            }
            let lo = pa.x.min(pb.x) - eps;
            let hi = pa.x.max(pb.x) + eps;
            let start = by_x.partition_point(|&v| points[v].x < lo);

            let mut on_edge: Vec<(f64, usize)> = Vec::new();
            for &v in by_x[start..].iter().take_while(|&&v| points[v].x <= hi) {
                if v == a || v == b || face.contains(&v) {
                    continue;
                }
                let t = (points[v] - pa).dot(&dir) / len2;
                let t_eps = eps / len2.sqrt();
                if t <= t_eps || t >= 1.0 - t_eps {
                    continue;
                }
                let foot = pa + dir * t;
                if (points[v] - foot).norm_squared() <= eps * eps {
                    on_edge.push((t, v));
                }
            }
            on_edge.sort_by(|x, y| x.0.total_cmp(&y.0));
            on_edge.dedup_by_key(|entry| entry.1);
            expanded.extend(on_edge.into_iter().map(|(_, v)| v));
        }
        if let Some(face) = clean_loop(&expanded) {
            result.push(face);
        }
    }
    result
}

/// Create global half-edges for every face and pair reverses.
/// Returns the edges and the first edge of each face.
fn link_faces(faces: &[Vec<usize>]) -> (Vec<HalfEdge>, Vec<usize>) {
    let total: usize = faces.iter().map(Vec::len).sum();
    let mut edges = Vec::with_capacity(total);
    let mut face_heads = Vec::with_capacity(faces.len());

    for (f, face) in faces.iter().enumerate() {
        let base = edges.len();
        let n = face.len();
        face_heads.push(base);
        for i in 0..n {
            edges.push(HalfEdge {
                next: base + (i + 1) % n,
                prev: base + (i + n - 1) % n,
                rev: None,
                vert: face[(i + 1) % n],
                face: Some(f),
            });
        }
    }

    let mut directed: AHashMap<(usize, usize), Vec<usize>> = AHashMap::with_capacity(total);
    for (i, edge) in edges.iter().enumerate() {
        let tail = edges[edge.prev].vert;
        directed.entry((tail, edge.vert)).or_default().push(i);
    }
    for i in 0..edges.len() {
        let tail = edges[edges[i].prev].vert;
        let head = edges[i].vert;
        if tail >= head {
            continue;
        }
        let forward = directed.get(&(tail, head));
        let backward = directed.get(&(head, tail));
        if let (Some(forward), Some(backward)) = (forward, backward) {
            if forward.len() == 1 && backward.len() == 1 {
                let r = backward[0];
                edges[i].rev = Some(r);
                edges[r].rev = Some(i);
            }
        }
    }
    (edges, face_heads)
}

/// Group faces into connected components across paired edges
fn face_components(edges: &[HalfEdge], face_heads: &[usize], n_faces: usize) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..n_faces).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for edge in edges {
        if let (Some(rev), Some(f)) = (edge.rev, edge.face) {
            if let Some(g) = edges[rev].face {
                let a = find(&mut parent, f);
                let b = find(&mut parent, g);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut groups: AHashMap<usize, usize> = AHashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for f in 0..face_heads.len() {
        let root = find(&mut parent, f);
        let slot = *groups.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(f);
    }
    components
}

fn extract_mesh(
    edges: &[HalfEdge],
    faces: &[Vec<usize>],
    face_heads: &[usize],
    component: &[usize],
) -> Mesh {
    let mut edge_map: AHashMap<usize, usize> = AHashMap::new();
    let mut mesh = Mesh::new();

    for (local_face, &f) in component.iter().enumerate() {
        let head = face_heads[f];
        let n = faces[f].len();
        for k in 0..n {
            edge_map.insert(head + k, mesh.edges.len() + k);
        }
        for k in 0..n {
            let mut edge = edges[head + k];
            edge.face = Some(local_face);
            mesh.edges.push(edge);
        }
        mesh.faces.push(Face {
            edge: Some(mesh.edges.len() - n),
            n_edges: n,
            plane: Plane::new(Vector3::zeros(), 0.0),
        });
    }
    for edge in mesh.edges.iter_mut() {
        edge.next = edge_map[&edge.next];
        edge.prev = edge_map[&edge.prev];
        edge.rev = edge.rev.and_then(|r| edge_map.get(&r).copied());
    }
    mesh.cache_edges();
    mesh
}
