// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Re-triangulation of polygonal faces

use super::validator::{is_better_for_bool_op, MeshValidator, ValidationParams};
use crate::error::CsgResult;
use crate::geometry::{MeshSet, PolyhedronBuilder};
use crate::kernel::ear_clip;
use crate::utils::math;
use tracing::{debug, trace};

/// Triangle corners closer than this are treated as duplicates
const MIN_VERTEX_DISTANCE: f64 = 1e-7;

/// Splits every face into triangles with ear clipping
#[derive(Debug, Clone, Copy)]
pub struct Retriangulator {
    validation: ValidationParams,
}

impl Retriangulator {
    pub fn new(validation: ValidationParams) -> Self {
        Self { validation }
    }

    /// Triangulate in place. Returns whether the set was replaced.
    ///
    /// The triangulated set is kept when it compares better than the
    /// original, when it is valid, or when `ignore_open_edges` is set.
    pub fn triangulate(&self, mesh_set: &mut MeshSet, ignore_open_edges: bool) -> CsgResult<bool> {
        let validator = MeshValidator::new(self.validation);
        let before = validator.check(mesh_set);
        if mesh_set.is_triangulated() && before.mesh_set_valid {
            return Ok(false);
        }

        let mut triangulated = self.split_faces(mesh_set);
        let after = validator.check(&mut triangulated);

        let accept = is_better_for_bool_op(&after, &before, true) || after.mesh_set_valid || ignore_open_edges;
        debug!(
            accept,
            faces_before = before.num_faces,
            faces_after = after.num_faces,
            valid = after.mesh_set_valid,
            "re-triangulated mesh set"
        );
        if accept {
            *mesh_set = triangulated;
        }
        Ok(accept)
    }

    fn split_faces(&self, mesh_set: &MeshSet) -> MeshSet {
        let mut builder = PolyhedronBuilder::new(MIN_VERTEX_DISTANCE * 1e-3);
        let ids: Vec<usize> = mesh_set
            .vertices
            .iter()
            .map(|p| builder.add_point(*p))
            .collect();

        for mesh in &mesh_set.meshes {
            for face in mesh.live_faces() {
                let corners = mesh.face_vertices(face);
                let points = mesh.face_points(face, &mesh_set.vertices);
                let triangles = if corners.len() == 3 {
                    vec![[0, 1, 2]]
                } else {
                    let normal = math::newell_normal(&points);
                    if normal.norm_squared() == 0.0 {
                        trace!(face, "skipping face without area");
                        continue;
                    }
                    match ear_clip(&math::project_to_2d(&points, &normal)) {
                        Ok(triangles) => triangles,
                        Err(err) => {
                            trace!(face, %err, "ear clipping failed");
                            continue;
                        }
                    }
                };

                for [a, b, c] in triangles {
                    let (va, vb, vc) = (corners[a], corners[b], corners[c]);
                    if self.is_degenerate(&mesh_set.vertices, va, vb, vc) {
                        continue;
                    }
                    builder.add_face(&[ids[va], ids[vb], ids[vc]]);
                }
            }
        }

        let mut triangulated = builder.build();
        triangulated.normalized_by = mesh_set.normalized_by;
        triangulated
    }

    fn is_degenerate(&self, vertices: &[nalgebra::Point3<f64>], a: usize, b: usize, c: usize) -> bool {
        if a == b || b == c || a == c {
            return true;
        }
        let (pa, pb, pc) = (&vertices[a], &vertices[b], &vertices[c]);
        if (pa - pb).norm() < MIN_VERTEX_DISTANCE
            || (pb - pc).norm() < MIN_VERTEX_DISTANCE
            || (pa - pc).norm() < MIN_VERTEX_DISTANCE
        {
            return true;
        }
        math::triangle_area(pa, pb, pc) < self.validation.min_face_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeomSettings;
    use crate::geometry::primitives::{self, Primitive};
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Point3};

    fn retriangulator() -> Retriangulator {
        Retriangulator::new(ValidationParams::new(&GeomSettings::default(), 1e-7))
    }

    #[test]
    fn test_quads_become_triangles() {
        let mut cube = primitives::cuboid_quads(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(retriangulator().triangulate(&mut cube, false).unwrap());
        assert!(cube.is_triangulated());
        assert_eq!(cube.num_faces(), 12);
        assert_eq!(cube.num_open_edges(), 0);
        assert_relative_eq!(cube.volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_triangulation_is_idempotent() {
        let mut prism = Primitive::Prism {
            profile: vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 1.0),
                Point2::new(1.0, 1.0),
                Point2::new(1.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            z0: 0.0,
            z1: 1.0,
        }
        .to_mesh_set();
        retriangulator().triangulate(&mut prism, false).unwrap();
        let first = prism.num_faces();
        assert_eq!(first, 4 + 4 + 12);

        assert!(!retriangulator().triangulate(&mut prism, false).unwrap());
        assert_eq!(prism.num_faces(), first);
        assert_relative_eq!(prism.volume(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_open_result_kept_only_when_allowed() {
        // Quad cube without its top: the result stays open and so is not valid
        let mut open = primitives::cuboid_quads(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mesh = &mut open.meshes[0];
        let top = mesh
            .live_faces()
            .find(|&f| mesh.faces[f].plane.normal.z > 0.5)
            .unwrap();
        let edges: Vec<usize> = mesh.face_edges(top).collect();
        for e in edges {
            mesh.kill_edge(e);
        }
        mesh.kill_face(top);
        open.compact();

        let mut strict = open.clone();
        assert!(!retriangulator().triangulate(&mut strict, false).unwrap());
        assert_eq!(strict.num_faces(), 5);

        let mut relaxed = open.clone();
        assert!(retriangulator().triangulate(&mut relaxed, true).unwrap());
        assert!(relaxed.is_triangulated());
        assert_eq!(relaxed.num_faces(), 10);
    }
}
