// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh set statistics for reports

use super::MeshSet;
use serde::{Deserialize, Serialize};

/// Geometry statistics and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Signed volume in cubic units
    pub volume: f64,
    /// Total surface area in square units
    pub surface_area: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub face_count: usize,
    /// Number of triangles after fanning every face
    pub triangle_count: usize,
    pub open_edge_count: usize,
    /// No open edges
    pub is_closed: bool,
}

impl MeshStats {
    /// Create empty stats
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: [0.0; 6],
            mesh_count: 0,
            vertex_count: 0,
            face_count: 0,
            triangle_count: 0,
            open_edge_count: 0,
            is_closed: false,
        }
    }

    /// Analyze mesh geometry and compute statistics
    pub fn analyze(mesh_set: &MeshSet) -> Self {
        if mesh_set.is_empty() {
            return Self::empty();
        }
        let bbox = mesh_set.bbox();
        let triangle_count = mesh_set
            .meshes
            .iter()
            .flat_map(|m| m.live_faces().map(move |f| m.faces[f].n_edges.saturating_sub(2)))
            .sum();
        let open_edge_count = mesh_set.num_open_edges();

        Self {
            volume: mesh_set.volume(),
            surface_area: mesh_set.surface_area(),
            bbox: [
                bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z,
            ],
            mesh_count: mesh_set.meshes.len(),
            vertex_count: mesh_set.num_vertices(),
            face_count: mesh_set.num_faces(),
            triangle_count,
            open_edge_count,
            is_closed: open_edge_count == 0,
        }
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.bbox[3] - self.bbox[0],
            self.bbox[4] - self.bbox[1],
            self.bbox[5] - self.bbox[2],
        ]
    }
}

impl std::fmt::Display for MeshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.size();
        writeln!(f, "Volume:        {:>12.6}", self.volume)?;
        writeln!(f, "Surface area:  {:>12.6}", self.surface_area)?;
        writeln!(
            f,
            "Size:          {:.4} x {:.4} x {:.4}",
            size[0], size[1], size[2]
        )?;
        writeln!(f, "Meshes:        {:>12}", self.mesh_count)?;
        writeln!(f, "Vertices:      {:>12}", self.vertex_count)?;
        writeln!(f, "Faces:         {:>12}", self.face_count)?;
        writeln!(f, "Triangles:     {:>12}", self.triangle_count)?;
        write!(
            f,
            "Closed:        {:>12}",
            if self.is_closed {
                "yes".to_string()
            } else {
                format!("NO ({} open)", self.open_edge_count)
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_analyze_cube() {
        let cube = primitives::cuboid_quads(Point3::new(-5.0, -5.0, -5.0), Point3::new(5.0, 5.0, 5.0));
        let stats = MeshStats::analyze(&cube);

        assert_relative_eq!(stats.volume, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(stats.surface_area, 600.0, epsilon = 1e-9);
        assert_eq!(stats.vertex_count, 8);
        assert_eq!(stats.face_count, 6);
        assert_eq!(stats.triangle_count, 12);
        assert!(stats.is_closed);
        assert_eq!(stats.size(), [10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_empty_stats() {
        let stats = MeshStats::analyze(&MeshSet::new());
        assert_eq!(stats, MeshStats::empty());
    }
}
