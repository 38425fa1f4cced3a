// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL import and export

use crate::geometry::{MeshSet, PolyhedronBuilder};
use crate::kernel::triangle_polygons;
use anyhow::{Context, Result};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use stl_io::{Normal, Triangle, Vertex};
use tracing::debug;

/// Load an STL file, welding coincident vertices within `eps`
pub fn load_stl(path: impl AsRef<Path>, eps: f64) -> Result<MeshSet> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("Failed to open STL file: {}", path.display()))?;
    read_stl(&mut file, eps).with_context(|| format!("Failed to read STL file: {}", path.display()))
}

pub fn read_stl<R: Read + Seek>(reader: &mut R, eps: f64) -> Result<MeshSet> {
    let stl = stl_io::read_stl(reader).context("Invalid STL data")?;

    let mut builder = PolyhedronBuilder::new(eps);
    let indices: Vec<usize> = stl
        .vertices
        .iter()
        .map(|v| builder.add_point(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64)))
        .collect();
    for face in &stl.faces {
        builder.add_face(&face.vertices.map(|i| indices[i]));
    }

    let mesh_set = builder.build();
    debug!(
        triangles = stl.faces.len(),
        vertices = mesh_set.num_vertices(),
        meshes = mesh_set.meshes.len(),
        "loaded STL"
    );
    Ok(mesh_set)
}

/// Write a mesh set as binary STL
pub fn export_stl(mesh_set: &MeshSet, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create STL file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_stl(mesh_set, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write STL file: {}", path.display()))
}

/// Convex faces are fanned, concave faces ear-clipped
pub fn write_stl<W: Write>(mesh_set: &MeshSet, writer: &mut W) -> Result<()> {
    let to_vertex = |p: &Point3<f64>| Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<Triangle> = triangle_polygons(mesh_set)
        .iter()
        .map(|polygon| {
            let n = polygon.plane.normal;
            Triangle {
                normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [
                    to_vertex(&polygon.points[0]),
                    to_vertex(&polygon.points[1]),
                    to_vertex(&polygon.points[2]),
                ],
            }
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter()).context("STL export error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn test_round_trip_through_buffer() -> Result<()> {
        let cube = primitives::cuboid_quads(Point3::origin(), Point3::new(2.0, 1.0, 1.0));
        let mut buffer = Cursor::new(Vec::new());
        write_stl(&cube, &mut buffer)?;

        buffer.set_position(0);
        let loaded = read_stl(&mut buffer, 1e-6)?;
        assert_eq!(loaded.num_vertices(), 8);
        assert_eq!(loaded.num_faces(), 12);
        assert_eq!(loaded.num_open_edges(), 0);
        assert_relative_eq!(loaded.volume(), 2.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_stl("/nonexistent/part.stl", 1e-6).unwrap_err();
        assert!(err.to_string().contains("Failed to open STL file"));
    }
}
