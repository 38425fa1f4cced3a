// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator

use super::{MeshSet, PolyhedronBuilder};
use nalgebra::{Point2, Point3};
use std::f64::consts::PI;

const WELD_EPS: f64 = 1e-9;

/// Closed solids used as boolean operands
#[derive(Debug, Clone)]
pub enum Primitive {
    /// Axis-aligned box, twelve triangles or six quads
    Cuboid {
        min: Point3<f64>,
        max: Point3<f64>,
        triangulate: bool,
    },
    /// Counter-clockwise profile extruded along z
    Prism {
        profile: Vec<Point2<f64>>,
        z0: f64,
        z1: f64,
    },
    /// Regular polygonal cylinder along z with n-gon caps
    Cylinder {
        center: Point3<f64>,
        radius: f64,
        height: f64,
        segments: usize,
    },
}

impl Primitive {
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self::Cuboid {
            min,
            max,
            triangulate: true,
        }
    }

    pub fn cylinder(center: Point3<f64>, radius: f64, height: f64, segments: usize) -> Self {
        Self::Cylinder {
            center,
            radius,
            height,
            segments: segments.max(3),
        }
    }

    pub fn to_mesh_set(&self) -> MeshSet {
        match self {
            Self::Cuboid {
                min,
                max,
                triangulate,
            } => generate_cuboid(min, max, *triangulate),
            Self::Prism { profile, z0, z1 } => generate_prism(profile, *z0, *z1),
            Self::Cylinder {
                center,
                radius,
                height,
                segments,
            } => {
                let profile: Vec<Point2<f64>> = (0..*segments)
                    .map(|i| {
                        let angle = 2.0 * PI * i as f64 / *segments as f64;
                        Point2::new(
                            center.x + radius * angle.cos(),
                            center.y + radius * angle.sin(),
                        )
                    })
                    .collect();
                generate_prism(&profile, center.z, center.z + height)
            }
        }
    }
}

/// Triangulated axis-aligned box
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> MeshSet {
    generate_cuboid(&min, &max, true)
}

/// Axis-aligned box with one quad per side
pub fn cuboid_quads(min: Point3<f64>, max: Point3<f64>) -> MeshSet {
    generate_cuboid(&min, &max, false)
}

fn cuboid_corners(min: &Point3<f64>, max: &Point3<f64>) -> [Point3<f64>; 8] {
    [
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ]
}

/// Outward-facing side quads of a box, indices into [`cuboid_corners`]
pub(crate) const CUBOID_SIDES: [[usize; 4]; 6] = [
    [0, 3, 2, 1], // bottom
    [4, 5, 6, 7], // top
    [0, 1, 5, 4], // front
    [2, 3, 7, 6], // back
    [0, 4, 7, 3], // left
    [1, 2, 6, 5], // right
];

fn generate_cuboid(min: &Point3<f64>, max: &Point3<f64>, triangulate: bool) -> MeshSet {
    let corners = cuboid_corners(min, max);
    let mut builder = PolyhedronBuilder::new(WELD_EPS);
    let ids: Vec<usize> = corners.iter().map(|p| builder.add_point(*p)).collect();

    for side in CUBOID_SIDES.iter() {
        let [a, b, c, d] = side.map(|i| ids[i]);
        if triangulate {
            builder.add_face(&[a, b, c]);
            builder.add_face(&[a, c, d]);
        } else {
            builder.add_face(&[a, b, c, d]);
        }
    }
    builder.build()
}

fn generate_prism(profile: &[Point2<f64>], z0: f64, z1: f64) -> MeshSet {
    let n = profile.len();
    let mut builder = PolyhedronBuilder::new(WELD_EPS);
    if n < 3 {
        return builder.build();
    }
    let bottom: Vec<usize> = profile
        .iter()
        .map(|p| builder.add_point(Point3::new(p.x, p.y, z0)))
        .collect();
    let top: Vec<usize> = profile
        .iter()
        .map(|p| builder.add_point(Point3::new(p.x, p.y, z1)))
        .collect();

    let reversed: Vec<usize> = bottom.iter().rev().copied().collect();
    builder.add_face(&reversed);
    builder.add_face(&top);
    for i in 0..n {
        let j = (i + 1) % n;
        builder.add_face(&[bottom[i], bottom[j], top[j], top[i]]);
    }
    builder.build()
}
