// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities for planar polygons in 3D

use nalgebra::{Point2, Point3, Vector3};

/// Newell normal of a polygon loop. Its length is twice the polygon area.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Area of a planar polygon loop
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    newell_normal(points).norm() * 0.5
}

/// Area of a triangle
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}

/// Arithmetic mean of the points, accumulated with Kahan summation
pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let mut sum = Vector3::zeros();
    let mut compensation = Vector3::<f64>::zeros();
    for p in points {
        let y = p.coords - compensation;
        let t = sum + y;
        compensation = (t - sum) - y;
        sum = t;
    }
    Point3::from(sum / points.len() as f64)
}

/// Plane as unit normal and offset, `normal . p == offset` for points on it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub offset: f64,
}

impl Plane {
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        Self { normal, offset }
    }

    /// Best-fit plane through a polygon loop (Newell normal through the centroid).
    /// Returns `None` when the loop has no measurable area.
    pub fn from_polygon(points: &[Point3<f64>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let normal = newell_normal(points);
        let length = normal.norm();
        if length <= 0.0 || !length.is_finite() {
            return None;
        }
        let normal = normal / length;
        let center = centroid(points);
        Some(Self {
            normal,
            offset: normal.dot(&center.coords),
        })
    }

    /// Plane through three points, `None` if collinear
    pub fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let normal = (b - a).cross(&(c - a));
        let length = normal.norm();
        if length <= 0.0 || !length.is_finite() {
            return None;
        }
        let normal = normal / length;
        Some(Self {
            normal,
            offset: normal.dot(&a.coords),
        })
    }

    /// Signed distance of a point to the plane
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    /// Orthogonal projection of a point onto the plane
    pub fn project(&self, p: &Point3<f64>) -> Point3<f64> {
        p - self.normal * self.distance(p)
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }
}

/// Index of the coordinate axis most aligned with the normal
pub fn dominant_axis(normal: &Vector3<f64>) -> usize {
    let ax = normal.x.abs();
    let ay = normal.y.abs();
    let az = normal.z.abs();
    if ax >= ay && ax >= az {
        0
    } else if ay >= az {
        1
    } else {
        2
    }
}

/// Drop the dominant axis of `normal`, keeping the loop counter-clockwise in 2D
pub fn project_to_2d(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    let axis = dominant_axis(normal);
    let (u, v) = match axis {
        0 => (1, 2),
        1 => (2, 0),
        _ => (0, 1),
    };
    let flip = normal[axis] < 0.0;
    points
        .iter()
        .map(|p| {
            if flip {
                Point2::new(p[v], p[u])
            } else {
                Point2::new(p[u], p[v])
            }
        })
        .collect()
}

/// Signed area of a 2D loop, positive for counter-clockwise
pub fn signed_area_2d(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}

/// Direction for ray-parity inside tests, skewed so rays rarely graze
/// shared edges of axis-aligned input
pub fn parity_ray_direction() -> Vector3<f64> {
    Vector3::new(0.577_215_664_9, 0.618_033_988_7, 0.531_049_382_3).normalize()
}

/// Möller-Trumbore ray/triangle test, counting only hits beyond `eps`
pub fn ray_hits_triangle(origin: &Point3<f64>, direction: &Vector3<f64>, triangle: &[Point3<f64>], eps: f64) -> bool {
    const PARALLEL_EPS: f64 = 1e-12;
    let (v0, v1, v2) = (&triangle[0], &triangle[1], &triangle[2]);
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < PARALLEL_EPS {
        return false;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    f * edge2.dot(&q) > eps
}

/// Check if two floats are approximately equal
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Linear interpolation between two points
pub fn lerp_point(a: &Point3<f64>, b: &Point3<f64>, t: f64) -> Point3<f64> {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_newell_normal_and_area() {
        let square = unit_square();
        let normal = newell_normal(&square);
        assert!(approx_eq(normal.z, 2.0, 1e-12));
        assert!(approx_eq(polygon_area(&square), 1.0, 1e-12));
    }

    #[test]
    fn test_plane_from_polygon() {
        let plane = Plane::from_polygon(&unit_square()).unwrap();
        assert!(approx_eq(plane.normal.z, 1.0, 1e-12));
        assert!(approx_eq(plane.distance(&Point3::new(0.3, 0.3, 2.0)), 2.0, 1e-12));
        assert!(Plane::from_polygon(&unit_square()[..2]).is_none());
    }

    #[test]
    fn test_projection_keeps_orientation() {
        let mut square = unit_square();
        let normal = newell_normal(&square);
        assert!(signed_area_2d(&project_to_2d(&square, &normal)) > 0.0);

        square.reverse();
        let normal = newell_normal(&square);
        assert!(signed_area_2d(&project_to_2d(&square, &normal)) > 0.0);
    }

    #[test]
    fn test_ray_hits_triangle_in_front_only() {
        let triangle = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 2.0, 1.0),
        ];
        let up = Vector3::new(0.0, 0.0, 1.0);
        assert!(ray_hits_triangle(&Point3::new(0.5, 0.5, 0.0), &up, &triangle, 0.0));
        assert!(!ray_hits_triangle(&Point3::new(0.5, 0.5, 2.0), &up, &triangle, 0.0));
        assert!(!ray_hits_triangle(&Point3::new(1.5, 1.5, 0.0), &up, &triangle, 0.0));
    }

    #[test]
    fn test_dominant_axis() {
        assert_eq!(dominant_axis(&Vector3::new(0.1, -0.9, 0.2)), 1);
        assert_eq!(dominant_axis(&Vector3::new(0.0, 0.0, -1.0)), 2);
    }
}
