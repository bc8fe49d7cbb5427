// Copyright @yucwang 2023

use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector3f };
use crate::math::ray::Ray3f;

/// A hit on a single triangle: distance plus the barycentric weights of
/// vertices 1 and 2, and whether the ray arrived from the back face.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub t: Float,
    pub u: Float,
    pub v: Float,
    pub backside: bool,
}

/// Bare triangle math shared by the mesh-backed primitives. Carries no
/// material or emission state of its own.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub p0: Vector3f,
    pub p1: Vector3f,
    pub p2: Vector3f,
}

impl Triangle {
    pub fn new(p0: Vector3f, p1: Vector3f, p2: Vector3f) -> Self {
        Self { p0, p1, p2 }
    }

    pub fn bounding_box(&self) -> AABB {
        let mut bound = AABB::new(self.p0, self.p1);
        bound.expand_by_point(&self.p2);
        bound
    }

    pub fn geometric_normal(&self) -> Vector3f {
        let n = (self.p1 - self.p0).cross(&(self.p2 - self.p0));
        let len = n.norm();
        if len > 0.0 {
            n / len
        } else {
            Vector3f::new(0.0, 0.0, 1.0)
        }
    }

    pub fn surface_area(&self) -> Float {
        0.5 * (self.p1 - self.p0).cross(&(self.p2 - self.p0)).norm()
    }

    pub fn point_from_barycentric(&self, u: Float, v: Float) -> Vector3f {
        self.p0 * (1.0 - u - v) + self.p1 * u + self.p2 * v
    }

    /// Moeller-Trumbore intersection against the ray's active interval.
    pub fn intersect(&self, ray: &Ray3f) -> Option<TriangleHit> {
        let edge1 = self.p1 - self.p0;
        let edge2 = self.p2 - self.p0;

        let pvec = ray.dir().cross(&edge2);
        let det = edge1.dot(&pvec);
        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;
        let tvec = ray.origin() - self.p0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&edge1);
        let v = ray.dir().dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&qvec) * inv_det;
        if !ray.test_segment(t) {
            return None;
        }

        Some(TriangleHit { t, u, v, backside: det < 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_triangle() -> Triangle {
        Triangle::new(Vector3f::new(0.0, 0.0, 0.0),
                      Vector3f::new(1.0, 0.0, 0.0),
                      Vector3f::new(0.0, 1.0, 0.0))
    }

    #[test]
    fn test_triangle_bounding_box() {
        let tri = Triangle::new(Vector3f::new(1.0, 1.0, 1.0),
                                Vector3f::new(1.5, 4.0, -1.0),
                                Vector3f::new(-1.0, 2.0, 2.5));
        let bound = tri.bounding_box();
        assert_eq!(bound.p_min, Vector3f::new(-1.0, 1.0, -1.0));
        assert_eq!(bound.p_max, Vector3f::new(1.5, 4.0, 2.5));
    }

    #[test]
    fn test_triangle_hit_and_barycentrics() {
        let tri = xy_triangle();
        let ray = Ray3f::new(Vector3f::new(0.25, 0.25, 2.0),
                             Vector3f::new(0.0, 0.0, -1.0), None, None);
        let hit = tri.intersect(&ray).expect("inside the triangle");
        assert!((hit.t - 2.0).abs() < 1e-5);
        assert!((hit.u - 0.25).abs() < 1e-5);
        assert!((hit.v - 0.25).abs() < 1e-5);
        let p = tri.point_from_barycentric(hit.u, hit.v);
        assert!((p - Vector3f::new(0.25, 0.25, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_triangle_edge_and_outside() {
        let tri = xy_triangle();
        let outside = Ray3f::new(Vector3f::new(0.75, 0.75, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(tri.intersect(&outside).is_none());

        let behind = Ray3f::new(Vector3f::new(0.25, 0.25, 2.0),
                                Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(tri.intersect(&behind).is_none());
    }

    #[test]
    fn test_triangle_backside_flag() {
        let tri = xy_triangle();
        let front = Ray3f::new(Vector3f::new(0.25, 0.25, 2.0),
                               Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(!tri.intersect(&front).unwrap().backside);

        let back = Ray3f::new(Vector3f::new(0.25, 0.25, -2.0),
                              Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(back.dir().z > 0.0);
        assert!(tri.intersect(&back).unwrap().backside);
    }

    #[test]
    fn test_degenerate_triangle_never_hits() {
        let tri = Triangle::new(Vector3f::zeros(), Vector3f::zeros(),
                                Vector3f::new(1.0, 0.0, 0.0));
        let ray = Ray3f::new(Vector3f::new(0.2, 0.0, 1.0),
                             Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(tri.intersect(&ray).is_none());
    }
}
