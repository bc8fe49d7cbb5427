// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Matrix4f, Quaternionf, Vector3f };
use super::ray::Ray3f;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or_else(Matrix4f::identity) }
    }

    pub fn translate(offset: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&offset))
    }

    pub fn scale(factors: Vector3f) -> Self {
        Self::new(Matrix4f::new_nonuniform_scaling(&factors))
    }

    pub fn rotate(rotation: Quaternionf) -> Self {
        Self::new(rotation.to_homogeneous())
    }

    /// Rigid transform from a per-instance translation + unit quaternion.
    pub fn from_parts(translation: Vector3f, rotation: Quaternionf) -> Self {
        Self::new(Matrix4f::new_translation(&translation) * rotation.to_homogeneous())
    }

    pub fn compose(&self, inner: &Transform) -> Self {
        Self::new(self.matrix * inner.matrix)
    }

    pub fn matrix(&self) -> &Matrix4f {
        &self.matrix
    }

    /// Largest singular axis scale of the linear part. Conservative radius
    /// factor for transformed bounding spheres.
    pub fn max_scale(&self) -> Float {
        let mut largest: Float = 0.0;
        for col in 0..3 {
            let len = Vector3f::new(self.matrix[(0, col)],
                                    self.matrix[(1, col)],
                                    self.matrix[(2, col)]).norm();
            largest = largest.max(len);
        }
        largest
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        Self::transform_point(&self.matrix, p)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        Self::transform_vector(&self.matrix, v)
    }

    // Normal transformation is different from point transformation.
    // Before transformation, we have n^Tx = 0
    // After transformation, we have (Sn)^T(Mx) = 0
    // Then, we will get: S = (M^{-1})^T
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        Self::transform_vector(&self.inv_matrix.transpose(), n)
    }

    pub fn apply_ray(&self, ray: &Ray3f) -> Ray3f {
        Ray3f::new(self.apply_point(ray.origin()),
                   self.apply_vector(ray.dir()),
                   Some(ray.min_t), Some(ray.max_t))
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        Self::transform_point(&self.inv_matrix, p)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        Self::transform_vector(&self.inv_matrix, v)
    }

    pub fn inv_apply_normal(&self, n: Vector3f) -> Vector3f {
        Self::transform_vector(&self.matrix.transpose(), n)
    }

    pub fn inv_apply_ray(&self, ray: &Ray3f) -> Ray3f {
        Ray3f::new(self.inv_apply_point(ray.origin()),
                   self.inv_apply_vector(ray.dir()),
                   Some(ray.min_t), Some(ray.max_t))
    }

    fn transform_point(m: &Matrix4f, p: Vector3f) -> Vector3f {
        let x = p[0] * m[(0, 0)] + p[1] * m[(0, 1)] + p[2] * m[(0, 2)] + m[(0, 3)];
        let y = p[0] * m[(1, 0)] + p[1] * m[(1, 1)] + p[2] * m[(1, 2)] + m[(1, 3)];
        let z = p[0] * m[(2, 0)] + p[1] * m[(2, 1)] + p[2] * m[(2, 2)] + m[(2, 3)];
        let w = p[0] * m[(3, 0)] + p[1] * m[(3, 1)] + p[2] * m[(3, 2)] + m[(3, 3)];

        Vector3f::new(x / w, y / w, z / w)
    }

    fn transform_vector(m: &Matrix4f, v: Vector3f) -> Vector3f {
        let x = v[0] * m[(0, 0)] + v[1] * m[(0, 1)] + v[2] * m[(0, 2)];
        let y = v[0] * m[(1, 0)] + v[1] * m[(1, 1)] + v[2] * m[(1, 2)];
        let z = v[0] * m[(2, 0)] + v[1] * m[(2, 1)] + v[2] * m[(2, 2)];

        Vector3f::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::PI;

    #[test]
    fn test_transform_point_round_trip() {
        let t = Transform::translate(Vector3f::new(1.0, -2.0, 3.0))
            .compose(&Transform::scale(Vector3f::new(2.0, 2.0, 2.0)));
        let p = Vector3f::new(0.5, 0.5, 0.5);
        let p_world = t.apply_point(p);
        assert!((p_world - Vector3f::new(2.0, -1.0, 4.0)).norm() < 1e-5);
        assert!((t.inv_apply_point(p_world) - p).norm() < 1e-5);
    }

    #[test]
    fn test_transform_normal_is_not_vector() {
        // Nonuniform scale: the normal of a plane must be transformed by
        // the inverse transpose to stay perpendicular.
        let t = Transform::scale(Vector3f::new(2.0, 1.0, 1.0));
        let surface_dir = t.apply_vector(Vector3f::new(1.0, 1.0, 0.0));
        let n = t.apply_normal(Vector3f::new(1.0, -1.0, 0.0));
        assert!(n.dot(&surface_dir).abs() < 1e-5);
    }

    #[test]
    fn test_transform_from_parts() {
        let rot = Quaternionf::from_axis_angle(&nalgebra::Unit::new_normalize(
            Vector3f::new(0.0, 1.0, 0.0)), 0.5 * PI);
        let t = Transform::from_parts(Vector3f::new(10.0, 0.0, 0.0), rot);
        let p = t.apply_point(Vector3f::new(1.0, 0.0, 0.0));
        assert!((p - Vector3f::new(10.0, 0.0, -1.0)).norm() < 1e-4);
        assert!((t.max_scale() - 1.0).abs() < 1e-4);
    }
}
