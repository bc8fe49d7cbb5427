// Copyright @yucwang 2026

use crate::core::camera::Camera;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{ Float, Matrix4f, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

pub struct PinholeCamera {
    origin: Vector3f,
    forward: Vector3f,
    right: Vector3f,
    up: Vector3f,
    fov_y: Float,
    tan_half_fov_y: Float,
    aspect: Float,
    world_to_camera: Transform,
    bitmap: Bitmap,
}

impl PinholeCamera {
    pub fn new(origin: Vector3f,
               target: Vector3f,
               up: Vector3f,
               fov_y_radians: Float,
               width: usize,
               height: usize) -> Self {
        let forward = (target - origin).normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward).normalize();

        let mut camera = Self {
            origin,
            forward,
            right,
            up,
            fov_y: fov_y_radians,
            tan_half_fov_y: (0.5 * fov_y_radians).tan(),
            aspect: width as Float / height.max(1) as Float,
            world_to_camera: Transform::default(),
            bitmap: Bitmap::new(width, height),
        };
        camera.bake_view();
        camera
    }

    fn bake_view(&mut self) {
        // Camera space: +x right, +y up, +z forward.
        let mut cam_to_world = Matrix4f::identity();
        for row in 0..3 {
            cam_to_world[(row, 0)] = self.right[row];
            cam_to_world[(row, 1)] = self.up[row];
            cam_to_world[(row, 2)] = self.forward[row];
            cam_to_world[(row, 3)] = self.origin[row];
        }
        let world_to_cam = cam_to_world.try_inverse().unwrap_or_else(Matrix4f::identity);
        self.world_to_camera = Transform::new(world_to_cam);
    }
}

impl Camera for PinholeCamera {
    fn prepare_for_render(&mut self) {
        let (width, height) = (self.bitmap.width(), self.bitmap.height());
        self.bitmap = Bitmap::new(width, height);
        self.bake_view();
    }

    fn resolution(&self) -> (usize, usize) {
        (self.bitmap.width(), self.bitmap.height())
    }

    fn generate_ray(&self, pixel: Vector2f, lens: Vector2f) -> Ray3f {
        let width = self.bitmap.width().max(1) as Float;
        let height = self.bitmap.height().max(1) as Float;
        let u = (pixel.x + lens.x) / width;
        let v = (pixel.y + lens.y) / height;

        let px = (2.0 * u - 1.0) * self.aspect * self.tan_half_fov_y;
        let py = (1.0 - 2.0 * v) * self.tan_half_fov_y;
        let dir = (self.right * px + self.up * py + self.forward).normalize();
        Ray3f::new(self.origin, dir, Some(0.0), None)
    }

    fn world_to_camera(&self) -> &Transform {
        &self.world_to_camera
    }

    fn fov_y(&self) -> Float {
        self.fov_y
    }

    fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    fn bitmap_mut(&mut self) -> &mut Bitmap {
        &mut self.bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinhole_center_ray() {
        let cam = PinholeCamera::new(Vector3f::zeros(),
                                     Vector3f::new(0.0, 0.0, -1.0),
                                     Vector3f::new(0.0, 1.0, 0.0),
                                     std::f32::consts::FRAC_PI_2,
                                     4, 4);
        let ray = cam.generate_ray(Vector2f::new(1.5, 1.5), Vector2f::new(0.5, 0.5));
        let dir = ray.dir();
        assert!(dir.x.abs() < 1e-6);
        assert!(dir.y.abs() < 1e-6);
        assert!((dir.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pinhole_view_transform() {
        let cam = PinholeCamera::new(Vector3f::new(0.0, 0.0, 5.0),
                                     Vector3f::zeros(),
                                     Vector3f::new(0.0, 1.0, 0.0),
                                     std::f32::consts::FRAC_PI_2,
                                     8, 8);
        // The look-at target sits on the +z axis of camera space.
        let target_cam = cam.world_to_camera().apply_point(Vector3f::zeros());
        assert!(target_cam.x.abs() < 1e-5);
        assert!(target_cam.y.abs() < 1e-5);
        assert!((target_cam.z - 5.0).abs() < 1e-5);

        // The camera origin maps to the camera-space origin.
        let origin_cam = cam.world_to_camera().apply_point(Vector3f::new(0.0, 0.0, 5.0));
        assert!(origin_cam.norm() < 1e-5);
    }

    #[test]
    fn test_pinhole_corner_rays_spread_by_fov() {
        let cam = PinholeCamera::new(Vector3f::zeros(),
                                     Vector3f::new(0.0, 0.0, -1.0),
                                     Vector3f::new(0.0, 1.0, 0.0),
                                     std::f32::consts::FRAC_PI_2,
                                     8, 8);
        let left = cam.generate_ray(Vector2f::new(0.0, 3.5), Vector2f::new(0.0, 0.5));
        let right = cam.generate_ray(Vector2f::new(7.0, 3.5), Vector2f::new(1.0, 0.5));
        assert!(left.dir().x < -0.5);
        assert!(right.dir().x > 0.5);
    }
}
