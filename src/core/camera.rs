// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;
use crate::math::constants::{ Float, Vector2f };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

pub trait Camera: Send + Sync {
    /// Allocate output buffers and derived state for the coming render.
    fn prepare_for_render(&mut self);

    fn teardown_after_render(&mut self) {}

    fn resolution(&self) -> (usize, usize);

    /// Generate a primary ray for a pixel position (in pixel units) and a
    /// lens sample in the unit square.
    fn generate_ray(&self, pixel: Vector2f, lens: Vector2f) -> Ray3f;

    /// World→camera transform, consumed by screen-space binning.
    fn world_to_camera(&self) -> &Transform;

    /// Vertical field of view in radians.
    fn fov_y(&self) -> Float;

    fn bitmap(&self) -> &Bitmap;

    fn bitmap_mut(&mut self) -> &mut Bitmap;
}
