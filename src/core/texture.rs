// Copyright @yucwang 2026

use crate::math::constants::Vector2f;
use crate::math::spectrum::RGBSpectrum;

pub trait Texture: Send + Sync {
    fn eval(&self, uv: Vector2f) -> RGBSpectrum;

    /// Native resolution, used to size importance tables built over this
    /// texture. Procedural textures report a nominal grid.
    fn dimensions(&self) -> (usize, usize) {
        (1, 1)
    }
}
