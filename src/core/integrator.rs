// Copyright @yucwang 2026

use crate::core::rng::LcgRng;
use crate::core::scene::TraceableScene;
use crate::math::constants::Vector2f;
use crate::math::spectrum::RGBSpectrum;

pub trait Integrator: Send + Sync {
    fn prepare_for_render(&mut self, _scene: &TraceableScene) {}

    fn teardown_after_render(&mut self) {}

    /// Estimate the radiance arriving at the film through `pixel` for one
    /// sample of the pixel's sampler stream.
    fn trace_sample(&self, scene: &TraceableScene, pixel: Vector2f, rng: &mut LcgRng)
        -> RGBSpectrum;

    fn samples_per_pixel(&self) -> u32;
}
