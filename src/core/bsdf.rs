// Copyright @yucwang 2023

use crate::core::rng::LcgRng;
use crate::math::constants::{ Float, Vector3f };
use crate::math::spectrum::RGBSpectrum;

// All directions are expressed in the local shading frame (+z is the
// shading normal) and point away from the surface.

#[derive(Debug, PartialEq)]
pub struct BsdfSample {
    pub wi: Vector3f,
    pub pdf: Float,
    pub value: RGBSpectrum,
}

pub trait Bsdf: Send + Sync {
    /// Shared resources carry a name; the scene prepares a named BSDF only
    /// once even when several primitives alias it.
    fn name(&self) -> Option<&str> {
        None
    }

    fn prepare_for_render(&self) {}

    fn teardown_after_render(&self) {}

    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> RGBSpectrum;

    /// Solid-angle density of `sample` for the pair (wo, wi).
    fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float;

    fn sample(&self, rng: &mut LcgRng, wo: &Vector3f) -> Option<BsdfSample>;
}
