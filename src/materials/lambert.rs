// Copyright @yucwang 2023

use crate::core::bsdf::{ Bsdf, BsdfSample };
use crate::core::rng::LcgRng;
use crate::math::constants::{ Float, Vector3f, INV_PI };
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf };

pub struct LambertBsdf {
    albedo: RGBSpectrum,
    name: Option<String>,
}

impl LambertBsdf {
    pub fn new(albedo: RGBSpectrum) -> Self {
        Self { albedo, name: None }
    }

    /// Named BSDFs are shared resources; the scene prepares them once.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl Bsdf for LambertBsdf {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> RGBSpectrum {
        if wo.z <= 0.0 || wi.z <= 0.0 {
            return RGBSpectrum::default();
        }
        self.albedo * INV_PI
    }

    fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if wo.z <= 0.0 || wi.z <= 0.0 {
            return 0.0;
        }
        square_to_cosine_hemisphere_pdf(wi.z)
    }

    fn sample(&self, rng: &mut LcgRng, wo: &Vector3f) -> Option<BsdfSample> {
        if wo.z <= 0.0 {
            return None;
        }
        let wi = square_to_cosine_hemisphere(&rng.next_2d());
        if wi.z <= 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi,
            pdf: square_to_cosine_hemisphere_pdf(wi.z),
            value: self.albedo * INV_PI,
        })
    }
}
