// Copyright @yucwang 2026

use crate::core::medium::Medium;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector3f };
use crate::math::spectrum::RGBSpectrum;

pub struct HomogeneousMedium {
    sigma_t: RGBSpectrum,
    albedo: RGBSpectrum,
    scale: Float,
    bbox: Option<AABB>,
}

impl HomogeneousMedium {
    pub fn new(sigma_t: RGBSpectrum, albedo: RGBSpectrum) -> Self {
        Self { sigma_t, albedo, scale: 1.0, bbox: None }
    }

    pub fn with_scale(mut self, scale: Float) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_bbox(mut self, bbox: Option<AABB>) -> Self {
        self.bbox = bbox;
        self
    }
}

impl Medium for HomogeneousMedium {
    fn sigma_t(&self, _p_world: Vector3f) -> RGBSpectrum {
        self.sigma_t * self.scale
    }

    fn albedo(&self, _p_world: Vector3f) -> RGBSpectrum {
        RGBSpectrum::new(self.albedo[0].clamp(0.0, 1.0),
                         self.albedo[1].clamp(0.0, 1.0),
                         self.albedo[2].clamp(0.0, 1.0))
    }

    fn bbox(&self) -> Option<AABB> {
        self.bbox
    }
}
