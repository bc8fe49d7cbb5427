// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector2f, Vector3f, FLOAT_MAX };
use crate::math::spectrum::RGBSpectrum;

/// A point on an emitter's surface. `pdf` is in area measure; `weight`
/// carries the unweighted emission so MIS combination stays at the call
/// site.
pub struct PositionSample {
    pub p: Vector3f,
    pub ng: Vector3f,
    pub uv: Vector2f,
    pub pdf: Float,
    pub weight: RGBSpectrum,
}

impl Default for PositionSample {
    fn default() -> Self {
        Self {
            p: Vector3f::zeros(),
            ng: Vector3f::new(0.0, 0.0, 1.0),
            uv: Vector2f::new(0.0, 0.0),
            pdf: 0.0,
            weight: RGBSpectrum::default(),
        }
    }
}

impl PositionSample {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An outgoing direction at a previously sampled position. `pdf` is in
/// solid-angle measure.
pub struct DirectionSample {
    pub d: Vector3f,
    pub pdf: Float,
    pub weight: RGBSpectrum,
}

impl Default for DirectionSample {
    fn default() -> Self {
        Self {
            d: Vector3f::new(0.0, 0.0, 1.0),
            pdf: 0.0,
            weight: RGBSpectrum::default(),
        }
    }
}

impl DirectionSample {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A next-event-estimation sample: a direction from the shading point `p`
/// toward an emitter, its distance, solid-angle pdf, and unweighted
/// radiance. Callers fill `p` before sampling and must check the sampling
/// function's return value before reading `pdf`/`weight`.
pub struct LightSample {
    pub p: Vector3f,
    pub d: Vector3f,
    pub dist: Float,
    pub pdf: Float,
    pub weight: RGBSpectrum,
}

impl Default for LightSample {
    fn default() -> Self {
        Self {
            p: Vector3f::zeros(),
            d: Vector3f::new(0.0, 0.0, 1.0),
            dist: FLOAT_MAX,
            pdf: 0.0,
            weight: RGBSpectrum::default(),
        }
    }
}

impl LightSample {
    pub fn at(p: Vector3f) -> Self {
        Self { p, ..Self::default() }
    }
}
