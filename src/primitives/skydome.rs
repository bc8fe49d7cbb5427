// Copyright @yucwang 2026

use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::build_tangent_frame;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, INV_PI, PI, TWO_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf,
                         square_to_uniform_disk_concentric };

/// Procedural sky: a horizon-to-zenith gradient plus a sun glow lobe,
/// covering the upper hemisphere (+z up). Rays below the horizon miss.
/// Inbound sampling is cosine-weighted over the hemisphere, which keeps
/// the generator/density pair exact without matching the sun term.
pub struct Skydome {
    zenith: RGBSpectrum,
    horizon: RGBSpectrum,
    sun_dir: Vector3f,
    sun_emission: RGBSpectrum,
    sun_sharpness: Float,
    scene_center: Vector3f,
    scene_radius: Float,
}

impl Skydome {
    pub fn new(zenith: RGBSpectrum, horizon: RGBSpectrum) -> Self {
        Self {
            zenith,
            horizon,
            sun_dir: Vector3f::new(0.0, 0.0, 1.0),
            sun_emission: RGBSpectrum::default(),
            sun_sharpness: 200.0,
            scene_center: Vector3f::zeros(),
            scene_radius: 1.0,
        }
    }

    pub fn with_sun(mut self, sun_dir: Vector3f, sun_emission: RGBSpectrum,
                    sun_sharpness: Float) -> Self {
        let len = sun_dir.norm();
        self.sun_dir = if len > 0.0 { sun_dir / len } else { Vector3f::new(0.0, 0.0, 1.0) };
        self.sun_emission = sun_emission;
        self.sun_sharpness = sun_sharpness.max(1.0);
        self
    }

    fn radiance(&self, d: &Vector3f) -> RGBSpectrum {
        if d.z < 0.0 {
            return RGBSpectrum::default();
        }
        let t = d.z.clamp(0.0, 1.0);
        let sky = self.horizon * (1.0 - t) + self.zenith * t;
        let sun_cos = d.dot(&self.sun_dir).max(0.0);
        sky + self.sun_emission * sun_cos.powf(self.sun_sharpness)
    }

    fn dome_uv(d: &Vector3f) -> Vector2f {
        let mut phi = d.y.atan2(d.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        let theta = d.z.clamp(-1.0, 1.0).acos();
        Vector2f::new(phi / TWO_PI, (2.0 * theta / PI).min(1.0))
    }

    fn far_distance(&self) -> Float {
        2.0 * self.scene_radius.max(1.0)
    }
}

impl Primitive for Skydome {
    fn type_name(&self) -> &'static str {
        "skydome"
    }

    fn prepare_for_render(&mut self) {}

    fn bounds(&self) -> AABB {
        AABB::default()
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        if ray.dir().z < 0.0 {
            return false;
        }
        data.payload = IntersectionPayload::Infinite { d: ray.dir() };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        ray.dir().z >= 0.0
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let d = match data.payload {
            IntersectionPayload::Infinite { d } => d,
            _ => panic!("skydome expansion from a foreign payload"),
        };

        info.p = self.scene_center + d * self.far_distance();
        info.ng = -d;
        info.ns = -d;
        info.uv = Self::dome_uv(&d);
        info.bsdf = None;
    }

    fn is_samplable(&self) -> bool {
        true
    }

    fn sample_inbound_direction(&self, rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        let d = square_to_cosine_hemisphere(&rng.next_2d());
        if d.z <= 0.0 {
            return false;
        }
        sample.d = d;
        sample.dist = self.far_distance();
        sample.pdf = square_to_cosine_hemisphere_pdf(d.z);
        sample.weight = self.radiance(&d);
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   _p: &Vector3f, d: &Vector3f) -> Float {
        if d.z <= 0.0 {
            return 0.0;
        }
        d.z * INV_PI
    }

    fn sample_outbound_direction(&self, rng: &mut LcgRng, pos: &mut PositionSample,
                                 dir: &mut DirectionSample) -> bool {
        let mut inbound = LightSample::at(self.scene_center);
        if !self.sample_inbound_direction(rng, &mut inbound) {
            return false;
        }
        let d_env = inbound.d;

        let (t, b) = build_tangent_frame(&d_env);
        let disk = square_to_uniform_disk_concentric(&rng.next_2d());
        let offset = (t * disk.x + b * disk.y) * self.scene_radius;

        pos.p = self.scene_center + d_env * self.far_distance() + offset;
        pos.ng = -d_env;
        pos.uv = Self::dome_uv(&d_env);
        pos.pdf = 1.0 / (PI * self.scene_radius * self.scene_radius);
        pos.weight = inbound.weight;

        dir.d = -d_env;
        dir.pdf = inbound.pdf;
        dir.weight = RGBSpectrum::from_scalar(1.0);
        true
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        if uv.y > 1.0 {
            return None;
        }
        let theta = uv.y * 0.5 * PI;
        let phi = uv.x * TWO_PI;
        let d = Vector3f::new(theta.sin() * phi.cos(),
                              theta.sin() * phi.sin(),
                              theta.cos());
        Some(self.scene_center + d * self.far_distance())
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn is_emissive(&self) -> bool {
        !self.zenith.is_black() || !self.horizon.is_black()
            || !self.sun_emission.is_black()
    }

    fn evaluate_emission(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> RGBSpectrum {
        match data.payload {
            IntersectionPayload::Infinite { d } => self.radiance(&d),
            _ => RGBSpectrum::default(),
        }
    }

    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        let sky = (self.zenith.luminance() + self.horizon.luminance()) * 0.5;
        TWO_PI * sky
    }

    fn set_scene_bounds(&mut self, bounds: &AABB) {
        if bounds.is_valid() {
            self.scene_center = bounds.center();
            self.scene_radius = (bounds.p_max - bounds.center()).norm().max(1e-6);
        } else {
            self.scene_center = Vector3f::zeros();
            self.scene_radius = 1.0;
        }
    }
}
