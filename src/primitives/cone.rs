// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, INV_SQUARE_2, PI, SQUARE_2, TWO_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf };
use std::sync::Arc;

/// Lateral surface of the unit cone: apex at local (0, 0, 1), base circle
/// of radius 1 in the z=0 plane. The uv parametrization is
/// (phi / 2pi, slant fraction from the apex).
pub struct Cone {
    to_world: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,
    area: Float,
    inv_area: Float,
}

impl Cone {
    pub fn new(to_world: Transform) -> Self {
        let mut cone = Self {
            to_world,
            bsdf: None,
            emission: RGBSpectrum::default(),
            area: PI * SQUARE_2,
            inv_area: 1.0 / (PI * SQUARE_2),
        };
        cone.bake();
        cone
    }

    pub fn with_bsdf(mut self, bsdf: Arc<dyn Bsdf>) -> Self {
        self.bsdf = Some(bsdf);
        self
    }

    pub fn with_emission(mut self, emission: RGBSpectrum) -> Self {
        self.emission = emission;
        self
    }

    fn bake(&mut self) {
        let scale = self.to_world.max_scale();
        self.area = PI * SQUARE_2 * scale * scale;
        self.inv_area = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
    }

    fn intersect_local(&self, ray: &Ray3f) -> Option<(Vector3f, Float, bool)> {
        let ray_local = self.to_world.inv_apply_ray(ray);
        let o = ray_local.origin();
        let d = ray_local.dir();

        // x^2 + y^2 = (1 - z)^2 along o + t d.
        let a = d.x * d.x + d.y * d.y - d.z * d.z;
        let b = 2.0 * (o.x * d.x + o.y * d.y + (1.0 - o.z) * d.z);
        let c = o.x * o.x + o.y * o.y - (1.0 - o.z) * (1.0 - o.z);

        let roots = if a.abs() < 1e-8 {
            // Ray parallel to a generatrix: the quadratic degenerates.
            if b.abs() < 1e-8 {
                return None;
            }
            [-c / b, Float::INFINITY]
        } else {
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return None;
            }
            let sqrt_disc = disc.sqrt();
            let inv_2a = 0.5 / a;
            let t0 = (-b - sqrt_disc) * inv_2a;
            let t1 = (-b + sqrt_disc) * inv_2a;
            [t0.min(t1), t0.max(t1)]
        };

        for &t_local in &roots {
            if !t_local.is_finite() {
                continue;
            }
            let p_local = ray_local.at(t_local);
            if p_local.z < 0.0 || p_local.z > 1.0 {
                continue;
            }
            let p_world = self.to_world.apply_point(p_local);
            let t_world = (p_world - ray.origin()).dot(&ray.dir());
            if !ray.test_segment(t_world) {
                continue;
            }

            // Outward local normal is (cos phi, sin phi, 1) / sqrt(2).
            let radius = (1.0 - p_local.z).max(1e-6);
            let n_local = Vector3f::new(p_local.x / radius, p_local.y / radius, 1.0)
                * INV_SQUARE_2;
            let backside = n_local.dot(&d) > 0.0;
            return Some((p_local, t_world, backside));
        }

        None
    }

    fn local_from_uv(uv: &Vector2f) -> Vector3f {
        let phi = uv.x * TWO_PI;
        let slant = uv.y;
        Vector3f::new(slant * phi.cos(), slant * phi.sin(), 1.0 - slant)
    }

    fn world_normal(&self, phi: Float) -> Vector3f {
        let n_local = Vector3f::new(phi.cos(), phi.sin(), 1.0) * INV_SQUARE_2;
        let n = self.to_world.apply_normal(n_local);
        if n.norm() > 0.0 { n.normalize() } else { Vector3f::new(0.0, 0.0, 1.0) }
    }
}

impl Primitive for Cone {
    fn type_name(&self) -> &'static str {
        "cone"
    }

    fn prepare_for_render(&mut self) {
        self.bake();
    }

    fn bounds(&self) -> AABB {
        let mut bbox = AABB::default();
        bbox.expand_by_point(&self.to_world.apply_point(Vector3f::new(0.0, 0.0, 1.0)));
        for i in 0..8 {
            let phi = i as Float / 8.0 * TWO_PI;
            let rim = Vector3f::new(phi.cos(), phi.sin(), 0.0);
            bbox.expand_by_point(&self.to_world.apply_point(rim));
        }
        let pad = 0.1 * bbox.diagnal().norm().max(1e-3);
        AABB::new(bbox.p_min - Vector3f::new(pad, pad, pad),
                  bbox.p_max + Vector3f::new(pad, pad, pad))
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let (p_local, t_world, backside) = match self.intersect_local(ray) {
            Some(hit) => hit,
            None => return false,
        };
        if !ray.update(t_world) {
            return false;
        }
        let mut phi = p_local.y.atan2(p_local.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        data.payload = IntersectionPayload::Cone { phi, slant: 1.0 - p_local.z, backside };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.intersect_local(ray).is_some()
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        match data.payload {
            IntersectionPayload::Cone { backside, .. } => backside,
            _ => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let (phi, slant) = match data.payload {
            IntersectionPayload::Cone { phi, slant, .. } => (phi, slant),
            _ => panic!("cone expansion from a foreign payload"),
        };

        let uv = Vector2f::new(phi / TWO_PI, slant);
        info.p = self.to_world.apply_point(Self::local_from_uv(&uv));
        info.ng = self.world_normal(phi);
        info.ns = info.ng;
        info.uv = uv;
        info.bsdf = self.bsdf.clone();
    }

    fn tangent_space(&self, data: &IntersectionTemporary, info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        let (phi, slant) = match data.payload {
            IntersectionPayload::Cone { phi, slant, .. } => (phi, slant),
            _ => return None,
        };
        if slant < 1e-5 {
            // The parametrization collapses at the apex.
            return None;
        }
        let dp_du = self.to_world.apply_vector(Vector3f::new(-phi.sin(), phi.cos(), 0.0));
        if dp_du.norm_squared() < 1e-10 {
            return None;
        }
        let t = dp_du.normalize();
        let b = info.ng.cross(&t).normalize();
        Some((t, b))
    }

    fn is_samplable(&self) -> bool {
        self.area > 0.0
    }

    fn sample_position(&self, rng: &mut LcgRng, sample: &mut PositionSample) -> bool {
        if self.area <= 0.0 {
            return false;
        }
        let u = rng.next_2d();
        // Uniform over the lateral surface: the area element grows with
        // the slant distance from the apex.
        let slant = u.x.sqrt();
        let uv = Vector2f::new(u.y, slant);
        let phi = uv.x * TWO_PI;
        sample.p = self.to_world.apply_point(Self::local_from_uv(&uv));
        sample.ng = self.world_normal(phi);
        sample.uv = uv;
        sample.pdf = self.inv_area;
        sample.weight = self.emission;
        true
    }

    fn positional_pdf(&self, _sample: &PositionSample) -> Float {
        self.inv_area
    }

    fn sample_direction(&self, rng: &mut LcgRng, point: &PositionSample,
                        sample: &mut DirectionSample) -> bool {
        let local = square_to_cosine_hemisphere(&rng.next_2d());
        if local.z <= 0.0 {
            return false;
        }
        let (t, b) = build_tangent_frame(&point.ng);
        sample.d = local_to_world(&local, &t, &b, &point.ng);
        sample.pdf = square_to_cosine_hemisphere_pdf(local.z);
        sample.weight = RGBSpectrum::from_scalar(1.0);
        true
    }

    fn directional_pdf(&self, point: &PositionSample, d: &Vector3f) -> Float {
        let cos_theta = point.ng.dot(d);
        if cos_theta <= 0.0 {
            0.0
        } else {
            square_to_cosine_hemisphere_pdf(cos_theta)
        }
    }

    fn sample_inbound_direction(&self, rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        let mut pos = PositionSample::new();
        if !self.sample_position(rng, &mut pos) {
            return false;
        }

        let to_light = pos.p - sample.p;
        let dist2 = to_light.norm_squared();
        if dist2 <= 0.0 {
            return false;
        }
        let dist = dist2.sqrt();
        let d = to_light / dist;

        let cos_light = pos.ng.dot(&-d);
        if cos_light <= 0.0 {
            return false;
        }

        sample.d = d;
        sample.dist = dist;
        sample.pdf = self.inv_area * dist2 / cos_light;
        sample.weight = self.emission;
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, info: &IntersectionInfo,
                   p: &Vector3f, d: &Vector3f) -> Float {
        let dist2 = (info.p - *p).norm_squared();
        if dist2 <= 0.0 {
            return 0.0;
        }
        let cos_light = info.ng.dot(&-d);
        if cos_light <= 0.0 {
            return 0.0;
        }
        self.inv_area * dist2 / cos_light
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        if uv.y < 0.0 || uv.y > 1.0 {
            return None;
        }
        Some(self.to_world.apply_point(Self::local_from_uv(uv)))
    }

    fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }

    fn evaluate_emission(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> RGBSpectrum {
        if self.hit_backside(data) {
            RGBSpectrum::default()
        } else {
            self.emission
        }
    }

    fn approximate_radiance(&self, p: &Vector3f) -> Float {
        let center = self.to_world.apply_point(Vector3f::new(0.0, 0.0, 0.25));
        let dist2 = (center - *p).norm_squared().max(1e-6);
        self.area / dist2 * self.emission.luminance()
    }

    fn bsdf(&self, _data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        self.bsdf.clone()
    }
}
