// Copyright @yucwang 2026

use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world, world_to_local };
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, PI, TWO_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_uniform_cone, square_to_uniform_cone_pdf,
                         square_to_uniform_disk_concentric };
use std::sync::Arc;

/// Cone-bounded slice of the environment sphere: constant emission inside
/// a cap of the given half-angle around the transformed +z direction.
/// Rays outside the cap pass through to whatever lies behind.
pub struct InfiniteSphereCap {
    emission: RGBSpectrum,
    to_world: Transform,
    cap_angle: Float,
    cap_dir: Vector3f,
    cos_cap: Float,
    scene_center: Vector3f,
    scene_radius: Float,
}

impl InfiniteSphereCap {
    pub fn new(emission: RGBSpectrum, cap_angle: Float) -> Self {
        let mut cap = Self {
            emission,
            to_world: Transform::default(),
            cap_angle,
            cap_dir: Vector3f::new(0.0, 0.0, 1.0),
            cos_cap: cap_angle.cos(),
            scene_center: Vector3f::zeros(),
            scene_radius: 1.0,
        };
        cap.bake();
        cap
    }

    pub fn with_transform(mut self, to_world: Transform) -> Self {
        self.to_world = to_world;
        self.bake();
        self
    }

    fn bake(&mut self) {
        let d = self.to_world.apply_vector(Vector3f::new(0.0, 0.0, 1.0));
        let len = d.norm();
        self.cap_dir = if len > 0.0 { d / len } else { Vector3f::new(0.0, 0.0, 1.0) };
        self.cos_cap = self.cap_angle.cos();
    }

    fn inside_cap(&self, d: &Vector3f) -> bool {
        d.dot(&self.cap_dir) >= self.cos_cap
    }

    fn cap_uv(&self, d: &Vector3f) -> Vector2f {
        let (t, b) = build_tangent_frame(&self.cap_dir);
        let local = world_to_local(d, &t, &b, &self.cap_dir);
        let mut phi = local.y.atan2(local.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        let theta = local.z.clamp(-1.0, 1.0).acos();
        Vector2f::new(phi / TWO_PI, (theta / self.cap_angle).min(1.0))
    }

    fn far_distance(&self) -> Float {
        2.0 * self.scene_radius.max(1.0)
    }
}

impl Primitive for InfiniteSphereCap {
    fn type_name(&self) -> &'static str {
        "infinite_sphere_cap"
    }

    fn prepare_for_render(&mut self) {
        self.bake();
    }

    fn bounds(&self) -> AABB {
        AABB::default()
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        if !self.inside_cap(&ray.dir()) {
            return false;
        }
        data.payload = IntersectionPayload::Infinite { d: ray.dir() };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.inside_cap(&ray.dir())
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let d = match data.payload {
            IntersectionPayload::Infinite { d } => d,
            _ => panic!("cap expansion from a foreign payload"),
        };

        info.p = self.scene_center + d * self.far_distance();
        info.ng = -d;
        info.ns = -d;
        info.uv = self.cap_uv(&d);
        info.bsdf = None;
    }

    fn is_samplable(&self) -> bool {
        self.cos_cap < 1.0
    }

    fn sample_inbound_direction(&self, rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        if self.cos_cap >= 1.0 {
            // Zero solid angle: no density to define.
            return false;
        }
        let local = square_to_uniform_cone(&rng.next_2d(), self.cos_cap);
        let (t, b) = build_tangent_frame(&self.cap_dir);
        sample.d = local_to_world(&local, &t, &b, &self.cap_dir);
        sample.dist = self.far_distance();
        sample.pdf = square_to_uniform_cone_pdf(self.cos_cap);
        sample.weight = self.emission;
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   _p: &Vector3f, d: &Vector3f) -> Float {
        if self.cos_cap >= 1.0 || !self.inside_cap(d) {
            return 0.0;
        }
        square_to_uniform_cone_pdf(self.cos_cap)
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
        pos.uv = self.cap_uv(&d_env);
        pos.pdf = 1.0 / (PI * self.scene_radius * self.scene_radius);
        pos.weight = self.emission;

        dir.d = -d_env;
        dir.pdf = inbound.pdf;
        dir.weight = RGBSpectrum::from_scalar(1.0);
        true
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        if uv.y > 1.0 {
            return None;
        }
        let theta = uv.y * self.cap_angle;
        let phi = uv.x * TWO_PI;
        let local = Vector3f::new(theta.sin() * phi.cos(),
                                  theta.sin() * phi.sin(),
                                  theta.cos());
        let (t, b) = build_tangent_frame(&self.cap_dir);
        let d = local_to_world(&local, &t, &b, &self.cap_dir);
        Some(self.scene_center + d * self.far_distance())
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }

    fn evaluate_emission(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> RGBSpectrum {
        match data.payload {
            IntersectionPayload::Infinite { d } if self.inside_cap(&d) => self.emission,
            _ => RGBSpectrum::default(),
        }
    }

    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        TWO_PI * (1.0 - self.cos_cap) * self.emission.luminance()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::warp::square_to_uniform_sphere;

    fn overhead_cap() -> InfiniteSphereCap {
        let mut cap = InfiniteSphereCap::new(RGBSpectrum::new(4.0, 4.0, 4.0), 0.5);
        cap.prepare_for_render();
        cap
    }

    #[test]
    fn test_cap_accepts_only_cap_directions() {
        let cap = overhead_cap();
        let mut data = IntersectionTemporary::new();

        let mut inside = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0),
                                    None, None);
        assert!(cap.intersect(&mut inside, &mut data));

        let mut outside = Ray3f::new(Vector3f::zeros(), Vector3f::new(1.0, 0.0, 0.1),
                                     None, None);
        assert!(!cap.intersect(&mut outside, &mut data));
    }

    #[test]
    fn test_cap_occlusion_agreement() {
        let cap = overhead_cap();
        let mut rng = LcgRng::new(91);
        for _ in 0..512 {
            let d = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(Vector3f::zeros(), d, None, None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(cap.occluded(&ray), cap.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_cap_sampling_duality_and_support() {
        let cap = overhead_cap();
        let analytic = square_to_uniform_cone_pdf(0.5f32.cos());
        let data = IntersectionTemporary::new();
        let info = IntersectionInfo::new();

        let mut rng = LcgRng::new(107);
        for _ in 0..512 {
            let mut sample = LightSample::at(Vector3f::zeros());
            assert!(cap.sample_inbound_direction(&mut rng, &mut sample));
            assert!(cap.inside_cap(&sample.d));
            assert!((sample.pdf - analytic).abs() < 1e-6);
            assert!((cap.inbound_pdf(&data, &info, &Vector3f::zeros(), &sample.d)
                     - analytic).abs() < 1e-6);
        }

        // Outside the support the density vanishes.
        let sideways = Vector3f::new(1.0, 0.0, 0.0);
        assert_eq!(cap.inbound_pdf(&data, &info, &Vector3f::zeros(), &sideways), 0.0);
    }

    #[test]
    fn test_cap_normalization() {
        // The pdf integrates to one over its cone support.
        let cap = overhead_cap();
        let solid_angle = TWO_PI * (1.0 - 0.5f32.cos());
        let analytic = square_to_uniform_cone_pdf(0.5f32.cos());
        assert!((analytic * solid_angle - 1.0).abs() < 1e-5);
    }
}
