// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };
use crate::math::aabb::AABB;
use crate::math::constants::{ EPSILON, Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf };
use std::sync::Arc;

/// One-sided unit square `[-1, 1]^2` in the local z=0 plane under a
/// transform, facing local +z.
pub struct Quad {
    to_world: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,
    normal: Vector3f,
    dp_du: Vector3f,
    dp_dv: Vector3f,
    area: Float,
    inv_area: Float,
}

impl Quad {
    pub fn new(to_world: Transform) -> Self {
        let mut quad = Self {
            to_world,
            bsdf: None,
            emission: RGBSpectrum::default(),
            normal: Vector3f::new(0.0, 0.0, 1.0),
            dp_du: Vector3f::new(2.0, 0.0, 0.0),
            dp_dv: Vector3f::new(0.0, 2.0, 0.0),
            area: 4.0,
            inv_area: 0.25,
        };
        quad.bake();
        quad
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
        self.dp_du = self.to_world.apply_vector(Vector3f::new(2.0, 0.0, 0.0));
        self.dp_dv = self.to_world.apply_vector(Vector3f::new(0.0, 2.0, 0.0));
        let cross = self.dp_du.cross(&self.dp_dv);
        self.area = cross.norm();
        self.inv_area = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
        self.normal = if cross.norm() > 0.0 {
            cross.normalize()
        } else {
            Vector3f::new(0.0, 0.0, 1.0)
        };
    }

    fn intersect_local(&self, ray: &Ray3f) -> Option<(Vector2f, Float, bool)> {
        let ray_local = self.to_world.inv_apply_ray(ray);
        let dir = ray_local.dir();
        if dir.z.abs() < EPSILON {
            return None;
        }

        let t_local = -ray_local.origin().z / dir.z;
        let p_local = ray_local.at(t_local);
        if p_local.x.abs() > 1.0 || p_local.y.abs() > 1.0 {
            return None;
        }

        let p_world = self.to_world.apply_point(p_local);
        let t_world = (p_world - ray.origin()).dot(&ray.dir());
        if !ray.test_segment(t_world) {
            return None;
        }

        let uv = Vector2f::new(0.5 * (p_local.x + 1.0), 0.5 * (p_local.y + 1.0));
        Some((uv, t_world, dir.z > 0.0))
    }

    fn local_from_uv(uv: &Vector2f) -> Vector3f {
        Vector3f::new(2.0 * uv.x - 1.0, 2.0 * uv.y - 1.0, 0.0)
    }
}

impl Primitive for Quad {
    fn type_name(&self) -> &'static str {
        "quad"
    }

    fn prepare_for_render(&mut self) {
        self.bake();
    }

    fn bounds(&self) -> AABB {
        let mut bbox = AABB::default();
        let corners = [
            Vector3f::new(-1.0, -1.0, 0.0),
            Vector3f::new(-1.0,  1.0, 0.0),
            Vector3f::new( 1.0, -1.0, 0.0),
            Vector3f::new( 1.0,  1.0, 0.0),
        ];
        for corner in &corners {
            bbox.expand_by_point(&self.to_world.apply_point(*corner));
        }
        bbox
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let (uv, t_world, backside) = match self.intersect_local(ray) {
            Some(hit) => hit,
            None => return false,
        };
        if !ray.update(t_world) {
            return false;
        }
        data.payload = IntersectionPayload::Quad { uv, backside };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.intersect_local(ray).is_some()
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        match data.payload {
            IntersectionPayload::Quad { backside, .. } => backside,
            _ => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let uv = match data.payload {
            IntersectionPayload::Quad { uv, .. } => uv,
            _ => panic!("quad expansion from a foreign payload"),
        };

        info.p = self.to_world.apply_point(Self::local_from_uv(&uv));
        info.ng = self.normal;
        info.ns = self.normal;
        info.uv = uv;
        info.bsdf = self.bsdf.clone();
    }

    fn tangent_space(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        if self.area <= 0.0 {
            return None;
        }
        let t = self.dp_du.normalize();
        let b = self.normal.cross(&t).normalize();
        Some((t, b))
    }

    fn is_samplable(&self) -> bool {
        self.area > 0.0
    }

    fn sample_position(&self, rng: &mut LcgRng, sample: &mut PositionSample) -> bool {
        if self.area <= 0.0 {
            return false;
        }
        let uv = rng.next_2d();
        sample.p = self.to_world.apply_point(Self::local_from_uv(&uv));
        sample.ng = self.normal;
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

        let cos_light = self.normal.dot(&-d);
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
        let cos_light = self.normal.dot(&-d);
        if cos_light <= 0.0 {
            return 0.0;
        }
        self.inv_area * dist2 / cos_light
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
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
        let center = self.to_world.apply_point(Vector3f::zeros());
        let to_center = center - *p;
        let dist2 = to_center.norm_squared().max(1e-6);
        if self.normal.dot(&-to_center) <= 0.0 {
            return 0.0;
        }
        self.area / dist2 * self.emission.luminance()
    }

    fn bsdf(&self, _data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        self.bsdf.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::warp::square_to_uniform_sphere;

    fn ceiling_light() -> Quad {
        let mut quad = Quad::new(Transform::translate(Vector3f::new(0.0, 0.0, 4.0))
                                 .compose(&Transform::scale(Vector3f::new(0.5, 0.5, 1.0))))
            .with_emission(RGBSpectrum::new(5.0, 5.0, 5.0));
        quad.prepare_for_render();
        quad
    }

    #[test]
    fn test_quad_hit_and_uv() {
        let quad = ceiling_light();
        let mut ray = Ray3f::new(Vector3f::new(0.0, 0.0, 10.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(quad.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 6.0).abs() < 1e-4);

        let mut info = IntersectionInfo::new();
        quad.intersection_info(&data, &mut info);
        assert!((info.uv - Vector2f::new(0.5, 0.5)).norm() < 1e-4);
        assert!((info.p - Vector3f::new(0.0, 0.0, 4.0)).norm() < 1e-4);
    }

    #[test]
    fn test_quad_occlusion_agreement() {
        let quad = ceiling_light();
        let mut rng = LcgRng::new(13);
        for _ in 0..512 {
            let origin = Vector3f::new(rng.next_f32() * 6.0 - 3.0,
                                       rng.next_f32() * 6.0 - 3.0,
                                       rng.next_f32() * 8.0);
            let dir = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(origin, dir, Some(1e-3), None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(quad.occluded(&ray), quad.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_quad_inbound_normalization() {
        // Integrate the solid-angle pdf over its domain with a uniform
        // cone estimator wide enough to contain the whole light.
        use crate::math::warp::{ square_to_uniform_cone, square_to_uniform_cone_pdf };

        let quad = ceiling_light();
        let p = Vector3f::new(0.0, 0.0, 0.0);
        let cos_cone = 0.9;
        let cone_pdf = square_to_uniform_cone_pdf(cos_cone);

        let mut rng = LcgRng::new(41);
        let mut sum = 0.0;
        let n = 200000;
        for _ in 0..n {
            let d = square_to_uniform_cone(&rng.next_2d(), cos_cone);
            let mut ray = Ray3f::new(p, d, Some(1e-4), None);
            let mut data = IntersectionTemporary::new();
            if quad.intersect(&mut ray, &mut data) {
                let mut info = IntersectionInfo::new();
                quad.intersection_info(&data, &mut info);
                sum += quad.inbound_pdf(&data, &info, &p, &d) / cone_pdf;
            }
        }
        let integral = sum / n as Float;
        assert!((integral - 1.0).abs() < 0.05, "integral = {}", integral);
    }

    #[test]
    fn test_quad_parametrization_round_trip() {
        let quad = ceiling_light();
        let mut rng = LcgRng::new(59);
        for _ in 0..128 {
            let uv = Vector2f::new(rng.next_f32(), rng.next_f32());
            let pos = quad.invert_parametrization(&uv).unwrap();
            let origin = pos - Vector3f::new(0.0, 0.0, 3.0);
            let mut ray = Ray3f::new(origin, (pos - origin).normalize(), None, None);
            let mut data = IntersectionTemporary::new();
            assert!(quad.intersect(&mut ray, &mut data));
            let mut info = IntersectionInfo::new();
            quad.intersection_info(&data, &mut info);
            assert!((info.uv - uv).norm() < 1e-3);
        }
    }

    #[test]
    fn test_quad_outbound_sampling_pairs() {
        use crate::core::records::{ DirectionSample, PositionSample };

        let quad = ceiling_light();
        let mut rng = LcgRng::new(67);
        for _ in 0..128 {
            let mut pos = PositionSample::new();
            let mut dir = DirectionSample::new();
            assert!(quad.sample_outbound_direction(&mut rng, &mut pos, &mut dir));
            assert_eq!(pos.pdf, quad.positional_pdf(&pos));
            assert!((dir.pdf - quad.directional_pdf(&pos, &dir.d)).abs() < 1e-5);
            // Emission leaves the front face.
            assert!(pos.ng.dot(&dir.d) > 0.0);
        }
    }

    #[test]
    fn test_degenerate_quad_declines_sampling() {
        let mut quad = Quad::new(Transform::scale(Vector3f::new(0.0, 0.0, 1.0)));
        quad.prepare_for_render();
        assert!(!quad.is_samplable());
        let mut rng = LcgRng::new(1);
        let mut sample = LightSample::at(Vector3f::new(0.0, 0.0, -1.0));
        assert!(!quad.sample_inbound_direction(&mut rng, &mut sample));
        assert_eq!(sample.pdf, 0.0);
    }
}
