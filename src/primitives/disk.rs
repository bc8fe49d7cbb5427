// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };
use crate::math::aabb::AABB;
use crate::math::constants::{ EPSILON, Float, Vector2f, Vector3f, PI, TWO_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf,
                         square_to_uniform_disk_concentric };
use std::sync::Arc;

/// One-sided unit disk in the local z=0 plane, facing local +z.
pub struct Disk {
    to_world: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,
    normal: Vector3f,
    dp_du: Vector3f,
    dp_dv: Vector3f,
    area: Float,
    inv_area: Float,
}

impl Disk {
    pub fn new(to_world: Transform) -> Self {
        let mut disk = Self {
            to_world,
            bsdf: None,
            emission: RGBSpectrum::default(),
            normal: Vector3f::new(0.0, 0.0, 1.0),
            dp_du: Vector3f::new(1.0, 0.0, 0.0),
            dp_dv: Vector3f::new(0.0, 1.0, 0.0),
            area: PI,
            inv_area: 1.0 / PI,
        };
        disk.bake();
        disk
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
        self.dp_du = self.to_world.apply_vector(Vector3f::new(1.0, 0.0, 0.0));
        self.dp_dv = self.to_world.apply_vector(Vector3f::new(0.0, 1.0, 0.0));
        let cross = self.dp_du.cross(&self.dp_dv);
        self.area = PI * cross.norm();
        self.inv_area = if self.area > 0.0 { 1.0 / self.area } else { 0.0 };
        self.normal = if cross.norm() > 0.0 {
            cross.normalize()
        } else {
            Vector3f::new(0.0, 0.0, 1.0)
        };
    }

    fn intersect_local(&self, ray: &Ray3f) -> Option<(Vector3f, Float, bool)> {
        let ray_local = self.to_world.inv_apply_ray(ray);
        let dir = ray_local.dir();
        if dir.z.abs() < EPSILON {
            return None;
        }

        let t_local = -ray_local.origin().z / dir.z;
        let p_local = ray_local.at(t_local);
        if p_local.x * p_local.x + p_local.y * p_local.y > 1.0 {
            return None;
        }

        // Project the world hit back onto the world ray for the distance.
        let p_world = self.to_world.apply_point(p_local);
        let t_world = (p_world - ray.origin()).dot(&ray.dir());
        if !ray.test_segment(t_world) {
            return None;
        }

        Some((p_local, t_world, dir.z > 0.0))
    }

    fn polar_uv(p_local: &Vector3f) -> Vector2f {
        let r = (p_local.x * p_local.x + p_local.y * p_local.y).sqrt();
        let mut phi = p_local.y.atan2(p_local.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        Vector2f::new(phi / TWO_PI, r)
    }
}

impl Primitive for Disk {
    fn type_name(&self) -> &'static str {
        "disk"
    }

    fn prepare_for_render(&mut self) {
        self.bake();
    }

    fn bounds(&self) -> AABB {
        // The affine image of the unit circle spans, along each world
        // axis, center ± sqrt(du_i^2 + dv_i^2).
        let center = self.to_world.apply_point(Vector3f::zeros());
        let extent = Vector3f::new(
            (self.dp_du.x * self.dp_du.x + self.dp_dv.x * self.dp_dv.x).sqrt(),
            (self.dp_du.y * self.dp_du.y + self.dp_dv.y * self.dp_dv.y).sqrt(),
            (self.dp_du.z * self.dp_du.z + self.dp_dv.z * self.dp_dv.z).sqrt(),
        );
        AABB::new(center - extent, center + extent)
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let (p_local, t_world, backside) = match self.intersect_local(ray) {
            Some(hit) => hit,
            None => return false,
        };
        if !ray.update(t_world) {
            return false;
        }
        data.payload = IntersectionPayload::Disk { uv: Self::polar_uv(&p_local), backside };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.intersect_local(ray).is_some()
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        match data.payload {
            IntersectionPayload::Disk { backside, .. } => backside,
            _ => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let uv = match data.payload {
            IntersectionPayload::Disk { uv, .. } => uv,
            _ => panic!("disk expansion from a foreign payload"),
        };

        let phi = uv.x * TWO_PI;
        let p_local = Vector3f::new(uv.y * phi.cos(), uv.y * phi.sin(), 0.0);
        info.p = self.to_world.apply_point(p_local);
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
        let disk = square_to_uniform_disk_concentric(&rng.next_2d());
        let p_local = Vector3f::new(disk.x, disk.y, 0.0);
        sample.p = self.to_world.apply_point(p_local);
        sample.ng = self.normal;
        sample.uv = Self::polar_uv(&p_local);
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

        // One-sided: the light only radiates from its front face.
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
        let to_light = info.p - *p;
        let dist2 = to_light.norm_squared();
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
        if uv.y > 1.0 {
            return None;
        }
        let phi = uv.x * TWO_PI;
        let p_local = Vector3f::new(uv.y * phi.cos(), uv.y * phi.sin(), 0.0);
        Some(self.to_world.apply_point(p_local))
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

    fn lit_disk() -> Disk {
        let mut disk = Disk::new(Transform::translate(Vector3f::new(0.0, 0.0, 2.0)))
            .with_emission(RGBSpectrum::new(2.0, 2.0, 2.0));
        disk.prepare_for_render();
        disk
    }

    #[test]
    fn test_disk_hit_and_backside() {
        let disk = lit_disk();

        let mut ray = Ray3f::new(Vector3f::new(0.25, 0.25, 5.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(disk.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 3.0).abs() < 1e-4);
        assert!(!disk.hit_backside(&data));

        let mut from_below = Ray3f::new(Vector3f::new(0.25, 0.25, 0.0),
                                        Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(disk.intersect(&mut from_below, &mut data));
        assert!(disk.hit_backside(&data));
        assert!(disk.evaluate_emission(&data, &IntersectionInfo::new()).is_black());
    }

    #[test]
    fn test_disk_rim_miss() {
        let disk = lit_disk();
        let mut ray = Ray3f::new(Vector3f::new(1.2, 0.0, 5.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, Some(50.0));
        let mut data = IntersectionTemporary::new();
        assert!(!disk.intersect(&mut ray, &mut data));
        assert_eq!(ray.max_t, 50.0);
    }

    #[test]
    fn test_disk_occlusion_agreement() {
        let disk = lit_disk();
        let mut rng = LcgRng::new(31);
        for _ in 0..512 {
            let origin = Vector3f::new(rng.next_f32() * 6.0 - 3.0,
                                       rng.next_f32() * 6.0 - 3.0,
                                       rng.next_f32() * 6.0 - 3.0);
            let dir = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(origin, dir, Some(1e-3), None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(disk.occluded(&ray), disk.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_disk_sampling_duality() {
        let disk = lit_disk();
        let mut rng = LcgRng::new(53);
        for _ in 0..256 {
            let mut sample = LightSample::at(Vector3f::new(0.4, -0.2, 0.0));
            if !disk.sample_inbound_direction(&mut rng, &mut sample) {
                continue;
            }
            let mut ray = Ray3f::new(sample.p, sample.d, Some(1e-4), None);
            let mut data = IntersectionTemporary::new();
            assert!(disk.intersect(&mut ray, &mut data));
            let mut info = IntersectionInfo::new();
            disk.intersection_info(&data, &mut info);
            let pdf = disk.inbound_pdf(&data, &info, &sample.p, &sample.d);
            assert!((pdf - sample.pdf).abs() < 1e-2 * sample.pdf.max(1.0),
                    "pdf {} vs sampled {}", pdf, sample.pdf);
        }
    }

    #[test]
    fn test_disk_parametrization_round_trip() {
        let disk = lit_disk();
        let mut rng = LcgRng::new(71);
        for _ in 0..128 {
            let uv = Vector2f::new(rng.next_f32(), 0.05 + 0.9 * rng.next_f32());
            let pos = disk.invert_parametrization(&uv).unwrap();
            let origin = pos + Vector3f::new(0.0, 0.0, 3.0);
            let mut ray = Ray3f::new(origin, (pos - origin).normalize(), None, None);
            let mut data = IntersectionTemporary::new();
            assert!(disk.intersect(&mut ray, &mut data));
            let mut info = IntersectionInfo::new();
            disk.intersection_info(&data, &mut info);
            assert!((info.uv.x - uv.x).abs() < 1e-3 || (info.uv.x - uv.x).abs() > 0.999);
            assert!((info.uv.y - uv.y).abs() < 1e-3);
        }
    }
}
