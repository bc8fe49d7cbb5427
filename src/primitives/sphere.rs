// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, FOUR_PI, PI, TWO_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf,
                         square_to_uniform_cone, square_to_uniform_cone_pdf,
                         square_to_uniform_sphere };
use std::sync::Arc;

pub struct Sphere {
    transform: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,
    center: Vector3f,
    radius: Float,
}

impl Sphere {
    pub fn new(transform: Transform) -> Self {
        let mut sphere = Self {
            transform,
            bsdf: None,
            emission: RGBSpectrum::default(),
            center: Vector3f::zeros(),
            radius: 1.0,
        };
        sphere.bake();
        sphere
    }

    pub fn unit() -> Self {
        Self::new(Transform::default())
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
        self.center = self.transform.apply_point(Vector3f::zeros());
        self.radius = self.transform.max_scale();
    }

    fn solve_hit(&self, ray: &Ray3f) -> Option<(Float, bool)> {
        let o_rel = ray.origin() - self.center;
        let b = 2.0 * o_rel.dot(&ray.dir());
        let c = o_rel.dot(&o_rel) - self.radius * self.radius;
        let disc = b * b - 4.0 * c;
        if disc < 0.0 {
            return None;
        }

        let sqrt_disc = disc.sqrt();
        let t0 = 0.5 * (-b - sqrt_disc);
        let t1 = 0.5 * (-b + sqrt_disc);
        if ray.test_segment(t0) {
            Some((t0, false))
        } else if ray.test_segment(t1) {
            // Entry point behind the interval: the hit leaves the sphere
            // from inside.
            Some((t1, true))
        } else {
            None
        }
    }

    fn cone_cos_theta_max(&self, p: &Vector3f) -> Option<Float> {
        let d2 = (self.center - p).norm_squared();
        if d2 <= self.radius * self.radius {
            return None;
        }
        Some((1.0 - self.radius * self.radius / d2).max(0.0).sqrt())
    }
}

impl Primitive for Sphere {
    fn type_name(&self) -> &'static str {
        "sphere"
    }

    fn prepare_for_render(&mut self) {
        self.bake();
    }

    fn bounds(&self) -> AABB {
        let r = Vector3f::new(self.radius, self.radius, self.radius);
        AABB::new(self.center - r, self.center + r)
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let (t, backside) = match self.solve_hit(ray) {
            Some(hit) => hit,
            None => return false,
        };

        if !ray.update(t) {
            return false;
        }
        let p_local = (ray.at(t) - self.center) / self.radius;
        data.payload = IntersectionPayload::Sphere { p_local, backside };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.solve_hit(ray).is_some()
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        match data.payload {
            IntersectionPayload::Sphere { backside, .. } => backside,
            _ => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let p_local = match data.payload {
            IntersectionPayload::Sphere { p_local, .. } => p_local,
            _ => panic!("sphere expansion from a foreign payload"),
        };

        let n = p_local.normalize();
        info.p = self.center + p_local * self.radius;
        info.ng = n;
        info.ns = n;
        info.uv = spherical_uv(&n);
        info.epsilon = 1e-4 * self.radius.max(1.0);
        info.bsdf = self.bsdf.clone();
    }

    fn tangent_space(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        let p_local = match data.payload {
            IntersectionPayload::Sphere { p_local, .. } => p_local,
            _ => return None,
        };

        // dp/du degenerates at the poles.
        let dp_du = Vector3f::new(-p_local.y, p_local.x, 0.0);
        if dp_du.norm_squared() < 1e-10 {
            return None;
        }
        let t = dp_du.normalize();
        let b = p_local.normalize().cross(&t).normalize();
        Some((t, b))
    }

    fn is_samplable(&self) -> bool {
        true
    }

    fn sample_position(&self, rng: &mut LcgRng, sample: &mut PositionSample) -> bool {
        let n = square_to_uniform_sphere(&rng.next_2d());
        sample.p = self.center + n * self.radius;
        sample.ng = n;
        sample.uv = spherical_uv(&n);
        sample.pdf = 1.0 / (FOUR_PI * self.radius * self.radius);
        sample.weight = self.emission;
        true
    }

    fn positional_pdf(&self, _sample: &PositionSample) -> Float {
        1.0 / (FOUR_PI * self.radius * self.radius)
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
        let cos_theta_max = match self.cone_cos_theta_max(&sample.p) {
            Some(v) => v,
            None => return false,
        };

        let to_center = self.center - sample.p;
        let dist_center = to_center.norm();
        let axis = to_center / dist_center;

        let local = square_to_uniform_cone(&rng.next_2d(), cos_theta_max);
        let (t, b) = build_tangent_frame(&axis);
        let d = local_to_world(&local, &t, &b, &axis);

        // Distance to the nearer sheet along the sampled direction.
        let cos_theta = local.z;
        let sin2_theta = (1.0 - cos_theta * cos_theta).max(0.0);
        let under = self.radius * self.radius - dist_center * dist_center * sin2_theta;
        if under < 0.0 {
            return false;
        }

        sample.d = d;
        sample.dist = dist_center * cos_theta - under.sqrt();
        sample.pdf = square_to_uniform_cone_pdf(cos_theta_max);
        sample.weight = self.emission;
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   p: &Vector3f, _d: &Vector3f) -> Float {
        match self.cone_cos_theta_max(p) {
            Some(cos_theta_max) => square_to_uniform_cone_pdf(cos_theta_max),
            None => 0.0,
        }
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        let n = spherical_direction(uv);
        Some(self.center + n * self.radius)
    }

    fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }

    fn evaluate_emission(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> RGBSpectrum {
        self.emission
    }

    fn approximate_radiance(&self, p: &Vector3f) -> Float {
        match self.cone_cos_theta_max(p) {
            Some(cos_theta_max) => {
                TWO_PI * (1.0 - cos_theta_max) * self.emission.luminance()
            }
            None => FOUR_PI * self.emission.luminance(),
        }
    }

    fn bsdf(&self, _data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        self.bsdf.clone()
    }
}

fn spherical_uv(n: &Vector3f) -> Vector2f {
    let mut phi = n.y.atan2(n.x);
    if phi < 0.0 {
        phi += TWO_PI;
    }
    let theta = n.z.clamp(-1.0, 1.0).acos();
    Vector2f::new(phi / TWO_PI, theta / PI)
}

fn spherical_direction(uv: &Vector2f) -> Vector3f {
    let phi = uv.x * TWO_PI;
    let theta = uv.y * PI;
    let sin_theta = theta.sin();
    Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), theta.cos())
}
