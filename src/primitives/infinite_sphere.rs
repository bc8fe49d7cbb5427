// Copyright @yucwang 2026

use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::build_tangent_frame;
use crate::core::texture::Texture;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, FOUR_PI, INV_FOUR_PI, PI, TWO_PI };
use crate::math::distribution::Distribution2D;
use crate::math::ray::Ray3f;
use crate::math::spectrum::{ RGBSpectrum, Spectrum };
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_uniform_disk_concentric, square_to_uniform_sphere };
use std::sync::Arc;

/// Unbounded environment emitter surrounding the whole scene. Uniform by
/// default; with a texture attached, `make_samplable` builds a luminance
/// importance table so inbound sampling follows the bright texels.
pub struct InfiniteSphere {
    emission: RGBSpectrum,
    texture: Option<Arc<dyn Texture>>,
    to_world: Transform,
    scene_center: Vector3f,
    scene_radius: Float,
    distribution: Option<Distribution2D>,
}

impl InfiniteSphere {
    pub fn uniform(emission: RGBSpectrum) -> Self {
        Self {
            emission,
            texture: None,
            to_world: Transform::default(),
            scene_center: Vector3f::zeros(),
            scene_radius: 1.0,
            distribution: None,
        }
    }

    pub fn textured(texture: Arc<dyn Texture>) -> Self {
        Self {
            emission: RGBSpectrum::from_scalar(1.0),
            texture: Some(texture),
            to_world: Transform::default(),
            scene_center: Vector3f::zeros(),
            scene_radius: 1.0,
            distribution: None,
        }
    }

    pub fn with_transform(mut self, to_world: Transform) -> Self {
        self.to_world = to_world;
        self
    }

    fn env_uv(&self, d_world: &Vector3f) -> Vector2f {
        let d = self.to_world.inv_apply_vector(*d_world);
        let len = d.norm();
        let d = if len > 0.0 { d / len } else { Vector3f::new(0.0, 0.0, 1.0) };
        let mut phi = d.y.atan2(d.x);
        if phi < 0.0 {
            phi += TWO_PI;
        }
        Vector2f::new(phi / TWO_PI, d.z.clamp(-1.0, 1.0).acos() / PI)
    }

    fn env_direction(&self, uv: &Vector2f) -> Vector3f {
        let phi = uv.x * TWO_PI;
        let theta = uv.y * PI;
        let sin_theta = theta.sin();
        let d = Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), theta.cos());
        let d_world = self.to_world.apply_vector(d);
        let len = d_world.norm();
        if len > 0.0 { d_world / len } else { d }
    }

    fn radiance_at(&self, uv: &Vector2f) -> RGBSpectrum {
        match &self.texture {
            Some(texture) => texture.eval(*uv) * self.emission,
            None => self.emission,
        }
    }

    fn far_distance(&self) -> Float {
        2.0 * self.scene_radius.max(1.0)
    }
}

impl Primitive for InfiniteSphere {
    fn type_name(&self) -> &'static str {
        "infinite_sphere"
    }

    fn prepare_for_render(&mut self) {}

    fn teardown_after_render(&mut self) {
        self.distribution = None;
    }

    fn bounds(&self) -> AABB {
        AABB::default()
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        // Every ray escaping the finite scene reaches the environment.
        data.payload = IntersectionPayload::Infinite { d: ray.dir() };
        true
    }

    fn occluded(&self, _ray: &Ray3f) -> bool {
        true
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let d = match data.payload {
            IntersectionPayload::Infinite { d } => d,
            _ => panic!("environment expansion from a foreign payload"),
        };

        info.p = self.scene_center + d * self.far_distance();
        info.ng = -d;
        info.ns = -d;
        info.uv = self.env_uv(&d);
        info.bsdf = None;
    }

    fn tangent_space(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        let d = match data.payload {
            IntersectionPayload::Infinite { d } => d,
            _ => return None,
        };
        let (t, b) = build_tangent_frame(&-d);
        Some((t, b))
    }

    fn is_samplable(&self) -> bool {
        self.texture.is_none() || self.distribution.is_some()
    }

    fn make_samplable(&mut self) {
        if self.distribution.is_some() {
            return;
        }
        let texture = match &self.texture {
            Some(texture) => texture.clone(),
            None => return,
        };

        let (tw, th) = texture.dimensions();
        let width = tw.max(16);
        let height = th.max(8);
        let mut weights = vec![0.0; width * height];
        for y in 0..height {
            let v = (y as Float + 0.5) / height as Float;
            let sin_theta = (v * PI).sin();
            for x in 0..width {
                let u = (x as Float + 0.5) / width as Float;
                let lum = texture.eval(Vector2f::new(u, v)).value();
                weights[y * width + x] = lum * sin_theta;
            }
        }
        self.distribution = Some(Distribution2D::new(&weights, width, height));
    }

    fn sample_position(&self, _rng: &mut LcgRng, _sample: &mut PositionSample) -> bool {
        // No standalone area density at infinity; emission-first sampling
        // goes through `sample_outbound_direction`.
        false
    }

    fn sample_inbound_direction(&self, rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        if let Some(dist) = &self.distribution {
            let (uv, pdf_uv) = match dist.sample(&rng.next_2d()) {
                Some(drawn) => drawn,
                None => return false,
            };
            let sin_theta = (uv.y * PI).sin();
            if sin_theta <= 1e-6 || pdf_uv <= 0.0 {
                return false;
            }
            sample.d = self.env_direction(&uv);
            sample.dist = self.far_distance();
            sample.pdf = pdf_uv / (TWO_PI * PI * sin_theta);
            sample.weight = self.radiance_at(&uv);
            true
        } else {
            let d = square_to_uniform_sphere(&rng.next_2d());
            sample.d = d;
            sample.dist = self.far_distance();
            sample.pdf = INV_FOUR_PI;
            sample.weight = self.emission;
            true
        }
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   _p: &Vector3f, d: &Vector3f) -> Float {
        match &self.distribution {
            Some(dist) => {
                let uv = self.env_uv(d);
                let sin_theta = (uv.y * PI).sin();
                if sin_theta <= 1e-6 {
                    return 0.0;
                }
                dist.pdf(&uv) / (TWO_PI * PI * sin_theta)
            }
            None => INV_FOUR_PI,
        }
    }

    fn sample_outbound_direction(&self, rng: &mut LcgRng, pos: &mut PositionSample,
                                 dir: &mut DirectionSample) -> bool {
        // Direction first, then a point on the disk tangent to the scene's
        // bounding sphere; the emitted ray travels back into the scene.
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
        pos.uv = self.env_uv(&d_env);
        pos.pdf = 1.0 / (PI * self.scene_radius * self.scene_radius);
        pos.weight = inbound.weight;

        dir.d = -d_env;
        dir.pdf = inbound.pdf;
        dir.weight = RGBSpectrum::from_scalar(1.0);
        true
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        let d = self.env_direction(uv);
        Some(self.scene_center + d * self.far_distance())
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn is_emissive(&self) -> bool {
        self.texture.is_some() || !self.emission.is_black()
    }

    fn evaluate_emission(&self, data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> RGBSpectrum {
        let d = match data.payload {
            IntersectionPayload::Infinite { d } => d,
            _ => return RGBSpectrum::default(),
        };
        self.radiance_at(&self.env_uv(&d))
    }

    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        match &self.texture {
            Some(_) => -1.0,
            None => FOUR_PI * self.emission.luminance(),
        }
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

    struct GradientTexture;

    impl Texture for GradientTexture {
        fn eval(&self, uv: Vector2f) -> RGBSpectrum {
            // Bright band near the "north pole" of the environment.
            if uv.y < 0.25 {
                RGBSpectrum::new(10.0, 10.0, 10.0)
            } else {
                RGBSpectrum::new(0.1, 0.1, 0.1)
            }
        }

        fn dimensions(&self) -> (usize, usize) {
            (32, 16)
        }
    }

    #[test]
    fn test_uniform_env_pdf_is_inv_four_pi() {
        let env = InfiniteSphere::uniform(RGBSpectrum::new(1.0, 1.0, 1.0));
        let data = IntersectionTemporary::new();
        let info = IntersectionInfo::new();
        let mut rng = LcgRng::new(3);
        for _ in 0..128 {
            let d = square_to_uniform_sphere(&rng.next_2d());
            let pdf = env.inbound_pdf(&data, &info, &Vector3f::zeros(), &d);
            assert!((pdf - INV_FOUR_PI).abs() < 1e-7);
        }
    }

    #[test]
    fn test_uniform_env_histogram_is_uniform() {
        // Octant histogram of 10^5 draws against the analytic density.
        let env = InfiniteSphere::uniform(RGBSpectrum::new(1.0, 1.0, 1.0));
        let mut rng = LcgRng::new(9);
        let mut counts = [0usize; 8];
        let n = 100000;
        for _ in 0..n {
            let mut sample = LightSample::at(Vector3f::zeros());
            assert!(env.sample_inbound_direction(&mut rng, &mut sample));
            assert!((sample.pdf - INV_FOUR_PI).abs() < 1e-7);
            let octant = (sample.d.x >= 0.0) as usize
                | (((sample.d.y >= 0.0) as usize) << 1)
                | (((sample.d.z >= 0.0) as usize) << 2);
            counts[octant] += 1;
        }
        let expected = n as Float / 8.0;
        for &count in &counts {
            let rel = (count as Float - expected).abs() / expected;
            assert!(rel < 0.03, "octant off by {}", rel);
        }
    }

    #[test]
    fn test_textured_env_importance_sampling() {
        let mut env = InfiniteSphere::textured(Arc::new(GradientTexture));
        assert!(!env.is_samplable());
        env.make_samplable();
        assert!(env.is_samplable());

        let mut rng = LcgRng::new(21);
        let mut bright = 0usize;
        let mut boundary_flips = 0usize;
        let n = 20000;
        for _ in 0..n {
            let mut sample = LightSample::at(Vector3f::zeros());
            assert!(env.sample_inbound_direction(&mut rng, &mut sample));
            // Generator/density duality along the drawn direction. The
            // uv round trip may land a hair across a cell boundary, so a
            // handful of flips are tolerated.
            let data = IntersectionTemporary::new();
            let info = IntersectionInfo::new();
            let pdf = env.inbound_pdf(&data, &info, &Vector3f::zeros(), &sample.d);
            if (pdf - sample.pdf).abs() > 1e-2 * sample.pdf {
                boundary_flips += 1;
            }
            if env.env_uv(&sample.d).y < 0.25 {
                bright += 1;
            }
        }
        assert!(boundary_flips <= 20, "{} duality mismatches", boundary_flips);
        // The bright band holds ~99% of the table weight but only ~15% of
        // the solid angle.
        assert!(bright as Float / n as Float > 0.8);
    }

    #[test]
    fn test_env_outbound_rays_enter_the_scene() {
        use crate::core::records::{ DirectionSample, PositionSample };
        use crate::math::aabb::AABB;

        let mut env = InfiniteSphere::uniform(RGBSpectrum::new(1.0, 1.0, 1.0));
        env.set_scene_bounds(&AABB::new(Vector3f::new(-1.0, -1.0, -1.0),
                                        Vector3f::new(1.0, 1.0, 1.0)));
        let mut rng = LcgRng::new(51);
        for _ in 0..128 {
            let mut pos = PositionSample::new();
            let mut dir = DirectionSample::new();
            assert!(env.sample_outbound_direction(&mut rng, &mut pos, &mut dir));
            assert!(pos.pdf > 0.0);
            assert!((dir.pdf - INV_FOUR_PI).abs() < 1e-7);
            // The emitted direction heads back toward the scene.
            assert!(dir.d.dot(&(Vector3f::zeros() - pos.p)) > 0.0);
        }
    }

    #[test]
    fn test_env_hits_everything_and_matches_occlusion() {
        let env = InfiniteSphere::uniform(RGBSpectrum::new(0.5, 0.5, 0.5));
        let mut rng = LcgRng::new(33);
        for _ in 0..64 {
            let d = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(Vector3f::zeros(), d, None, None);
            let mut data = IntersectionTemporary::new();
            assert!(env.intersect(&mut ray, &mut data));
            assert!(env.occluded(&ray));

            let mut info = IntersectionInfo::new();
            env.intersection_info(&data, &mut info);
            assert!((info.ng + d).norm() < 1e-6);
            assert_eq!(env.evaluate_emission(&data, &info),
                       RGBSpectrum::new(0.5, 0.5, 0.5));
        }
    }
}
