// Copyright @yucwang 2026

use crate::core::intersection::{ IntersectionInfo, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector3f, INV_FOUR_PI };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::square_to_uniform_sphere;

/// Zero-measure point emitter. A delta primitive is never hit by a ray,
/// never enters the acceleration structure, and never appears in
/// area-sampling code paths; direct lighting reaches it only through
/// `sample_inbound_direction`.
pub struct PointLight {
    position: Vector3f,
    intensity: RGBSpectrum,
}

impl PointLight {
    pub fn new(position: Vector3f, intensity: RGBSpectrum) -> Self {
        Self { position, intensity }
    }
}

impl Primitive for PointLight {
    fn type_name(&self) -> &'static str {
        "point"
    }

    fn prepare_for_render(&mut self) {}

    fn bounds(&self) -> AABB {
        AABB::default()
    }

    fn intersect(&self, _ray: &mut Ray3f, _data: &mut IntersectionTemporary) -> bool {
        false
    }

    fn occluded(&self, _ray: &Ray3f) -> bool {
        false
    }

    fn intersection_info(&self, _data: &IntersectionTemporary, _info: &mut IntersectionInfo) {
        unreachable!("a delta primitive has no surface to expand");
    }

    fn is_samplable(&self) -> bool {
        true
    }

    fn sample_inbound_direction(&self, _rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        let to_light = self.position - sample.p;
        let dist2 = to_light.norm_squared();
        if dist2 <= 0.0 {
            return false;
        }
        let dist = dist2.sqrt();
        sample.d = to_light / dist;
        sample.dist = dist;
        // Discrete measure: the delta direction carries probability one.
        sample.pdf = 1.0;
        sample.weight = self.intensity * (1.0 / dist2);
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   _p: &Vector3f, _d: &Vector3f) -> Float {
        // A zero-measure emitter can never be reached by path sampling.
        0.0
    }

    fn sample_outbound_direction(&self, rng: &mut LcgRng, pos: &mut PositionSample,
                                 dir: &mut DirectionSample) -> bool {
        pos.p = self.position;
        pos.ng = Vector3f::new(0.0, 0.0, 1.0);
        pos.pdf = 1.0;
        pos.weight = self.intensity;

        dir.d = square_to_uniform_sphere(&rng.next_2d());
        dir.pdf = INV_FOUR_PI;
        dir.weight = RGBSpectrum::from_scalar(1.0);
        true
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn is_emissive(&self) -> bool {
        !self.intensity.is_black()
    }

    fn approximate_radiance(&self, p: &Vector3f) -> Float {
        let dist2 = (self.position - *p).norm_squared().max(1e-6);
        self.intensity.luminance() / dist2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::pinhole::PinholeCamera;
    use crate::core::accel::TraceContext;
    use crate::core::scene::TraceableScene;
    use crate::primitives::sphere::Sphere;

    #[test]
    fn test_point_light_is_never_hit() {
        let light = PointLight::new(Vector3f::new(0.0, 0.0, 2.0),
                                    RGBSpectrum::new(10.0, 10.0, 10.0));
        let mut ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0),
                                 None, None);
        let mut data = IntersectionTemporary::new();
        assert!(!light.intersect(&mut ray, &mut data));
        assert!(!light.occluded(&ray));
        assert!(light.is_delta());
    }

    #[test]
    fn test_point_light_inbound_sample() {
        let light = PointLight::new(Vector3f::new(0.0, 0.0, 2.0),
                                    RGBSpectrum::new(8.0, 8.0, 8.0));
        let mut rng = LcgRng::new(1);
        let mut sample = LightSample::at(Vector3f::zeros());
        assert!(light.sample_inbound_direction(&mut rng, &mut sample));
        assert!((sample.d - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-6);
        assert!((sample.dist - 2.0).abs() < 1e-6);
        assert_eq!(sample.pdf, 1.0);
        // Inverse-square falloff folded into the unweighted contribution.
        assert!((sample.weight[0] - 2.0).abs() < 1e-5);
        // Path sampling can never land on it.
        let data = IntersectionTemporary::new();
        let info = IntersectionInfo::new();
        assert_eq!(light.inbound_pdf(&data, &info, &Vector3f::zeros(), &sample.d), 0.0);
    }

    #[test]
    fn test_delta_light_excluded_from_finite_scene() {
        let ctx = TraceContext::new();
        let primitives: Vec<Box<dyn Primitive>> = vec![
            Box::new(Sphere::unit()),
            Box::new(PointLight::new(Vector3f::new(0.0, 5.0, 0.0),
                                     RGBSpectrum::new(10.0, 10.0, 10.0))),
        ];
        let camera = Box::new(PinholeCamera::new(Vector3f::new(0.0, 0.0, 5.0),
                                                 Vector3f::zeros(),
                                                 Vector3f::new(0.0, 1.0, 0.0),
                                                 std::f32::consts::FRAC_PI_2,
                                                 8, 8));
        let scene = TraceableScene::new(&ctx, primitives, Vec::new(), Vec::new(), camera);

        // The delta light is the only light, and no default is added.
        assert_eq!(scene.lights().len(), 1);
        assert_eq!(scene.infinite_lights().len(), 0);

        // Scene bounds cover the sphere only; a ray toward the light's
        // position sails through.
        assert!(scene.bounds().contains_point(&Vector3f::new(0.0, 1.0, 0.0)));
        assert!(!scene.bounds().contains_point(&Vector3f::new(0.0, 5.0, 0.0)));
        let toward_light = Ray3f::new(Vector3f::new(0.0, 3.0, 0.0),
                                      Vector3f::new(0.0, 1.0, 0.0), None, None);
        assert!(!scene.occluded(&toward_light));
    }
}
