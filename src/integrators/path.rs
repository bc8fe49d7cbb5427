// Copyright @yucwang 2026

use crate::core::integrator::Integrator;
use crate::core::intersection::{ IntersectionInfo, IntersectionTemporary };
use crate::core::records::LightSample;
use crate::core::rng::LcgRng;
use crate::core::scene::TraceableScene;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world, world_to_local };
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Unidirectional path tracer with next-event estimation. Light and BSDF
/// strategies are combined with the power heuristic; sample records carry
/// unweighted radiance, so every `weight / pdf` division happens here and
/// nowhere inside a primitive.
pub struct PathIntegrator {
    max_depth: u32,
    samples_per_pixel: u32,
}

impl PathIntegrator {
    pub fn new(max_depth: u32, samples_per_pixel: u32) -> Self {
        Self { max_depth, samples_per_pixel }
    }

    fn power_heuristic(a: Float, b: Float) -> Float {
        let a2 = a * a;
        if a2 + b * b <= 0.0 {
            0.0
        } else {
            a2 / (a2 + b * b)
        }
    }

    fn shading_frame(scene: &TraceableScene, data: &IntersectionTemporary,
                     info: &IntersectionInfo) -> (Vector3f, Vector3f, Vector3f) {
        let n = info.ns;
        let prim = scene.primitive(data.primitive.expect("expanded hit"));
        match prim.tangent_space(data, info) {
            Some((t, _)) => {
                // Re-orthogonalize the uv tangent against the shading
                // normal.
                let t_proj = t - n * n.dot(&t);
                if t_proj.norm_squared() > 1e-8 {
                    let t = t_proj.normalize();
                    let b = n.cross(&t).normalize();
                    (t, b, n)
                } else {
                    let (t, b) = build_tangent_frame(&n);
                    (t, b, n)
                }
            }
            None => {
                let (t, b) = build_tangent_frame(&n);
                (t, b, n)
            }
        }
    }

    fn direct_lighting(&self, scene: &TraceableScene, info: &IntersectionInfo,
                       wo_local: &Vector3f, frame: &(Vector3f, Vector3f, Vector3f),
                       bsdf: &dyn crate::core::bsdf::Bsdf, rng: &mut LcgRng)
        -> RGBSpectrum {
        let lights = scene.lights();
        if lights.is_empty() {
            return RGBSpectrum::default();
        }

        let pick = ((rng.next_f32() * lights.len() as Float) as usize).min(lights.len() - 1);
        let light = scene.primitive(lights[pick]);
        if !light.is_samplable() {
            return RGBSpectrum::default();
        }
        let select_pdf = 1.0 / lights.len() as Float;

        let mut sample = LightSample::at(info.p);
        if !light.sample_inbound_direction(rng, &mut sample) || sample.pdf <= 0.0 {
            return RGBSpectrum::default();
        }

        let (t, b, n) = *frame;
        let wi_local = world_to_local(&sample.d, &t, &b, &n);
        if wi_local.z <= 0.0 {
            return RGBSpectrum::default();
        }

        let f = bsdf.eval(wo_local, &wi_local);
        if f.is_black() {
            return RGBSpectrum::default();
        }

        let shadow = Ray3f::new(info.p + info.ng * info.epsilon, sample.d,
                                Some(0.0), Some(sample.dist - 2.0 * info.epsilon));
        if scene.occluded(&shadow) {
            return RGBSpectrum::default();
        }

        let light_pdf = sample.pdf * select_pdf;
        // A delta light cannot be reached by BSDF sampling, so its light
        // sample carries full weight.
        let mis = if light.is_delta() {
            1.0
        } else {
            Self::power_heuristic(light_pdf, bsdf.pdf(wo_local, &wi_local))
        };
        f * sample.weight * (wi_local.z * mis / light_pdf)
    }

    fn light_select_pdf(scene: &TraceableScene, prim_idx: usize) -> Float {
        let lights = scene.lights();
        if lights.iter().any(|&idx| idx == prim_idx) {
            1.0 / lights.len() as Float
        } else {
            0.0
        }
    }
}

impl Integrator for PathIntegrator {
    fn trace_sample(&self, scene: &TraceableScene, pixel: Vector2f, rng: &mut LcgRng)
        -> RGBSpectrum {
        let mut ray = scene.camera().generate_ray(pixel, rng.next_2d());
        let mut radiance = RGBSpectrum::default();
        let mut throughput = RGBSpectrum::from_scalar(1.0);
        let mut prev_bsdf_pdf = 0.0;
        let mut prev_p = ray.origin();
        let mut from_camera = true;

        for depth in 0..self.max_depth {
            let mut data = IntersectionTemporary::new();
            let mut info = IntersectionInfo::new();

            if !scene.intersect(&mut ray, &mut data, &mut info) {
                if scene.intersect_infinites(&mut ray, &mut data, &mut info) {
                    let prim_idx = data.primitive.expect("expanded hit");
                    let prim = scene.primitive(prim_idx);
                    let le = prim.evaluate_emission(&data, &info);
                    if !le.is_black() {
                        let mis = if from_camera {
                            1.0
                        } else {
                            let light_pdf = prim.inbound_pdf(&data, &info, &prev_p, &ray.dir())
                                * Self::light_select_pdf(scene, prim_idx);
                            Self::power_heuristic(prev_bsdf_pdf, light_pdf)
                        };
                        radiance += throughput * le * mis;
                    }
                }
                break;
            }

            let prim_idx = data.primitive.expect("expanded hit");
            let prim = scene.primitive(prim_idx);

            if prim.is_emissive() && !prim.hit_backside(&data) {
                let le = prim.evaluate_emission(&data, &info);
                if !le.is_black() {
                    let mis = if from_camera {
                        1.0
                    } else {
                        let light_pdf = prim.inbound_pdf(&data, &info, &prev_p, &ray.dir())
                            * Self::light_select_pdf(scene, prim_idx);
                        Self::power_heuristic(prev_bsdf_pdf, light_pdf)
                    };
                    radiance += throughput * le * mis;
                }
            }

            let bsdf = match &info.bsdf {
                Some(bsdf) => bsdf.clone(),
                None => break,
            };

            let frame = Self::shading_frame(scene, &data, &info);
            let (t, b, n) = frame;
            let wo_local = world_to_local(&-ray.dir(), &t, &b, &n);
            if wo_local.z <= 0.0 {
                break;
            }

            radiance += throughput
                * self.direct_lighting(scene, &info, &wo_local, &frame, bsdf.as_ref(), rng);

            let sample = match bsdf.sample(rng, &wo_local) {
                Some(sample) if sample.pdf > 0.0 => sample,
                _ => break,
            };
            throughput *= sample.value * (sample.wi.z / sample.pdf);
            if throughput.max_component() <= 0.0 {
                break;
            }

            // Russian roulette once the path has a few bounces behind it.
            if depth >= 3 {
                let survive = throughput.max_component().min(0.95);
                if rng.next_f32() > survive {
                    break;
                }
                throughput = throughput * (1.0 / survive);
            }

            let wi_world = local_to_world(&sample.wi, &t, &b, &n);
            prev_p = info.p;
            prev_bsdf_pdf = sample.pdf;
            from_camera = false;
            ray = Ray3f::new(info.p + info.ng * info.epsilon, wi_world,
                             Some(0.0), None);
        }

        radiance
    }

    fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::pinhole::PinholeCamera;
    use crate::core::accel::TraceContext;
    use crate::core::primitive::Primitive;
    use crate::materials::lambert::LambertBsdf;
    use crate::math::transform::Transform;
    use crate::primitives::quad::Quad;
    use crate::primitives::sphere::Sphere;
    use std::sync::Arc;

    fn lit_scene() -> TraceableScene {
        // A diffuse floor quad under a small area light.
        let floor_bsdf: Arc<dyn crate::core::bsdf::Bsdf> =
            Arc::new(LambertBsdf::new(RGBSpectrum::new(0.8, 0.8, 0.8)));
        let primitives: Vec<Box<dyn Primitive>> = vec![
            Box::new(Quad::new(Transform::scale(Vector3f::new(4.0, 4.0, 1.0)))
                     .with_bsdf(floor_bsdf.clone())),
            Box::new(Quad::new(Transform::translate(Vector3f::new(0.0, 0.0, 3.0))
                               .compose(&Transform::rotate(
                                   crate::math::constants::Quaternionf::from_axis_angle(
                                       &nalgebra::Unit::new_normalize(
                                           Vector3f::new(1.0, 0.0, 0.0)),
                                       std::f32::consts::PI))))
                     .with_emission(RGBSpectrum::new(8.0, 8.0, 8.0))),
        ];
        let camera = Box::new(PinholeCamera::new(Vector3f::new(0.0, -0.01, 2.0),
                                                 Vector3f::new(0.0, 0.0, 0.0),
                                                 Vector3f::new(0.0, 1.0, 0.0),
                                                 std::f32::consts::FRAC_PI_2,
                                                 8, 8));
        let ctx = TraceContext::new();
        TraceableScene::new(&ctx, primitives, vec![floor_bsdf], Vec::new(), camera)
    }

    #[test]
    fn test_path_integrator_sees_light() {
        let scene = lit_scene();
        let integrator = PathIntegrator::new(4, 16);
        let mut rng = LcgRng::new(11);

        let mut total = RGBSpectrum::default();
        for _ in 0..64 {
            total += integrator.trace_sample(&scene, Vector2f::new(3.5, 3.5), &mut rng);
        }
        let mean = total * (1.0 / 64.0);
        // The floor reflects the overhead light: strictly positive but
        // below the light's own radiance.
        assert!(mean.luminance() > 0.0);
        assert!(mean.luminance() < 8.0);
    }

    #[test]
    fn test_power_heuristic_properties() {
        assert_eq!(PathIntegrator::power_heuristic(0.0, 0.0), 0.0);
        assert!((PathIntegrator::power_heuristic(1.0, 1.0) - 0.5).abs() < 1e-6);
        // Complementary weights sum to one.
        let a = PathIntegrator::power_heuristic(0.3, 1.7);
        let b = PathIntegrator::power_heuristic(1.7, 0.3);
        assert!((a + b - 1.0).abs() < 1e-6);
        // The sharper strategy dominates.
        assert!(PathIntegrator::power_heuristic(10.0, 0.1) > 0.99);
    }
}
