// Copyright @yucwang 2026

use crate::core::accel::{ Bvh, TraceContext };
use crate::core::bsdf::Bsdf;
use crate::core::camera::Camera;
use crate::core::intersection::{ IntersectionInfo, IntersectionTemporary };
use crate::core::medium::Medium;
use crate::core::primitive::Primitive;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::primitives::infinite_sphere::InfiniteSphere;
use std::sync::Arc;

const DEFAULT_EMITTER_RADIANCE: Float = 0.5;

/// The scene aggregator: owns the primitive/BSDF/media lists and the
/// camera, derives the per-render classification (finite, infinite,
/// emissive) and one top-level acceleration structure whose leaves
/// forward to each primitive's own bounds/intersect/occluded. Constructed
/// once per render; all queries afterwards are read-only and safe to call
/// concurrently.
pub struct TraceableScene {
    primitives: Vec<Box<dyn Primitive>>,
    bsdfs: Vec<Arc<dyn Bsdf>>,
    media: Vec<Box<dyn Medium>>,
    camera: Box<dyn Camera>,
    finites: Vec<usize>,
    infinites: Vec<usize>,
    lights: Vec<usize>,
    scene_bounds: AABB,
    accel: Option<Bvh>,
    use_accel: bool,
}

impl TraceableScene {
    /// Runs the full prepare cascade: camera, media, BSDFs (deduplicating
    /// shared/named ones), primitives, classification, default-emitter
    /// synthesis, scene bounds, sampling precomputation, acceleration
    /// build.
    pub fn new(ctx: &TraceContext,
               mut primitives: Vec<Box<dyn Primitive>>,
               bsdfs: Vec<Arc<dyn Bsdf>>,
               mut media: Vec<Box<dyn Medium>>,
               mut camera: Box<dyn Camera>) -> Self {
        camera.prepare_for_render();

        for medium in &mut media {
            medium.prepare_for_render();
        }

        // A named or pointer-shared BSDF is prepared exactly once even
        // when several primitives alias it.
        let mut prepared: Vec<&Arc<dyn Bsdf>> = Vec::new();
        let mut prepared_names: Vec<String> = Vec::new();
        for bsdf in &bsdfs {
            if prepared.iter().any(|seen| Arc::ptr_eq(seen, bsdf)) {
                continue;
            }
            if let Some(name) = bsdf.name() {
                if prepared_names.iter().any(|seen| seen == name) {
                    log::debug!("skipping shared bsdf '{}', already prepared", name);
                    prepared.push(bsdf);
                    continue;
                }
                prepared_names.push(name.to_string());
            }
            bsdf.prepare_for_render();
            prepared.push(bsdf);
        }

        for primitive in &mut primitives {
            primitive.prepare_for_render();
        }

        let mut lights: Vec<usize> = (0..primitives.len())
            .filter(|&i| primitives[i].is_emissive())
            .collect();

        if lights.is_empty() {
            // Direct-lighting estimators must never face an empty light
            // list; synthesize one uniform environment emitter.
            log::info!("scene has no emissive primitives, adding a default environment");
            let mut default_light =
                InfiniteSphere::uniform(RGBSpectrum::from_scalar(DEFAULT_EMITTER_RADIANCE));
            default_light.prepare_for_render();
            primitives.push(Box::new(default_light));
            lights.push(primitives.len() - 1);
        }

        let infinites: Vec<usize> = (0..primitives.len())
            .filter(|&i| primitives[i].is_infinite())
            .collect();
        let finites: Vec<usize> = (0..primitives.len())
            .filter(|&i| !primitives[i].is_infinite() && !primitives[i].is_delta())
            .collect();

        let mut scene_bounds = AABB::default();
        for &idx in &finites {
            let bounds = primitives[idx].bounds();
            if bounds.is_valid() {
                scene_bounds.expand_by_aabb(&bounds);
            }
        }

        for primitive in &mut primitives {
            primitive.set_scene_bounds(&scene_bounds);
        }
        for &idx in &lights {
            primitives[idx].make_samplable();
        }

        let leaf_bounds: Vec<AABB> = finites.iter()
            .map(|&idx| primitives[idx].bounds())
            .collect();
        let accel = ctx.build(leaf_bounds);

        log::info!("prepared scene: {} primitives ({} finite, {} infinite), {} lights",
                   primitives.len(), finites.len(), infinites.len(), lights.len());

        Self {
            primitives,
            bsdfs,
            media,
            camera,
            finites,
            infinites,
            lights,
            scene_bounds,
            accel: Some(accel),
            use_accel: true,
        }
    }

    /// Drop the acceleration structure and fall back to a linear scan.
    /// Source geometry is untouched.
    pub fn set_use_accel(&mut self, use_accel: bool) {
        self.use_accel = use_accel;
    }

    fn closest_finite(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary)
        -> Option<usize> {
        if self.use_accel {
            if let Some(accel) = &self.accel {
                return accel
                    .closest_hit(ray, |leaf, ray| {
                        self.primitives[self.finites[leaf]].intersect(ray, data)
                    })
                    .map(|leaf| self.finites[leaf]);
            }
        }

        let mut hit = None;
        for &idx in &self.finites {
            if self.primitives[idx].intersect(ray, data) {
                hit = Some(idx);
            }
        }
        hit
    }

    /// Closest hit over the finite scene. On success the scratch record
    /// names the owning primitive and `info` holds the expanded hit;
    /// expansion happens once, never per acceleration candidate.
    pub fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary,
                     info: &mut IntersectionInfo) -> bool {
        data.reset();
        match self.closest_finite(ray, data) {
            Some(idx) => {
                data.primitive = Some(idx);
                self.primitives[idx].intersection_info(data, info);
                info.w = ray.dir();
                info.t = ray.max_t;
                true
            }
            None => false,
        }
    }

    /// Boolean shadow query over the finite scene.
    pub fn occluded(&self, ray: &Ray3f) -> bool {
        if self.use_accel {
            if let Some(accel) = &self.accel {
                return accel.occluded(ray, |leaf, ray| {
                    self.primitives[self.finites[leaf]].occluded(ray)
                });
            }
        }
        self.finites.iter().any(|&idx| self.primitives[idx].occluded(ray))
    }

    /// Exhaustive pass over only the unbounded emitters, used after the
    /// finite scene reported a miss.
    pub fn intersect_infinites(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary,
                               info: &mut IntersectionInfo) -> bool {
        data.reset();
        for &idx in &self.infinites {
            if self.primitives[idx].intersect(ray, data) {
                data.primitive = Some(idx);
                self.primitives[idx].intersection_info(data, info);
                info.w = ray.dir();
                info.t = ray.max_t;
                return true;
            }
        }
        false
    }

    /// Distance-only convenience query.
    pub fn hit_distance(&self, ray: &Ray3f) -> Option<Float> {
        let mut probe = ray.with_range(ray.min_t, ray.max_t);
        let mut data = IntersectionTemporary::new();
        self.closest_finite(&mut probe, &mut data).map(|_| probe.max_t)
    }

    pub fn bounds(&self) -> AABB {
        self.scene_bounds
    }

    pub fn primitives(&self) -> &[Box<dyn Primitive>] {
        &self.primitives
    }

    pub fn primitive(&self, idx: usize) -> &dyn Primitive {
        self.primitives[idx].as_ref()
    }

    pub fn lights(&self) -> &[usize] {
        &self.lights
    }

    pub fn infinite_lights(&self) -> &[usize] {
        &self.infinites
    }

    pub fn bsdfs(&self) -> &[Arc<dyn Bsdf>] {
        &self.bsdfs
    }

    pub fn media(&self) -> &[Box<dyn Medium>] {
        &self.media
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn Camera {
        self.camera.as_mut()
    }

    /// Reverse of the prepare cascade. Releases derived state only, is
    /// idempotent, and leaves source geometry intact for a re-render.
    pub fn teardown_after_render(&mut self) {
        self.accel = None;
        for primitive in self.primitives.iter_mut().rev() {
            primitive.teardown_after_render();
        }
        for bsdf in self.bsdfs.iter().rev() {
            bsdf.teardown_after_render();
        }
        for medium in self.media.iter_mut().rev() {
            medium.teardown_after_render();
        }
        self.camera.teardown_after_render();
    }
}
