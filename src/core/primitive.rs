// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionTemporary };
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use std::sync::Arc;

/// The polymorphic surface-primitive contract. Implementations are
/// immutable after `prepare_for_render`/`make_samplable`; every other
/// operation is read-only and safe for concurrent queries.
pub trait Primitive: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Bake world-space state for the current object transform. After this
    /// call `bounds()` must enclose every point `intersect` or sampling can
    /// produce.
    fn prepare_for_render(&mut self);

    /// Drop derived render state. Idempotent; safe without a prior prepare.
    fn teardown_after_render(&mut self) {}

    fn bounds(&self) -> AABB;

    /// On a hit inside `[min_t, max_t]`, shrink the ray's far bound to the
    /// hit distance and fill the scratch record. Must leave the far bound
    /// untouched on a miss. Only the nearest accepted hit's scratch
    /// survives a multi-candidate query.
    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool;

    /// Shadow-ray predicate. Must agree with `intersect` on hit/miss over
    /// the same interval, but fills no scratch.
    fn occluded(&self, ray: &Ray3f) -> bool;

    /// True when the accepted hit's outward normal opposes the incoming
    /// ray. Callers suppress emission from the back of one-sided lights.
    fn hit_backside(&self, _data: &IntersectionTemporary) -> bool {
        false
    }

    /// Expand the opaque scratch into the canonical record. Called only
    /// for accepted hits.
    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo);

    /// Tangent frame from the surface parametrization, or None when no
    /// stable frame exists; callers fall back to an arbitrary orthonormal
    /// frame.
    fn tangent_space(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        None
    }

    fn is_samplable(&self) -> bool {
        false
    }

    /// Idempotent precomputation (e.g. an importance table over an
    /// environment texture). Runs in the single-threaded prepare phase,
    /// before any worker issues direct-lighting samples.
    fn make_samplable(&mut self) {}

    fn sample_position(&self, _rng: &mut LcgRng, _sample: &mut PositionSample) -> bool {
        false
    }

    fn positional_pdf(&self, _sample: &PositionSample) -> Float {
        0.0
    }

    fn sample_direction(&self, _rng: &mut LcgRng, _point: &PositionSample,
                        _sample: &mut DirectionSample) -> bool {
        false
    }

    fn directional_pdf(&self, _point: &PositionSample, _d: &Vector3f) -> Float {
        0.0
    }

    /// Draw a direction from the shading point `sample.p` toward this
    /// emitter. Fills `d`, `dist`, the solid-angle `pdf` and the
    /// unweighted emission `weight`. Must draw from exactly the density
    /// `inbound_pdf` reports.
    fn sample_inbound_direction(&self, _rng: &mut LcgRng, _sample: &mut LightSample) -> bool {
        false
    }

    /// Solid-angle density of `sample_inbound_direction` for the hit
    /// described by `data`/`info`, seen from `p` along `d`.
    fn inbound_pdf(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo,
                   _p: &Vector3f, _d: &Vector3f) -> Float {
        0.0
    }

    /// Emission-first sampling: a position on the emitter plus an outgoing
    /// direction, for light-tracing style algorithms.
    fn sample_outbound_direction(&self, rng: &mut LcgRng, pos: &mut PositionSample,
                                 dir: &mut DirectionSample) -> bool {
        if !self.sample_position(rng, pos) {
            return false;
        }
        self.sample_direction(rng, pos, dir)
    }

    /// Map a surface coordinate back to world space; None where the
    /// parametrization is not invertible.
    fn invert_parametrization(&self, _uv: &Vector2f) -> Option<Vector3f> {
        None
    }

    /// Zero-measure emitters (point/directional style); never appear in
    /// area-sampling code paths.
    fn is_delta(&self) -> bool {
        false
    }

    /// Unbounded background emitters; excluded from the finite scene
    /// bounds and from the primary acceleration structure.
    fn is_infinite(&self) -> bool {
        false
    }

    fn is_emissive(&self) -> bool;

    /// Unweighted radiance leaving the hit toward the incoming ray.
    fn evaluate_emission(&self, _data: &IntersectionTemporary, _info: &IntersectionInfo)
        -> crate::math::spectrum::RGBSpectrum {
        crate::math::spectrum::RGBSpectrum::default()
    }

    /// Order-of-magnitude radiance estimate from `p` for light-importance
    /// heuristics. A negative value means "unknown magnitude"; callers
    /// must never feed it into correctness-critical computation.
    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        -1.0
    }

    /// Scene bounds of the finite geometry, handed to unbounded emitters
    /// before sampling so they can position samples on the bounding
    /// sphere.
    fn set_scene_bounds(&mut self, _bounds: &AABB) {}

    /// BSDF governing the sub-surface the scratch record resolved to.
    fn bsdf(&self, _data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        None
    }
}
