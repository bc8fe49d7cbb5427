// Copyright @yucwang 2026

use crate::core::accel::Bvh;
use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::tangent_frame::build_tangent_frame;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;
use std::sync::Arc;

/// Camera-facing ribbons swept along cubic Bezier segments. Intersection
/// projects the segment into a ray-aligned frame and subdivides until the
/// flat remainder can be tested as a thin quad of the local width.
pub struct Curves {
    segments: Vec<[Vector3f; 4]>,
    widths: Vec<(Float, Float)>,
    transform: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,

    world_segments: Vec<[Vector3f; 4]>,
    world_widths: Vec<(Float, Float)>,
    bvh: Option<Bvh>,
}

impl Curves {
    pub fn new(segments: Vec<[Vector3f; 4]>, widths: Vec<(Float, Float)>) -> Self {
        debug_assert_eq!(segments.len(), widths.len());
        Self {
            segments,
            widths,
            transform: Transform::default(),
            bsdf: None,
            world_segments: Vec::new(),
            world_widths: Vec::new(),
            bvh: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_bsdf(mut self, bsdf: Arc<dyn Bsdf>) -> Self {
        self.bsdf = Some(bsdf);
        self
    }

    fn segment_bounds(cp: &[Vector3f; 4], max_width: Float) -> AABB {
        // The Bezier hull bounds the curve; pad by half the width.
        let mut bbox = AABB::default();
        for p in cp {
            bbox.expand_by_point(p);
        }
        let pad = 0.5 * max_width;
        AABB::new(bbox.p_min - Vector3f::new(pad, pad, pad),
                  bbox.p_max + Vector3f::new(pad, pad, pad))
    }

    fn intersect_segment(&self, seg: usize, ray: &mut Ray3f,
                         data: &mut IntersectionTemporary) -> bool {
        let cp = &self.world_segments[seg];
        let (w0, w1) = self.world_widths[seg];

        // Ray-aligned frame: +z along the ray, the curve projected into
        // the xy plane around the origin.
        let d = ray.dir();
        let (fx, fy) = build_tangent_frame(&d);
        let o = ray.origin();
        let local = [
            project(&(cp[0] - o), &fx, &fy, &d),
            project(&(cp[1] - o), &fx, &fy, &d),
            project(&(cp[2] - o), &fx, &fy, &d),
            project(&(cp[3] - o), &fx, &fy, &d),
        ];

        let depth = subdivision_depth(cp, w0.max(w1));
        let mut best: Option<(Float, Float, Float)> = None;
        recurse(&local, 0.0, 1.0, w0, w1, depth, ray, &mut best);

        if let Some((t, u, v)) = best {
            if ray.update(t) {
                data.payload = IntersectionPayload::Curve {
                    segment: seg as u32,
                    u,
                    v,
                    p: ray.at(t),
                    d,
                };
                return true;
            }
        }
        false
    }
}

fn project(v: &Vector3f, fx: &Vector3f, fy: &Vector3f, fz: &Vector3f) -> Vector3f {
    Vector3f::new(v.dot(fx), v.dot(fy), v.dot(fz))
}

fn bezier_eval(cp: &[Vector3f; 4], u: Float) -> Vector3f {
    let a = cp[0] * (1.0 - u) + cp[1] * u;
    let b = cp[1] * (1.0 - u) + cp[2] * u;
    let c = cp[2] * (1.0 - u) + cp[3] * u;
    let ab = a * (1.0 - u) + b * u;
    let bc = b * (1.0 - u) + c * u;
    ab * (1.0 - u) + bc * u
}

fn bezier_tangent(cp: &[Vector3f; 4], u: Float) -> Vector3f {
    let d0 = (cp[1] - cp[0]) * 3.0;
    let d1 = (cp[2] - cp[1]) * 3.0;
    let d2 = (cp[3] - cp[2]) * 3.0;
    let a = d0 * (1.0 - u) + d1 * u;
    let b = d1 * (1.0 - u) + d2 * u;
    let t = a * (1.0 - u) + b * u;
    if t.norm_squared() > 1e-12 {
        t.normalize()
    } else {
        (cp[3] - cp[0]).normalize()
    }
}

fn bezier_split(cp: &[Vector3f; 4]) -> ([Vector3f; 4], [Vector3f; 4]) {
    let m01 = (cp[0] + cp[1]) * 0.5;
    let m12 = (cp[1] + cp[2]) * 0.5;
    let m23 = (cp[2] + cp[3]) * 0.5;
    let m012 = (m01 + m12) * 0.5;
    let m123 = (m12 + m23) * 0.5;
    let mid = (m012 + m123) * 0.5;
    ([cp[0], m01, m012, mid], [mid, m123, m23, cp[3]])
}

fn subdivision_depth(cp: &[Vector3f; 4], max_width: Float) -> u32 {
    // Halving until the control polygon deviation drops below a fraction
    // of the ribbon width.
    let l0 = (cp[0] - cp[1] * 2.0 + cp[2]).norm()
        .max((cp[1] - cp[2] * 2.0 + cp[3]).norm());
    if l0 <= 0.0 {
        return 0;
    }
    let eps = (max_width * 0.05).max(1e-5);
    let mut depth = 0u32;
    let mut dev = 1.41421356 * 6.0 * l0 / 8.0;
    while dev > eps && depth < 10 {
        dev *= 0.25;
        depth += 1;
    }
    depth
}

fn recurse(cp: &[Vector3f; 4], u0: Float, u1: Float, w0: Float, w1: Float,
           depth: u32, ray: &Ray3f, best: &mut Option<(Float, Float, Float)>) {
    // Conservative reject in the ray frame: the ray is the z axis.
    let max_w = 0.5 * (w0 + (w1 - w0) * u0.max(u1)).max(w0 + (w1 - w0) * u0.min(u1));
    let mut bbox = AABB::default();
    for p in cp {
        bbox.expand_by_point(p);
    }
    if bbox.p_min.x > max_w || bbox.p_max.x < -max_w
        || bbox.p_min.y > max_w || bbox.p_max.y < -max_w {
        return;
    }
    if bbox.p_max.z < ray.min_t || bbox.p_min.z > ray.max_t {
        return;
    }

    if depth > 0 {
        let (left, right) = bezier_split(cp);
        let um = 0.5 * (u0 + u1);
        recurse(&left, u0, um, w0, w1, depth - 1, ray, best);
        recurse(&right, um, u1, w0, w1, depth - 1, ray, best);
        return;
    }

    // Flat enough: treat the span as a line segment in the xy plane and
    // test the origin's distance against the interpolated half-width.
    let seg = cp[3].xy() - cp[0].xy();
    let len2 = seg.norm_squared();
    let w = if len2 > 1e-12 {
        (-cp[0].xy()).dot(&seg) / len2
    } else {
        0.5
    };
    let w = w.clamp(0.0, 1.0);
    let u = u0 + (u1 - u0) * w;
    let half_width = 0.5 * (w0 + (w1 - w0) * u);

    let pc = bezier_eval(cp, w);
    let dist2 = pc.x * pc.x + pc.y * pc.y;
    if dist2 > half_width * half_width {
        return;
    }

    let t = pc.z;
    if !ray.test_segment(t) {
        return;
    }
    if best.map_or(true, |(bt, _, _)| t < bt) {
        let v = 0.5 + 0.5 * (dist2.sqrt() / half_width.max(1e-8));
        *best = Some((t, u, v));
    }
}

impl Primitive for Curves {
    fn type_name(&self) -> &'static str {
        "curves"
    }

    fn prepare_for_render(&mut self) {
        let scale = self.transform.max_scale();
        self.world_segments = self.segments.iter()
            .map(|cp| [
                self.transform.apply_point(cp[0]),
                self.transform.apply_point(cp[1]),
                self.transform.apply_point(cp[2]),
                self.transform.apply_point(cp[3]),
            ])
            .collect();
        self.world_widths = self.widths.iter()
            .map(|(w0, w1)| (w0 * scale, w1 * scale))
            .collect();

        if self.world_segments.is_empty() {
            self.bvh = None;
        } else {
            let leaf_bounds = self.world_segments.iter()
                .zip(&self.world_widths)
                .map(|(cp, (w0, w1))| Self::segment_bounds(cp, w0.max(*w1)))
                .collect();
            self.bvh = Some(Bvh::over_leaves(leaf_bounds));
        }
    }

    fn teardown_after_render(&mut self) {
        self.world_segments.clear();
        self.world_widths.clear();
        self.bvh = None;
    }

    fn bounds(&self) -> AABB {
        match &self.bvh {
            Some(bvh) => bvh.bounds(),
            None => AABB::default(),
        }
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let bvh = match &self.bvh {
            Some(bvh) => bvh,
            None => return false,
        };
        bvh.closest_hit(ray, |seg, ray| self.intersect_segment(seg, ray, data))
            .is_some()
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        let mut probe = ray.with_range(ray.min_t, ray.max_t);
        let mut data = IntersectionTemporary::new();
        self.intersect(&mut probe, &mut data)
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let (segment, u, v, p, d) = match data.payload {
            IntersectionPayload::Curve { segment, u, v, p, d } => {
                (segment as usize, u, v, p, d)
            }
            _ => panic!("curve expansion from a foreign payload"),
        };

        let tangent = bezier_tangent(&self.world_segments[segment], u);
        // Ribbon normal: the direction opposing the ray, orthogonalized
        // against the curve tangent.
        let mut n = -d - tangent * tangent.dot(&-d);
        if n.norm_squared() < 1e-10 {
            let (t_axis, _) = build_tangent_frame(&tangent);
            n = t_axis;
        }
        info.p = p;
        info.ng = n.normalize();
        info.ns = info.ng;
        info.uv = Vector2f::new(u, v);
        info.bsdf = self.bsdf.clone();
    }

    // No stable frame across the ribbon width.

    fn is_emissive(&self) -> bool {
        false
    }

    fn bsdf(&self, _data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        self.bsdf.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::LcgRng;
    use crate::math::warp::square_to_uniform_sphere;

    fn straight_ribbon() -> Curves {
        // A straight "curve" along x at y = 0, z = 0, width 0.2.
        let cp = [
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(0.3333, 0.0, 0.0),
            Vector3f::new(0.6667, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
        ];
        let mut curves = Curves::new(vec![cp], vec![(0.2, 0.2)]);
        curves.prepare_for_render();
        curves
    }

    #[test]
    fn test_ribbon_center_hit() {
        let curves = straight_ribbon();
        let mut ray = Ray3f::new(Vector3f::new(0.5, 0.0, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(curves.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 2.0).abs() < 1e-2);

        let mut info = IntersectionInfo::new();
        curves.intersection_info(&data, &mut info);
        assert!((info.uv.x - 0.5).abs() < 0.05);
        // Ribbon faces the incoming ray.
        assert!(info.ng.dot(&Vector3f::new(0.0, 0.0, 1.0)) > 0.9);
    }

    #[test]
    fn test_ribbon_width_bounds_hits() {
        let curves = straight_ribbon();
        let mut inside = Ray3f::new(Vector3f::new(0.5, 0.08, 2.0),
                                    Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(curves.intersect(&mut inside, &mut data));

        let mut outside = Ray3f::new(Vector3f::new(0.5, 0.15, 2.0),
                                     Vector3f::new(0.0, 0.0, -1.0), None, Some(30.0));
        assert!(!curves.intersect(&mut outside, &mut data));
        assert_eq!(outside.max_t, 30.0);
    }

    #[test]
    fn test_curved_segment_tracks_control_polygon() {
        // An arc bowing up to z = 0.75 at its middle.
        let cp = [
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(0.3333, 0.0, 1.0),
            Vector3f::new(0.6667, 0.0, 1.0),
            Vector3f::new(1.0, 0.0, 0.0),
        ];
        let mut curves = Curves::new(vec![cp], vec![(0.1, 0.1)]);
        curves.prepare_for_render();

        let mut ray = Ray3f::new(Vector3f::new(0.5, 2.0, 0.75),
                                 Vector3f::new(0.0, -1.0, 0.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(curves.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_curves_occlusion_agreement() {
        let curves = straight_ribbon();
        let mut rng = LcgRng::new(67);
        for _ in 0..256 {
            let origin = Vector3f::new(rng.next_f32() * 3.0 - 1.0,
                                       rng.next_f32() * 2.0 - 1.0,
                                       rng.next_f32() * 2.0 - 1.0);
            let dir = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(origin, dir, Some(1e-3), None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(curves.occluded(&ray), curves.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_curves_have_no_tangent_space() {
        let curves = straight_ribbon();
        let mut ray = Ray3f::new(Vector3f::new(0.5, 0.0, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(curves.intersect(&mut ray, &mut data));
        let mut info = IntersectionInfo::new();
        curves.intersection_info(&data, &mut info);
        assert!(curves.tangent_space(&data, &info).is_none());
    }
}
