// Copyright @yucwang 2023

use super::triangle::Triangle;

use crate::core::accel::Bvh;
use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };
use crate::io::obj_utils;
use crate::io::obj_utils::ObjLoadError;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{ square_to_cosine_hemisphere, square_to_cosine_hemisphere_pdf,
                         square_to_triangle };
use std::sync::Arc;

/// Indexed triangle mesh. Local vertices are baked into world space at
/// `prepare_for_render`; intersection runs through an internal BVH over
/// triangle bounds. An empty mesh is valid, inert and non-intersecting.
pub struct TriangleMesh {
    verts: Vec<Vector3f>,
    normals: Vec<Vector3f>,
    uvs: Vec<Vector2f>,
    tris: Vec<[u32; 3]>,
    tri_bsdf: Vec<u32>,
    smooth: bool,
    transform: Transform,
    bsdfs: Vec<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,

    world_verts: Vec<Vector3f>,
    world_normals: Vec<Vector3f>,
    bvh: Option<Bvh>,
    area_cdf: Vec<Float>,
    total_area: Float,
}

impl TriangleMesh {
    pub fn new(verts: Vec<Vector3f>, tris: Vec<[u32; 3]>) -> Self {
        Self {
            verts,
            normals: Vec::new(),
            uvs: Vec::new(),
            tris,
            tri_bsdf: Vec::new(),
            smooth: false,
            transform: Transform::default(),
            bsdfs: Vec::new(),
            emission: RGBSpectrum::default(),
            world_verts: Vec::new(),
            world_normals: Vec::new(),
            bvh: None,
            area_cdf: Vec::new(),
            total_area: 0.0,
        }
    }

    pub fn from_obj(path: &str) -> Result<Self, ObjLoadError> {
        let (verts, normals, uvs, tris) = obj_utils::load_mesh_buffers(path)?;
        let smooth = !normals.is_empty();
        let mut mesh = Self::new(verts, tris);
        mesh.normals = normals;
        mesh.uvs = uvs;
        mesh.smooth = smooth;
        Ok(mesh)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_normals(mut self, normals: Vec<Vector3f>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vector2f>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn with_bsdfs(mut self, bsdfs: Vec<Arc<dyn Bsdf>>) -> Self {
        self.bsdfs = bsdfs;
        self
    }

    /// Per-triangle indices into the mesh's BSDF list.
    pub fn with_tri_bsdfs(mut self, tri_bsdf: Vec<u32>) -> Self {
        self.tri_bsdf = tri_bsdf;
        self
    }

    pub fn with_emission(mut self, emission: RGBSpectrum) -> Self {
        self.emission = emission;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }

    fn tri_at(&self, idx: usize) -> Triangle {
        let [a, b, c] = self.tris[idx];
        Triangle::new(self.world_verts[a as usize],
                      self.world_verts[b as usize],
                      self.world_verts[c as usize])
    }

    fn interpolated_uv(&self, idx: usize, u: Float, v: Float) -> Vector2f {
        let [a, b, c] = self.tris[idx];
        match (self.uvs.get(a as usize), self.uvs.get(b as usize), self.uvs.get(c as usize)) {
            (Some(uv0), Some(uv1), Some(uv2)) => {
                uv0 * (1.0 - u - v) + uv1 * u + uv2 * v
            }
            _ => Vector2f::new(u, v),
        }
    }

    fn shading_normal(&self, idx: usize, u: Float, v: Float, ng: &Vector3f) -> Vector3f {
        if !self.smooth {
            return *ng;
        }
        let [a, b, c] = self.tris[idx];
        let n = match (self.world_normals.get(a as usize),
                       self.world_normals.get(b as usize),
                       self.world_normals.get(c as usize)) {
            (Some(n0), Some(n1), Some(n2)) => {
                n0 * (1.0 - u - v) + n1 * u + n2 * v
            }
            _ => return *ng,
        };
        let len = n.norm();
        if len <= 0.0 {
            return *ng;
        }
        let mut ns = n / len;
        if ns.dot(ng) < 0.0 {
            ns = -ns;
        }
        ns
    }
}

impl Primitive for TriangleMesh {
    fn type_name(&self) -> &'static str {
        "mesh"
    }

    fn prepare_for_render(&mut self) {
        self.world_verts = self.verts.iter()
            .map(|v| self.transform.apply_point(*v))
            .collect();
        self.world_normals = self.normals.iter()
            .map(|n| {
                let n = self.transform.apply_normal(*n);
                let len = n.norm();
                if len > 0.0 { n / len } else { Vector3f::new(0.0, 0.0, 1.0) }
            })
            .collect();

        if self.tris.is_empty() {
            self.bvh = None;
        } else {
            let leaf_bounds = (0..self.tris.len())
                .map(|i| self.tri_at(i).bounding_box())
                .collect();
            self.bvh = Some(Bvh::over_leaves(leaf_bounds));
        }

        self.area_cdf.clear();
        self.total_area = 0.0;
    }

    fn teardown_after_render(&mut self) {
        self.world_verts.clear();
        self.world_normals.clear();
        self.bvh = None;
        self.area_cdf.clear();
        self.total_area = 0.0;
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

        bvh.closest_hit(ray, |tri_idx, ray| {
            if let Some(hit) = self.tri_at(tri_idx).intersect(ray) {
                if ray.update(hit.t) {
                    data.payload = IntersectionPayload::Triangle {
                        u: hit.u,
                        v: hit.v,
                        tri: tri_idx as u32,
                        backside: hit.backside,
                    };
                    return true;
                }
            }
            false
        }).is_some()
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        let bvh = match &self.bvh {
            Some(bvh) => bvh,
            None => return false,
        };
        bvh.occluded(ray, |tri_idx, ray| self.tri_at(tri_idx).intersect(ray).is_some())
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        match data.payload {
            IntersectionPayload::Triangle { backside, .. } => backside,
            _ => false,
        }
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let (u, v, tri) = match data.payload {
            IntersectionPayload::Triangle { u, v, tri, .. } => (u, v, tri as usize),
            _ => panic!("mesh expansion from a foreign payload"),
        };

        let triangle = self.tri_at(tri);
        let ng = triangle.geometric_normal();
        info.p = triangle.point_from_barycentric(u, v);
        info.ng = ng;
        info.ns = self.shading_normal(tri, u, v, &ng);
        info.uv = self.interpolated_uv(tri, u, v);
        info.bsdf = self.bsdf(data);
    }

    fn tangent_space(&self, data: &IntersectionTemporary, info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        let tri = match data.payload {
            IntersectionPayload::Triangle { tri, .. } => tri as usize,
            _ => return None,
        };
        let [a, b, c] = self.tris[tri];
        let (uv0, uv1, uv2) = match (self.uvs.get(a as usize),
                                     self.uvs.get(b as usize),
                                     self.uvs.get(c as usize)) {
            (Some(uv0), Some(uv1), Some(uv2)) => (*uv0, *uv1, *uv2),
            _ => return None,
        };

        let duv1 = uv1 - uv0;
        let duv2 = uv2 - uv0;
        let det = duv1.x * duv2.y - duv1.y * duv2.x;
        if det.abs() < 1e-10 {
            // Degenerate UV Jacobian.
            return None;
        }

        let triangle = self.tri_at(tri);
        let edge1 = triangle.p1 - triangle.p0;
        let edge2 = triangle.p2 - triangle.p0;
        let dp_du = (edge1 * duv2.y - edge2 * duv1.y) / det;
        if dp_du.norm_squared() < 1e-12 {
            return None;
        }
        let t = dp_du.normalize();
        let b_axis = info.ng.cross(&t);
        if b_axis.norm_squared() < 1e-12 {
            return None;
        }
        Some((t, b_axis.normalize()))
    }

    fn is_samplable(&self) -> bool {
        !self.area_cdf.is_empty() && self.total_area > 0.0
    }

    fn make_samplable(&mut self) {
        if !self.area_cdf.is_empty() || self.world_verts.is_empty() {
            return;
        }
        let mut accum = 0.0;
        self.area_cdf = (0..self.tris.len())
            .map(|i| {
                accum += self.tri_at(i).surface_area();
                accum
            })
            .collect();
        self.total_area = accum;
    }

    fn sample_position(&self, rng: &mut LcgRng, sample: &mut PositionSample) -> bool {
        if !self.is_samplable() {
            return false;
        }

        let target = rng.next_f32() * self.total_area;
        let idx = match self.area_cdf.iter().position(|&cdf| cdf >= target) {
            Some(idx) => idx,
            None => self.area_cdf.len() - 1,
        };

        let bary = square_to_triangle(&rng.next_2d());
        let triangle = self.tri_at(idx);
        sample.p = triangle.point_from_barycentric(bary.y, bary.z);
        sample.ng = triangle.geometric_normal();
        sample.uv = self.interpolated_uv(idx, bary.y, bary.z);
        sample.pdf = 1.0 / self.total_area;
        sample.weight = self.emission;
        true
    }

    fn positional_pdf(&self, _sample: &PositionSample) -> Float {
        if self.total_area > 0.0 {
            1.0 / self.total_area
        } else {
            0.0
        }
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

        let cos_light = pos.ng.dot(&-d);
        if cos_light <= 0.0 {
            return false;
        }

        sample.d = d;
        sample.dist = dist;
        sample.pdf = dist2 / (cos_light * self.total_area);
        sample.weight = self.emission;
        true
    }

    fn inbound_pdf(&self, _data: &IntersectionTemporary, info: &IntersectionInfo,
                   p: &Vector3f, d: &Vector3f) -> Float {
        if self.total_area <= 0.0 {
            return 0.0;
        }
        let dist2 = (info.p - *p).norm_squared();
        if dist2 <= 0.0 {
            return 0.0;
        }
        let cos_light = info.ng.dot(&-d);
        if cos_light <= 0.0 {
            return 0.0;
        }
        dist2 / (cos_light * self.total_area)
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

    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        // No cheap reliable estimate exists over an arbitrary triangle
        // soup; signal "unknown magnitude" to importance heuristics.
        -1.0
    }

    fn bsdf(&self, data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        let tri = match data.payload {
            IntersectionPayload::Triangle { tri, .. } => tri as usize,
            _ => return None,
        };
        let slot = self.tri_bsdf.get(tri).copied().unwrap_or(0) as usize;
        self.bsdfs.get(slot).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::warp::square_to_uniform_sphere;

    // Unit square in the xy plane, two triangles, facing +z.
    fn square_mesh() -> TriangleMesh {
        let verts = vec![
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(1.0, 1.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        ];
        let tris = vec![[0, 1, 2], [0, 2, 3]];
        let mut mesh = TriangleMesh::new(verts, tris)
            .with_uvs(vec![
                Vector2f::new(0.0, 0.0),
                Vector2f::new(1.0, 0.0),
                Vector2f::new(1.0, 1.0),
                Vector2f::new(0.0, 1.0),
            ])
            .with_emission(RGBSpectrum::new(3.0, 3.0, 3.0));
        mesh.prepare_for_render();
        mesh.make_samplable();
        mesh
    }

    #[test]
    fn test_mesh_closest_hit_and_uv() {
        let mesh = square_mesh();
        let mut ray = Ray3f::new(Vector3f::new(0.75, 0.25, 3.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(mesh.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 3.0).abs() < 1e-4);

        let mut info = IntersectionInfo::new();
        mesh.intersection_info(&data, &mut info);
        assert!((info.p - Vector3f::new(0.75, 0.25, 0.0)).norm() < 1e-4);
        assert!((info.uv - Vector2f::new(0.75, 0.25)).norm() < 1e-4);
        assert!((info.ng - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_mesh_smooth_vs_flat_shading() {
        let verts = vec![
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(1.0, 0.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        ];
        let normals = vec![
            Vector3f::new(0.0, 0.0, 1.0),
            Vector3f::new(1.0, 0.0, 1.0).normalize(),
            Vector3f::new(0.0, 1.0, 1.0).normalize(),
        ];
        let tris = vec![[0, 1, 2]];

        let mut smooth = TriangleMesh::new(verts.clone(), tris.clone())
            .with_normals(normals.clone())
            .with_smooth(true);
        smooth.prepare_for_render();

        let mut flat = TriangleMesh::new(verts, tris).with_normals(normals);
        flat.prepare_for_render();

        let mut ray = Ray3f::new(Vector3f::new(0.3, 0.3, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(smooth.intersect(&mut ray, &mut data));

        let mut info = IntersectionInfo::new();
        smooth.intersection_info(&data, &mut info);
        // Interpolated normal tilts away from the face normal.
        assert!((info.ns - info.ng).norm() > 1e-3);
        assert!(info.ns.dot(&info.ng) > 0.0);

        let mut info_flat = IntersectionInfo::new();
        flat.intersection_info(&data, &mut info_flat);
        assert!((info_flat.ns - info_flat.ng).norm() < 1e-6);
    }

    #[test]
    fn test_mesh_occlusion_agreement() {
        let mesh = square_mesh();
        let mut rng = LcgRng::new(7);
        for _ in 0..512 {
            let origin = Vector3f::new(rng.next_f32() * 3.0 - 1.0,
                                       rng.next_f32() * 3.0 - 1.0,
                                       rng.next_f32() * 4.0 - 2.0);
            let dir = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(origin, dir, Some(1e-3), None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(mesh.occluded(&ray), mesh.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_mesh_sampling_duality() {
        let mesh = square_mesh();
        let mut rng = LcgRng::new(61);
        for _ in 0..256 {
            let mut sample = LightSample::at(Vector3f::new(0.5, 0.5, 2.0));
            if !mesh.sample_inbound_direction(&mut rng, &mut sample) {
                continue;
            }
            let mut ray = Ray3f::new(sample.p, sample.d, Some(1e-4), None);
            let mut data = IntersectionTemporary::new();
            assert!(mesh.intersect(&mut ray, &mut data));
            let mut info = IntersectionInfo::new();
            mesh.intersection_info(&data, &mut info);
            let pdf = mesh.inbound_pdf(&data, &info, &sample.p, &sample.d);
            assert!((pdf - sample.pdf).abs() < 1e-2 * sample.pdf.max(1.0));
        }
    }

    #[test]
    fn test_empty_mesh_is_inert() {
        let mut mesh = TriangleMesh::new(Vec::new(), Vec::new());
        mesh.prepare_for_render();
        mesh.make_samplable();

        assert!(!mesh.bounds().is_valid());
        assert!(!mesh.is_samplable());
        assert_eq!(mesh.approximate_radiance(&Vector3f::zeros()), -1.0);

        let mut ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(!mesh.intersect(&mut ray, &mut data));
        assert!(!mesh.occluded(&ray));
    }

    #[test]
    fn test_mesh_tangent_space_follows_uv() {
        let mesh = square_mesh();
        let mut ray = Ray3f::new(Vector3f::new(0.25, 0.25, 3.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(mesh.intersect(&mut ray, &mut data));
        let mut info = IntersectionInfo::new();
        mesh.intersection_info(&data, &mut info);

        let (t, b) = mesh.tangent_space(&data, &info).expect("uv frame");
        assert!((t - Vector3f::new(1.0, 0.0, 0.0)).norm() < 1e-4);
        assert!(t.dot(&b).abs() < 1e-5);
    }
}
