// Copyright @yucwang 2026

use super::mesh::TriangleMesh;

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::core::records::{ DirectionSample, LightSample, PositionSample };
use crate::core::rng::LcgRng;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use std::sync::Arc;

/// Heightmap terrain: a grid of height samples over the local unit square
/// (x, y in [0, 1], height along +z), tessellated into an internal
/// triangle mesh at render preparation. All queries delegate to the mesh.
pub struct Terrain {
    heights: Vec<Float>,
    samples_x: usize,
    samples_y: usize,
    transform: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
    emission: RGBSpectrum,
    mesh: Option<TriangleMesh>,
}

impl Terrain {
    pub fn new(heights: Vec<Float>, samples_x: usize, samples_y: usize) -> Self {
        debug_assert_eq!(heights.len(), samples_x * samples_y);
        Self {
            heights,
            samples_x,
            samples_y,
            transform: Transform::default(),
            bsdf: None,
            emission: RGBSpectrum::default(),
            mesh: None,
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

    pub fn with_emission(mut self, emission: RGBSpectrum) -> Self {
        self.emission = emission;
        self
    }

    fn height_at(&self, u: Float, v: Float) -> Float {
        let fx = u.clamp(0.0, 1.0) * (self.samples_x - 1) as Float;
        let fy = v.clamp(0.0, 1.0) * (self.samples_y - 1) as Float;
        let x0 = (fx as usize).min(self.samples_x - 2);
        let y0 = (fy as usize).min(self.samples_y - 2);
        let tx = fx - x0 as Float;
        let ty = fy - y0 as Float;

        let h = |x: usize, y: usize| self.heights[x + y * self.samples_x];
        let h0 = h(x0, y0) * (1.0 - tx) + h(x0 + 1, y0) * tx;
        let h1 = h(x0, y0 + 1) * (1.0 - tx) + h(x0 + 1, y0 + 1) * tx;
        h0 * (1.0 - ty) + h1 * ty
    }

    fn tessellate(&self) -> TriangleMesh {
        let nx = self.samples_x;
        let ny = self.samples_y;
        let mut verts = Vec::with_capacity(nx * ny);
        let mut normals = Vec::with_capacity(nx * ny);
        let mut uvs = Vec::with_capacity(nx * ny);

        for y in 0..ny {
            for x in 0..nx {
                let u = x as Float / (nx - 1) as Float;
                let v = y as Float / (ny - 1) as Float;
                let h = self.heights[x + y * nx];
                verts.push(Vector3f::new(u, v, h));
                uvs.push(Vector2f::new(u, v));

                // Central differences for the smooth-shading normal.
                let hl = self.heights[x.saturating_sub(1) + y * nx];
                let hr = self.heights[(x + 1).min(nx - 1) + y * nx];
                let hd = self.heights[x + y.saturating_sub(1) * nx];
                let hu = self.heights[x + (y + 1).min(ny - 1) * nx];
                let dx = (hr - hl) * 0.5 * (nx - 1) as Float;
                let dy = (hu - hd) * 0.5 * (ny - 1) as Float;
                normals.push(Vector3f::new(-dx, -dy, 1.0).normalize());
            }
        }

        let mut tris = Vec::with_capacity(2 * (nx - 1) * (ny - 1));
        for y in 0..(ny - 1) {
            for x in 0..(nx - 1) {
                let i00 = (x + y * nx) as u32;
                let i10 = i00 + 1;
                let i01 = i00 + nx as u32;
                let i11 = i01 + 1;
                tris.push([i00, i10, i11]);
                tris.push([i00, i11, i01]);
            }
        }

        let bsdfs = match &self.bsdf {
            Some(bsdf) => vec![bsdf.clone()],
            None => Vec::new(),
        };
        TriangleMesh::new(verts, tris)
            .with_normals(normals)
            .with_uvs(uvs)
            .with_smooth(true)
            .with_bsdfs(bsdfs)
            .with_emission(self.emission)
            .with_transform(self.transform)
    }

    fn inner(&self) -> &TriangleMesh {
        self.mesh.as_ref().expect("terrain queried before prepare_for_render")
    }
}

impl Primitive for Terrain {
    fn type_name(&self) -> &'static str {
        "terrain"
    }

    fn prepare_for_render(&mut self) {
        if self.samples_x < 2 || self.samples_y < 2 {
            // Degenerate grid: keep an empty, inert mesh.
            let mut mesh = TriangleMesh::new(Vec::new(), Vec::new());
            mesh.prepare_for_render();
            self.mesh = Some(mesh);
            return;
        }
        let mut mesh = self.tessellate();
        mesh.prepare_for_render();
        self.mesh = Some(mesh);
    }

    fn teardown_after_render(&mut self) {
        self.mesh = None;
    }

    fn bounds(&self) -> AABB {
        match &self.mesh {
            Some(mesh) => mesh.bounds(),
            None => AABB::default(),
        }
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        self.inner().intersect(ray, data)
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.inner().occluded(ray)
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        self.inner().hit_backside(data)
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        self.inner().intersection_info(data, info);
    }

    fn tangent_space(&self, data: &IntersectionTemporary, info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        self.inner().tangent_space(data, info)
    }

    fn is_samplable(&self) -> bool {
        self.mesh.as_ref().map_or(false, |m| m.is_samplable())
    }

    fn make_samplable(&mut self) {
        if let Some(mesh) = &mut self.mesh {
            mesh.make_samplable();
        }
    }

    fn sample_position(&self, rng: &mut LcgRng, sample: &mut PositionSample) -> bool {
        self.inner().sample_position(rng, sample)
    }

    fn positional_pdf(&self, sample: &PositionSample) -> Float {
        self.inner().positional_pdf(sample)
    }

    fn sample_direction(&self, rng: &mut LcgRng, point: &PositionSample,
                        sample: &mut DirectionSample) -> bool {
        self.inner().sample_direction(rng, point, sample)
    }

    fn directional_pdf(&self, point: &PositionSample, d: &Vector3f) -> Float {
        self.inner().directional_pdf(point, d)
    }

    fn sample_inbound_direction(&self, rng: &mut LcgRng, sample: &mut LightSample) -> bool {
        self.inner().sample_inbound_direction(rng, sample)
    }

    fn inbound_pdf(&self, data: &IntersectionTemporary, info: &IntersectionInfo,
                   p: &Vector3f, d: &Vector3f) -> Float {
        self.inner().inbound_pdf(data, info, p, d)
    }

    fn invert_parametrization(&self, uv: &Vector2f) -> Option<Vector3f> {
        if self.samples_x < 2 || self.samples_y < 2 {
            return None;
        }
        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
            return None;
        }
        let p_local = Vector3f::new(uv.x, uv.y, self.height_at(uv.x, uv.y));
        Some(self.transform.apply_point(p_local))
    }

    fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }

    fn evaluate_emission(&self, data: &IntersectionTemporary, info: &IntersectionInfo)
        -> RGBSpectrum {
        self.inner().evaluate_emission(data, info)
    }

    fn approximate_radiance(&self, _p: &Vector3f) -> Float {
        -1.0
    }

    fn bsdf(&self, data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        self.inner().bsdf(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_terrain(height: Float) -> Terrain {
        let mut terrain = Terrain::new(vec![height; 9], 3, 3);
        terrain.prepare_for_render();
        terrain
    }

    #[test]
    fn test_terrain_flat_hit() {
        let terrain = flat_terrain(0.25);
        let mut ray = Ray3f::new(Vector3f::new(0.5, 0.5, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(terrain.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 1.75).abs() < 1e-4);

        let mut info = IntersectionInfo::new();
        terrain.intersection_info(&data, &mut info);
        assert!((info.ng - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-4);
        assert!((info.uv - Vector2f::new(0.5, 0.5)).norm() < 1e-4);
    }

    #[test]
    fn test_terrain_ridge_profile() {
        // A single raised row: rays on either side land lower.
        let mut heights = vec![0.0; 9];
        heights[4] = 1.0;
        let mut terrain = Terrain::new(heights, 3, 3);
        terrain.prepare_for_render();

        let mut at_peak = Ray3f::new(Vector3f::new(0.5, 0.5, 3.0),
                                     Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(terrain.intersect(&mut at_peak, &mut data));
        assert!((at_peak.max_t - 2.0).abs() < 1e-3);

        let mut off_peak = Ray3f::new(Vector3f::new(0.05, 0.05, 3.0),
                                      Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(terrain.intersect(&mut off_peak, &mut data));
        assert!(off_peak.max_t > 2.5);
    }

    #[test]
    fn test_terrain_parametrization_round_trip() {
        let terrain = flat_terrain(0.5);
        let mut rng = LcgRng::new(3);
        for _ in 0..64 {
            let uv = Vector2f::new(0.05 + 0.9 * rng.next_f32(), 0.05 + 0.9 * rng.next_f32());
            let pos = terrain.invert_parametrization(&uv).unwrap();
            let origin = pos + Vector3f::new(0.0, 0.0, 2.0);
            let mut ray = Ray3f::new(origin, Vector3f::new(0.0, 0.0, -1.0), None, None);
            let mut data = IntersectionTemporary::new();
            assert!(terrain.intersect(&mut ray, &mut data));
            let mut info = IntersectionInfo::new();
            terrain.intersection_info(&data, &mut info);
            assert!((info.uv - uv).norm() < 1e-3);
        }
    }

    #[test]
    fn test_degenerate_terrain_is_inert() {
        let mut terrain = Terrain::new(vec![1.0], 1, 1);
        terrain.prepare_for_render();
        let mut ray = Ray3f::new(Vector3f::new(0.0, 0.0, 2.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(!terrain.intersect(&mut ray, &mut data));
        assert!(!terrain.bounds().is_valid());
    }
}
