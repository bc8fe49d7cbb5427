// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, IntersectionPayload, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector3f, FLOAT_MAX };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;
use std::sync::Arc;

/// Occupancy-grid volume in the local unit cube, traversed with a DDA
/// walk. Hits land on the faces of filled cells.
pub struct VoxelGrid {
    cells: Vec<bool>,
    nx: usize,
    ny: usize,
    nz: usize,
    to_world: Transform,
    bsdf: Option<Arc<dyn Bsdf>>,
}

struct VoxelHit {
    p_local: Vector3f,
    t_world: Float,
    axis: usize,
    backward: bool,
}

impl VoxelGrid {
    pub fn new(cells: Vec<bool>, nx: usize, ny: usize, nz: usize) -> Self {
        debug_assert_eq!(cells.len(), nx * ny * nz);
        Self {
            cells,
            nx,
            ny,
            nz,
            to_world: Transform::default(),
            bsdf: None,
        }
    }

    pub fn with_transform(mut self, to_world: Transform) -> Self {
        self.to_world = to_world;
        self
    }

    pub fn with_bsdf(mut self, bsdf: Arc<dyn Bsdf>) -> Self {
        self.bsdf = Some(bsdf);
        self
    }

    fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn filled(&self, ix: i64, iy: i64, iz: i64) -> bool {
        if ix < 0 || iy < 0 || iz < 0 {
            return false;
        }
        let (ix, iy, iz) = (ix as usize, iy as usize, iz as usize);
        if ix >= self.nx || iy >= self.ny || iz >= self.nz {
            return false;
        }
        self.cells[ix + self.nx * (iy + self.ny * iz)]
    }

    /// Amanatides-Woo grid walk. Works in local parameter space and maps
    /// each candidate face hit back onto the world ray interval.
    fn march(&self, ray: &Ray3f) -> Option<VoxelHit> {
        if self.cells.is_empty() {
            return None;
        }

        let ray_local = self.to_world.inv_apply_ray(ray).with_range(0.0, FLOAT_MAX);
        let cube = AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        let (t_enter, t_exit) = cube.ray_intersect_range(&ray_local)?;
        let t_enter = t_enter.max(0.0);
        if t_exit < t_enter {
            return None;
        }

        let o = ray_local.origin();
        let d = ray_local.dir();
        let dims = self.dims();

        // Entry axis: the slab whose entry parameter realized t_enter.
        let mut enter_axis = 0usize;
        let mut best = -1.0;
        for axis in 0..3 {
            if d[axis].abs() < 1e-10 {
                continue;
            }
            let slab = if d[axis] > 0.0 { 0.0 } else { 1.0 };
            let t = (slab - o[axis]) / d[axis];
            if t <= t_enter + 1e-6 && t > best {
                best = t;
                enter_axis = axis;
            }
        }

        let p_entry = ray_local.at(t_enter + 1e-6);
        let mut cell = [0i64; 3];
        let mut step = [0i64; 3];
        let mut t_max = [FLOAT_MAX; 3];
        let mut t_delta = [FLOAT_MAX; 3];
        for axis in 0..3 {
            let n = dims[axis] as Float;
            cell[axis] = ((p_entry[axis] * n) as i64).clamp(0, dims[axis] as i64 - 1);
            if d[axis] > 1e-10 {
                step[axis] = 1;
                t_max[axis] = (((cell[axis] + 1) as Float / n) - o[axis]) / d[axis];
                t_delta[axis] = 1.0 / (n * d[axis]);
            } else if d[axis] < -1e-10 {
                step[axis] = -1;
                t_max[axis] = ((cell[axis] as Float / n) - o[axis]) / d[axis];
                t_delta[axis] = -1.0 / (n * d[axis]);
            }
        }

        let mut t_face = t_enter;
        let mut axis = enter_axis;
        loop {
            if self.filled(cell[0], cell[1], cell[2]) {
                let p_local = ray_local.at(t_face);
                let p_world = self.to_world.apply_point(p_local);
                let t_world = (p_world - ray.origin()).dot(&ray.dir());
                if ray.test_segment(t_world) {
                    return Some(VoxelHit {
                        p_local,
                        t_world,
                        axis,
                        backward: step[axis] < 0,
                    });
                }
                if t_world > ray.max_t {
                    // Every later face is even farther along the ray.
                    return None;
                }
            }

            axis = if t_max[0] < t_max[1] {
                if t_max[0] < t_max[2] { 0 } else { 2 }
            } else if t_max[1] < t_max[2] { 1 } else { 2 };

            t_face = t_max[axis];
            if t_face > t_exit + 1e-6 {
                return None;
            }
            cell[axis] += step[axis];
            if cell[axis] < 0 || cell[axis] >= dims[axis] as i64 {
                return None;
            }
            t_max[axis] += t_delta[axis];
        }
    }
}

impl Primitive for VoxelGrid {
    fn type_name(&self) -> &'static str {
        "voxels"
    }

    fn prepare_for_render(&mut self) {}

    fn bounds(&self) -> AABB {
        if self.cells.iter().all(|&filled| !filled) {
            return AABB::default();
        }
        let mut bbox = AABB::default();
        for ix in 0..2 {
            for iy in 0..2 {
                for iz in 0..2 {
                    let corner = Vector3f::new(ix as Float, iy as Float, iz as Float);
                    bbox.expand_by_point(&self.to_world.apply_point(corner));
                }
            }
        }
        bbox
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let hit = match self.march(ray) {
            Some(hit) => hit,
            None => return false,
        };
        if !ray.update(hit.t_world) {
            return false;
        }
        data.payload = IntersectionPayload::Voxel {
            p_local: hit.p_local,
            axis: hit.axis as u8,
            backward: hit.backward,
        };
        true
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        self.march(ray).is_some()
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let (p_local, axis, backward) = match data.payload {
            IntersectionPayload::Voxel { p_local, axis, backward } => {
                (p_local, axis as usize, backward)
            }
            _ => panic!("voxel expansion from a foreign payload"),
        };

        let mut n_local = Vector3f::zeros();
        n_local[axis] = if backward { 1.0 } else { -1.0 };
        let n = self.to_world.apply_normal(n_local);

        info.p = self.to_world.apply_point(p_local);
        info.ng = if n.norm() > 0.0 { n.normalize() } else { n_local };
        info.ns = info.ng;
        // Face parametrization: the two coordinates orthogonal to the
        // entry axis.
        let (ua, va) = match axis {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        };
        info.uv = crate::math::constants::Vector2f::new(p_local[ua], p_local[va]);
        info.bsdf = self.bsdf.clone();
    }

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

    fn solid_cube() -> VoxelGrid {
        VoxelGrid::new(vec![true; 8], 2, 2, 2)
    }

    fn checkerboard() -> VoxelGrid {
        let mut cells = vec![false; 64];
        for ix in 0..4 {
            for iy in 0..4 {
                for iz in 0..4 {
                    if (ix + iy + iz) % 2 == 0 {
                        cells[ix + 4 * (iy + 4 * iz)] = true;
                    }
                }
            }
        }
        VoxelGrid::new(cells, 4, 4, 4)
    }

    #[test]
    fn test_voxel_face_hit() {
        let grid = solid_cube();
        let mut ray = Ray3f::new(Vector3f::new(0.5, 0.5, 3.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(grid.intersect(&mut ray, &mut data));
        assert!((ray.max_t - 2.0).abs() < 1e-3);

        let mut info = IntersectionInfo::new();
        grid.intersection_info(&data, &mut info);
        assert!((info.ng - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-4);
        assert!((info.p.z - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_voxel_empty_cells_pass_through() {
        let grid = checkerboard();
        // The column at cell (0, 0) has an empty top cell (parity 0+0+3);
        // the hit must land on the filled cell below it, at z = 0.75.
        let mut ray = Ray3f::new(Vector3f::new(0.125, 0.125, 3.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, None);
        let mut data = IntersectionTemporary::new();
        assert!(grid.intersect(&mut ray, &mut data));
        let mut info = IntersectionInfo::new();
        grid.intersection_info(&data, &mut info);
        assert!((info.p.z - 0.75).abs() < 1e-3, "must pass the empty top cell");
    }

    #[test]
    fn test_voxel_occlusion_agreement() {
        let grid = checkerboard();
        let mut rng = LcgRng::new(47);
        for _ in 0..512 {
            let origin = Vector3f::new(rng.next_f32() * 4.0 - 1.5,
                                       rng.next_f32() * 4.0 - 1.5,
                                       rng.next_f32() * 4.0 - 1.5);
            let dir = square_to_uniform_sphere(&rng.next_2d());
            let mut ray = Ray3f::new(origin, dir, Some(1e-3), None);
            let mut data = IntersectionTemporary::new();
            assert_eq!(grid.occluded(&ray), grid.intersect(&mut ray, &mut data));
        }
    }

    #[test]
    fn test_voxel_miss_and_inert_grid() {
        let grid = solid_cube();
        let mut ray = Ray3f::new(Vector3f::new(5.0, 5.0, 3.0),
                                 Vector3f::new(0.0, 0.0, -1.0), None, Some(40.0));
        let mut data = IntersectionTemporary::new();
        assert!(!grid.intersect(&mut ray, &mut data));
        assert_eq!(ray.max_t, 40.0);

        let empty = VoxelGrid::new(vec![false; 8], 2, 2, 2);
        assert!(!empty.bounds().is_valid());
        let mut through = Ray3f::new(Vector3f::new(0.5, 0.5, 3.0),
                                     Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(!empty.intersect(&mut through, &mut data));
    }
}
