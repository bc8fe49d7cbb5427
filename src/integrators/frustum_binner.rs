// Copyright @yucwang 2026

use crate::core::camera::Camera;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::simd::Float4;
use crate::math::transform::Transform;

pub const TILE_SIZE: usize = 8;

const NEAR_PLANE: Float = 1e-2;
const MAX_CLIPPED_VERTS: usize = 12;

/// Screen-space binner for light-beam quads. Projects a quad through the
/// camera, clips it against the near plane and the guard-banded screen
/// rectangle, builds one signed edge function per clipped edge (expanded
/// outward by the guard band), and rasterizes fixed-size tiles with
/// four-wide lane evaluation. Bounded over-inclusion from the guard band
/// is the accepted trade for never missing a covered pixel.
pub struct FrustumBinner {
    width: usize,
    height: usize,
    guard_band: Float,
    scale: Float,
    world_to_camera: Transform,
}

#[derive(Clone, Copy)]
struct EdgeFn {
    a: Float,
    b: Float,
    c: Float,
}

impl EdgeFn {
    fn eval(&self, x: Float, y: Float) -> Float {
        self.a * x + self.b * y + self.c
    }
}

/// Precomputed rasterization state for one quad.
pub struct QuadSetup {
    edges: [EdgeFn; MAX_CLIPPED_VERTS],
    edge_count: usize,
    min: Vector2f,
    max: Vector2f,
}

impl QuadSetup {
    fn empty() -> Self {
        Self {
            edges: [EdgeFn { a: 0.0, b: 0.0, c: 0.0 }; MAX_CLIPPED_VERTS],
            edge_count: 0,
            min: Vector2f::new(0.0, 0.0),
            max: Vector2f::new(0.0, 0.0),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.edge_count == 0
    }
}

impl FrustumBinner {
    /// Derives the projection scale and guard band once per render.
    pub fn new(camera: &dyn Camera) -> Self {
        let (width, height) = camera.resolution();
        let scale = 0.5 * height as Float / (0.5 * camera.fov_y()).tan();
        Self {
            width,
            height,
            guard_band: 1.0,
            scale,
            world_to_camera: *camera.world_to_camera(),
        }
    }

    pub fn with_guard_band(mut self, guard_band: Float) -> Self {
        self.guard_band = guard_band.max(0.0);
        self
    }

    fn to_screen(&self, p_cam: &Vector3f) -> Vector2f {
        let inv_z = 1.0 / p_cam.z;
        Vector2f::new(0.5 * self.width as Float + p_cam.x * inv_z * self.scale,
                      0.5 * self.height as Float - p_cam.y * inv_z * self.scale)
    }

    /// Sutherland-Hodgman clip of a camera-space polygon against the near
    /// plane z >= NEAR_PLANE.
    fn clip_near(poly: &[Vector3f], out: &mut Vec<Vector3f>) {
        out.clear();
        let n = poly.len();
        for i in 0..n {
            let curr = poly[i];
            let next = poly[(i + 1) % n];
            let curr_in = curr.z >= NEAR_PLANE;
            let next_in = next.z >= NEAR_PLANE;
            if curr_in {
                out.push(curr);
            }
            if curr_in != next_in {
                let t = (NEAR_PLANE - curr.z) / (next.z - curr.z);
                out.push(curr + (next - curr) * t);
            }
        }
    }

    /// Half-plane clip in screen space: keeps points with
    /// `dot(normal, p) <= limit`.
    fn clip_half_plane(poly: &[Vector2f], normal: Vector2f, limit: Float,
                       out: &mut Vec<Vector2f>) {
        out.clear();
        let n = poly.len();
        for i in 0..n {
            let curr = poly[i];
            let next = poly[(i + 1) % n];
            let curr_d = curr.dot(&normal) - limit;
            let next_d = next.dot(&normal) - limit;
            if curr_d <= 0.0 {
                out.push(curr);
            }
            if (curr_d <= 0.0) != (next_d <= 0.0) {
                let t = curr_d / (curr_d - next_d);
                out.push(curr + (next - curr) * t);
            }
        }
    }

    /// Clip, project and build guard-banded edge functions for a quad.
    pub fn setup_quad(&self, p0: Vector3f, p1: Vector3f, p2: Vector3f, p3: Vector3f)
        -> QuadSetup {
        let cam: Vec<Vector3f> = [p0, p1, p2, p3].iter()
            .map(|p| self.world_to_camera.apply_point(*p))
            .collect();

        let mut near_clipped = Vec::with_capacity(MAX_CLIPPED_VERTS);
        Self::clip_near(&cam, &mut near_clipped);
        if near_clipped.len() < 3 {
            return QuadSetup::empty();
        }

        let mut poly: Vec<Vector2f> = near_clipped.iter()
            .map(|p| self.to_screen(p))
            .collect();

        // Screen-rectangle clip, expanded by the guard band.
        let g = self.guard_band;
        let w = self.width as Float;
        let h = self.height as Float;
        let mut scratch = Vec::with_capacity(MAX_CLIPPED_VERTS);
        let planes = [
            (Vector2f::new(-1.0, 0.0), g),
            (Vector2f::new(1.0, 0.0), w + g),
            (Vector2f::new(0.0, -1.0), g),
            (Vector2f::new(0.0, 1.0), h + g),
        ];
        for (normal, limit) in &planes {
            Self::clip_half_plane(&poly, *normal, *limit, &mut scratch);
            std::mem::swap(&mut poly, &mut scratch);
            if poly.len() < 3 {
                return QuadSetup::empty();
            }
        }

        // Consistent winding for inside-positive edge functions.
        let mut signed_area = 0.0;
        for i in 0..poly.len() {
            let p = poly[i];
            let q = poly[(i + 1) % poly.len()];
            signed_area += p.x * q.y - q.x * p.y;
        }
        if signed_area < 0.0 {
            poly.reverse();
        }

        let mut setup = QuadSetup::empty();
        let mut min = poly[0];
        let mut max = poly[0];
        for i in 0..poly.len() {
            let p = poly[i];
            let q = poly[(i + 1) % poly.len()];
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);

            let a = p.y - q.y;
            let b = q.x - p.x;
            let c = p.x * q.y - q.x * p.y;
            let edge_length = (a * a + b * b).sqrt();
            if edge_length < 1e-8 {
                continue;
            }
            // Push the edge outward in proportion to its length so the
            // guard band absorbs rasterization error.
            setup.edges[setup.edge_count] = EdgeFn {
                a,
                b,
                c: c + self.guard_band * edge_length,
            };
            setup.edge_count += 1;
            if setup.edge_count == MAX_CLIPPED_VERTS {
                break;
            }
        }
        if setup.edge_count < 3 {
            return QuadSetup::empty();
        }

        let pad = Vector2f::new(self.guard_band, self.guard_band);
        setup.min = min - pad;
        setup.max = max + pad;
        setup
    }

    /// Rasterize the setup in `TILE_SIZE` tiles, invoking the visitor for
    /// every covered pixel of every accepted tile. Returns the number of
    /// accepted tiles.
    pub fn iterate_tiles<F: FnMut(usize, usize)>(&self, setup: &QuadSetup, mut visitor: F)
        -> usize {
        if setup.is_degenerate() {
            return 0;
        }

        let x0 = (setup.min.x.floor().max(0.0) as usize) / TILE_SIZE;
        let y0 = (setup.min.y.floor().max(0.0) as usize) / TILE_SIZE;
        let x1 = ((setup.max.x.ceil() as usize).min(self.width.saturating_sub(1))) / TILE_SIZE;
        let y1 = ((setup.max.y.ceil() as usize).min(self.height.saturating_sub(1))) / TILE_SIZE;

        let edges = &setup.edges[..setup.edge_count];
        let mut visited_tiles = 0;

        for ty in y0..=y1 {
            for tx in x0..=x1 {
                let tile_min_x = (tx * TILE_SIZE) as Float;
                let tile_min_y = (ty * TILE_SIZE) as Float;
                let tile_max_x = tile_min_x + TILE_SIZE as Float;
                let tile_max_y = tile_min_y + TILE_SIZE as Float;

                // Reject when any edge sees the whole tile outside.
                let mut rejected = false;
                for edge in edges {
                    let corners = [
                        edge.eval(tile_min_x, tile_min_y),
                        edge.eval(tile_max_x, tile_min_y),
                        edge.eval(tile_min_x, tile_max_y),
                        edge.eval(tile_max_x, tile_max_y),
                    ];
                    if corners.iter().all(|&v| v < 0.0) {
                        rejected = true;
                        break;
                    }
                }
                if rejected {
                    continue;
                }
                visited_tiles += 1;

                self.rasterize_tile(edges, tx, ty, &mut visitor);
            }
        }

        visited_tiles
    }

    fn rasterize_tile<F: FnMut(usize, usize)>(&self, edges: &[EdgeFn],
                                              tx: usize, ty: usize, visitor: &mut F) {
        let px0 = tx * TILE_SIZE;
        let py0 = ty * TILE_SIZE;
        let px_end = (px0 + TILE_SIZE).min(self.width);
        let py_end = (py0 + TILE_SIZE).min(self.height);
        let lane_offsets = Float4::new(0.0, 1.0, 2.0, 3.0);

        for py in py0..py_end {
            let y = py as Float + 0.5;
            let mut px = px0;
            while px < px_end {
                // Incremental four-lane evaluation across the row.
                let x_base = px as Float + 0.5;
                let mut mask = 0b1111u8;
                for edge in edges {
                    let values = Float4::splat(edge.eval(x_base, y))
                        + Float4::splat(edge.a) * lane_offsets;
                    mask &= values.ge_zero_mask();
                    if mask == 0 {
                        break;
                    }
                }

                for lane in 0..4 {
                    let x = px + lane;
                    if x >= px_end {
                        break;
                    }
                    if mask & (1 << lane) != 0 {
                        visitor(x, py);
                    }
                }
                px += 4;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::pinhole::PinholeCamera;

    fn binner(width: usize, height: usize) -> FrustumBinner {
        let camera = PinholeCamera::new(Vector3f::zeros(),
                                        Vector3f::new(0.0, 0.0, -1.0),
                                        Vector3f::new(0.0, 1.0, 0.0),
                                        std::f32::consts::FRAC_PI_2,
                                        width, height);
        FrustumBinner::new(&camera)
    }

    #[test]
    fn test_quad_behind_camera_visits_nothing() {
        let binner = binner(64, 64);
        let setup = binner.setup_quad(Vector3f::new(-1.0, -1.0, 2.0),
                                      Vector3f::new(1.0, -1.0, 2.0),
                                      Vector3f::new(1.0, 1.0, 2.0),
                                      Vector3f::new(-1.0, 1.0, 2.0));
        assert!(setup.is_degenerate());

        let mut pixels = 0;
        let tiles = binner.iterate_tiles(&setup, |_, _| pixels += 1);
        assert_eq!(tiles, 0);
        assert_eq!(pixels, 0);
    }

    #[test]
    fn test_quad_off_screen_visits_nothing() {
        let binner = binner(64, 64);
        // In front of the camera but far outside the field of view.
        let setup = binner.setup_quad(Vector3f::new(50.0, 50.0, -2.0),
                                      Vector3f::new(52.0, 50.0, -2.0),
                                      Vector3f::new(52.0, 52.0, -2.0),
                                      Vector3f::new(50.0, 52.0, -2.0));
        let mut pixels = 0;
        let tiles = binner.iterate_tiles(&setup, |_, _| pixels += 1);
        assert_eq!(tiles, 0);
        assert_eq!(pixels, 0);
    }

    #[test]
    fn test_full_screen_quad_covers_all_tiles() {
        let width = 64;
        let height = 64;
        let binner = binner(width, height);
        // At depth 2 with a 90 degree fov, the frustum half-width is 2;
        // a quad twice that size covers the whole screen.
        let setup = binner.setup_quad(Vector3f::new(-4.0, -4.0, -2.0),
                                      Vector3f::new(4.0, -4.0, -2.0),
                                      Vector3f::new(4.0, 4.0, -2.0),
                                      Vector3f::new(-4.0, 4.0, -2.0));
        assert!(!setup.is_degenerate());

        let mut pixels = 0usize;
        let tiles = binner.iterate_tiles(&setup, |_, _| pixels += 1);

        let expected_tiles = (width / TILE_SIZE) * (height / TILE_SIZE);
        assert_eq!(tiles, expected_tiles);
        assert_eq!(pixels, width * height);
    }

    #[test]
    fn test_small_quad_touches_bounded_region() {
        let width = 64;
        let height = 64;
        let binner = binner(width, height);
        // A quad subtending a quarter of the screen width, centered.
        let setup = binner.setup_quad(Vector3f::new(-0.5, -0.5, -2.0),
                                      Vector3f::new(0.5, -0.5, -2.0),
                                      Vector3f::new(0.5, 0.5, -2.0),
                                      Vector3f::new(-0.5, 0.5, -2.0));
        let mut min = (usize::MAX, usize::MAX);
        let mut max = (0usize, 0usize);
        let mut pixels = 0usize;
        binner.iterate_tiles(&setup, |x, y| {
            pixels += 1;
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        });

        // Quarter of the fov maps to 16 pixels across, plus guard band.
        assert!(pixels > 0);
        let span_x = max.0 - min.0 + 1;
        let span_y = max.1 - min.1 + 1;
        assert!((14..=20).contains(&span_x), "span_x = {}", span_x);
        assert!((14..=20).contains(&span_y), "span_y = {}", span_y);
        // The covered block stays centered.
        assert!(min.0 >= 20 && max.0 <= 44);
    }
}
