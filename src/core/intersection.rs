// Copyright @yucwang 2026

use crate::core::bsdf::Bsdf;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use std::sync::Arc;

/// Which copy and master an instanced hit resolved to. Kept outside the
/// payload union so delegated master payloads never need to nest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceRef {
    pub copy: u32,
    pub master: u32,
}

/// Per-variant scratch data written by `Primitive::intersect` and read
/// back by `intersection_info`/`hit_backside`. Every variant must stay
/// within the fixed record size; the whole union is `Copy` so a ray query
/// never allocates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntersectionPayload {
    None,
    Sphere { p_local: Vector3f, backside: bool },
    Disk { uv: Vector2f, backside: bool },
    Quad { uv: Vector2f, backside: bool },
    Cylinder { phi: Float, height: Float, backside: bool },
    Cone { phi: Float, slant: Float, backside: bool },
    Curve { segment: u32, u: Float, v: Float, p: Vector3f, d: Vector3f },
    Triangle { u: Float, v: Float, tri: u32, backside: bool },
    Voxel { p_local: Vector3f, axis: u8, backward: bool },
    Infinite { d: Vector3f },
}

// The zero-allocation contract: the scratch union must fit the fixed
// 64-byte record.
const _: () = assert!(std::mem::size_of::<IntersectionPayload>() <= 64);

/// Opaque per-hit scratch record. Stack-allocated per ray query; contents
/// are invalid once the next query on the same storage begins.
pub struct IntersectionTemporary {
    /// Index of the accepted top-level primitive, assigned by the scene
    /// aggregator after dispatch.
    pub primitive: Option<usize>,
    pub instance: Option<InstanceRef>,
    pub payload: IntersectionPayload,
}

impl Default for IntersectionTemporary {
    fn default() -> Self {
        Self { primitive: None, instance: None, payload: IntersectionPayload::None }
    }
}

impl IntersectionTemporary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.primitive = None;
        self.instance = None;
        self.payload = IntersectionPayload::None;
    }
}

/// Canonical, primitive-agnostic hit record. Expanded from the opaque
/// scratch only for accepted hits, never per acceleration candidate.
pub struct IntersectionInfo {
    pub p: Vector3f,
    pub ng: Vector3f,
    pub ns: Vector3f,
    pub uv: Vector2f,
    /// Incident ray direction at the hit.
    pub w: Vector3f,
    pub t: Float,
    /// Offset distance for spawning secondary rays off the surface.
    pub epsilon: Float,
    pub bsdf: Option<Arc<dyn Bsdf>>,
}

impl Default for IntersectionInfo {
    fn default() -> Self {
        Self {
            p: Vector3f::zeros(),
            ng: Vector3f::new(0.0, 0.0, 1.0),
            ns: Vector3f::new(0.0, 0.0, 1.0),
            uv: Vector2f::new(0.0, 0.0),
            w: Vector3f::new(0.0, 0.0, 1.0),
            t: 0.0,
            epsilon: 1e-4,
            bsdf: None,
        }
    }
}

impl IntersectionInfo {
    pub fn new() -> Self {
        Self::default()
    }
}
