// Copyright @yucwang 2026

use crate::core::accel::Bvh;
use crate::core::bsdf::Bsdf;
use crate::core::intersection::{ IntersectionInfo, InstanceRef, IntersectionTemporary };
use crate::core::primitive::Primitive;
use crate::math::aabb::AABB;
use crate::math::constants::{ Quaternionf, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;
use std::sync::Arc;

/// One placed copy of a master primitive: an index into the master list
/// plus a rigid position/rotation. Masters are referenced by index, never
/// owned by the copies, so reuse forms no ownership cycles.
pub struct Instance {
    pub master: usize,
    pub position: Vector3f,
    pub rotation: Quaternionf,
}

impl Instance {
    pub fn new(master: usize, position: Vector3f, rotation: Quaternionf) -> Self {
        Self { master, position, rotation }
    }
}

/// Instance array: a master primitive list and a set of rigid copies with
/// their own acceleration structure over per-copy world bounds. A
/// candidate copy transforms the ray into master space and delegates; the
/// resolved (copy, master) pair rides in the scratch record's instance
/// slot, so masters may be any primitive kind except another instance
/// array.
pub struct Instances {
    masters: Vec<Box<dyn Primitive>>,
    copies: Vec<Instance>,
    copy_transforms: Vec<Transform>,
    bvh: Option<Bvh>,
    world_bounds: AABB,
}

impl Instances {
    pub fn new(masters: Vec<Box<dyn Primitive>>, copies: Vec<Instance>) -> Self {
        Self {
            masters,
            copies,
            copy_transforms: Vec::new(),
            bvh: None,
            world_bounds: AABB::default(),
        }
    }

    fn resolved(&self, data: &IntersectionTemporary) -> (usize, &dyn Primitive) {
        let instance = data.instance
            .expect("instanced hit without an instance reference");
        let copy = instance.copy as usize;
        (copy, self.masters[instance.master as usize].as_ref())
    }

    fn copy_bounds(&self, copy: usize) -> AABB {
        let master_bounds = self.masters[self.copies[copy].master].bounds();
        if !master_bounds.is_valid() {
            return AABB::default();
        }
        let xform = &self.copy_transforms[copy];
        let mut bbox = AABB::default();
        for ix in 0..2 {
            for iy in 0..2 {
                for iz in 0..2 {
                    let corner = Vector3f::new(
                        if ix == 0 { master_bounds.p_min.x } else { master_bounds.p_max.x },
                        if iy == 0 { master_bounds.p_min.y } else { master_bounds.p_max.y },
                        if iz == 0 { master_bounds.p_min.z } else { master_bounds.p_max.z },
                    );
                    bbox.expand_by_point(&xform.apply_point(corner));
                }
            }
        }
        bbox
    }
}

impl Primitive for Instances {
    fn type_name(&self) -> &'static str {
        "instances"
    }

    fn prepare_for_render(&mut self) {
        for master in &mut self.masters {
            master.prepare_for_render();
        }

        self.copy_transforms = self.copies.iter()
            .map(|copy| Transform::from_parts(copy.position, copy.rotation))
            .collect();

        let mut world_bounds = AABB::default();
        let leaf_bounds: Vec<AABB> = (0..self.copies.len())
            .map(|copy| {
                let bounds = self.copy_bounds(copy);
                if bounds.is_valid() {
                    world_bounds.expand_by_aabb(&bounds);
                }
                bounds
            })
            .collect();
        self.world_bounds = world_bounds;
        self.bvh = if leaf_bounds.is_empty() {
            None
        } else {
            Some(Bvh::over_leaves(leaf_bounds))
        };
    }

    fn teardown_after_render(&mut self) {
        for master in &mut self.masters {
            master.teardown_after_render();
        }
        self.copy_transforms.clear();
        self.bvh = None;
        self.world_bounds = AABB::default();
    }

    fn bounds(&self) -> AABB {
        self.world_bounds
    }

    fn intersect(&self, ray: &mut Ray3f, data: &mut IntersectionTemporary) -> bool {
        let bvh = match &self.bvh {
            Some(bvh) => bvh,
            None => return false,
        };

        bvh.closest_hit(ray, |copy_idx, ray| {
            let copy = &self.copies[copy_idx];
            let xform = &self.copy_transforms[copy_idx];
            // Rigid transform: local and world ray parameters coincide.
            let mut local_ray = xform.inv_apply_ray(ray);
            if self.masters[copy.master].intersect(&mut local_ray, data) {
                ray.max_t = local_ray.max_t;
                data.instance = Some(InstanceRef {
                    copy: copy_idx as u32,
                    master: copy.master as u32,
                });
                true
            } else {
                false
            }
        }).is_some()
    }

    fn occluded(&self, ray: &Ray3f) -> bool {
        let bvh = match &self.bvh {
            Some(bvh) => bvh,
            None => return false,
        };
        bvh.occluded(ray, |copy_idx, ray| {
            let copy = &self.copies[copy_idx];
            let local_ray = self.copy_transforms[copy_idx].inv_apply_ray(ray);
            self.masters[copy.master].occluded(&local_ray)
        })
    }

    fn hit_backside(&self, data: &IntersectionTemporary) -> bool {
        let (_, master) = self.resolved(data);
        master.hit_backside(data)
    }

    fn intersection_info(&self, data: &IntersectionTemporary, info: &mut IntersectionInfo) {
        let (copy, master) = self.resolved(data);
        master.intersection_info(data, info);

        let xform = &self.copy_transforms[copy];
        info.p = xform.apply_point(info.p);
        info.ng = xform.apply_vector(info.ng).normalize();
        info.ns = xform.apply_vector(info.ns).normalize();
    }

    fn tangent_space(&self, data: &IntersectionTemporary, info: &IntersectionInfo)
        -> Option<(Vector3f, Vector3f)> {
        let (copy, master) = self.resolved(data);
        let (t, b) = master.tangent_space(data, info)?;
        let xform = &self.copy_transforms[copy];
        Some((xform.apply_vector(t).normalize(), xform.apply_vector(b).normalize()))
    }

    fn is_emissive(&self) -> bool {
        false
    }

    fn bsdf(&self, data: &IntersectionTemporary) -> Option<Arc<dyn Bsdf>> {
        let (_, master) = self.resolved(data);
        master.bsdf(data)
    }
}
