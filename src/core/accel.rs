// Copyright @yucwang 2026

use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector3f };
use crate::math::ray::Ray3f;

const SAH_BUCKETS: usize = 12;
const MAX_LEAF_SIZE: usize = 4;

/// Explicit acceleration-library context. Construct once per process,
/// pass by reference into scene construction, shut down explicitly.
/// Building through a shut-down context is a contract violation.
pub struct TraceContext {
    alive: bool,
}

impl TraceContext {
    pub fn new() -> Self {
        Self { alive: true }
    }

    pub fn shutdown(&mut self) {
        self.alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Build an acceleration handle over opaque leaves described only by
    /// their bounds. Intersection stays with the caller through the query
    /// callbacks, so analytic shapes and mesh sub-hierarchies compose
    /// uniformly.
    pub fn build(&self, leaf_bounds: Vec<AABB>) -> Bvh {
        assert!(self.alive, "TraceContext used after shutdown");
        Bvh::new(leaf_bounds)
    }
}

#[derive(Clone)]
struct BvhNode {
    bounds: AABB,
    left: Option<usize>,
    right: Option<usize>,
    start: usize,
    count: usize,
}

impl BvhNode {
    fn leaf(bounds: AABB, start: usize, count: usize) -> Self {
        Self { bounds, left: None, right: None, start, count }
    }

    fn interior(bounds: AABB, left: usize, right: usize) -> Self {
        Self { bounds, left: Some(left), right: Some(right), start: 0, count: 0 }
    }

    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Callback-leaf BVH. The structure stores leaf bounds only; every query
/// delegates the actual geometry test to its callback, which may shrink
/// the ray's far bound to claim a hit.
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<usize>,
    leaf_bounds: Vec<AABB>,
    centroids: Vec<Vector3f>,
}

impl Bvh {
    /// Sub-hierarchy constructor for primitives that manage their own
    /// leaves (meshes, curves, instance arrays). The top-level scene
    /// structure goes through `TraceContext::build`.
    pub fn over_leaves(leaf_bounds: Vec<AABB>) -> Self {
        Self::new(leaf_bounds)
    }

    fn new(leaf_bounds: Vec<AABB>) -> Self {
        let centroids = leaf_bounds.iter().map(|b| b.center()).collect();
        let mut bvh = Self {
            indices: (0..leaf_bounds.len()).collect(),
            nodes: Vec::new(),
            leaf_bounds,
            centroids,
        };

        if !bvh.indices.is_empty() {
            let (bounds, centroid_bounds) = bvh.range_bounds(0, bvh.indices.len());
            bvh.build_range(0, bvh.indices.len(), bounds, centroid_bounds);
        }

        bvh
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_bounds.len()
    }

    pub fn bounds(&self) -> AABB {
        self.nodes.first().map(|n| n.bounds).unwrap_or_default()
    }

    /// Closest-hit traversal. `hit_fn(leaf, ray)` returns true when the
    /// leaf accepted a hit, in which case it must have shrunk `ray.max_t`;
    /// the shrunken interval then culls the remaining subtrees. Returns
    /// the leaf owning the nearest accepted hit.
    pub fn closest_hit<F>(&self, ray: &mut Ray3f, mut hit_fn: F) -> Option<usize>
    where
        F: FnMut(usize, &mut Ray3f) -> bool,
    {
        if self.nodes.is_empty() {
            return None;
        }

        let mut closest: Option<usize> = None;
        let mut stack = Vec::with_capacity(64);
        stack.push(0usize);

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.ray_intersect(ray) {
                continue;
            }

            if node.is_leaf() {
                for i in 0..node.count {
                    let leaf = self.indices[node.start + i];
                    if hit_fn(leaf, ray) {
                        closest = Some(leaf);
                    }
                }
            } else {
                if let Some(left) = node.left {
                    stack.push(left);
                }
                if let Some(right) = node.right {
                    stack.push(right);
                }
            }
        }

        closest
    }

    /// Early-out traversal for shadow rays; the callback never mutates the
    /// ray.
    pub fn occluded<F>(&self, ray: &Ray3f, mut hit_fn: F) -> bool
    where
        F: FnMut(usize, &Ray3f) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(0usize);

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.ray_intersect(ray) {
                continue;
            }
            if node.is_leaf() {
                for i in 0..node.count {
                    if hit_fn(self.indices[node.start + i], ray) {
                        return true;
                    }
                }
            } else {
                if let Some(left) = node.left {
                    stack.push(left);
                }
                if let Some(right) = node.right {
                    stack.push(right);
                }
            }
        }

        false
    }

    fn build_range(&mut self, start: usize, end: usize,
                   bounds: AABB, centroid_bounds: AABB) -> usize {
        let count = end - start;
        if count <= MAX_LEAF_SIZE {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        let axis = centroid_bounds.max_extent() as usize;
        let axis_min = centroid_bounds.p_min[axis];
        let axis_extent = centroid_bounds.p_max[axis] - axis_min;
        if axis_extent.abs() < 1e-6 {
            // All centroids coincide along every axis worth splitting.
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        // Binned SAH along the widest centroid axis.
        let mut bucket_counts = [0usize; SAH_BUCKETS];
        let mut bucket_bounds = [AABB::default(); SAH_BUCKETS];
        for i in start..end {
            let idx = self.indices[i];
            let b = self.bucket_of(idx, axis, axis_min, axis_extent);
            bucket_counts[b] += 1;
            bucket_bounds[b].expand_by_aabb(&self.leaf_bounds[idx]);
        }

        // Suffix sweep, then a forward sweep picking the cheapest split.
        let mut suffix_bounds = [AABB::default(); SAH_BUCKETS];
        let mut suffix_counts = [0usize; SAH_BUCKETS];
        let mut running = AABB::default();
        let mut running_count = 0usize;
        for b in (0..SAH_BUCKETS).rev() {
            running.expand_by_aabb(&bucket_bounds[b]);
            running_count += bucket_counts[b];
            suffix_bounds[b] = running;
            suffix_counts[b] = running_count;
        }

        let parent_area = bounds.surface_area().max(1e-6);
        let mut best_split = None;
        let mut best_cost = count as Float;
        let mut prefix = AABB::default();
        let mut prefix_count = 0usize;
        for b in 0..(SAH_BUCKETS - 1) {
            prefix.expand_by_aabb(&bucket_bounds[b]);
            prefix_count += bucket_counts[b];
            if prefix_count == 0 || suffix_counts[b + 1] == 0 {
                continue;
            }
            let cost = 0.125
                + (prefix_count as Float * prefix.surface_area()
                   + suffix_counts[b + 1] as Float * suffix_bounds[b + 1].surface_area())
                  / parent_area;
            if cost < best_cost {
                best_cost = cost;
                best_split = Some(b);
            }
        }

        let split_bucket = match best_split {
            Some(b) => b,
            None => {
                // A leaf is cheaper than any split.
                let node_idx = self.nodes.len();
                self.nodes.push(BvhNode::leaf(bounds, start, count));
                return node_idx;
            }
        };

        // Partition indices in place around the chosen bucket.
        let mut mid = start;
        for i in start..end {
            let idx = self.indices[i];
            if self.bucket_of(idx, axis, axis_min, axis_extent) <= split_bucket {
                self.indices.swap(i, mid);
                mid += 1;
            }
        }
        if mid == start || mid == end {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        let (left_bounds, left_centroids) = self.range_bounds(start, mid);
        let (right_bounds, right_centroids) = self.range_bounds(mid, end);
        let node_idx = self.nodes.len();
        self.nodes.push(BvhNode::leaf(bounds, 0, 0));
        let left = self.build_range(start, mid, left_bounds, left_centroids);
        let right = self.build_range(mid, end, right_bounds, right_centroids);
        self.nodes[node_idx] = BvhNode::interior(bounds, left, right);
        node_idx
    }

    fn bucket_of(&self, idx: usize, axis: usize, axis_min: Float, axis_extent: Float) -> usize {
        let c = self.centroids[idx][axis];
        let b = ((c - axis_min) / axis_extent * SAH_BUCKETS as Float) as usize;
        b.min(SAH_BUCKETS - 1)
    }

    fn range_bounds(&self, start: usize, end: usize) -> (AABB, AABB) {
        let mut bounds = AABB::default();
        let mut centroid_bounds = AABB::default();
        for i in start..end {
            let idx = self.indices[i];
            bounds.expand_by_aabb(&self.leaf_bounds[idx]);
            centroid_bounds.expand_by_point(&self.centroids[idx]);
        }
        (bounds, centroid_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::Float;

    fn grid_bounds(n: usize) -> Vec<AABB> {
        (0..n)
            .map(|i| {
                let x = i as Float * 2.0;
                AABB::new(Vector3f::new(x, 0.0, 0.0), Vector3f::new(x + 1.0, 1.0, 1.0))
            })
            .collect()
    }

    #[test]
    fn test_closest_hit_matches_linear_scan() {
        let ctx = TraceContext::new();
        let leaves = grid_bounds(32);
        let bvh = ctx.build(leaves.clone());
        assert_eq!(bvh.leaf_count(), 32);

        // A ray skimming along x hits every box; the nearest must win.
        let mut ray = Ray3f::new(Vector3f::new(-5.0, 0.5, 0.5),
                                 Vector3f::new(1.0, 0.0, 0.0), None, None);
        let hit = bvh.closest_hit(&mut ray, |leaf, ray| {
            if let Some((t0, _)) = leaves[leaf].ray_intersect_range(ray) {
                ray.update(t0.max(ray.min_t))
            } else {
                false
            }
        });
        assert_eq!(hit, Some(0));
        assert!((ray.max_t - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_occluded_early_out() {
        let ctx = TraceContext::new();
        let leaves = grid_bounds(8);
        let bvh = ctx.build(leaves.clone());

        let blocked = Ray3f::new(Vector3f::new(0.5, 0.5, -5.0),
                                 Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(bvh.occluded(&blocked, |leaf, ray| leaves[leaf].ray_intersect(ray)));

        let free = Ray3f::new(Vector3f::new(0.5, 5.0, -5.0),
                              Vector3f::new(0.0, 0.0, 1.0), None, None);
        assert!(!bvh.occluded(&free, |leaf, ray| leaves[leaf].ray_intersect(ray)));
    }

    #[test]
    fn test_empty_build_is_inert() {
        let ctx = TraceContext::new();
        let bvh = ctx.build(Vec::new());
        let mut ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(1.0, 0.0, 0.0), None, None);
        assert_eq!(bvh.closest_hit(&mut ray, |_, _| true), None);
        assert!(!bvh.occluded(&ray, |_, _| true));
    }

    #[test]
    #[should_panic]
    fn test_context_shutdown_is_fatal_for_builds() {
        let mut ctx = TraceContext::new();
        ctx.shutdown();
        let _ = ctx.build(Vec::new());
    }
}
