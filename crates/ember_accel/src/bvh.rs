//! A binned-SAH bounding volume hierarchy, shared by the per-mesh BLAS
//! (`SPEC_FULL.md` §4.C) and the scene TLAS. Build quality is "high":
//! surface-area heuristic cost estimation with top-level binning, the
//! standard approach the original engine cites.
//!
//! The BVH never reorders its caller's primitive array; instead it builds
//! an internal `order: Vec<u32>` permutation so that leaf `[first, first +
//! count)` ranges are contiguous in `order`, purely for traversal locality
//! (`SPEC_FULL.md` §4.C: "Internally reorders primitives to match BVH leaf
//! order... the public primitive array is not reordered").

use ember_core::Aabb;
use glam::Vec3;

const BIN_COUNT: usize = 12;
const MAX_LEAF_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy)]
pub enum BvhNodeKind {
    Leaf { first: u32, count: u32 },
    Interior { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bounds: Aabb,
    pub kind: BvhNodeKind,
}

impl BvhNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvhNodeKind::Leaf { .. })
    }
}

/// A built hierarchy: a flat node array (root at index 0, matching the
/// classic `bvh::v2`-style binary-tree-in-an-array layout the original
/// cites) plus the leaf-order permutation.
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    pub order: Vec<u32>,
}

struct BuildItem {
    index: u32,
    bounds: Aabb,
    centroid: Vec3,
}

impl Bvh {
    /// Builds a BVH over `count` items, given per-item bounds/centroid
    /// accessors. `count == 0` yields a single empty leaf.
    pub fn build(count: u32, bounds_of: impl Fn(u32) -> Aabb) -> Self {
        let mut items: Vec<BuildItem> = (0..count)
            .map(|i| {
                let bounds = bounds_of(i);
                BuildItem {
                    index: i,
                    bounds,
                    centroid: bounds.center(),
                }
            })
            .collect();

        let mut nodes = Vec::new();
        if items.is_empty() {
            nodes.push(BvhNode {
                bounds: Aabb::INVALID,
                kind: BvhNodeKind::Leaf { first: 0, count: 0 },
            });
            return Self { nodes, order: Vec::new() };
        }

        build_recursive(&mut items, 0, items.len(), &mut nodes);

        let order = items.iter().map(|it| it.index).collect();
        Self { nodes, order }
    }

    #[must_use]
    pub fn root_bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or(Aabb::INVALID)
    }
}

/// Recursively splits `items[begin..end]` in place (so the final slice
/// order becomes the BVH's leaf order), pushing nodes into `nodes` and
/// returning the index of the node just created.
fn build_recursive(items: &mut [BuildItem], begin: usize, end: usize, nodes: &mut Vec<BvhNode>) -> u32 {
    let slice = &mut items[begin..end];
    let bounds = slice.iter().fold(Aabb::INVALID, |acc, it| acc.union(&it.bounds));
    let count = (end - begin) as u32;

    if count <= MAX_LEAF_SIZE {
        let node_index = nodes.len() as u32;
        nodes.push(BvhNode {
            bounds,
            kind: BvhNodeKind::Leaf {
                first: begin as u32,
                count,
            },
        });
        return node_index;
    }

    let Some((split_axis, split_at)) = find_sah_split(slice, bounds) else {
        let node_index = nodes.len() as u32;
        nodes.push(BvhNode {
            bounds,
            kind: BvhNodeKind::Leaf {
                first: begin as u32,
                count,
            },
        });
        return node_index;
    };

    // Partition items[begin..end] around the chosen bin boundary.
    let centroid_bounds_min = bounds.min()[split_axis];
    let centroid_bounds_extent = (bounds.max()[split_axis] - centroid_bounds_min).max(1e-8);
    let bin_of = |c: Vec3| -> usize {
        let t = (c[split_axis] - centroid_bounds_min) / centroid_bounds_extent;
        ((t * BIN_COUNT as f32) as usize).min(BIN_COUNT - 1)
    };
    slice.sort_by_key(|it| bin_of(it.centroid) < split_at);
    let mid = slice.iter().filter(|it| bin_of(it.centroid) < split_at).count();
    let mid = mid.clamp(1, slice.len() - 1);

    // Reserve a slot for this interior node before recursing so its index
    // is known to both children's caller.
    let node_index = nodes.len() as u32;
    nodes.push(BvhNode {
        bounds,
        kind: BvhNodeKind::Interior { left: 0, right: 0 },
    });

    let left = build_recursive(items, begin, begin + mid, nodes);
    let right = build_recursive(items, begin + mid, end, nodes);
    nodes[node_index as usize].kind = BvhNodeKind::Interior { left, right };
    node_index
}

/// Finds the cheapest of `BIN_COUNT` candidate splits along whichever axis
/// has the widest centroid extent, using the surface-area heuristic. Falls
/// back to `None` (caller makes a leaf) when the centroid bounds are
/// degenerate (e.g. all items share one point).
fn find_sah_split(items: &[BuildItem], bounds: Aabb) -> Option<(usize, usize)> {
    let centroid_bounds = items
        .iter()
        .fold(Aabb::INVALID, |acc, it| acc.union(&Aabb::from_center_half_size(it.centroid, Vec3::ZERO)));
    let extent = centroid_bounds.size();
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    if extent[axis] < 1e-8 {
        return None;
    }

    let min = centroid_bounds.min()[axis];
    let inv_extent = BIN_COUNT as f32 / extent[axis];

    #[derive(Clone, Copy)]
    struct Bin {
        bounds: Aabb,
        count: u32,
    }
    let mut bins = [Bin {
        bounds: Aabb::INVALID,
        count: 0,
    }; BIN_COUNT];

    let bin_index = |c: f32| -> usize { (((c - min) * inv_extent) as usize).min(BIN_COUNT - 1) };

    for it in items {
        let b = bin_index(it.centroid[axis]);
        bins[b].bounds.union_with(&it.bounds);
        bins[b].count += 1;
    }

    // Prefix/suffix sweep over the BIN_COUNT-1 internal split candidates.
    let mut left_area = [0.0f32; BIN_COUNT];
    let mut left_count = [0u32; BIN_COUNT];
    let mut acc_bounds = Aabb::INVALID;
    let mut acc_count = 0u32;
    for i in 0..BIN_COUNT {
        acc_bounds.union_with(&bins[i].bounds);
        acc_count += bins[i].count;
        left_area[i] = acc_bounds.surface_area();
        left_count[i] = acc_count;
    }

    let mut right_area = [0.0f32; BIN_COUNT];
    let mut right_count = [0u32; BIN_COUNT];
    let mut acc_bounds = Aabb::INVALID;
    let mut acc_count = 0u32;
    for i in (0..BIN_COUNT).rev() {
        acc_bounds.union_with(&bins[i].bounds);
        acc_count += bins[i].count;
        right_area[i] = acc_bounds.surface_area();
        right_count[i] = acc_count;
    }

    let bounds_area = bounds.surface_area().max(1e-8);
    let mut best_cost = f32::MAX;
    let mut best_split = None;
    for split in 1..BIN_COUNT {
        if left_count[split - 1] == 0 || right_count[split] == 0 {
            continue;
        }
        let cost = (left_count[split - 1] as f32 * left_area[split - 1]
            + right_count[split] as f32 * right_area[split])
            / bounds_area;
        if cost < best_cost {
            best_cost = cost;
            best_split = Some(split);
        }
    }
    best_split.map(|split| (axis, split))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_build_yields_one_empty_leaf() {
        let bvh = Bvh::build(0, |_| Aabb::INVALID);
        assert_eq!(bvh.nodes.len(), 1);
        assert!(bvh.nodes[0].is_leaf());
    }

    #[test]
    fn order_is_a_permutation_of_input_indices() {
        let boxes: Vec<Aabb> = (0..37)
            .map(|i| Aabb::from_center_half_size(Vec3::new(i as f32 * 2.0, 0.0, 0.0), Vec3::splat(0.4)))
            .collect();
        let bvh = Bvh::build(boxes.len() as u32, |i| boxes[i as usize]);
        let mut sorted = bvh.order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn root_bounds_contain_every_item() {
        let boxes: Vec<Aabb> = (0..20)
            .map(|i| Aabb::from_center_half_size(Vec3::new(i as f32, (i * i) as f32 * 0.1, 0.0), Vec3::splat(0.3)))
            .collect();
        let bvh = Bvh::build(boxes.len() as u32, |i| boxes[i as usize]);
        let root = bvh.root_bounds();
        for b in &boxes {
            assert!(root.intersects(b) || root.contains_point(b.center()));
        }
    }
}
