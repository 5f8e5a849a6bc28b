use std::{array, time::Instant};

use index_vec::IndexVec;
use log::{debug, info, log_enabled};
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::{
    geometry::{FloatType, WorldBox, WorldPoint},
    scene::Object,
};

use super::{Bvh, Node, NodeIdx, NodeKind, ObjectIdx};

/// Number of buckets the centroid range is divided into when evaluating SAH splits.
const BUCKET_COUNT: usize = 12;

/// Cost of traversing an inner node, relative to the cost of intersecting one object.
const TRAVERSAL_COST: FloatType = 0.125;

/// Larger requested leaf sizes are clamped to this.
pub const MAX_LEAF_SIZE: usize = u8::MAX as usize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SplitMethod {
    /// Median split along the widest axis of centroids.
    Naive,
    /// Surface area heuristic over bucketed centroids.
    #[default]
    Sah,
}

#[derive(Debug, Error, PartialEq)]
pub enum BvhBuildError {
    #[error("Maximum leaf size must be at least 1")]
    ZeroLeafSize,

    #[error("Object {index} has invalid bounds {bounds:?}")]
    InvalidBounds { index: usize, bounds: WorldBox },
}

#[derive(Clone, Debug)]
struct BuildItem {
    bounds: WorldBox,
    centroid: WorldPoint,
    source_index: usize,
}

#[derive(Copy, Clone, Debug)]
struct Bucket {
    count: usize,
    bounds: WorldBox,
}

impl Bucket {
    fn merge(buckets: &[Bucket]) -> Bucket {
        buckets.iter().fold(
            Bucket {
                count: 0,
                bounds: WorldBox::empty(),
            },
            |acc, b| Bucket {
                count: acc.count + b.count,
                bounds: acc.bounds.union(&b.bounds),
            },
        )
    }
}

impl<O: Object> Bvh<O> {
    /// Builds the hierarchy over the objects.
    ///
    /// Leaves hold between 1 and `max_leaf_size` objects. Fails if `max_leaf_size`
    /// is zero or if any of the objects reports non-finite or inverted bounds.
    /// An empty object list builds an empty tree.
    pub fn build(
        objects: Vec<O>,
        max_leaf_size: usize,
        split_method: SplitMethod,
    ) -> Result<Bvh<O>, BvhBuildError> {
        if max_leaf_size == 0 {
            return Err(BvhBuildError::ZeroLeafSize);
        }
        let start = Instant::now();

        let mut items = objects
            .iter()
            .enumerate()
            .map(|(index, object)| {
                let bounds = object.bounding_box();
                if bounds.is_valid() {
                    Ok(BuildItem {
                        bounds,
                        centroid: bounds.centroid(),
                        source_index: index,
                    })
                } else {
                    Err(BvhBuildError::InvalidBounds { index, bounds })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = Builder {
            nodes: IndexVec::new(),
            max_leaf_size: max_leaf_size.min(MAX_LEAF_SIZE),
            split_method,
        };
        if !items.is_empty() {
            builder.build_recursive(&mut items, 0);
        }

        // Items are now in leaf order, objects have to follow them
        let mut position = vec![0; items.len()];
        for (i, item) in items.iter().enumerate() {
            position[item.source_index] = i;
        }
        let mut objects: Vec<(usize, O)> = objects.into_iter().enumerate().collect();
        objects.sort_unstable_by_key(|(source_index, _)| position[*source_index]);
        let (source_indices, objects): (Vec<_>, Vec<_>) = objects.into_iter().unzip();

        let bvh = Bvh {
            nodes: builder.nodes,
            objects: IndexVec::from_vec(objects),
            source_indices: IndexVec::from_vec(source_indices),
        };

        info!(
            "Built BVH ({:?}) over {} objects, {} nodes in {:.2?}",
            split_method,
            bvh.len(),
            bvh.nodes.len(),
            start.elapsed()
        );
        if log_enabled!(log::Level::Debug) {
            let statistics = bvh.statistics();
            debug!("BVH depth: {}", statistics.depth);
            debug!("BVH leaf size: {}", statistics.leaf_size);
        }

        Ok(bvh)
    }
}

struct Builder {
    nodes: IndexVec<NodeIdx, Node>,
    max_leaf_size: usize,
    split_method: SplitMethod,
}

impl Builder {
    /// Builds a subtree over the items, `offset` is the position of `items[0]`
    /// in the final object order.
    fn build_recursive(&mut self, items: &mut [BuildItem], offset: usize) -> NodeIdx {
        let bounding_box = items
            .iter()
            .fold(WorldBox::empty(), |acc, item| acc.union(&item.bounds));

        if items.len() <= self.max_leaf_size {
            return self.nodes.push(Node {
                bounding_box,
                kind: NodeKind::Leaf {
                    first: ObjectIdx::new(offset),
                    count: items.len() as u8,
                },
            });
        }

        let (mid, axis) = self.split(items, &bounding_box);

        // Create placeholder node that will be overwriten once the children exist
        let node_index = self.nodes.push(Node {
            bounding_box,
            kind: NodeKind::Leaf {
                first: ObjectIdx::new(offset),
                count: 0,
            },
        });

        let (left, right) = items.split_at_mut(mid);
        let left = self.build_recursive(left, offset);
        let right = self.build_recursive(right, offset + mid);

        self.nodes[node_index].kind = NodeKind::Inner {
            children: [left, right],
            axis: axis as u8,
        };

        node_index
    }

    /// Reorders the items and returns the split position and the axis used.
    /// Both sides are always non-empty.
    fn split(&self, items: &mut [BuildItem], bounding_box: &WorldBox) -> (usize, usize) {
        let centroid_bounds = items
            .iter()
            .fold(WorldBox::empty(), |acc, item| acc.union_point(&item.centroid));
        let axis = centroid_bounds.max_extent();

        let sah = if self.split_method == SplitMethod::Sah && centroid_bounds.size()[axis] > 0.0 {
            sah_split(items, axis, &centroid_bounds, bounding_box)
        } else {
            None
        };

        let mid = sah.unwrap_or_else(|| median_split(items, axis));
        (mid, axis)
    }
}

/// Places the lower half of centroids along the axis first.
fn median_split(items: &mut [BuildItem], axis: usize) -> usize {
    let mid = items.len() / 2;
    items.select_nth_unstable_by_key(mid, |item| OrderedFloat(item.centroid[axis]));
    mid
}

/// Returns None when no bucket boundary leaves objects on both sides.
fn sah_split(
    items: &mut [BuildItem],
    axis: usize,
    centroid_bounds: &WorldBox,
    bounding_box: &WorldBox,
) -> Option<usize> {
    let total_area = bounding_box.surface_area();
    if total_area <= 0.0 {
        return None;
    }

    let bucket_index = |item: &BuildItem| {
        let offset = centroid_bounds.offset(&item.centroid)[axis];
        ((offset * BUCKET_COUNT as FloatType) as usize).min(BUCKET_COUNT - 1)
    };

    let mut buckets: [Bucket; BUCKET_COUNT] = array::from_fn(|_| Bucket {
        count: 0,
        bounds: WorldBox::empty(),
    });
    for item in items.iter() {
        let bucket = &mut buckets[bucket_index(item)];
        bucket.count += 1;
        bucket.bounds = bucket.bounds.union(&item.bounds);
    }

    let (best_split, _cost) = (0..BUCKET_COUNT - 1)
        .filter_map(|split| {
            let left = Bucket::merge(&buckets[..=split]);
            let right = Bucket::merge(&buckets[split + 1..]);
            if left.count == 0 || right.count == 0 {
                return None;
            }
            let cost = TRAVERSAL_COST
                + (left.count as FloatType * left.bounds.surface_area()
                    + right.count as FloatType * right.bounds.surface_area())
                    / total_area;
            Some((split, cost))
        })
        .min_by_key(|(_split, cost)| OrderedFloat(*cost))?;

    let mid = itertools::partition(items.iter_mut(), |item| bucket_index(item) <= best_split);
    (mid > 0 && mid < items.len()).then_some(mid)
}
