mod building;
mod printing;
mod ray_bvh_intersection;

use index_vec::IndexVec;

use crate::geometry::WorldBox;

pub use building::{BvhBuildError, MAX_LEAF_SIZE, SplitMethod};
pub use printing::{BvhStatistics, SizeSummary};

/// Binary bounding volume hierarchy over a list of objects.
///
/// Objects are reordered during the build so that every leaf references a contiguous
/// range of them. The tree is immutable once built.
#[derive(Clone, Debug)]
pub struct Bvh<O> {
    /// Root is the first node, if there is any
    nodes: IndexVec<NodeIdx, Node>,
    objects: IndexVec<ObjectIdx, O>,
    /// Position of each object in the list passed to `build`.
    source_indices: IndexVec<ObjectIdx, usize>,
}

#[derive(Clone, Debug)]
struct Node {
    bounding_box: WorldBox,
    kind: NodeKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NodeKind {
    Leaf {
        first: ObjectIdx,
        count: u8,
    },
    /// First child holds the objects with lower centroids along the split axis.
    Inner {
        children: [NodeIdx; 2],
        axis: u8,
    },
}

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
}

index_vec::define_index_type! {
    pub struct ObjectIdx = u32;
}

impl<O> Bvh<O> {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bounds of all objects, empty box for an empty tree.
    pub fn bounding_box(&self) -> WorldBox {
        self.root()
            .map_or_else(WorldBox::empty, |root| self.nodes[root].bounding_box)
    }

    /// Objects in leaf order.
    pub fn objects(&self) -> &IndexVec<ObjectIdx, O> {
        &self.objects
    }

    pub fn source_index(&self, index: ObjectIdx) -> usize {
        self.source_indices[index]
    }

    /// Iterates over leaves as (bounding box, objects of the leaf).
    pub fn leaves(&self) -> impl Iterator<Item = (&WorldBox, &[O])> {
        self.nodes.iter().filter_map(|node| match node.kind {
            NodeKind::Leaf { first, count } => Some((
                &node.bounding_box,
                &self.objects.raw[first.index()..first.index() + count as usize],
            )),
            NodeKind::Inner { .. } => None,
        })
    }

    fn root(&self) -> Option<NodeIdx> {
        (!self.nodes.is_empty()).then(|| NodeIdx::new(0))
    }
}
