use crate::{
    geometry::{FloatType, Ray, RayIntersectionExt as _},
    scene::{HitRecord, Object, TraceHit},
};

use super::{Bvh, NodeIdx, NodeKind, ObjectIdx};

/// Relative slack added to box exit distances.
/// Keeps rays that graze an object exactly at its box boundary from being culled by round-off.
const BOX_EXIT_TOLERANCE: FloatType = 1e-5;

impl<O: Object> Bvh<O> {
    /// Nearest hit along the ray.
    pub fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        self.traverse(ray, |_index, object| {
            object.intersect(ray).map(|hit| (hit.t, hit))
        })
    }

    /// Nearest hit along the ray, with the index of the object that was hit.
    pub fn trace(&self, ray: &Ray) -> Option<(ObjectIdx, TraceHit)> {
        self.traverse(ray, |index, object| {
            object.trace(ray).map(|hit| (hit.t, (index, hit)))
        })
    }

    /// Walks the tree front to back, calling `hit_object` for objects in leaves whose
    /// box the ray enters before the nearest hit found so far.
    fn traverse<'a, H>(
        &'a self,
        ray: &Ray,
        mut hit_object: impl FnMut(ObjectIdx, &'a O) -> Option<(FloatType, H)>,
    ) -> Option<H> {
        let root = self.root()?;

        let mut best_t = FloatType::INFINITY;
        let mut best = None;

        let mut stack: Vec<(NodeIdx, FloatType)> = Vec::new();
        if let Some(t) = self.node_entry_distance(root, ray, best_t) {
            stack.push((root, t));
        }

        while let Some((node_index, node_t1)) = stack.pop() {
            if node_t1 > best_t {
                // If the node's minimum intersection distance is further away than the best
                // hit found so far, the node can't do any good any more and we can skip it.
                continue;
            }

            match self.nodes[node_index].kind {
                NodeKind::Leaf { first, count } => {
                    for index in (0..count as usize).map(|i| first + i) {
                        if let Some((t, hit)) = hit_object(index, &self.objects[index]) {
                            if t < best_t {
                                best_t = t;
                                best = Some(hit);
                            }
                        }
                    }
                }
                NodeKind::Inner { children, axis } => {
                    let [near, far] = if ray.dir_is_neg[axis as usize] {
                        [children[1], children[0]]
                    } else {
                        children
                    };
                    // Near child is pushed last, so that it gets popped first
                    for child in [far, near] {
                        if let Some(t) = self.node_entry_distance(child, ray, best_t) {
                            stack.push((child, t));
                        }
                    }
                }
            }
        }

        best
    }

    /// Distance where the ray enters the node's box, None if it misses the box
    /// or enters it after `max_t`.
    fn node_entry_distance(&self, node: NodeIdx, ray: &Ray, max_t: FloatType) -> Option<FloatType> {
        let (t1, t2) = self.nodes[node].bounding_box.intersect(ray);
        let t2 = t2 + t2.abs() * BOX_EXIT_TOLERANCE;
        (t1 <= t2 && t2 >= 0.0 && t1 <= max_t).then_some(t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{
            WorldPoint, WorldVector,
            test::{NonzeroWorldVectorWrapper, RayWrapper},
        },
        scene::{
            bvh::{
                SplitMethod,
                test::{grey, object_strategy},
            },
            primitives::{Cuboid, Primitive, Sphere},
        },
    };
    use assert2::{assert, check, let_assert};
    use ordered_float::OrderedFloat;
    use proptest::collection::vec;
    use test_strategy::proptest;

    fn brute_force(objects: &[Primitive], ray: &Ray) -> Option<FloatType> {
        objects
            .iter()
            .filter_map(|o| o.intersect(ray).map(|hit| hit.t))
            .min_by_key(|t| OrderedFloat(*t))
    }

    /// The tree must find the same nearest hit as testing every object.
    #[proptest]
    fn matches_brute_force(
        #[strategy(vec(object_strategy(), 0..40))] objects: Vec<Primitive>,
        #[strategy(vec(proptest::arbitrary::any::<RayWrapper>(), 1..20))] rays: Vec<RayWrapper>,
        #[strategy(1usize..=4)] max_leaf_size: usize,
        use_sah: bool,
    ) {
        let split_method = if use_sah {
            SplitMethod::Sah
        } else {
            SplitMethod::Naive
        };
        let bvh = Bvh::build(objects.clone(), max_leaf_size, split_method).expect("objects are valid");

        for ray in rays.iter() {
            let expected = brute_force(&objects, ray);
            let hit = bvh.intersect(ray).map(|hit| hit.t);
            let traced = bvh.trace(ray).map(|(_, hit)| hit.t);

            match (expected, hit) {
                (None, None) => {}
                (Some(expected), Some(t)) => {
                    assert!((expected - t).abs() <= 1e-4 * expected.max(1.0), "{ray:?}");
                }
                (expected, hit) => {
                    panic!("{ray:?}: brute force {expected:?}, bvh {hit:?}");
                }
            }
            assert!(hit == traced);
        }
    }

    #[proptest]
    fn repeated_queries_are_identical(
        #[strategy(vec(object_strategy(), 1..30))] objects: Vec<Primitive>,
        ray: RayWrapper,
    ) {
        let bvh = Bvh::build(objects, 1, SplitMethod::Sah).expect("objects are valid");
        let first = bvh.trace(&ray);
        let second = bvh.trace(&ray);
        assert!(first == second);
    }

    #[proptest]
    fn empty_tree_never_hits(origin: NonzeroWorldVectorWrapper, direction: NonzeroWorldVectorWrapper) {
        let bvh = Bvh::<Primitive>::build(Vec::new(), 1, SplitMethod::Sah).expect("empty is valid");
        let ray = Ray::new(WorldPoint::from(*origin), *direction);
        assert!(bvh.intersect(&ray).is_none());
        assert!(bvh.trace(&ray).is_none());
    }

    fn three_cubes() -> Bvh<Cuboid> {
        let cubes = [0.0, 10.0, 20.0]
            .into_iter()
            .map(|x| Cuboid::cube(WorldPoint::new(x, 0.0, 0.0), 1.0, grey()))
            .collect();
        Bvh::build(cubes, 1, SplitMethod::Sah).expect("cubes are valid")
    }

    #[test]
    fn three_cubes_hit_first() {
        let bvh = three_cubes();
        let ray = Ray::new(WorldPoint::new(-5.0, 0.0, 0.0), WorldVector::x());

        let_assert!(Some(hit) = bvh.intersect(&ray));
        check!((hit.t - 4.5).abs() < 1e-5);
        check!(hit.point == WorldPoint::new(-0.5, 0.0, 0.0));

        let_assert!(Some((index, _)) = bvh.trace(&ray));
        check!(bvh.source_index(index) == 0);
    }

    #[test]
    fn three_cubes_hit_last_from_behind() {
        let bvh = three_cubes();
        let ray = Ray::new(WorldPoint::new(25.0, 0.0, 0.0), -WorldVector::x());

        let_assert!(Some((index, hit)) = bvh.trace(&ray));
        check!((hit.t - 4.5).abs() < 1e-5);
        check!(bvh.source_index(index) == 2);
    }

    #[test]
    fn three_cubes_miss() {
        let bvh = three_cubes();
        let ray = Ray::new(WorldPoint::new(-5.0, 2.0, 0.0), WorldVector::x());
        assert!(bvh.intersect(&ray).is_none());
    }

    /// Origin inside the sphere's box but outside the sphere, pointing away from it.
    #[test]
    fn no_false_hit_from_inside_bounds() {
        let sphere = Sphere {
            center: WorldPoint::origin(),
            radius: 1.0,
            material: grey(),
        };
        let bvh = Bvh::build(vec![sphere], 1, SplitMethod::Sah).expect("sphere is valid");

        let away = Ray::new(WorldPoint::new(0.9, 0.9, 0.9), WorldVector::new(1.0, 1.0, 1.0));
        assert!(bvh.intersect(&away).is_none());

        let towards = Ray::new(WorldPoint::new(0.9, 0.9, 0.9), WorldVector::new(-1.0, -1.0, -1.0));
        let_assert!(Some(hit) = bvh.intersect(&towards));
        let expected = WorldVector::new(0.9, 0.9, 0.9).norm() - 1.0;
        assert!((hit.t - expected).abs() < 1e-5);
    }
}
