mod aabb;
mod frame;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

use nalgebra::{Point2, Point3, Vector3};

pub use aabb::AABB;
pub use frame::LocalFrame;
pub use ray_box_intersection::RayIntersectionExt;
pub use triangle::Triangle;

pub type FloatType = f32;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = nalgebra::Vector2<u32>;
pub type ScreenBlock = AABB<ScreenPoint>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Linear RGB radiance.
pub type Radiance = Vector3<FloatType>;

/// Tolerance for degenerate geometry (zero-length vectors, parallel rays).
pub const EPSILON: FloatType = 1e-6;

/// Minimum hit distance accepted by primitives.
/// Rays spawned on a surface must not hit that surface again at distance ~0.
pub const RAY_EPSILON: FloatType = 1e-4;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,

    /// For each axis, true if the direction is negative along it.
    pub dir_is_neg: [bool; 3],
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| if x == 0.0 { f32::INFINITY } else { 1.0 / x });
        let dir_is_neg = [
            inv_direction.x < 0.0,
            inv_direction.y < 0.0,
            inv_direction.z < 0.0,
        ];

        Ray {
            origin,
            direction,
            inv_direction,
            dir_is_neg,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use assert2::assert;
    use proptest::prelude::*;

    /// Helper macro that creates a wrapper arnound a type that implemetns Deref and Arbitary
    macro_rules! arbitrary_wrapper {
        ( $wrapper_name:ident ( $type:ty ) -> $block:block ) => {
            #[derive(Copy, Clone, Debug)]
            pub struct $wrapper_name(pub $type);

            impl std::ops::Deref for $wrapper_name {
                type Target = $type;
                fn deref(&self) -> &$type {
                    &self.0
                }
            }

            impl Arbitrary for $wrapper_name {
                type Parameters = ();
                type Strategy = proptest::strategy::BoxedStrategy<Self>;
                fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
                    $block.prop_map(|x| $wrapper_name(x)).boxed()
                }
            }
        };
    }

    pub fn coordinate() -> BoxedStrategy<f32> {
        (-100i32..=100i32).prop_map(|n| n as f32 * 0.25).boxed()
    }

    arbitrary_wrapper! {
        WorldPointWrapper(WorldPoint) -> {
            (coordinate(), coordinate(), coordinate())
                .prop_map(|(x, y, z)| WorldPoint::new(x, y, z))
        }
    }

    arbitrary_wrapper! {
        NonzeroWorldVectorWrapper(WorldVector) -> {
            (-10i32..=10, -10i32..=10, -10i32..=10)
                .prop_filter_map("vector is zero", |(x, y, z)| {
                    let vector = WorldVector::new(x as f32, y as f32, z as f32);
                    if vector.norm() < 1e-6 {
                        None
                    } else {
                        Some(vector)
                    }
                })
        }
    }

    arbitrary_wrapper! {
        RayWrapper(Ray) -> {
            (any::<WorldPointWrapper>(), any::<NonzeroWorldVectorWrapper>())
                .prop_map(|(origin, direction)| Ray::new(*origin, *direction))
        }
    }

    #[test]
    fn ray_direction_is_normalized() {
        let ray = Ray::new(WorldPoint::origin(), WorldVector::new(3.0, 0.0, 4.0));
        assert!((ray.direction.norm() - 1.0).abs() < 1e-6);
        assert!((ray.point_at(5.0) - WorldPoint::new(3.0, 0.0, 4.0)).norm() < 1e-5);
    }

    #[test]
    fn ray_zero_component_has_infinite_inverse() {
        let ray = Ray::new(WorldPoint::origin(), WorldVector::new(0.0, -2.0, 0.0));
        assert!(ray.inv_direction.x == f32::INFINITY);
        assert!(ray.inv_direction.y == -1.0);
        assert!(ray.dir_is_neg == [false, true, false]);
    }
}
