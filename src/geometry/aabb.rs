use std::ops::Sub;

use nalgebra::{Point2, Scalar};

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + Copy + Sub> AABB<Point2<T>> {
    pub fn width(&self) -> T::Output {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> T::Output {
        self.max[1] - self.min[1]
    }
}

impl WorldBox {
    /// Box that contains nothing; identity element of `union`.
    pub fn empty() -> WorldBox {
        AABB {
            min: WorldPoint::from(WorldVector::repeat(FloatType::INFINITY)),
            max: WorldPoint::from(WorldVector::repeat(FloatType::NEG_INFINITY)),
        }
    }

    pub fn from_point(p: WorldPoint) -> WorldBox {
        AABB { min: p, max: p }
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn union_point(&self, p: &WorldPoint) -> WorldBox {
        AABB {
            min: self.min.inf(p),
            max: self.max.sup(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Finite corners with min <= max on every axis.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| {
            self.min[axis].is_finite()
                && self.max[axis].is_finite()
                && self.min[axis] <= self.max[axis]
        })
    }

    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn centroid(&self) -> WorldPoint {
        self.center()
    }

    pub fn surface_area(&self) -> FloatType {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.size();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Index of the axis along which the box is widest.
    pub fn max_extent(&self) -> usize {
        let d = self.size();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Position of the point relative to the box, 0 at min and 1 at max on each axis.
    /// Zero-width axes map to 0.
    pub fn offset(&self, p: &WorldPoint) -> WorldVector {
        let mut o = *p - self.min;
        let size = self.size();
        for axis in 0..3 {
            if size[axis] > 0.0 {
                o[axis] /= size[axis];
            } else {
                o[axis] = 0.0;
            }
        }
        o
    }

    /// Returns true if the point is inside the box or on its boundary, with tolerance.
    pub fn contains(&self, p: &WorldPoint, tolerance: FloatType) -> bool {
        (0..3).all(|axis| {
            p[axis] >= self.min[axis] - tolerance && p[axis] <= self.max[axis] + tolerance
        })
    }

    /// The corner selected per axis: `false` picks min, `true` picks max.
    pub fn corner(&self, select_max: [bool; 3]) -> WorldPoint {
        WorldPoint::new(
            if select_max[0] { self.max.x } else { self.min.x },
            if select_max[1] { self.max.y } else { self.min.y },
            if select_max[2] { self.max.z } else { self.min.z },
        )
    }
}
