use std::ops::Index;

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Triangle<WorldPoint> {
    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    /// Its length is twice the triangle area.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn area(&self) -> FloatType {
        0.5 * self.normal().norm()
    }

    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from((self[0].coords + self[1].coords + self[2].coords) / 3.0)
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::from_point(self[0])
            .union_point(&self[1])
            .union_point(&self[2])
    }

    /// Point at barycentric coordinates (u, v); weight of self[0] is 1 - u - v.
    pub fn interpolate(&self, u: FloatType, v: FloatType) -> WorldPoint {
        let [e1, e2] = self.edges();
        self[0] + e1 * u + e2 * v
    }
}
