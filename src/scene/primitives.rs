use nalgebra::Unit;
use rand::Rng;
use rand_distr::{Distribution as _, UnitSphere};

use crate::geometry::{
    self, FloatType, RAY_EPSILON, Ray, RayIntersectionExt as _, WorldBox, WorldPoint, WorldVector,
};

use super::{HitRecord, Object, SurfaceSample, TraceHit, material::Material, mesh::Mesh};

#[derive(Clone, Debug)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
    pub material: Material,
}

impl Object for Sphere {
    fn bounding_box(&self) -> WorldBox {
        let r_vec = WorldVector::repeat(self.radius);
        WorldBox::new(self.center - r_vec, self.center + r_vec)
    }

    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        let oc = ray.origin - self.center;
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = -b - sqrt_disc;
        let t2 = -b + sqrt_disc;
        let t = if t1 > RAY_EPSILON {
            t1
        } else if t2 > RAY_EPSILON {
            t2
        } else {
            return None;
        };

        let point = ray.point_at(t);
        Some(HitRecord::new(
            t,
            point,
            Unit::new_normalize(point - self.center),
            &self.material,
        ))
    }

    fn area(&self) -> FloatType {
        4.0 * std::f32::consts::PI * self.radius * self.radius
    }

    fn has_emission(&self) -> bool {
        self.material.has_emission()
    }

    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample {
        let [x, y, z]: [FloatType; 3] = UnitSphere.sample(rng);
        let normal = Unit::new_normalize(WorldVector::new(x, y, z));
        SurfaceSample {
            point: self.center + normal.as_ref() * self.radius,
            normal,
            emission: self.material.emission(),
            pdf: 1.0 / self.area(),
        }
    }
}

/// Single flat triangle. Mesh triangles are these too.
#[derive(Clone, Debug)]
pub struct Triangle {
    pub vertices: geometry::Triangle<WorldPoint>,
    pub material: Material,
}

impl Triangle {
    pub fn new(a: WorldPoint, b: WorldPoint, c: WorldPoint, material: Material) -> Triangle {
        Triangle {
            vertices: geometry::Triangle::new(a, b, c),
            material,
        }
    }

    fn hit_distance(&self, ray: &Ray) -> Option<FloatType> {
        let (t, _uv) = self.vertices.intersect(ray)?;
        (t > RAY_EPSILON).then_some(t)
    }
}

impl Object for Triangle {
    fn bounding_box(&self) -> WorldBox {
        self.vertices.bounding_box()
    }

    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        let t = self.hit_distance(ray)?;
        let normal = Unit::try_new(self.vertices.normal(), geometry::EPSILON)?;
        Some(HitRecord::new(t, ray.point_at(t), normal, &self.material))
    }

    fn trace(&self, ray: &Ray) -> Option<TraceHit> {
        self.hit_distance(ray).map(|t| TraceHit { t, index: 0 })
    }

    fn area(&self) -> FloatType {
        self.vertices.area()
    }

    fn has_emission(&self) -> bool {
        self.material.has_emission()
    }

    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample {
        let su = rng.random::<FloatType>().sqrt();
        let v: FloatType = rng.random();
        let point = self.vertices.interpolate(su * (1.0 - v), su * v);
        SurfaceSample {
            point,
            normal: Unit::new_normalize(self.vertices.normal()),
            emission: self.material.emission(),
            pdf: 1.0 / self.area(),
        }
    }
}

/// Axis aligned box.
#[derive(Clone, Debug)]
pub struct Cuboid {
    pub bounds: WorldBox,
    pub material: Material,
}

impl Cuboid {
    /// Cuboid of the given edge length, centered at a point.
    pub fn cube(center: WorldPoint, size: FloatType, material: Material) -> Cuboid {
        let half = WorldVector::repeat(size / 2.0);
        Cuboid {
            bounds: WorldBox::new(center - half, center + half),
            material,
        }
    }

    fn hit_distance(&self, ray: &Ray) -> Option<FloatType> {
        let (t1, t2) = self.bounds.intersect(ray);
        if t1 > t2 {
            None
        } else if t1 > RAY_EPSILON {
            Some(t1)
        } else if t2 > RAY_EPSILON {
            Some(t2)
        } else {
            None
        }
    }

    /// Outward normal of the face nearest to the point.
    fn face_normal(&self, point: &WorldPoint) -> Unit<WorldVector> {
        let mut best_distance = FloatType::INFINITY;
        let mut normal = WorldVector::z();
        for axis in 0..3 {
            for (face, sign) in [(self.bounds.min[axis], -1.0), (self.bounds.max[axis], 1.0)] {
                let distance = (point[axis] - face).abs();
                if distance < best_distance {
                    best_distance = distance;
                    normal = WorldVector::zeros();
                    normal[axis] = sign;
                }
            }
        }
        Unit::new_unchecked(normal)
    }
}

impl Object for Cuboid {
    fn bounding_box(&self) -> WorldBox {
        self.bounds
    }

    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        let t = self.hit_distance(ray)?;
        let point = ray.point_at(t);
        Some(HitRecord::new(
            t,
            point,
            self.face_normal(&point),
            &self.material,
        ))
    }

    fn trace(&self, ray: &Ray) -> Option<TraceHit> {
        self.hit_distance(ray).map(|t| TraceHit { t, index: 0 })
    }

    fn area(&self) -> FloatType {
        self.bounds.surface_area()
    }

    fn has_emission(&self) -> bool {
        self.material.has_emission()
    }

    /// Picks a face proportionally to its area, then a uniform point on it.
    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample {
        let size = self.bounds.size();
        let face_areas = [size.y * size.z, size.x * size.z, size.x * size.y];
        let mut draw = rng.random::<FloatType>() * (face_areas.iter().sum::<FloatType>() * 2.0);

        let mut axis = 2;
        let mut positive = true;
        'search: for a in 0..3 {
            for side in [false, true] {
                if draw < face_areas[a] {
                    axis = a;
                    positive = side;
                    break 'search;
                }
                draw -= face_areas[a];
            }
        }

        let mut point = self.bounds.min + size.component_mul(&WorldVector::new(
            rng.random(),
            rng.random(),
            rng.random(),
        ));
        point[axis] = if positive {
            self.bounds.max[axis]
        } else {
            self.bounds.min[axis]
        };

        let mut normal = WorldVector::zeros();
        normal[axis] = if positive { 1.0 } else { -1.0 };

        SurfaceSample {
            point,
            normal: Unit::new_unchecked(normal),
            emission: self.material.emission(),
            pdf: 1.0 / self.area(),
        }
    }
}

/// Closed set of scene objects.
#[derive(Clone, Debug)]
pub enum Primitive {
    Sphere(Sphere),
    Triangle(Triangle),
    Cuboid(Cuboid),
    Mesh(Mesh),
}

macro_rules! dispatch {
    ($self:expr, $o:ident => $body:expr) => {
        match $self {
            Primitive::Sphere($o) => $body,
            Primitive::Triangle($o) => $body,
            Primitive::Cuboid($o) => $body,
            Primitive::Mesh($o) => $body,
        }
    };
}

impl Object for Primitive {
    fn bounding_box(&self) -> WorldBox {
        dispatch!(self, o => o.bounding_box())
    }

    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        dispatch!(self, o => o.intersect(ray))
    }

    fn trace(&self, ray: &Ray) -> Option<TraceHit> {
        dispatch!(self, o => o.trace(ray))
    }

    fn area(&self) -> FloatType {
        dispatch!(self, o => o.area())
    }

    fn has_emission(&self) -> bool {
        dispatch!(self, o => o.has_emission())
    }

    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample {
        dispatch!(self, o => o.sample(rng))
    }
}

impl From<Sphere> for Primitive {
    fn from(value: Sphere) -> Self {
        Primitive::Sphere(value)
    }
}

impl From<Triangle> for Primitive {
    fn from(value: Triangle) -> Self {
        Primitive::Triangle(value)
    }
}

impl From<Cuboid> for Primitive {
    fn from(value: Cuboid) -> Self {
        Primitive::Cuboid(value)
    }
}

impl From<Mesh> for Primitive {
    fn from(value: Mesh) -> Self {
        Primitive::Mesh(value)
    }
}
