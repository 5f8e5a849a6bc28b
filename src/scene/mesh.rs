use rand::Rng;
use thiserror::Error;

use crate::geometry::{FloatType, Ray, WorldBox, WorldPoint};

use super::{
    HitRecord, Object, SurfaceSample, TraceHit,
    bvh::{Bvh, BvhBuildError, SplitMethod},
    material::Material,
    primitives::Triangle,
};

/// Indexed triangle mesh with a single material.
/// Triangles are kept in their own BVH, so the mesh is a single object for the scene.
#[derive(Clone, Debug)]
pub struct Mesh {
    triangles: Bvh<Triangle>,
    /// Running sum of triangle areas, in BVH order
    cumulative_area: Vec<FloatType>,
    area: FloatType,
    material: Material,
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Mesh has no triangles")]
    NoTriangles,

    #[error("Triangle {triangle} references vertex {vertex}, but there are only {vertex_count} vertices")]
    VertexOutOfRange {
        triangle: usize,
        vertex: usize,
        vertex_count: usize,
    },

    #[error("Failed to build triangle BVH: {0}")]
    Bvh(#[from] BvhBuildError),
}

impl Mesh {
    pub fn new(
        vertices: &[WorldPoint],
        indices: &[[usize; 3]],
        material: Material,
    ) -> Result<Mesh, MeshError> {
        if indices.is_empty() {
            return Err(MeshError::NoTriangles);
        }

        let triangles = indices
            .iter()
            .enumerate()
            .map(|(triangle, corners)| -> Result<Triangle, MeshError> {
                let mut points = [WorldPoint::origin(); 3];
                for (point, &vertex) in points.iter_mut().zip(corners) {
                    *point = *vertices.get(vertex).ok_or(MeshError::VertexOutOfRange {
                        triangle,
                        vertex,
                        vertex_count: vertices.len(),
                    })?;
                }
                let [a, b, c] = points;
                Ok(Triangle::new(a, b, c, material))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let triangles = Bvh::build(triangles, 4, SplitMethod::Sah)?;

        let cumulative_area: Vec<FloatType> = triangles
            .objects()
            .iter()
            .scan(0.0, |sum, triangle| {
                *sum += triangle.area();
                Some(*sum)
            })
            .collect();
        let area = cumulative_area.last().copied().unwrap_or(0.0);

        Ok(Mesh {
            triangles,
            cumulative_area,
            area,
            material,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Object for Mesh {
    fn bounding_box(&self) -> WorldBox {
        self.triangles.bounding_box()
    }

    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        self.triangles.intersect(ray)
    }

    /// Index in the hit is the position of the triangle in the index list the mesh was created from.
    fn trace(&self, ray: &Ray) -> Option<TraceHit> {
        let (object_index, hit) = self.triangles.trace(ray)?;
        Some(TraceHit {
            t: hit.t,
            index: self.triangles.source_index(object_index),
        })
    }

    fn area(&self) -> FloatType {
        self.area
    }

    fn has_emission(&self) -> bool {
        self.material.has_emission()
    }

    /// Picks a triangle proportionally to its area, then a uniform point on it.
    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample {
        let draw = rng.random::<FloatType>() * self.area;
        let index = self
            .cumulative_area
            .partition_point(|sum| *sum <= draw)
            .min(self.cumulative_area.len() - 1);

        let sample = self.triangles.objects().raw[index].sample(rng);
        SurfaceSample {
            pdf: 1.0 / self.area,
            ..sample
        }
    }
}
