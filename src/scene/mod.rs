pub mod bvh;
mod integrator;
pub mod material;
pub mod mesh;
pub mod primitives;

use std::time::Instant;

use log::info;
use nalgebra::Unit;
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::geometry::{FloatType, Radiance, Ray, WorldBox, WorldPoint, WorldVector};

use bvh::{Bvh, BvhBuildError, ObjectIdx, SplitMethod};
use material::Material;
use primitives::Primitive;

pub use integrator::{IntegratorSettings, VisibilityTest};

/// Renderable object
pub trait Object {
    fn bounding_box(&self) -> WorldBox;

    /// Nearest hit along the ray, farther than `RAY_EPSILON`.
    fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>>;

    /// Like `intersect`, but only reports the distance and the index of the hit
    /// sub-primitive (triangle of a mesh, 0 for simple objects).
    fn trace(&self, ray: &Ray) -> Option<TraceHit> {
        self.intersect(ray).map(|hit| TraceHit { t: hit.t, index: 0 })
    }

    fn area(&self) -> FloatType;

    fn has_emission(&self) -> bool;

    /// Uniformly samples a point on the surface, pdf is with respect to area.
    fn sample(&self, rng: &mut impl Rng) -> SurfaceSample;
}

#[derive(Copy, Clone, Debug)]
pub struct HitRecord<'a> {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    /// Geometric normal, pointing outside for closed objects
    pub normal: Unit<WorldVector>,
    pub material: &'a Material,
    pub emission: Radiance,
}

impl<'a> HitRecord<'a> {
    pub fn new(
        t: FloatType,
        point: WorldPoint,
        normal: Unit<WorldVector>,
        material: &'a Material,
    ) -> HitRecord<'a> {
        HitRecord {
            t,
            point,
            normal,
            material,
            emission: material.emission(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TraceHit {
    pub t: FloatType,
    pub index: usize,
}

/// Point sampled on a surface.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceSample {
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    pub emission: Radiance,
    /// Density with respect to surface area
    pub pdf: FloatType,
}

/// Collects objects and settings, `build_bvh` turns it into a queryable `Scene`.
#[derive(Clone, Debug)]
pub struct SceneBuilder<O = Primitive> {
    objects: Vec<O>,
    max_leaf_size: usize,
    split_method: SplitMethod,
    settings: IntegratorSettings,
}

impl<O: Object> Default for SceneBuilder<O> {
    fn default() -> Self {
        SceneBuilder {
            objects: Vec::new(),
            max_leaf_size: 1,
            split_method: SplitMethod::default(),
            settings: IntegratorSettings::default(),
        }
    }
}

impl<O: Object> SceneBuilder<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, object: impl Into<O>) -> Self {
        self.objects.push(object.into());
        self
    }

    pub fn extend(mut self, objects: impl IntoIterator<Item = O>) -> Self {
        self.objects.extend(objects);
        self
    }

    pub fn max_leaf_size(mut self, max_leaf_size: usize) -> Self {
        self.max_leaf_size = max_leaf_size;
        self
    }

    pub fn split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    pub fn integrator_settings(mut self, settings: IntegratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build_bvh(self) -> Result<Scene<O>, BvhBuildError> {
        let start = Instant::now();
        let bvh = Bvh::build(self.objects, self.max_leaf_size, self.split_method)?;

        let mut total_emissive_area = 0.0;
        let lights = bvh
            .objects()
            .iter_enumerated()
            .filter(|(_, object)| object.has_emission() && object.area() > 0.0)
            .map(|(index, object)| {
                total_emissive_area += object.area();
                Light {
                    index,
                    cumulative_area: total_emissive_area,
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Scene with {} objects and {} lights ({} emissive area) ready in {:.2?}",
            bvh.len(),
            lights.len(),
            total_emissive_area,
            start.elapsed()
        );

        Ok(Scene {
            bvh,
            lights,
            total_emissive_area,
            settings: self.settings,
        })
    }
}

#[derive(Copy, Clone, Debug)]
struct Light {
    index: ObjectIdx,
    /// Sum of areas of this and all previous lights
    cumulative_area: FloatType,
}

/// Objects with their BVH, immutable and shareable between render threads.
#[derive(Clone, Debug)]
pub struct Scene<O = Primitive> {
    bvh: Bvh<O>,
    lights: Vec<Light>,
    total_emissive_area: FloatType,
    settings: IntegratorSettings,
}

impl<O: Object> Scene<O> {
    pub fn builder() -> SceneBuilder<O> {
        SceneBuilder::new()
    }

    pub fn bvh(&self) -> &Bvh<O> {
        &self.bvh
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    pub fn total_emissive_area(&self) -> FloatType {
        self.total_emissive_area
    }

    /// Nearest hit, using the BVH.
    pub fn intersect(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        self.bvh.intersect(ray)
    }

    /// Nearest hit by testing every object, without the BVH.
    pub fn intersect_linear(&self, ray: &Ray) -> Option<HitRecord<'_>> {
        self.bvh
            .objects()
            .iter()
            .filter_map(|object| object.intersect(ray))
            .min_by_key(|hit| OrderedFloat(hit.t))
    }

    /// Linear scan over all objects, returns the nearest hit object and its trace result.
    pub fn trace(&self, ray: &Ray) -> Option<(ObjectIdx, TraceHit)> {
        self.bvh
            .objects()
            .iter_enumerated()
            .filter_map(|(index, object)| object.trace(ray).map(|hit| (index, hit)))
            .min_by_key(|(_, hit)| OrderedFloat(hit.t))
    }

    /// Samples a point uniformly over the area of all emissive objects.
    /// The returned pdf is `1 / total emissive area`. None if there is nothing to sample.
    pub fn sample_light(&self, rng: &mut impl Rng) -> Option<SurfaceSample> {
        if self.lights.is_empty() {
            return None;
        }

        let draw = rng.random::<FloatType>() * self.total_emissive_area;
        let chosen = self
            .lights
            .partition_point(|light| light.cumulative_area <= draw)
            .min(self.lights.len() - 1);
        let object = &self.bvh.objects()[self.lights[chosen].index];

        Some(SurfaceSample {
            pdf: 1.0 / self.total_emissive_area,
            ..object.sample(rng)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::primitives::{Cuboid, Sphere, Triangle};
    use assert2::{assert, let_assert};
    use rand::{SeedableRng as _, rngs::SmallRng};

    fn light(radiance: FloatType) -> Material {
        Material::Emissive {
            radiance: Radiance::repeat(radiance),
        }
    }

    fn grey() -> Material {
        Material::Diffuse {
            albedo: Radiance::repeat(0.5),
        }
    }

    /// Two lights: a 1x1 square (area 1) and a 2x1.5 box (area 13), plus a dark sphere.
    fn two_light_scene() -> Scene {
        Scene::builder()
            .add(Sphere {
                center: WorldPoint::new(0.0, 0.0, 5.0),
                radius: 1.0,
                material: grey(),
            })
            .add(Triangle::new(
                WorldPoint::new(0.0, 0.0, 0.0),
                WorldPoint::new(1.0, 0.0, 0.0),
                WorldPoint::new(1.0, 1.0, 0.0),
                light(1.0),
            ))
            .add(Triangle::new(
                WorldPoint::new(0.0, 0.0, 0.0),
                WorldPoint::new(1.0, 1.0, 0.0),
                WorldPoint::new(0.0, 1.0, 0.0),
                light(1.0),
            ))
            .add(Cuboid {
                bounds: WorldBox::new(WorldPoint::new(10.0, 0.0, 0.0), WorldPoint::new(12.0, 1.5, 1.0)),
                material: light(2.0),
            })
            .build_bvh()
            .expect("scene is valid")
    }

    #[test]
    fn emissive_area_is_summed() {
        let scene = two_light_scene();
        assert!((scene.total_emissive_area() - 14.0).abs() < 1e-5);
    }

    #[test]
    fn light_samples_are_area_proportional() {
        let scene = two_light_scene();
        let mut rng = SmallRng::seed_from_u64(17);
        let sample_count = 50_000;

        let mut on_box = 0;
        for _ in 0..sample_count {
            let_assert!(Some(sample) = scene.sample_light(&mut rng));
            assert!((sample.pdf - 1.0 / 14.0).abs() < 1e-6);
            if sample.point.x >= 10.0 {
                on_box += 1;
                assert!(sample.emission == Radiance::repeat(2.0));
            } else {
                assert!(sample.point.z == 0.0);
            }
        }

        let fraction = on_box as f32 / sample_count as f32;
        assert!((fraction - 13.0 / 14.0).abs() < 0.01);
    }

    #[test]
    fn no_lights_no_samples() {
        let scene: Scene = Scene::builder()
            .add(Sphere {
                center: WorldPoint::origin(),
                radius: 1.0,
                material: grey(),
            })
            .build_bvh()
            .expect("scene is valid");
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(scene.sample_light(&mut rng).is_none());
    }

    #[test]
    fn bvh_linear_and_trace_agree() {
        let scene = two_light_scene();
        let mut rng = SmallRng::seed_from_u64(23);

        for _ in 0..500 {
            let origin = WorldPoint::new(
                rng.random_range(-3.0..15.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..8.0),
            );
            let direction = WorldVector::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            if direction.norm() < 1e-3 {
                continue;
            }
            let ray = Ray::new(origin, direction);

            let bvh = scene.intersect(&ray).map(|hit| hit.t);
            let linear = scene.intersect_linear(&ray).map(|hit| hit.t);
            let traced = scene.trace(&ray).map(|(_, hit)| hit.t);
            assert!(bvh == linear);
            assert!(linear == traced);
        }
    }

    #[test]
    fn empty_scene() {
        let scene: Scene = Scene::builder().build_bvh().expect("empty scene is valid");
        let ray = Ray::new(WorldPoint::origin(), WorldVector::x());
        assert!(scene.intersect(&ray).is_none());
        assert!(scene.trace(&ray).is_none());
        assert!(scene.total_emissive_area() == 0.0);
    }

    #[test]
    fn zero_leaf_size_propagates() {
        let_assert!(Err(BvhBuildError::ZeroLeafSize) = Scene::<Primitive>::builder().max_leaf_size(0).build_bvh());
    }
}
