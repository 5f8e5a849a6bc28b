use bon::Builder;
use log::warn;
use nalgebra::Unit;
use rand::Rng;

use crate::geometry::{EPSILON, FloatType, Radiance, Ray, WorldPoint, WorldVector};

use super::{HitRecord, Object, Scene, SurfaceSample};

/// How the direct lighting decides that a sampled light point is visible.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum VisibilityTest {
    /// Visible if the nearest hit of the shadow ray lies within `sqrt(epsilon_squared)`
    /// of the sampled point.
    PointMatch { epsilon_squared: FloatType },
    /// Visible if nothing is hit closer than `(1 - relative_epsilon)` times the
    /// distance to the sampled point.
    DistanceCompare { relative_epsilon: FloatType },
}

impl Default for VisibilityTest {
    fn default() -> Self {
        VisibilityTest::PointMatch {
            epsilon_squared: 1e-4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct IntegratorSettings {
    /// Probability of continuing a path at each bounce.
    #[builder(default = 0.8)]
    pub russian_roulette: FloatType,

    /// Hard limit on the number of bounces, regardless of russian roulette.
    #[builder(default = 16)]
    pub max_depth: u32,

    /// Bounce samples with lower pdf are dropped.
    #[builder(default = 1e-6)]
    pub pdf_epsilon: FloatType,

    #[builder(default)]
    pub visibility: VisibilityTest,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        IntegratorSettings::builder().build()
    }
}

impl<O: Object> Scene<O> {
    /// Estimates radiance arriving along the ray, backwards from its origin.
    /// `depth` is the number of bounces already taken, camera rays start at 0.
    /// The result is always finite and non-negative.
    pub fn cast_ray(&self, ray: &Ray, depth: u32, rng: &mut impl Rng) -> Radiance {
        let Some(hit) = self.intersect(ray) else {
            return Radiance::zeros();
        };

        if hit.material.has_emission() {
            // Emitters seen from behind are dark
            return if hit.normal.dot(&ray.direction) < 0.0 {
                hit.emission
            } else {
                Radiance::zeros()
            };
        }

        self.shade(&hit, &-ray.direction, depth, rng)
    }

    /// Light leaving a non-emissive hit towards `wo`.
    fn shade(&self, hit: &HitRecord, wo: &WorldVector, depth: u32, rng: &mut impl Rng) -> Radiance {
        // Two sided surfaces, normal faces the viewer
        let normal = if hit.normal.dot(wo) < 0.0 {
            -hit.normal
        } else {
            hit.normal
        };

        let direct = finite_or_zero(self.direct_lighting(hit, &normal, wo, rng), "direct");
        let indirect = finite_or_zero(
            self.indirect_lighting(hit, &normal, wo, depth, rng),
            "indirect",
        );

        direct + indirect
    }

    fn direct_lighting(
        &self,
        hit: &HitRecord,
        normal: &Unit<WorldVector>,
        wo: &WorldVector,
        rng: &mut impl Rng,
    ) -> Radiance {
        let Some(light) = self.sample_light(rng) else {
            return Radiance::zeros();
        };

        let to_light = light.point - hit.point;
        let distance_squared = to_light.norm_squared();
        if distance_squared < EPSILON {
            return Radiance::zeros();
        }
        let distance = distance_squared.sqrt();
        let wi = to_light / distance;

        let cos_theta = normal.dot(&wi);
        // Lights only emit on the side their normal points to
        let cos_theta_light = -light.normal.dot(&wi);
        if cos_theta <= 0.0 || cos_theta_light <= 0.0 {
            return Radiance::zeros();
        }

        if !self.is_visible(&hit.point, &wi, distance, &light) {
            return Radiance::zeros();
        }

        let brdf = hit.material.eval(&wi, wo, normal);
        light.emission.component_mul(&brdf)
            * (cos_theta * cos_theta_light / distance_squared / light.pdf)
    }

    fn is_visible(
        &self,
        from: &WorldPoint,
        wi: &WorldVector,
        distance: FloatType,
        light: &SurfaceSample,
    ) -> bool {
        let shadow_ray = Ray::new(*from, *wi);
        let occluder = self.intersect(&shadow_ray);

        match self.settings.visibility {
            VisibilityTest::PointMatch { epsilon_squared } => occluder
                .is_some_and(|hit| (hit.point - light.point).norm_squared() < epsilon_squared),
            VisibilityTest::DistanceCompare { relative_epsilon } => occluder
                .is_none_or(|hit| hit.t >= distance * (1.0 - relative_epsilon)),
        }
    }

    fn indirect_lighting(
        &self,
        hit: &HitRecord,
        normal: &Unit<WorldVector>,
        wo: &WorldVector,
        depth: u32,
        rng: &mut impl Rng,
    ) -> Radiance {
        let russian_roulette = self.settings.russian_roulette;
        if depth >= self.settings.max_depth || rng.random::<FloatType>() >= russian_roulette {
            return Radiance::zeros();
        }

        let lobes = hit.material.lobes();
        if lobes.is_empty() {
            return Radiance::zeros();
        }
        let lobe = lobes[rng.random_range(0..lobes.len())];

        let wi = hit.material.sample_lobe(lobe, wo, normal, rng);
        let cos_theta = normal.dot(&wi);
        if cos_theta <= 0.0 {
            return Radiance::zeros();
        }
        let pdf = hit.material.pdf_lobe(lobe, &wi, wo, normal);
        if pdf < self.settings.pdf_epsilon {
            return Radiance::zeros();
        }

        let bounce_ray = Ray::new(hit.point, wi);
        let Some(next_hit) = self.intersect(&bounce_ray) else {
            return Radiance::zeros();
        };
        if next_hit.material.has_emission() {
            // Already accounted for by direct lighting
            return Radiance::zeros();
        }

        let incoming = self.shade(&next_hit, &-bounce_ray.direction, depth + 1, rng);
        let brdf = hit.material.eval_lobe(lobe, &wi, wo, normal);
        let lobe_count = lobes.len() as FloatType;

        incoming.component_mul(&brdf) * (cos_theta * lobe_count / pdf / russian_roulette)
    }
}

fn finite_or_zero(value: Radiance, term: &str) -> Radiance {
    if value.iter().all(|x| x.is_finite()) {
        value
    } else {
        warn!("Dropping non-finite {term} lighting sample {value:?}");
        Radiance::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::WorldBox,
        scene::{
            material::Material,
            primitives::{Cuboid, Primitive, Sphere, Triangle},
        },
    };
    use assert2::{assert, check};
    use rand::{SeedableRng as _, rngs::SmallRng};
    use test_case::test_case;

    fn diffuse(albedo: FloatType) -> Material {
        Material::Diffuse {
            albedo: Radiance::repeat(albedo),
        }
    }

    fn emissive(radiance: FloatType) -> Material {
        Material::Emissive {
            radiance: Radiance::repeat(radiance),
        }
    }

    fn average(scene: &Scene, ray: &Ray, sample_count: usize, seed: u64) -> Radiance {
        let mut rng = SmallRng::seed_from_u64(seed);
        let sum: Radiance = (0..sample_count)
            .map(|_| {
                let value = scene.cast_ray(ray, 0, &mut rng);
                assert!(value.iter().all(|x| x.is_finite() && *x >= 0.0));
                value
            })
            .sum();
        sum / sample_count as FloatType
    }

    /// Diffuse floor below a spherical light, nothing else.
    fn floor_and_sphere_light(settings: IntegratorSettings) -> Scene {
        Scene::builder()
            .add(Cuboid {
                bounds: WorldBox::new(
                    WorldPoint::new(-50.0, -50.0, -1.0),
                    WorldPoint::new(50.0, 50.0, 0.0),
                ),
                material: diffuse(0.8),
            })
            .add(Sphere {
                center: WorldPoint::new(0.0, 0.0, 2.0),
                radius: 0.5,
                material: emissive(10.0),
            })
            .integrator_settings(settings)
            .build_bvh()
            .expect("scene is valid")
    }

    #[test]
    fn miss_is_black() {
        let scene = floor_and_sphere_light(IntegratorSettings::default());
        let mut rng = SmallRng::seed_from_u64(0);
        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 5.0), WorldVector::z());
        assert!(scene.cast_ray(&ray, 0, &mut rng) == Radiance::zeros());
    }

    #[test]
    fn light_seen_directly() {
        let scene = floor_and_sphere_light(IntegratorSettings::default());
        let mut rng = SmallRng::seed_from_u64(0);
        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 5.0), -WorldVector::z());
        assert!(scene.cast_ray(&ray, 0, &mut rng) == Radiance::repeat(10.0));
    }

    #[test]
    fn triangle_light_is_dark_from_behind() {
        let scene: Scene = Scene::builder()
            .add(Triangle::new(
                WorldPoint::new(-1.0, -1.0, 0.0),
                WorldPoint::new(1.0, -1.0, 0.0),
                WorldPoint::new(0.0, 1.0, 0.0),
                emissive(3.0),
            ))
            .build_bvh()
            .expect("scene is valid");
        let mut rng = SmallRng::seed_from_u64(0);

        // Counter clockwise seen from above, the normal points up
        let from_above = Ray::new(WorldPoint::new(0.0, 0.0, 2.0), -WorldVector::z());
        assert!(scene.cast_ray(&from_above, 0, &mut rng) == Radiance::repeat(3.0));

        let from_below = Ray::new(WorldPoint::new(0.0, 0.0, -2.0), WorldVector::z());
        assert!(scene.cast_ray(&from_below, 0, &mut rng) == Radiance::zeros());
    }

    /// Radiance reflected by a diffuse surface lit by a sphere light straight above it is
    /// albedo * L * (R / d)^2. All the indirect bounces either escape or hit the light.
    #[test_case(VisibilityTest::default() ; "point_match")]
    #[test_case(VisibilityTest::DistanceCompare { relative_epsilon: 1e-3 } ; "distance_compare")]
    fn direct_lighting_converges(visibility: VisibilityTest) {
        let settings = IntegratorSettings::builder().visibility(visibility).build();
        let scene = floor_and_sphere_light(settings);
        let ray = Ray::new(WorldPoint::new(-1.0, 0.0, 0.5), WorldVector::new(1.0, 0.0, -0.5));

        let expected = 0.8 * 10.0 * (0.5f32 / 2.0).powi(2);
        let value = average(&scene, &ray, 20_000, 42);
        for channel in value.iter() {
            check!((channel - expected).abs() < 0.05 * expected, "{channel} vs {expected}");
        }
    }

    #[test]
    fn occluded_light_gives_nothing() {
        let scene: Scene = Scene::builder()
            .add(Cuboid {
                bounds: WorldBox::new(
                    WorldPoint::new(-50.0, -50.0, -1.0),
                    WorldPoint::new(50.0, 50.0, 0.0),
                ),
                material: diffuse(0.8),
            })
            .add(Cuboid {
                bounds: WorldBox::new(
                    WorldPoint::new(-50.0, -50.0, 1.0),
                    WorldPoint::new(50.0, 50.0, 1.1),
                ),
                material: Material::Diffuse {
                    albedo: Radiance::zeros(),
                },
            })
            .add(Sphere {
                center: WorldPoint::new(0.0, 0.0, 2.0),
                radius: 0.5,
                material: emissive(10.0),
            })
            .build_bvh()
            .expect("scene is valid");
        let ray = Ray::new(WorldPoint::new(-1.0, 0.0, 0.5), WorldVector::new(1.0, 0.0, -0.5));
        assert!(average(&scene, &ray, 1000, 1) == Radiance::zeros());
    }

    #[test]
    fn zero_depth_limit_skips_bounces() {
        let settings = IntegratorSettings::builder().max_depth(0).build();
        let scene = floor_and_sphere_light(settings);
        let ray = Ray::new(WorldPoint::new(-1.0, 0.0, 0.5), WorldVector::new(1.0, 0.0, -0.5));
        let value = average(&scene, &ray, 2000, 3);
        assert!(value.x > 0.0);
    }

    /// Closed room lit by a small sphere, so that paths bounce a lot.
    fn room(russian_roulette: FloatType) -> Scene {
        let wall = diffuse(0.7);
        let slab = |min: [FloatType; 3], max: [FloatType; 3]| -> Primitive {
            Cuboid {
                bounds: WorldBox::new(min.into(), max.into()),
                material: wall,
            }
            .into()
        };
        let settings = IntegratorSettings::builder()
            .russian_roulette(russian_roulette)
            .max_depth(5)
            .build();

        Scene::builder()
            .add(slab([-10.0, -10.0, -1.0], [10.0, 10.0, 0.0]))
            .add(slab([-10.0, -10.0, 3.0], [10.0, 10.0, 4.0]))
            .add(Sphere {
                center: WorldPoint::new(0.0, 0.0, 1.5),
                radius: 0.4,
                material: emissive(5.0),
            })
            .integrator_settings(settings)
            .build_bvh()
            .expect("scene is valid")
    }

    /// Russian roulette only adds noise, the mean stays the same as with no termination.
    #[test]
    fn russian_roulette_is_unbiased() {
        let ray = Ray::new(WorldPoint::new(-3.0, 0.0, 2.0), WorldVector::new(3.0, 0.0, -2.0));
        let sample_count = 60_000;

        let reference = average(&room(1.0), &ray, sample_count, 100);
        let terminated = average(&room(0.5), &ray, sample_count, 200);

        assert!(reference.x > 0.0);
        check!(
            (terminated.x - reference.x).abs() < 0.05 * reference.x,
            "{} vs {}",
            terminated.x,
            reference.x
        );
    }

    /// Indirect light makes a difference in the room.
    #[test]
    fn bounces_add_light() {
        let ray = Ray::new(WorldPoint::new(-3.0, 0.0, 2.0), WorldVector::new(3.0, 0.0, -2.0));
        let mut direct_only = room(1.0);
        direct_only.settings.max_depth = 0;

        let with_bounces = average(&room(1.0), &ray, 40_000, 5);
        let direct = average(&direct_only, &ray, 40_000, 6);
        assert!(with_bounces.x > direct.x * 1.05);
    }

    #[test]
    fn default_settings() {
        let settings = IntegratorSettings::default();
        assert!(settings.russian_roulette == 0.8);
        assert!(settings.max_depth == 16);
        assert!(settings.visibility == VisibilityTest::PointMatch { epsilon_squared: 1e-4 });
    }
}
