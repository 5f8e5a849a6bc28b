use std::f32::consts::{FRAC_1_PI, PI};

use arrayvec::ArrayVec;
use rand::Rng;
use rand_distr::{Distribution as _, UnitDisc};

use crate::geometry::{FloatType, LocalFrame, Radiance, WorldVector};
use nalgebra::Unit;

/// Roughness below this is treated as this, GGX degenerates to a delta otherwise.
const MIN_ALPHA: FloatType = 1e-3;

/// Surface description.
/// All directions passed to the methods point away from the surface:
/// `wi` towards the light (or next path vertex), `wo` towards the viewer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Material {
    /// Lambertian reflector
    Diffuse { albedo: Radiance },
    /// GGX microfacet reflector with Schlick fresnel, `specular` is the reflectance at normal incidence.
    Microfacet {
        specular: Radiance,
        roughness: FloatType,
    },
    DiffuseMicrofacet {
        albedo: Radiance,
        specular: Radiance,
        roughness: FloatType,
    },
    /// Light source, doesn't reflect anything.
    Emissive { radiance: Radiance },
}

/// One reflection component of a material.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lobe {
    Diffuse,
    Specular,
}

impl Material {
    pub fn has_emission(&self) -> bool {
        matches!(self, Material::Emissive { .. })
    }

    pub fn emission(&self) -> Radiance {
        match self {
            Material::Emissive { radiance } => *radiance,
            _ => Radiance::zeros(),
        }
    }

    pub fn lobes(&self) -> ArrayVec<Lobe, 2> {
        let mut lobes = ArrayVec::new();
        match self {
            Material::Diffuse { .. } => lobes.push(Lobe::Diffuse),
            Material::Microfacet { .. } => lobes.push(Lobe::Specular),
            Material::DiffuseMicrofacet { .. } => {
                lobes.push(Lobe::Diffuse);
                lobes.push(Lobe::Specular);
            }
            Material::Emissive { .. } => {}
        }
        lobes
    }

    /// BRDF value summed over all lobes.
    pub fn eval(&self, wi: &WorldVector, wo: &WorldVector, normal: &Unit<WorldVector>) -> Radiance {
        self.lobes()
            .iter()
            .map(|lobe| self.eval_lobe(*lobe, wi, wo, normal))
            .sum()
    }

    /// BRDF value of a single lobe. Zero if either direction is below the surface
    /// or the material doesn't have the lobe.
    pub fn eval_lobe(
        &self,
        lobe: Lobe,
        wi: &WorldVector,
        wo: &WorldVector,
        normal: &Unit<WorldVector>,
    ) -> Radiance {
        let cos_i = normal.dot(wi);
        let cos_o = normal.dot(wo);
        if cos_i <= 0.0 || cos_o <= 0.0 {
            return Radiance::zeros();
        }

        match (lobe, self.diffuse_albedo(), self.specular_parameters()) {
            (Lobe::Diffuse, Some(albedo), _) => albedo * FRAC_1_PI,
            (Lobe::Specular, _, Some((specular, alpha))) => {
                let Some(h) = half_vector(wi, wo) else {
                    return Radiance::zeros();
                };
                let d = ggx_d(normal.dot(&h), alpha);
                let g = smith_g1(cos_i, alpha) * smith_g1(cos_o, alpha);
                let f = schlick_fresnel(&specular, wo.dot(&h));
                f * (d * g / (4.0 * cos_i * cos_o))
            }
            _ => Radiance::zeros(),
        }
    }

    /// Importance samples an incoming direction for the lobe.
    /// The result may be below the surface, callers check the cosine.
    pub fn sample_lobe(
        &self,
        lobe: Lobe,
        wo: &WorldVector,
        normal: &Unit<WorldVector>,
        rng: &mut impl Rng,
    ) -> WorldVector {
        let frame = LocalFrame::new(normal);
        match (lobe, self.specular_parameters()) {
            (Lobe::Specular, Some((_, alpha))) => {
                // Trowbridge-Reitz half vector, tan^2 theta = alpha^2 u / (1 - u)
                let u: FloatType = rng.random();
                let phi = 2.0 * PI * rng.random::<FloatType>();
                let tan2_theta = alpha * alpha * u / (1.0 - u).max(FloatType::EPSILON);
                let cos_theta = 1.0 / (1.0 + tan2_theta).sqrt();
                let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
                let h = frame.to_world(&WorldVector::new(
                    sin_theta * phi.cos(),
                    sin_theta * phi.sin(),
                    cos_theta,
                ));
                reflect(wo, &h)
            }
            _ => {
                // Malley's method: project a uniform disc sample up to the hemisphere
                let [x, y]: [FloatType; 2] = UnitDisc.sample(rng);
                let z = (1.0 - x * x - y * y).max(0.0).sqrt();
                frame.to_world(&WorldVector::new(x, y, z))
            }
        }
    }

    /// Solid angle density of `sample_lobe` producing `wi`.
    pub fn pdf_lobe(
        &self,
        lobe: Lobe,
        wi: &WorldVector,
        wo: &WorldVector,
        normal: &Unit<WorldVector>,
    ) -> FloatType {
        let cos_i = normal.dot(wi);
        if cos_i <= 0.0 {
            return 0.0;
        }

        match (lobe, self.specular_parameters()) {
            (Lobe::Specular, Some((_, alpha))) => {
                let Some(h) = half_vector(wi, wo) else {
                    return 0.0;
                };
                let cos_h = normal.dot(&h);
                let wo_dot_h = wo.dot(&h).abs();
                if wo_dot_h <= 0.0 {
                    return 0.0;
                }
                ggx_d(cos_h, alpha) * cos_h / (4.0 * wo_dot_h)
            }
            _ => cos_i * FRAC_1_PI,
        }
    }

    fn diffuse_albedo(&self) -> Option<Radiance> {
        match self {
            Material::Diffuse { albedo } | Material::DiffuseMicrofacet { albedo, .. } => {
                Some(*albedo)
            }
            _ => None,
        }
    }

    /// Specular color and GGX alpha
    fn specular_parameters(&self) -> Option<(Radiance, FloatType)> {
        match self {
            Material::Microfacet {
                specular,
                roughness,
            }
            | Material::DiffuseMicrofacet {
                specular,
                roughness,
                ..
            } => Some((*specular, (roughness * roughness).max(MIN_ALPHA))),
            _ => None,
        }
    }
}

fn half_vector(wi: &WorldVector, wo: &WorldVector) -> Option<WorldVector> {
    Unit::try_new(wi + wo, 1e-6).map(Unit::into_inner)
}

fn reflect(w: &WorldVector, n: &WorldVector) -> WorldVector {
    n * (2.0 * w.dot(n)) - w
}

fn ggx_d(cos_h: FloatType, alpha: FloatType) -> FloatType {
    if cos_h <= 0.0 {
        return 0.0;
    }
    let a2 = alpha * alpha;
    let denominator = cos_h * cos_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denominator * denominator)
}

fn smith_g1(cos: FloatType, alpha: FloatType) -> FloatType {
    let a2 = alpha * alpha;
    2.0 * cos / (cos + (a2 + (1.0 - a2) * cos * cos).sqrt())
}

fn schlick_fresnel(f0: &Radiance, cos: FloatType) -> Radiance {
    let m = (1.0 - cos.clamp(0.0, 1.0)).powi(5);
    f0 + (Radiance::repeat(1.0) - f0) * m
}
