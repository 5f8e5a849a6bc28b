mod machinery;
mod worker;

use std::num::NonZeroU32;

use bon::Builder;
use rand::Rng;

use crate::geometry::{Ray, ScreenPoint, ScreenSize};

pub use crate::renderer::machinery::{RenderProgress, render};

/// Source of camera rays for image pixels.
pub trait RayGenerator {
    fn resolution(&self) -> ScreenSize;

    /// Samples a new ray for the given image pixel.
    fn sample_ray(&self, pixel: &ScreenPoint, rng: &mut impl Rng) -> Ray;
}

#[derive(Copy, Clone, Debug, Builder)]
pub struct RenderSettings {
    pub tile_size: NonZeroU32,
    /// Paths traced per pixel
    pub sample_count: NonZeroU32,
    /// Together with the tile index determines the random sequence used for each tile.
    #[builder(default)]
    pub seed: u64,
}
