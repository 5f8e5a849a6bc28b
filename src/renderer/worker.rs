use image::{Rgb, Rgb32FImage};
use log::trace;
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    geometry::{FloatType, Radiance, ScreenBlock, ScreenPoint},
    renderer::{RayGenerator, RenderSettings},
    scene::{Object, Scene},
};

/// Golden ratio increment, spreads consecutive tile indices over the seed space.
const TILE_SEED_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct Worker<'a, O, G> {
    worker_id: usize,
    scene: &'a Scene<O>,
    camera: &'a G,
    settings: &'a RenderSettings,
}

impl<'a, O: Object, G: RayGenerator> Worker<'a, O, G> {
    pub fn new(
        worker_id: usize,
        scene: &'a Scene<O>,
        camera: &'a G,
        settings: &'a RenderSettings,
    ) -> Self {
        Self {
            worker_id,
            scene,
            camera,
            settings,
        }
    }

    /// Renders the tile into the top left corner of the buffer.
    /// The result only depends on the settings and the tile index, not on the worker.
    pub fn render_tile(&self, tile_index: usize, tile: &ScreenBlock, buffer: &mut Rgb32FImage) {
        trace!("worker{} rendering tile {tile_index} {tile:?}", self.worker_id);

        let mut rng = tile_rng(self.settings.seed, tile_index);
        let sample_count = self.settings.sample_count.get();

        for point in tile.internal_points() {
            let mut pixel_sum = Radiance::zeros();
            for _ in 0..sample_count {
                pixel_sum += self.render_sample(&point, &mut rng);
            }
            let pixel = pixel_sum / sample_count as FloatType;

            let buffer_position = point - tile.min;
            buffer.put_pixel(
                buffer_position.x,
                buffer_position.y,
                Rgb([pixel.x, pixel.y, pixel.z]),
            );
        }
    }

    fn render_sample(&self, point: &ScreenPoint, rng: &mut SmallRng) -> Radiance {
        let ray = self.camera.sample_ray(point, rng);
        self.scene.cast_ray(&ray, 0, rng)
    }
}

fn tile_rng(seed: u64, tile_index: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ (tile_index as u64).wrapping_mul(TILE_SEED_MULTIPLIER))
}
