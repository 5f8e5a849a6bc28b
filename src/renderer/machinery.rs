use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::anyhow;
use image::{GenericImage, GenericImageView, Rgb32FImage};
use log::info;

use crate::{
    geometry::ScreenBlock,
    renderer::{RayGenerator, RenderSettings, worker::Worker},
    scene::{Object, Scene},
};

/// Starts rendering the scene on one pinned thread per CPU core and returns immediately.
///
/// Tiles are handed out center first. The callbacks are called from the worker
/// threads before and after each tile.
pub fn render<
    O: Object + Send + Sync + 'static,
    G: RayGenerator + Send + Sync + 'static,
    F1: Fn(ScreenBlock) + Send + Sync + 'static,
    F2: Fn(ScreenBlock) + Send + Sync + 'static,
>(
    scene: Scene<O>,
    camera: G,
    settings: RenderSettings,
    started_tile_callback: F1,
    finished_tile_callback: F2,
) -> anyhow::Result<RenderProgress<O, G>> {
    let resolution = camera.resolution();
    let image = Rgb32FImage::new(resolution.x, resolution.y);
    let tile_ordering = ScreenBlock::from_size(resolution).tile_ordering(settings.tile_size);

    let cores = core_affinity::get_core_ids()
        .ok_or_else(|| anyhow!("Unable to list CPU cores"))?;

    info!(
        "Rendering {}x{} pixels, {} samples per pixel, {} tiles on {} threads",
        resolution.x,
        resolution.y,
        settings.sample_count,
        tile_ordering.len(),
        cores.len()
    );

    let state = Arc::new(RenderState {
        scene,
        camera,
        settings,

        image: Mutex::new(image),

        tile_ordering,
        next_tile_index: AtomicUsize::new(0),
        start: Instant::now(),
    });
    let started_tile_callback = Arc::new(started_tile_callback);
    let finished_tile_callback = Arc::new(finished_tile_callback);

    let threads = cores
        .into_iter()
        .enumerate()
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let started_tile_callback = Arc::clone(&started_tile_callback);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || -> anyhow::Result<()> {
                    core_affinity::set_for_current(core);

                    let worker =
                        Worker::new(worker_id, &state.scene, &state.camera, &state.settings);
                    let tile_size = state.settings.tile_size.get();
                    let mut buffer = Rgb32FImage::new(tile_size, tile_size);

                    while let Some((tile_index, tile)) = state.get_next_tile() {
                        (started_tile_callback)(*tile);

                        worker.render_tile(tile_index, tile, &mut buffer);
                        state.lock_image()?.copy_from(
                            buffer.view(0, 0, tile.width(), tile.height()).deref(),
                            tile.min.x,
                            tile.min.y,
                        )?;

                        (finished_tile_callback)(*tile);
                    }
                    Ok(())
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RenderProgress {
        render_state: state,
        threads,
    })
}

pub struct RenderProgress<O, G> {
    render_state: Arc<RenderState<O, G>>,
    threads: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl<O, G> RenderProgress<O, G> {
    /// Return number of processed and total tiles.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.render_state.tile_ordering.len();
        let processed = self
            .render_state
            .next_tile_index
            .load(Ordering::Acquire)
            .min(total);
        (processed, total)
    }

    pub fn progress_percent(&self) -> f32 {
        let (processed, total) = self.progress();
        if total == 0 {
            100.0
        } else {
            100.0 * (processed as f32) / (total as f32)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones will be started.
    pub fn abort(&self) {
        self.render_state
            .next_tile_index
            .store(self.render_state.tile_ordering.len(), Ordering::Release);
    }

    /// Blocks until all workers finish, returns the first error any of them hit.
    pub fn wait(&mut self) -> anyhow::Result<()> {
        let mut result = Ok(());
        for handle in self.threads.drain(..) {
            let worker_result = handle
                .join()
                .map_err(|_| anyhow!("Render worker panicked"))
                .and_then(|r| r);
            if result.is_ok() {
                result = worker_result;
            }
        }

        if result.is_ok() {
            info!("Render finished in {:.2?}", self.render_state.start.elapsed());
        }
        result
    }

    /// Accumulated radiance. Pixels of tiles that were not rendered yet are black.
    pub fn image(&self) -> &Mutex<Rgb32FImage> {
        &self.render_state.image
    }
}

struct RenderState<O, G> {
    scene: Scene<O>,
    camera: G,
    settings: RenderSettings,

    image: Mutex<Rgb32FImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
    start: Instant,
}

impl<O, G> RenderState<O, G> {
    fn get_next_tile(&self) -> Option<(usize, &ScreenBlock)> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id).map(|tile| (id, tile))
    }

    fn lock_image(&self) -> anyhow::Result<MutexGuard<'_, Rgb32FImage>> {
        self.image
            .lock()
            .map_err(|_| anyhow!("Image lock poisoned"))
    }
}
