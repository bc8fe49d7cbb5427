// Copyright @yucwang 2021

use crate::core::integrator::Integrator;
use crate::core::rng::LcgRng;
use crate::core::scene::TraceableScene;
use crate::math::bitmap::Bitmap;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use indicatif::{ ProgressBar, ProgressStyle };
use std::fmt;
use std::panic::{ catch_unwind, AssertUnwindSafe };
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use std::sync::{ mpsc, Arc };
use std::thread;

const TILE_SIZE: usize = 32;

#[derive(Debug)]
pub struct RenderError {
    message: String,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// Fixed-pool tile renderer. The image is split into rectangular tiles
/// pulled from an atomic cursor; every pixel owns a deterministic sampler
/// stream derived from its coordinates, so results are reproducible and
/// independent of which worker processes which tile. A worker panic is
/// reported to the awaiting caller as a `RenderError` without tearing
/// down its siblings; the stop flag halts dequeuing while in-flight tiles
/// run to completion.
pub struct TileRenderer {
    integrator: Box<dyn Integrator>,
    seed: u64,
    stop: Arc<AtomicBool>,
}

type TileResult = Result<(usize, usize, usize, usize, Vec<Vector3f>), String>;

impl TileRenderer {
    pub fn new(integrator: Box<dyn Integrator>, seed: u64) -> Self {
        Self {
            integrator,
            seed,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clone of the coarse cancellation flag. Setting it stops tile
    /// dequeuing; it does not interrupt a tile in flight.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn pixel_seed(&self, x: usize, y: usize) -> u64 {
        ((self.seed & 0xFFF) << 32)
            | (((y as u64) & 0xFFFF) << 16)
            | ((x as u64) & 0xFFFF)
    }

    pub fn render(&self, scene: &mut TraceableScene) -> Result<Bitmap, RenderError> {
        let (width, height) = scene.camera().resolution();
        if width == 0 || height == 0 {
            return Ok(Bitmap::new(0, 0));
        }

        let spp = self.integrator.samples_per_pixel().max(1);
        let inv_spp = 1.0 / (spp as Float);
        let tiles_x = (width + TILE_SIZE - 1) / TILE_SIZE;
        let tiles_y = (height + TILE_SIZE - 1) / TILE_SIZE;
        let total_tiles = tiles_x * tiles_y;

        let progress = ProgressBar::new(total_tiles as u64);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let scene_ref: &TraceableScene = scene;
        let integrator_ref: &dyn Integrator = self.integrator.as_ref();
        let next_tile = Arc::new(AtomicUsize::new(0));
        let thread_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let (tx, rx) = mpsc::channel::<TileResult>();

        let mut output = vec![Vector3f::zeros(); width * height];
        let mut failure: Option<String> = None;

        thread::scope(|scope| {
            for _ in 0..thread_count {
                let next_tile = Arc::clone(&next_tile);
                let stop = Arc::clone(&self.stop);
                let tx = tx.clone();
                scope.spawn(move || {
                    loop {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        let tile_index = next_tile.fetch_add(1, Ordering::Relaxed);
                        if tile_index >= total_tiles {
                            break;
                        }

                        let tx0 = (tile_index % tiles_x) * TILE_SIZE;
                        let ty0 = (tile_index / tiles_x) * TILE_SIZE;
                        let tx1 = (tx0 + TILE_SIZE).min(width);
                        let ty1 = (ty0 + TILE_SIZE).min(height);

                        let traced = catch_unwind(AssertUnwindSafe(|| {
                            let mut tile = vec![Vector3f::zeros();
                                                (tx1 - tx0) * (ty1 - ty0)];
                            for y in ty0..ty1 {
                                for x in tx0..tx1 {
                                    let mut rng = LcgRng::new(self.pixel_seed(x, y));
                                    let pixel = Vector2f::new(x as Float, y as Float);
                                    let mut color = Vector3f::zeros();
                                    for _ in 0..spp {
                                        let rgb = integrator_ref
                                            .trace_sample(scene_ref, pixel, &mut rng);
                                        color += rgb.to_vector();
                                    }
                                    tile[(x - tx0) + (tx1 - tx0) * (y - ty0)] =
                                        color * inv_spp;
                                }
                            }
                            (tx0, ty0, tx1, ty1, tile)
                        }));

                        let message = match traced {
                            Ok(tile) => Ok(tile),
                            Err(panic) => {
                                let text = panic.downcast_ref::<&str>()
                                    .map(|s| s.to_string())
                                    .or_else(|| panic.downcast_ref::<String>().cloned())
                                    .unwrap_or_else(|| String::from("worker panicked"));
                                Err(text)
                            }
                        };
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                });
            }

            drop(tx);
            while let Ok(message) = rx.recv() {
                match message {
                    Ok((tx0, ty0, tx1, ty1, tile)) => {
                        for y in ty0..ty1 {
                            for x in tx0..tx1 {
                                output[x + width * y] =
                                    tile[(x - tx0) + (tx1 - tx0) * (y - ty0)];
                            }
                        }
                    }
                    Err(message) => {
                        if failure.is_none() {
                            failure = Some(message);
                        }
                    }
                }
                progress.inc(1);
            }
        });
        progress.finish_and_clear();

        if let Some(message) = failure {
            return Err(RenderError { message });
        }

        let bitmap = scene.camera_mut().bitmap_mut();
        for y in 0..height {
            for x in 0..width {
                bitmap[(x, y)] = output[x + width * y];
            }
        }
        Ok(bitmap.clone())
    }
}
