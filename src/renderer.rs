use crate::camera::{Camera, CameraConfig};
use crate::error::RenderError;
use crate::math::{Color, Ray};
use crate::scene::{Scene, SceneId, SHUTTER_CLOSE, SHUTTER_OPEN};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;
use threadpool::ThreadPool;

// ─── Render Configuration ───────────────────────────────────────────────────

/// Everything one render needs. Immutable for the duration of the render:
/// the orchestrator copies what the workers need before the first tile is
/// enqueued.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Square tile edge in pixels; the unit of work dispatch.
    pub tile_size: u32,
    pub samples_per_pixel: u32,
    /// Recursion bound for the path integrator.
    pub max_depth: u32,
    pub scene: SceneId,
    /// Radiance for rays that leave the world.
    pub background: Color,
    pub camera: CameraConfig,
    /// Root of all randomness: scene layout, BVH splits, and per-pixel
    /// sample streams. Equal seeds render byte-identical images.
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::for_scene(SceneId::RandomSpheres)
    }
}

impl RenderConfig {
    /// A configuration pre-filled with the scene's own camera and
    /// background defaults.
    pub fn for_scene(scene: SceneId) -> Self {
        Self {
            width: 480,
            height: 270,
            tile_size: 16,
            samples_per_pixel: 64,
            max_depth: 12,
            scene,
            background: scene.default_background(),
            camera: scene.default_camera(),
            seed: 0,
        }
    }

    /// Rejects configurations that cannot render before any worker runs.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::ZeroSamples);
        }
        if self.max_depth == 0 {
            return Err(RenderError::ZeroDepth);
        }
        if self.tile_size == 0 {
            return Err(RenderError::ZeroTileSize);
        }
        Ok(())
    }
}

// ─── Frame Buffer ───────────────────────────────────────────────────────────

/// The render target: row-major RGBA8 with row 0 at the bottom of the
/// image. Workers write tonemapped pixels directly, so the buffer is
/// display-ready the moment the last tile lands; consumers flip rows.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, bottom row first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA at (x, y) with y measured from the bottom.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    fn write_span(&mut self, x: u32, y: u32, rgba: &[u8]) {
        let start = ((y * self.width + x) * 4) as usize;
        self.pixels[start..start + rgba.len()].copy_from_slice(rgba);
    }

    /// A top-down copy of the pixel grid for display and image export.
    pub fn to_top_down_rgba(&self) -> Vec<u8> {
        let row = (self.width * 4) as usize;
        let mut out = Vec::with_capacity(self.pixels.len());
        for y in (0..self.height).rev() {
            let start = y as usize * row;
            out.extend_from_slice(&self.pixels[start..start + row]);
        }
        out
    }

    /// Exports the buffer as a binary PPM (P6) file, top row first.
    pub fn write_ppm(&self, path: &std::path::Path) -> io::Result<()> {
        let mut file = io::BufWriter::new(std::fs::File::create(path)?);
        write!(file, "P6\n{} {}\n255\n", self.width, self.height)?;
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let [r, g, b, _] = self.pixel(x, y);
                file.write_all(&[r, g, b])?;
            }
        }
        file.flush()
    }
}

// ─── Tonemap ────────────────────────────────────────────────────────────────

/// Averages the accumulated radiance, applies gamma-2 compression, and
/// quantizes to RGBA8. The 0.999 clamp keeps HDR emitters from wrapping
/// past white.
fn encode_pixel(sum: Color, samples_per_pixel: u32) -> [u8; 4] {
    let scale = 1.0 / samples_per_pixel as f64;
    let encode = |channel: f64| ((channel * scale).sqrt().clamp(0.0, 0.999) * 255.999) as u8;
    [encode(sum.x), encode(sum.y), encode(sum.z), 255]
}

// ─── Path Integrator ────────────────────────────────────────────────────────

/// Recursive Monte Carlo radiance estimator:
///
/// ```text
///   L(ray) = emitted + attenuation · L(scattered)
/// ```
///
/// A depleted depth budget contributes black, a miss contributes the
/// background, and a non-scattering surface terminates the path with its
/// emission. The 0.001 lower bound on `t` prevents shadow acne from
/// floating-point self-intersection.
pub fn ray_color<R: Rng>(
    scene: &Scene,
    ray: &Ray,
    background: Color,
    depth: u32,
    rng: &mut R,
) -> Color {
    if depth == 0 {
        return Color::zero();
    }

    let Some(hit) = scene.hit(ray, 0.001, f64::INFINITY) else {
        return background;
    };

    let material = scene.material(hit.material);
    let emitted = material.emitted(scene.textures(), hit.u, hit.v, hit.point);

    match material.scatter(scene.textures(), ray, &hit, rng) {
        Some(scatter) => {
            let incoming = ray_color(scene, &scatter.ray, background, depth - 1, rng);
            emitted + scatter.attenuation.hadamard(incoming)
        }
        None => emitted,
    }
}

// ─── Tiles ──────────────────────────────────────────────────────────────────

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)`, already clamped to the
/// render target.
#[derive(Debug, Clone, Copy)]
struct Tile {
    x0: u32,
    x1: u32,
    y0: u32,
    y1: u32,
}

/// Carves the target into `⌈W/tile⌉ × ⌈H/tile⌉` tiles. Edge tiles are
/// clamped here once, so workers never bounds-check per pixel.
fn tile_grid(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let x_tiles = width.div_ceil(tile_size);
    let y_tiles = height.div_ceil(tile_size);
    let mut tiles = Vec::with_capacity((x_tiles * y_tiles) as usize);
    for ty in 0..y_tiles {
        for tx in 0..x_tiles {
            let x0 = tx * tile_size;
            let y0 = ty * tile_size;
            tiles.push(Tile {
                x0,
                x1: (x0 + tile_size).min(width),
                y0,
                y1: (y0 + tile_size).min(height),
            });
        }
    }
    tiles
}

/// Mixes the render seed with a pixel coordinate into an independent
/// per-pixel RNG seed (splitmix64 finalizer). Pixel sample streams are
/// therefore identical no matter which tile or worker visits them.
fn pixel_seed(seed: u64, x: u32, y: u32) -> u64 {
    let mut z = seed ^ (((x as u64) << 32) | y as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-worker copy of the configuration fields a tile needs.
#[derive(Clone, Copy)]
struct TileParams {
    width: u32,
    height: u32,
    samples_per_pixel: u32,
    max_depth: u32,
    background: Color,
    seed: u64,
}

/// Renders one tile into a local pixel vector (row-major within the
/// tile). Pure with respect to shared state; the caller blits the result.
fn render_tile(scene: &Scene, camera: &Camera, tile: Tile, params: &TileParams) -> Vec<u8> {
    let mut out = Vec::with_capacity(((tile.x1 - tile.x0) * (tile.y1 - tile.y0) * 4) as usize);
    // Film coordinates divide by W-1 / H-1; a 1-pixel axis degenerates to 1.
    let film_w = (params.width.saturating_sub(1)).max(1) as f64;
    let film_h = (params.height.saturating_sub(1)).max(1) as f64;

    for y in tile.y0..tile.y1 {
        for x in tile.x0..tile.x1 {
            let mut rng = SmallRng::seed_from_u64(pixel_seed(params.seed, x, y));
            let mut sum = Color::zero();
            for _ in 0..params.samples_per_pixel {
                let u = (x as f64 + rng.gen::<f64>()) / film_w;
                let v = (y as f64 + rng.gen::<f64>()) / film_h;
                let ray = camera.get_ray(u, v, &mut rng);
                sum += ray_color(scene, &ray, params.background, params.max_depth, &mut rng);
            }
            out.extend_from_slice(&encode_pixel(sum, params.samples_per_pixel));
        }
    }
    out
}

// ─── Completion Signal ──────────────────────────────────────────────────────

/// Multi-subscriber completion notification. Subscribers run on the worker
/// that finishes the last tile and receive a snapshot of the finished
/// frame.
#[derive(Default)]
pub struct CompletionSignal {
    subscribers: Mutex<Vec<Box<dyn Fn(&FrameBuffer) + Send + Sync>>>,
}

impl CompletionSignal {
    fn subscribe(&self, f: Box<dyn Fn(&FrameBuffer) + Send + Sync>) {
        self.subscribers.lock().unwrap().push(f);
    }

    fn emit(&self, frame: &FrameBuffer) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            subscriber(frame);
        }
    }
}

// ─── Render Job ─────────────────────────────────────────────────────────────

/// Shared state of one in-flight render. Workers only ever touch their own
/// disjoint tile span of the buffer plus the counters below.
struct RenderJob {
    buffer: Mutex<FrameBuffer>,
    tiles_done: AtomicUsize,
    total_tiles: usize,
    panicked: AtomicUsize,
    completed: Mutex<bool>,
    cvar: Condvar,
    started: Instant,
    elapsed_secs: Mutex<Option<f64>>,
    width: u32,
    height: u32,
    samples_per_pixel: u32,
}

impl RenderJob {
    fn new(width: u32, height: u32, samples_per_pixel: u32, total_tiles: usize) -> Self {
        Self {
            buffer: Mutex::new(FrameBuffer::new(width, height)),
            tiles_done: AtomicUsize::new(0),
            total_tiles,
            panicked: AtomicUsize::new(0),
            completed: Mutex::new(false),
            cvar: Condvar::new(),
            started: Instant::now(),
            elapsed_secs: Mutex::new(None),
            width,
            height,
            samples_per_pixel,
        }
    }

    fn blit(&self, tile: Tile, pixels: &[u8]) {
        let row_bytes = ((tile.x1 - tile.x0) * 4) as usize;
        let mut buffer = self.buffer.lock().unwrap();
        for (row, y) in (tile.y0..tile.y1).enumerate() {
            let start = row * row_bytes;
            buffer.write_span(tile.x0, y, &pixels[start..start + row_bytes]);
        }
    }

    /// Counts the tile and, for the last one, records the elapsed time,
    /// notifies subscribers, and releases waiters.
    fn finish_tile(&self, signal: &CompletionSignal) {
        let done = self.tiles_done.fetch_add(1, Ordering::AcqRel) + 1;
        if done == self.total_tiles {
            *self.elapsed_secs.lock().unwrap() = Some(self.started.elapsed().as_secs_f64());
            let snapshot = self.buffer.lock().unwrap().clone();
            signal.emit(&snapshot);
            let mut completed = self.completed.lock().unwrap();
            *completed = true;
            self.cvar.notify_all();
        }
    }

    fn stats(&self) -> RenderStats {
        RenderStats {
            total_rays: self.width as u64 * self.height as u64 * self.samples_per_pixel as u64,
            elapsed_secs: self.elapsed_secs.lock().unwrap().unwrap_or_default(),
            width: self.width,
            height: self.height,
            samples_per_pixel: self.samples_per_pixel,
        }
    }
}

// ─── Render Statistics ──────────────────────────────────────────────────────

/// Aggregate figures for the diagnostic summary after a render.
pub struct RenderStats {
    pub total_rays: u64,
    pub elapsed_secs: f64,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
}

impl RenderStats {
    pub fn mrays_per_sec(&self) -> f64 {
        self.total_rays as f64 / self.elapsed_secs / 1e6
    }

    pub fn print_summary(&self) {
        let fill = "━".repeat(30);
        eprintln!("  {fill}");
        eprintln!("  Time:     {:.2}s", self.elapsed_secs);
        eprintln!("  Rays:     {:.2}M total", self.total_rays as f64 / 1e6);
        eprintln!("  Speed:    {:.2} Mrays/s", self.mrays_per_sec());
        eprintln!(
            "  Image:    {}×{} @ {} spp",
            self.width, self.height, self.samples_per_pixel
        );
        eprintln!("  {fill}");
    }
}

// ─── Raytracer Core ─────────────────────────────────────────────────────────

/// The tile-parallel render orchestrator. Owns a fixed worker pool sized
/// to the machine; each `render` call builds an immutable scene, carves
/// the target into tiles, and dispatches them. Rendering is asynchronous:
/// callers observe progress, snapshot the buffer mid-flight, subscribe to
/// the completion signal, or block on `wait`.
pub struct Raytracer {
    pool: ThreadPool,
    shut_down: AtomicBool,
    signal: Arc<CompletionSignal>,
    job: Mutex<Option<Arc<RenderJob>>>,
}

impl Raytracer {
    /// Pool sized to `max(1, hardware parallelism − 1)`, leaving one core
    /// for the dispatcher and the display shell.
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_workers(cores.saturating_sub(1).max(1))
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            pool: ThreadPool::new(workers.max(1)),
            shut_down: AtomicBool::new(false),
            signal: Arc::new(CompletionSignal::default()),
            job: Mutex::new(None),
        }
    }

    /// Subscribes to the completion signal. Every subscriber is invoked
    /// after the last tile of each subsequent render is written.
    pub fn on_render_complete(&self, f: impl Fn(&FrameBuffer) + Send + Sync + 'static) {
        self.signal.subscribe(Box::new(f));
    }

    /// Kicks off an asynchronous render. Returns as soon as every tile is
    /// enqueued; the frame arrives through `wait`, `frame_buffer`, or the
    /// completion signal.
    pub fn render(&self, config: &RenderConfig) -> Result<(), RenderError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RenderError::PoolShutDown);
        }
        config.validate()?;

        log::info!(
            "rendering {} at {}x{}, {} spp, depth {}",
            config.scene.name(),
            config.width,
            config.height,
            config.samples_per_pixel,
            config.max_depth
        );

        let scene = Arc::new(config.scene.build(config.seed));
        let camera = Arc::new(Camera::new(
            &config.camera,
            config.width as f64 / config.height as f64,
            SHUTTER_OPEN,
            SHUTTER_CLOSE,
        ));

        let tiles = tile_grid(config.width, config.height, config.tile_size);
        let job = Arc::new(RenderJob::new(
            config.width,
            config.height,
            config.samples_per_pixel,
            tiles.len(),
        ));
        *self.job.lock().unwrap() = Some(Arc::clone(&job));

        let params = TileParams {
            width: config.width,
            height: config.height,
            samples_per_pixel: config.samples_per_pixel,
            max_depth: config.max_depth,
            background: config.background,
            seed: config.seed,
        };

        for tile in tiles {
            let scene = Arc::clone(&scene);
            let camera = Arc::clone(&camera);
            let job = Arc::clone(&job);
            let signal = Arc::clone(&self.signal);
            self.pool.execute(move || {
                let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
                    render_tile(&scene, &camera, tile, &params)
                }));
                match rendered {
                    Ok(pixels) => job.blit(tile, &pixels),
                    Err(payload) => {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_owned())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_owned());
                        log::error!(
                            "render worker panicked on tile ({}, {}): {message}",
                            tile.x0,
                            tile.y0
                        );
                        job.panicked.fetch_add(1, Ordering::AcqRel);
                    }
                }
                job.finish_tile(&signal);
            });
        }

        Ok(())
    }

    /// Snapshot of the current frame buffer, possibly mid-render. Callers
    /// that need a consistent image subscribe to completion instead.
    pub fn frame_buffer(&self) -> Option<FrameBuffer> {
        self.job
            .lock()
            .unwrap()
            .as_ref()
            .map(|job| job.buffer.lock().unwrap().clone())
    }

    /// Tiles finished and tiles total for the current render.
    pub fn progress(&self) -> (usize, usize) {
        match self.job.lock().unwrap().as_ref() {
            Some(job) => (job.tiles_done.load(Ordering::Acquire), job.total_tiles),
            None => (0, 0),
        }
    }

    /// Blocks until the current render finishes. Worker panics are
    /// surfaced here rather than swallowed by the pool.
    pub fn wait(&self) -> Result<RenderStats, RenderError> {
        let job = self
            .job
            .lock()
            .unwrap()
            .clone()
            .ok_or(RenderError::NoActiveRender)?;

        let mut completed = job.completed.lock().unwrap();
        while !*completed {
            completed = job.cvar.wait(completed).unwrap();
        }
        drop(completed);

        let panicked = job.panicked.load(Ordering::Acquire);
        if panicked > 0 {
            return Err(RenderError::WorkerPanic { count: panicked });
        }
        Ok(job.stats())
    }

    /// Joins the worker pool. Renders requested afterwards fail with
    /// `PoolShutDown`.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.pool.join();
    }
}

impl Default for Raytracer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vec3};
    use crate::scene::SceneBuilder;

    #[test]
    fn encode_pixel_matches_the_gamma2_contract() {
        // √0.1, √0.2, √0.3 quantized with 255.999.
        let rgba = encode_pixel(Color::new(0.1, 0.2, 0.3), 1);
        assert_eq!(rgba, [80, 114, 140, 255]);
        // HDR values clamp to the brightest representable channel.
        let white = encode_pixel(Color::new(50.0, 50.0, 50.0), 1);
        assert_eq!(white, [255, 255, 255, 255]);
        // Averaging over samples: four samples of 0.4 equal one of 0.1.
        assert_eq!(encode_pixel(Color::new(0.4, 0.8, 1.2), 4), rgba);
    }

    #[test]
    fn tile_grid_covers_every_pixel_exactly_once() {
        for (w, h, tile) in [(64, 48, 16), (65, 47, 16), (5, 3, 8), (7, 7, 1)] {
            let tiles = tile_grid(w, h, tile);
            assert_eq!(
                tiles.len(),
                (w.div_ceil(tile) * h.div_ceil(tile)) as usize
            );
            let mut seen = vec![0u32; (w * h) as usize];
            for t in &tiles {
                assert!(t.x1 <= w && t.y1 <= h, "tile exceeds the target");
                for y in t.y0..t.y1 {
                    for x in t.x0..t.x1 {
                        seen[(y * w + x) as usize] += 1;
                    }
                }
            }
            assert!(seen.iter().all(|&count| count == 1));
        }
    }

    #[test]
    fn pixel_seed_is_stable_and_position_dependent() {
        assert_eq!(pixel_seed(42, 3, 5), pixel_seed(42, 3, 5));
        assert_ne!(pixel_seed(42, 3, 5), pixel_seed(42, 5, 3));
        assert_ne!(pixel_seed(42, 3, 5), pixel_seed(43, 3, 5));
    }

    #[test]
    fn validate_rejects_degenerate_configs() {
        let base = RenderConfig::for_scene(SceneId::TwoSpheres);
        assert!(base.validate().is_ok());

        let mut zero_width = base.clone();
        zero_width.width = 0;
        assert!(matches!(
            zero_width.validate(),
            Err(RenderError::InvalidDimensions { .. })
        ));

        let mut no_samples = base.clone();
        no_samples.samples_per_pixel = 0;
        assert!(matches!(no_samples.validate(), Err(RenderError::ZeroSamples)));

        let mut no_depth = base.clone();
        no_depth.max_depth = 0;
        assert!(matches!(no_depth.validate(), Err(RenderError::ZeroDepth)));

        let mut no_tiles = base;
        no_tiles.tile_size = 0;
        assert!(matches!(no_tiles.validate(), Err(RenderError::ZeroTileSize)));
    }

    #[test]
    fn miss_returns_the_configured_background() {
        let mut rng = SmallRng::seed_from_u64(0);
        let empty = SceneBuilder::new().build(SHUTTER_OPEN, SHUTTER_CLOSE, &mut rng);
        let background = Color::new(0.1, 0.2, 0.3);
        let ray = Ray::new(Point3::zero(), Vec3::new(0.3, 0.2, -1.0), 0.0);
        let radiance = ray_color(&empty, &ray, background, 8, &mut rng);
        assert_eq!(radiance, background);
        assert_eq!(encode_pixel(radiance, 1), [80, 114, 140, 255]);
    }

    #[test]
    fn depth_exhaustion_returns_black() {
        let mut rng = SmallRng::seed_from_u64(0);
        let empty = SceneBuilder::new().build(SHUTTER_OPEN, SHUTTER_CLOSE, &mut rng);
        let ray = Ray::new(Point3::zero(), Vec3::new(0.0, 0.0, -1.0), 0.0);
        let radiance = ray_color(&empty, &ray, Color::ones(), 0, &mut rng);
        assert_eq!(radiance, Color::zero());
    }

    #[test]
    fn frame_buffer_round_trips_pixels() {
        let mut fb = FrameBuffer::new(4, 3);
        fb.write_span(1, 2, &[10, 20, 30, 255]);
        assert_eq!(fb.pixel(1, 2), [10, 20, 30, 255]);
        assert_eq!(fb.pixel(0, 0), [0, 0, 0, 0]);

        // Top-down copy puts the highest row first.
        let flipped = fb.to_top_down_rgba();
        assert_eq!(&flipped[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn ppm_export_writes_the_header_and_flips_rows() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.write_span(0, 1, &[255, 0, 0, 255]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        fb.write_ppm(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n2 2\n255\n"));
        // First payload pixel is the top-left of the image, i.e. (0, 1).
        let payload = &bytes[b"P6\n2 2\n255\n".len()..];
        assert_eq!(&payload[0..3], &[255, 0, 0]);
    }
}
