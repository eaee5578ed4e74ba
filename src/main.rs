//! Command-line shell around the render core: argument parsing, logging,
//! the progress readout, and the display/export collaborators. The core
//! itself only ever sees a `RenderConfig` and hands back a frame buffer.

use anyhow::Context;
use clap::Parser;
use prism_tracer::config::SceneInfo;
use prism_tracer::display::{self, DisplayMode};
use prism_tracer::renderer::{Raytracer, RenderConfig};
use prism_tracer::scene::SceneId;
use std::path::PathBuf;
use std::time::Duration;

/// prism-tracer — offline tile-parallel path tracing
#[derive(Parser, Debug)]
#[command(
    name = "prism-tracer",
    version,
    about = "An offline Monte Carlo path tracer with a terminal preview",
    after_help = "EXAMPLES:\n  \
                  prism-tracer --scene cornell-box --spp 200 --max-depth 20\n  \
                  prism-tracer --scene random-spheres -W 640 -H 360 -o frame.png\n  \
                  prism-tracer --scene simple-light --scene-config night.json --no-display"
)]
struct Cli {
    /// Scene to render
    #[arg(short, long, value_enum, default_value_t = SceneId::RandomSpheres)]
    scene: SceneId,

    /// Render target width in pixels
    #[arg(short = 'W', long, default_value_t = 480)]
    width: u32,

    /// Render target height in pixels
    #[arg(short = 'H', long, default_value_t = 270)]
    height: u32,

    /// Monte Carlo samples per pixel. 10–50 for previews, 200+ for quality.
    #[arg(long, default_value_t = 64)]
    spp: u32,

    /// Maximum ray bounce depth. Glass and deep interreflections need more.
    #[arg(long, default_value_t = 12)]
    max_depth: u32,

    /// Square tile edge in pixels; one tile is one unit of parallel work
    #[arg(long, default_value_t = 16)]
    tile_size: u32,

    /// Worker threads (0 = hardware parallelism minus one)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Seed for all randomness; equal seeds render identical images
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON scene configuration overriding camera and background
    #[arg(long)]
    scene_config: Option<PathBuf>,

    /// Write the finished frame to this file (.ppm or .png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Terminal preview mode
    #[arg(short, long, value_enum, default_value_t = DisplayMode::HalfBlock)]
    mode: DisplayMode,

    /// Skip the terminal preview
    #[arg(long)]
    no_display: bool,
}

fn print_header(config: &RenderConfig) {
    eprintln!();
    eprintln!("  ╔═══════════════════════════════════════════════╗");
    eprintln!("  ║  prism-tracer  Offline Path Tracer            ║");
    eprintln!("  ╚═══════════════════════════════════════════════╝");
    eprintln!();
    eprintln!("  Scene:    {}", config.scene.name());
    eprintln!("  Target:   {}×{}", config.width, config.height);
    eprintln!("  Samples:  {} spp", config.samples_per_pixel);
    eprintln!("  Depth:    {}", config.max_depth);
    eprintln!("  Tiles:    {}×{} px", config.tile_size, config.tile_size);
    eprintln!();
}

/// Progress readout over the orchestrator's tile counter, polled by the
/// main thread while the workers render.
struct ProgressBar {
    total: usize,
    last_pct: usize,
    start: std::time::Instant,
}

impl ProgressBar {
    fn new(total: usize) -> Self {
        Self {
            total,
            last_pct: usize::MAX,
            start: std::time::Instant::now(),
        }
    }

    fn update(&mut self, done: usize) {
        let pct = done * 100 / self.total.max(1);
        if pct != self.last_pct {
            let bar_width = 24;
            let filled = pct * bar_width / 100;
            let bar = format!("{}{}", "█".repeat(filled), "░".repeat(bar_width - filled));
            let eta = if done > 0 {
                let rate = done as f64 / self.start.elapsed().as_secs_f64();
                (self.total - done) as f64 / rate
            } else {
                0.0
            };
            eprint!("\r  Rendering: │{bar}│ {pct:3}%  ETA {eta:.0}s   ");
            self.last_pct = pct;
        }
    }

    fn finish(&self) {
        let bar = "█".repeat(24);
        eprintln!(
            "\r  Rendering: │{bar}│ 100%  {:.2}s       ",
            self.start.elapsed().as_secs_f64()
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = RenderConfig::for_scene(cli.scene);
    config.width = cli.width;
    config.height = cli.height;
    config.samples_per_pixel = cli.spp;
    config.max_depth = cli.max_depth;
    config.tile_size = cli.tile_size;
    config.seed = cli.seed;

    if let Some(path) = &cli.scene_config {
        let info = SceneInfo::load(path)
            .with_context(|| format!("loading scene configuration {}", path.display()))?;
        info.apply(&mut config);
    }

    print_header(&config);

    let raytracer = if cli.threads == 0 {
        Raytracer::new()
    } else {
        Raytracer::with_workers(cli.threads)
    };
    raytracer.on_render_complete(|frame| {
        log::info!(
            "render complete: {}x{} frame ready",
            frame.width(),
            frame.height()
        );
    });

    raytracer.render(&config).context("starting the render")?;

    let (_, total) = raytracer.progress();
    let mut bar = ProgressBar::new(total);
    loop {
        let (done, total) = raytracer.progress();
        bar.update(done);
        if done >= total {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let stats = raytracer.wait().context("waiting for the render")?;
    bar.finish();
    eprintln!();
    stats.print_summary();

    let frame = raytracer
        .frame_buffer()
        .context("no frame buffer after completion")?;

    if !cli.no_display {
        eprintln!();
        display::print_frame(&frame, cli.mode);
    }

    if let Some(path) = &cli.output {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ppm") => frame
                .write_ppm(path)
                .with_context(|| format!("writing {}", path.display()))?,
            _ => image::save_buffer(
                path,
                &frame.to_top_down_rgba(),
                frame.width(),
                frame.height(),
                image::ColorType::Rgba8,
            )
            .with_context(|| format!("writing {}", path.display()))?,
        }
        eprintln!("  Saved {}", path.display());
    }

    raytracer.shutdown();
    Ok(())
}
