use thiserror::Error;

/// Failure modes of the render core. Configuration problems are rejected
/// before any worker launches; asset and scene anomalies are downgraded to
/// log output and never reach this type.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Render target with a zero-sized dimension.
    #[error("invalid render target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// At least one Monte Carlo sample per pixel is required.
    #[error("samples per pixel must be at least 1")]
    ZeroSamples,

    /// The path recursion bound must allow at least the primary ray.
    #[error("maximum ray depth must be at least 1")]
    ZeroDepth,

    /// Tiles must cover at least one pixel.
    #[error("tile size must be at least 1")]
    ZeroTileSize,

    /// `render` was called after the worker pool was shut down.
    #[error("render pool has been shut down")]
    PoolShutDown,

    /// `wait` was called with no render in flight.
    #[error("no render has been started")]
    NoActiveRender,

    /// One or more tile workers panicked; the frame is incomplete.
    #[error("{count} render worker(s) panicked")]
    WorkerPanic { count: usize },

    /// The scene configuration file could not be read.
    #[error("failed to read scene configuration {path}")]
    SceneConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The scene configuration file is not valid JSON for the schema.
    #[error("failed to parse scene configuration {path}")]
    SceneConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
