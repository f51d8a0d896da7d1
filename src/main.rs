use binraster::{
    ClipVolume, ConstantShader, PointBuffer, Pipeline, RasterConfig, RasterError, Result,
};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[command(name = "binraster")]
#[command(about = "Headless tile-binning software rasterizer")]
struct Settings {
    /// JSON scene with points, near/far bounds and an optional config block
    #[arg(long)]
    scene: Option<PathBuf>,

    /// PNG file to write the color buffer to
    #[arg(long, short, default_value = "frame.png")]
    output: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    bin_width: Option<u32>,

    #[arg(long)]
    bin_height: Option<u32>,

    /// Triangles each producer may queue per tile, the rest are dropped
    #[arg(long)]
    queue_size: Option<u32>,

    /// Number of bin producers
    #[arg(long)]
    producers: Option<u32>,
}

#[derive(Deserialize)]
struct Scene {
    dimension: usize,
    near: Vec<f32>,
    far: Vec<f32>,
    points: Vec<f32>,
    #[serde(default)]
    config: Option<RasterConfig>,
}

impl Scene {
    // The single triangle of the classic 3d demo
    fn demo() -> Self {
        Self {
            dimension: 3,
            near: vec![-3.0, -3.0, 0.5],
            far: vec![3.0, 3.0, 10.0],
            points: vec![-5.0, -2.5, 3.0, 0.0, 5.0, 2.5, 5.0, -2.5, 2.0],
            config: None,
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let reader = io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn build_config(settings: &Settings, base: Option<RasterConfig>) -> RasterConfig {
    let mut config = base.unwrap_or_default();
    if let Some(width) = settings.width {
        config.screen.width = width;
    }
    if let Some(height) = settings.height {
        config.screen.height = height;
    }
    if let Some(bin_width) = settings.bin_width {
        config.bins.bin_width = bin_width;
    }
    if let Some(bin_height) = settings.bin_height {
        config.bins.bin_height = bin_height;
    }
    if let Some(queue_size) = settings.queue_size {
        config.bins.queue_size = queue_size;
    }
    if let Some(producers) = settings.producers {
        config.producer_count = producers;
    }
    config
}

fn run(settings: &Settings) -> Result<()> {
    let scene = match &settings.scene {
        Some(path) => {
            tracing::info!("Loading: {}", path.display());
            Scene::load(path)?
        }
        None => Scene::demo(),
    };

    let config = build_config(settings, scene.config);
    let points = PointBuffer::new(scene.dimension, scene.points)?;
    let clip = ClipVolume::new(scene.near, scene.far);
    tracing::info!(
        points = points.len(),
        triangles = points.triangle_count(),
        dimension = points.dimension(),
        "scene ready"
    );

    let mut pipeline = Pipeline::new(config)?;
    let mut frame = config.new_frame_buffer()?;
    let stats = pipeline.render(&points, &clip, &ConstantShader::default(), &mut frame)?;

    tracing::info!(
        "Vertex shading: {:.3} ms",
        stats.vertex_time.as_secs_f64() * 1000.0
    );
    tracing::info!("Binning:        {:.3} ms", stats.bin_time.as_secs_f64() * 1000.0);
    tracing::info!("Rasterization:  {:.3} ms", stats.fine_time.as_secs_f64() * 1000.0);
    tracing::info!(
        "Total:          {:.3} ms",
        stats.total_time().as_secs_f64() * 1000.0
    );
    if stats.dropped > 0 {
        tracing::warn!(
            "{} queue entries dropped, consider a larger --queue-size",
            stats.dropped
        );
    }

    frame.to_image().save(&settings.output)?;
    tracing::info!(
        "Wrote {} fragments to {}",
        stats.fragments,
        settings.output.display()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();
    if let Err(err) = run(&settings) {
        tracing::error!("{}", err);
        let code = match err {
            RasterError::Io(_) | RasterError::Image(_) | RasterError::Scene(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
