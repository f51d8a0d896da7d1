use crate::binrasterizer::{
    BinQueueConfig, BinQueues, BinRasterizer, MAX_WORK_GROUP_COUNT, allocate_bin_queues,
};
use crate::coords::ScreenDimension;
use crate::error::{RasterError, Result};
use crate::finerasterizer::FineRasterizer;
use crate::framebuffer::{FrameBuffer, RawColor};
use crate::shader::FragmentShader;
use crate::vertexshader::{ClipVolume, PointBuffer, VertexShadingStage};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub screen: ScreenDimension,
    pub bins: BinQueueConfig,
    pub producer_count: u32,
    pub background: RawColor,
    /// Depth the frame buffer is cleared to, must exceed every fragment depth
    pub far_depth: f32,
    pub stencil: bool,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            screen: ScreenDimension {
                width: 640,
                height: 480,
            },
            bins: BinQueueConfig {
                bin_width: 32,
                bin_height: 32,
                queue_size: 5,
            },
            producer_count: 1,
            background: RawColor::BLACK,
            far_depth: 1.1,
            stencil: false,
        }
    }
}

impl RasterConfig {
    pub fn validate(&self) -> Result<()> {
        self.screen.validate()?;
        self.bins.validate()?;
        if self.producer_count == 0 {
            return Err(RasterError::InvalidBinConfig(
                "producer count must be positive".to_string(),
            ));
        }
        if self.producer_count >= MAX_WORK_GROUP_COUNT {
            return Err(RasterError::ProducerCountExceeded {
                count: self.producer_count,
                max: MAX_WORK_GROUP_COUNT,
            });
        }
        Ok(())
    }

    pub fn new_frame_buffer(&self) -> Result<FrameBuffer> {
        FrameBuffer::new(self.screen, self.background, self.far_depth, self.stencil)
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FrameStats {
    pub triangles: usize,
    pub binned: usize,
    pub dropped: usize,
    pub fragments: usize,
    pub vertex_time: Duration,
    pub bin_time: Duration,
    pub fine_time: Duration,
}

impl FrameStats {
    pub fn total_time(&self) -> Duration {
        self.vertex_time + self.bin_time + self.fine_time
    }
}

// Runs vertex shading, binning and fine rasterization in strict sequence
pub struct Pipeline {
    config: RasterConfig,
    queues: BinQueues,
    fine: FineRasterizer,
}

impl Pipeline {
    pub fn new(config: RasterConfig) -> Result<Self> {
        config.validate()?;
        let queues = allocate_bin_queues(
            config.producer_count,
            config.screen,
            config.bins.bin_width,
            config.bins.bin_height,
            config.bins.queue_size,
        )?;
        let fine = FineRasterizer::new(config.screen, config.bins)?;
        tracing::info!(
            width = config.screen.width,
            height = config.screen.height,
            tiles = fine.tiles().len(),
            "pipeline ready"
        );
        Ok(Self {
            config,
            queues,
            fine,
        })
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn queues(&self) -> &BinQueues {
        &self.queues
    }

    /// Projects `points`, assembles every three consecutive points into a
    /// triangle, and rasterizes them into `frame`.
    pub fn render<S: FragmentShader>(
        &mut self,
        points: &PointBuffer,
        clip: &ClipVolume,
        shader: &S,
        frame: &mut FrameBuffer,
    ) -> Result<FrameStats> {
        let vertex_start = Instant::now();
        let projected = VertexShadingStage::shade(points, clip)?;
        let vertex_time = vertex_start.elapsed();

        let bin_start = Instant::now();
        let triangles = projected.triangles();
        let bin_stats = BinRasterizer::bin(&mut self.queues, &triangles)?;
        let bin_time = bin_start.elapsed();

        let fine_start = Instant::now();
        let fine_stats = self.fine.rasterize(&self.queues, &triangles, shader, frame)?;
        let fine_time = fine_start.elapsed();

        let stats = FrameStats {
            triangles: triangles.len(),
            binned: bin_stats.binned,
            dropped: bin_stats.dropped,
            fragments: fine_stats.fragments,
            vertex_time,
            bin_time,
            fine_time,
        };
        tracing::debug!(
            vertex_ms = vertex_time.as_secs_f64() * 1000.0,
            bin_ms = bin_time.as_secs_f64() * 1000.0,
            fine_ms = fine_time.as_secs_f64() * 1000.0,
            "frame rendered"
        );
        Ok(stats)
    }
}
