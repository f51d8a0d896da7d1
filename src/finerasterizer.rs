use crate::binrasterizer::{BinQueueConfig, BinQueues, MAX_WORK_GROUP_COUNT};
use crate::coords::ScreenDimension;
use crate::error::{RasterError, Result};
use crate::framebuffer::FrameBuffer;
use crate::math::Triangle;
use crate::shader::FragmentShader;
use crate::tilerasterizer::{TileRasterizer, TileStats};
use glam::UVec2;
use rayon::prelude::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FineStats {
    pub tiles: usize,
    pub triangles: usize,
    pub fragments: usize,
}

// Screen rectangle of a tile, max exclusive and clamped to the screen
#[inline]
fn tile_bounds(tile: UVec2, bin_size: UVec2, screen_size: UVec2) -> (UVec2, UVec2) {
    let screen_min = tile * bin_size;
    let screen_max = screen_min.saturating_add(bin_size).min(screen_size);
    (screen_min, screen_max)
}

// Owns one tile rasterizer per screen tile and dispatches them in parallel
pub struct FineRasterizer {
    dim: ScreenDimension,
    config: BinQueueConfig,
    tiles_x: u32,
    tiles: Vec<TileRasterizer>,
}

impl FineRasterizer {
    pub fn new(dim: ScreenDimension, config: BinQueueConfig) -> Result<Self> {
        dim.validate()?;
        config.validate()?;
        let tile_count = config.tile_count(dim);
        let bin_size = UVec2::new(config.bin_width, config.bin_height);
        let screen_size = UVec2::new(dim.width, dim.height);

        let mut tiles = Vec::with_capacity(tile_count.x as usize * tile_count.y as usize);
        for y in 0..tile_count.y {
            for x in 0..tile_count.x {
                let tile = UVec2::new(x, y);
                let (screen_min, screen_max) = tile_bounds(tile, bin_size, screen_size);
                tiles.push(TileRasterizer::new(tile, screen_min, screen_max));
            }
        }

        Ok(Self {
            dim,
            config,
            tiles_x: tile_count.x,
            tiles,
        })
    }

    pub fn tiles(&self) -> &[TileRasterizer] {
        &self.tiles
    }

    /// Rasterizes every tile of `queues` into `frame`.
    ///
    /// Binning into `queues` must be complete before this is called. Each tile
    /// copies its rectangle out of the frame buffer, resolves its queues, and the
    /// results are copied back row by row. A tile that fails leaves its pixels
    /// untouched and does not stop the others; the first failure is returned.
    pub fn rasterize<S: FragmentShader>(
        &mut self,
        queues: &BinQueues,
        triangles: &[Triangle],
        shader: &S,
        frame: &mut FrameBuffer,
    ) -> Result<FineStats> {
        frame.check_dimension(self.dim)?;
        if queues.dim() != self.dim || queues.config() != self.config {
            return Err(RasterError::QueueLayoutMismatch);
        }
        let producer_count = queues.producer_count();
        if producer_count >= MAX_WORK_GROUP_COUNT {
            tracing::error!(
                producer_count,
                max = MAX_WORK_GROUP_COUNT,
                "too many producers for the fine rasterizer"
            );
            return Err(RasterError::ProducerCountExceeded {
                count: producer_count,
                max: MAX_WORK_GROUP_COUNT,
            });
        }

        // Load tiles from the frame buffer
        let source: &FrameBuffer = frame;
        self.tiles.par_iter_mut().for_each(|tile| tile.load(source));

        // Rasterize with one job per tile
        let results: Vec<Result<TileStats>> = self
            .tiles
            .par_iter_mut()
            .with_max_len(1)
            .map(|tile| tile.rasterize_queues(queues, triangles, shader))
            .collect();

        self.store(frame);

        let mut stats = FineStats::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(tile) => {
                    stats.tiles += 1;
                    stats.triangles += tile.triangles;
                    stats.fragments += tile.fragments;
                }
                Err(err) => {
                    tracing::error!(%err, "tile failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        tracing::debug!(
            tiles = stats.tiles,
            triangles = stats.triangles,
            fragments = stats.fragments,
            "fine rasterization done"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }

    // Tiles covering screen row y, left to right
    fn tile_row(&self, y: u32) -> &[TileRasterizer] {
        let tiles_x = self.tiles_x as usize;
        let start = (y / self.config.bin_height) as usize * tiles_x;
        &self.tiles[start..start + tiles_x]
    }

    // Copy all tile pixels back to the frame buffer, one job per screen row
    fn store(&self, frame: &mut FrameBuffer) {
        let width = self.dim.width as usize;

        frame
            .color
            .par_chunks_exact_mut(width)
            .zip(frame.depth.par_chunks_exact_mut(width))
            .enumerate()
            .for_each(|(y, (color_row, depth_row))| {
                let y = y as u32;
                for tile in self.tile_row(y) {
                    let span = tile.screen_min.x as usize..tile.screen_max.x as usize;
                    color_row[span.clone()].copy_from_slice(tile.color_row(y));
                    depth_row[span].copy_from_slice(tile.depth_row(y));
                }
            });

        if let Some(stencil) = &mut frame.stencil {
            stencil
                .par_chunks_exact_mut(width)
                .enumerate()
                .for_each(|(y, stencil_row)| {
                    let y = y as u32;
                    for tile in self.tile_row(y) {
                        let span = tile.screen_min.x as usize..tile.screen_max.x as usize;
                        stencil_row[span].copy_from_slice(tile.stencil_row(y));
                    }
                });
        }
    }
}
