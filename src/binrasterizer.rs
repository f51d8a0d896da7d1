use crate::coords::{ScreenDimension, screen_from_ndc};
use crate::error::{RasterError, Result};
use crate::math::Triangle;
use glam::UVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hard cap on the number of bin producers the fine stage can merge
pub const MAX_WORK_GROUP_COUNT: u32 = 16;

// Written to slot 0 of a queue once it holds at least one entry
pub const QUEUE_PRESENT: u32 = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinQueueConfig {
    pub bin_width: u32,
    pub bin_height: u32,
    /// Entries each producer may store per tile. Anything past this is dropped.
    pub queue_size: u32,
}

impl BinQueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bin_width == 0 || self.bin_height == 0 {
            return Err(RasterError::InvalidBinConfig(format!(
                "bin size {}x{} must be positive",
                self.bin_width, self.bin_height
            )));
        }
        Ok(())
    }

    // Number of tiles along each axis, partial tiles at the right and bottom included
    pub fn tile_count(&self, dim: ScreenDimension) -> UVec2 {
        UVec2::new(
            dim.width.div_ceil(self.bin_width),
            dim.height.div_ceil(self.bin_height),
        )
    }

    pub fn slots_per_queue(&self) -> usize {
        self.queue_size as usize + 1
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BinStats {
    pub binned: usize,
    pub dropped: usize,
}

/// Flat arena of fixed-capacity queues, one per (producer, tile) pair.
///
/// Each queue spans `queue_size + 1` slots. Slot 0 is [`QUEUE_PRESENT`] once
/// the queue has entries; slots 1.. hold triangle indices in insertion order
/// and read 0 past the last entry. Producers own contiguous, disjoint ranges.
pub struct BinQueues {
    dim: ScreenDimension,
    config: BinQueueConfig,
    producer_count: u32,
    tiles: UVec2,
    slots: Vec<u32>,
}

/// Sizes the queue storage for `producer_count` producers over the tile grid of `dim`.
pub fn allocate_bin_queues(
    producer_count: u32,
    dim: ScreenDimension,
    bin_width: u32,
    bin_height: u32,
    queue_size: u32,
) -> Result<BinQueues> {
    dim.validate()?;
    let config = BinQueueConfig {
        bin_width,
        bin_height,
        queue_size,
    };
    config.validate()?;
    if producer_count == 0 {
        return Err(RasterError::InvalidBinConfig(
            "producer count must be positive".to_string(),
        ));
    }

    let tiles = config.tile_count(dim);
    let requested = producer_count as u128
        * tiles.x as u128
        * tiles.y as u128
        * config.slots_per_queue() as u128;
    let slot_count =
        usize::try_from(requested).map_err(|_| RasterError::QueueAllocation { slots: requested })?;

    let mut slots = Vec::new();
    slots
        .try_reserve_exact(slot_count)
        .map_err(|_| RasterError::QueueAllocation { slots: requested })?;
    slots.resize(slot_count, 0);

    tracing::info!(
        producer_count,
        tiles_x = tiles.x,
        tiles_y = tiles.y,
        queue_size,
        slot_count,
        "allocated bin queues"
    );

    Ok(BinQueues {
        dim,
        config,
        producer_count,
        tiles,
        slots,
    })
}

impl BinQueues {
    pub fn dim(&self) -> ScreenDimension {
        self.dim
    }

    pub fn config(&self) -> BinQueueConfig {
        self.config
    }

    pub fn producer_count(&self) -> u32 {
        self.producer_count
    }

    pub fn tiles(&self) -> UVec2 {
        self.tiles
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    // Slots owned by one producer across all tiles
    pub fn elements_per_group(&self) -> usize {
        self.config.slots_per_queue() * self.tiles.x as usize * self.tiles.y as usize
    }

    fn tile_offset(&self, tile: UVec2) -> usize {
        (tile.y as usize * self.tiles.x as usize + tile.x as usize) * self.config.slots_per_queue()
    }

    /// The raw slots of one queue, sentinel first.
    pub fn queue(&self, producer: u32, tile: UVec2) -> &[u32] {
        let start = producer as usize * self.elements_per_group() + self.tile_offset(tile);
        &self.slots[start..start + self.config.slots_per_queue()]
    }

    /// The triangle indices stored in one queue, in insertion order.
    pub fn entries(&self, producer: u32, tile: UVec2) -> Vec<u32> {
        let queue = self.queue(producer, tile);
        if queue[0] == 0 {
            return Vec::new();
        }
        queue[1..]
            .iter()
            .enumerate()
            .take_while(|&(cursor, &value)| cursor == 0 || value != 0)
            .map(|(_, &value)| value)
            .collect()
    }

    pub fn clear(&mut self) {
        self.slots.fill(0);
    }
}

pub struct BinRasterizer;

impl BinRasterizer {
    /// Distributes triangle indices into the per-tile queues.
    ///
    /// Producer `p` takes the `p`-th contiguous chunk of triangles, so every
    /// queue is filled in ascending index order. Producers write only their own
    /// slot range and run in parallel without synchronization.
    pub fn bin(queues: &mut BinQueues, triangles: &[Triangle]) -> Result<BinStats> {
        if u32::try_from(triangles.len()).is_err() {
            return Err(RasterError::InvalidBinConfig(format!(
                "{} triangles cannot be indexed with 32 bits",
                triangles.len()
            )));
        }

        let dim = queues.dim;
        let config = queues.config;
        let tiles = queues.tiles;
        let producer_count = queues.producer_count as usize;
        let elements_per_group = queues.elements_per_group();
        let chunk_size = triangles.len().div_ceil(producer_count).max(1);

        let stats = queues
            .slots
            .par_chunks_mut(elements_per_group)
            .enumerate()
            .map(|(producer, slots)| {
                let start = (producer * chunk_size).min(triangles.len());
                let end = (start + chunk_size).min(triangles.len());
                bin_producer(slots, triangles, start..end, dim, config, tiles)
            })
            .reduce(BinStats::default, |a, b| BinStats {
                binned: a.binned + b.binned,
                dropped: a.dropped + b.dropped,
            });

        tracing::debug!(
            triangles = triangles.len(),
            binned = stats.binned,
            dropped = stats.dropped,
            "binning done"
        );
        if stats.dropped > 0 {
            tracing::warn!(
                dropped = stats.dropped,
                queue_size = config.queue_size,
                "bin queues overflowed, entries were dropped"
            );
        }
        Ok(stats)
    }
}

// Bins one producer's share of triangles into its own slot range
fn bin_producer(
    slots: &mut [u32],
    triangles: &[Triangle],
    range: std::ops::Range<usize>,
    dim: ScreenDimension,
    config: BinQueueConfig,
    tiles: UVec2,
) -> BinStats {
    slots.fill(0);
    let mut stats = BinStats::default();
    let slots_per_queue = config.slots_per_queue();
    let mut counts = vec![0u32; tiles.x as usize * tiles.y as usize];
    let screen_limit = UVec2::new(dim.width - 1, dim.height - 1);

    for index in range {
        let (min, max) = triangles[index].bounds();
        let screen_min = screen_from_ndc(min, dim).min(screen_limit);
        let screen_max = screen_from_ndc(max, dim).min(screen_limit);

        let min_bin_x = screen_min.x / config.bin_width;
        let min_bin_y = screen_min.y / config.bin_height;
        let max_bin_x = screen_max.x / config.bin_width;
        let max_bin_y = screen_max.y / config.bin_height;

        for y in min_bin_y..=max_bin_y {
            for x in min_bin_x..=max_bin_x {
                let bin_index = (y * tiles.x + x) as usize;
                let count = &mut counts[bin_index];
                if *count >= config.queue_size {
                    stats.dropped += 1;
                    continue;
                }
                let base = bin_index * slots_per_queue;
                slots[base] = QUEUE_PRESENT;
                slots[base + 1 + *count as usize] = index as u32;
                *count += 1;
                stats.binned += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn dim() -> ScreenDimension {
        ScreenDimension {
            width: 20,
            height: 10,
        }
    }

    // Triangle inside the pixel rectangle [x0, x1) x [y0, y1) of a 20x10 screen
    fn pixel_triangle(x0: f32, y0: f32, x1: f32, y1: f32, depth: f32) -> Triangle {
        let to_ndc_x = |x: f32| x * 2.0 / 20.0 - 1.0;
        let to_ndc_y = |y: f32| y * 2.0 / 10.0 - 1.0;
        Triangle::new(
            Vec3::new(to_ndc_x(x0), to_ndc_y(y0), depth),
            Vec3::new(to_ndc_x(x1), to_ndc_y(y0), depth),
            Vec3::new(to_ndc_x(x0), to_ndc_y(y1), depth),
        )
    }

    #[test]
    fn queue_storage_size() {
        let queues = allocate_bin_queues(4, dim(), 5, 5, 10).unwrap();
        assert_eq!(queues.tiles(), UVec2::new(4, 2));
        assert_eq!(queues.slots().len(), 4 * 4 * 2 * 11);
        assert!(queues.slots().iter().all(|&s| s == 0));
    }

    #[test]
    fn partial_tiles_are_counted() {
        let queues = allocate_bin_queues(1, ScreenDimension { width: 21, height: 9 }, 5, 5, 2).unwrap();
        assert_eq!(queues.tiles(), UVec2::new(5, 2));
    }

    #[test]
    fn allocation_rejects_bad_config() {
        assert!(allocate_bin_queues(1, dim(), 0, 5, 10).is_err());
        assert!(allocate_bin_queues(0, dim(), 5, 5, 10).is_err());
        assert!(allocate_bin_queues(1, ScreenDimension { width: 0, height: 1 }, 5, 5, 10).is_err());
    }

    #[test]
    fn allocation_failure_is_reported() {
        let huge = ScreenDimension {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert!(matches!(
            allocate_bin_queues(15, huge, 1, 1, u32::MAX),
            Err(RasterError::QueueAllocation { .. })
        ));
    }

    #[test]
    fn triangle_in_one_tile_lands_in_exactly_one_queue() {
        let mut queues = allocate_bin_queues(4, dim(), 5, 5, 10).unwrap();
        let mut triangles = vec![pixel_triangle(15.5, 0.5, 19.5, 4.5, 0.5); 8];
        triangles[5] = pixel_triangle(6.2, 5.5, 9.5, 9.5, 0.5);
        let stats = BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(stats.dropped, 0);

        let tile = UVec2::new(1, 1);
        let holders: Vec<u32> = (0..4)
            .filter(|&p| queues.entries(p, tile).contains(&5))
            .collect();
        assert_eq!(holders.len(), 1);

        for y in 0..2 {
            for x in 0..4 {
                let t = UVec2::new(x, y);
                if t == tile {
                    continue;
                }
                for p in 0..4 {
                    assert!(!queues.entries(p, t).contains(&5));
                }
            }
        }
    }

    #[test]
    fn triangle_spanning_tiles_reaches_each_of_them() {
        let mut queues = allocate_bin_queues(1, dim(), 5, 5, 10).unwrap();
        let triangles = vec![pixel_triangle(2.5, 2.5, 12.5, 7.5, 0.5)];
        let stats = BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(stats.binned, 6);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(queues.entries(0, UVec2::new(x, y)), vec![0]);
            }
            assert!(queues.entries(0, UVec2::new(3, y)).is_empty());
        }
    }

    #[test]
    fn sentinel_marks_used_queues_only() {
        let mut queues = allocate_bin_queues(2, dim(), 5, 5, 10).unwrap();
        let triangles = vec![pixel_triangle(0.5, 0.5, 4.5, 4.5, 0.5)];
        BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(queues.queue(0, UVec2::ZERO)[0], QUEUE_PRESENT);
        assert_eq!(queues.queue(1, UVec2::ZERO)[0], 0);
        assert_eq!(queues.queue(0, UVec2::new(1, 0))[0], 0);
    }

    #[test]
    fn queues_are_ascending_per_producer() {
        let mut queues = allocate_bin_queues(3, dim(), 5, 5, 10).unwrap();
        let triangles = vec![pixel_triangle(0.5, 0.5, 4.5, 4.5, 0.5); 9];
        BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(queues.entries(0, UVec2::ZERO), vec![0, 1, 2]);
        assert_eq!(queues.entries(1, UVec2::ZERO), vec![3, 4, 5]);
        assert_eq!(queues.entries(2, UVec2::ZERO), vec![6, 7, 8]);
    }

    #[test]
    fn overflow_drops_excess_entries() {
        let mut queues = allocate_bin_queues(1, dim(), 5, 5, 2).unwrap();
        let triangles = vec![pixel_triangle(0.5, 0.5, 4.5, 4.5, 0.5); 5];
        let stats = BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(stats.binned, 2);
        assert_eq!(stats.dropped, 3);
        assert_eq!(queues.entries(0, UVec2::ZERO), vec![0, 1]);
    }

    #[test]
    fn rebinning_clears_stale_entries() {
        let mut queues = allocate_bin_queues(1, dim(), 5, 5, 4).unwrap();
        let triangles = vec![pixel_triangle(0.5, 0.5, 4.5, 4.5, 0.5); 3];
        BinRasterizer::bin(&mut queues, &triangles).unwrap();
        BinRasterizer::bin(&mut queues, &triangles[..1]).unwrap();
        assert_eq!(queues.entries(0, UVec2::ZERO), vec![0]);
    }

    #[test]
    fn off_screen_bounds_are_clamped() {
        let mut queues = allocate_bin_queues(1, dim(), 5, 5, 4).unwrap();
        let triangles = vec![Triangle::new(
            Vec3::new(-3.0, -3.0, 0.5),
            Vec3::new(3.0, -3.0, 0.5),
            Vec3::new(0.0, 3.0, 0.5),
        )];
        let stats = BinRasterizer::bin(&mut queues, &triangles).unwrap();
        assert_eq!(stats.binned, 8);
    }
}
