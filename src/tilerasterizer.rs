use crate::binrasterizer::{BinQueues, MAX_WORK_GROUP_COUNT};
use crate::coords::{ScreenDimension, ScreenPosition, index_from_screen, pixel_midpoint};
use crate::error::{RasterError, Result};
use crate::framebuffer::{FrameBuffer, RawColor};
use crate::math::*;
use crate::shader::{Fragment, FragmentShader, TileContext};
use glam::UVec2;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    pub triangles: usize,
    pub fragments: usize,
}

// Read position in one producer's queue for the current tile
#[derive(Copy, Clone)]
pub struct QueueCursor<'a> {
    entries: &'a [u32],
    position: usize,
    present: bool,
}

impl<'a> QueueCursor<'a> {
    // `queue` is the raw slot range, presence sentinel first
    pub fn new(queue: &'a [u32]) -> Self {
        Self {
            entries: &queue[1..],
            position: 0,
            present: queue[0] != 0,
        }
    }

    // A zero past the first entry marks the end, since index 0 can only come first
    pub fn is_ended(&self) -> bool {
        !self.present
            || self.position >= self.entries.len()
            || (self.position > 0 && self.entries[self.position] == 0)
    }

    pub fn head(&self) -> Option<u32> {
        if self.is_ended() {
            None
        } else {
            Some(self.entries[self.position])
        }
    }

    pub fn advance(&mut self) {
        self.position += 1;
    }
}

/// Picks the queue whose head triangle index is smallest.
/// Ties go to the lowest producer. Returns `None` once every queue has ended.
pub fn pick_queue(cursors: &[QueueCursor]) -> Option<usize> {
    let mut current: Option<(usize, u32)> = None;
    for (i, cursor) in cursors.iter().enumerate() {
        if let Some(head) = cursor.head() {
            match current {
                Some((_, best)) if head >= best => {}
                _ => current = Some((i, head)),
            }
        }
    }
    current.map(|(i, _)| i)
}

// The unit of work of the fine stage: one screen tile with a private copy of its
// frame buffer rectangle. Tiles never overlap, so they can run concurrently.
pub struct TileRasterizer {
    pub tile: UVec2,
    pub screen_min: ScreenPosition,
    pub screen_max: ScreenPosition,
    pub color: Vec<RawColor>,
    pub depth: Vec<f32>,
    pub stencil: Vec<u32>,
}

impl TileRasterizer {
    // `screen_max` is exclusive and must already be clamped to the screen
    pub fn new(tile: UVec2, screen_min: ScreenPosition, screen_max: ScreenPosition) -> Self {
        let size = screen_max - screen_min;
        let count = size.x as usize * size.y as usize;
        Self {
            tile,
            screen_min,
            screen_max,
            color: vec![RawColor::BLACK; count],
            depth: vec![f32::INFINITY; count],
            stencil: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        (self.screen_max.x - self.screen_min.x) as usize
    }

    #[inline]
    fn local_index(&self, pos: ScreenPosition) -> usize {
        let local = pos - self.screen_min;
        local.y as usize * self.width() + local.x as usize
    }

    // Rows of this tile's planes, for copying back into the frame buffer
    pub fn color_row(&self, y: u32) -> &[RawColor] {
        let start = (y - self.screen_min.y) as usize * self.width();
        &self.color[start..start + self.width()]
    }

    pub fn depth_row(&self, y: u32) -> &[f32] {
        let start = (y - self.screen_min.y) as usize * self.width();
        &self.depth[start..start + self.width()]
    }

    pub fn stencil_row(&self, y: u32) -> &[u32] {
        let start = (y - self.screen_min.y) as usize * self.width();
        &self.stencil[start..start + self.width()]
    }

    /// Copies this tile's rectangle out of the frame buffer.
    pub fn load(&mut self, frame: &FrameBuffer) {
        let count = self.color.len();
        match &frame.stencil {
            Some(_) => self.stencil.resize(count, 0),
            None => self.stencil.clear(),
        }

        for y in self.screen_min.y..self.screen_max.y {
            for x in self.screen_min.x..self.screen_max.x {
                let pos = UVec2::new(x, y);
                let src = index_from_screen(pos, frame.dim);
                let dst = self.local_index(pos);
                self.color[dst] = frame.color[src];
                self.depth[dst] = frame.depth[src];
                if let Some(stencil) = &frame.stencil {
                    self.stencil[dst] = stencil[src];
                }
            }
        }
    }

    /// Merges this tile's producer queues in ascending triangle order and
    /// rasterizes every candidate triangle against every pixel of the tile.
    pub fn rasterize_queues<S: FragmentShader>(
        &mut self,
        queues: &BinQueues,
        triangles: &[Triangle],
        shader: &S,
    ) -> Result<TileStats> {
        let producer_count = queues.producer_count();
        if producer_count >= MAX_WORK_GROUP_COUNT {
            return Err(RasterError::ProducerCountExceeded {
                count: producer_count,
                max: MAX_WORK_GROUP_COUNT,
            });
        }

        let mut cursors: Vec<QueueCursor> = (0..producer_count)
            .map(|producer| QueueCursor::new(queues.queue(producer, self.tile)))
            .collect();

        let dim = queues.dim();
        let mut stats = TileStats::default();
        while let Some(queue) = pick_queue(&cursors) {
            let cursor = &mut cursors[queue];
            let triangle_index = cursor.entries[cursor.position];
            cursor.advance();

            tracing::trace!(
                tile_x = self.tile.x,
                tile_y = self.tile.y,
                queue,
                triangle_index,
                "picked triangle"
            );

            // Out of range indices can only come from a foreign queue buffer
            let Some(triangle) = triangles.get(triangle_index as usize) else {
                continue;
            };
            stats.triangles += 1;
            stats.fragments += self.rasterize_triangle(triangle_index, triangle, dim, shader);
        }

        Ok(stats)
    }

    // Tests every pixel center of the tile against one triangle, returns the number of fragments written
    fn rasterize_triangle<S: FragmentShader>(
        &mut self,
        triangle_index: u32,
        triangle: &Triangle,
        dim: ScreenDimension,
        shader: &S,
    ) -> usize {
        if triangle.area() == 0.0 {
            return 0;
        }
        let has_stencil = !self.stencil.is_empty();
        let mut written = 0;

        for y in self.screen_min.y..self.screen_max.y {
            for x in self.screen_min.x..self.screen_max.x {
                let position = UVec2::new(x, y);
                let position_ndc = pixel_midpoint(position, dim);
                let Some(barycentric) = barycentric2d(triangle, position_ndc) else {
                    continue;
                };
                if !is_point_in_triangle(&barycentric) {
                    continue;
                }

                let mut fragment = Fragment {
                    position,
                    color: RawColor::BLACK,
                    depth: depth_at_point(triangle, &barycentric),
                    stencil: has_stencil.then_some(triangle_index),
                };

                // Depth test before shading, only the nearest fragment needs a color
                let index = self.local_index(position);
                let passed = fragment.depth < self.depth[index];
                if !passed {
                    continue;
                }

                let context = TileContext {
                    tile: self.tile,
                    screen_min: self.screen_min,
                    screen_max: self.screen_max,
                    triangle_index,
                    barycentric,
                };
                fragment.color = shader.shade(&fragment, &context);
                self.write_fragment(index, &fragment);
                written += 1;
            }
        }

        written
    }

    #[inline]
    fn write_fragment(&mut self, index: usize, fragment: &Fragment) {
        self.color[index] = fragment.color;
        self.depth[index] = fragment.depth;
        if let Some(stencil) = fragment.stencil {
            self.stencil[index] = stencil;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_is_ended() {
        let slots = [0, 0, 0, 0];
        let cursor = QueueCursor::new(&slots);
        assert!(cursor.is_ended());
        assert_eq!(cursor.head(), None);
    }

    #[test]
    fn index_zero_is_valid_only_first() {
        let slots = [1, 0, 4, 0];
        let mut cursor = QueueCursor::new(&slots);
        assert_eq!(cursor.head(), Some(0));
        cursor.advance();
        assert_eq!(cursor.head(), Some(4));
        cursor.advance();
        assert!(cursor.is_ended());
    }

    #[test]
    fn full_queue_ends_at_capacity() {
        let slots = [1, 2, 3];
        let mut cursor = QueueCursor::new(&slots);
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_ended());
    }

    #[test]
    fn merge_yields_ascending_order() {
        let a = [1, 0, 3, 8, 0];
        let b = [1, 2, 5, 0, 0];
        let c = [0, 0, 0, 0, 0];
        let d = [1, 1, 4, 9, 0];
        let mut cursors = vec![
            QueueCursor::new(&a),
            QueueCursor::new(&b),
            QueueCursor::new(&c),
            QueueCursor::new(&d),
        ];
        let mut order = Vec::new();
        while let Some(q) = pick_queue(&cursors) {
            order.push(cursors[q].head().unwrap());
            cursors[q].advance();
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 8, 9]);
    }

    #[test]
    fn ties_go_to_lowest_producer() {
        let a = [1, 7, 0];
        let b = [1, 7, 0];
        let cursors = vec![QueueCursor::new(&a), QueueCursor::new(&b)];
        assert_eq!(pick_queue(&cursors), Some(0));
    }

    #[test]
    fn no_queues_picks_nothing() {
        assert_eq!(pick_queue(&[]), None);
    }
}
