use crate::coords::{ScreenDimension, ScreenPosition, index_from_screen};
use crate::error::{RasterError, Result};
use serde::{Deserialize, Serialize};

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RawColor {
    pub const BLACK: RawColor = RawColor::new(0, 0, 0);
    pub const RED: RawColor = RawColor::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Flat color/depth(/stencil) planes addressed with [`index_from_screen`].
///
/// The frame buffer performs no synchronization of its own. During fine
/// rasterization each tile owns a disjoint rectangle of every plane.
pub struct FrameBuffer {
    pub dim: ScreenDimension,
    pub color: Vec<RawColor>,
    pub depth: Vec<f32>,
    pub stencil: Option<Vec<u32>>,
}

impl FrameBuffer {
    /// Allocates all planes seeded with `background` and `far_depth`.
    /// `far_depth` must exceed every legal fragment depth.
    pub fn new(
        dim: ScreenDimension,
        background: RawColor,
        far_depth: f32,
        stencil: bool,
    ) -> Result<Self> {
        dim.validate()?;
        let count = dim.pixel_count();
        Ok(Self {
            dim,
            color: vec![background; count],
            depth: vec![far_depth; count],
            stencil: stencil.then(|| vec![0; count]),
        })
    }

    pub fn clear(&mut self, background: RawColor, far_depth: f32) {
        self.color.fill(background);
        self.depth.fill(far_depth);
        if let Some(stencil) = &mut self.stencil {
            stencil.fill(0);
        }
    }

    pub fn has_stencil(&self) -> bool {
        self.stencil.is_some()
    }

    pub fn color_at(&self, pos: ScreenPosition) -> RawColor {
        self.color[index_from_screen(pos, self.dim)]
    }

    pub fn depth_at(&self, pos: ScreenPosition) -> f32 {
        self.depth[index_from_screen(pos, self.dim)]
    }

    pub fn stencil_at(&self, pos: ScreenPosition) -> Option<u32> {
        self.stencil
            .as_ref()
            .map(|stencil| stencil[index_from_screen(pos, self.dim)])
    }

    pub(crate) fn check_dimension(&self, dim: ScreenDimension) -> Result<()> {
        if self.dim != dim {
            return Err(RasterError::FrameBufferMismatch {
                width: dim.width,
                height: dim.height,
                actual_width: self.dim.width,
                actual_height: self.dim.height,
            });
        }
        Ok(())
    }

    /// Copies the color plane into an RGB image. Row 0 of the frame buffer is
    /// NDC y = -1, so rows are flipped to put +y at the top of the image.
    pub fn to_image(&self) -> image::RgbImage {
        let width = self.dim.width;
        let height = self.dim.height;
        image::RgbImage::from_fn(width, height, |x, y| {
            let pos = ScreenPosition::new(x, height - 1 - y);
            let c = self.color_at(pos);
            image::Rgb([c.r, c.g, c.b])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec2;

    #[test]
    fn new_seeds_every_plane() {
        let dim = ScreenDimension { width: 4, height: 3 };
        let frame = FrameBuffer::new(dim, RawColor::new(1, 2, 3), 1.1, true).unwrap();
        assert_eq!(frame.color.len(), 12);
        assert!(frame.color.iter().all(|&c| c == RawColor::new(1, 2, 3)));
        assert!(frame.depth.iter().all(|&d| d == 1.1));
        assert_eq!(frame.stencil_at(UVec2::new(3, 2)), Some(0));
    }

    #[test]
    fn stencil_is_optional() {
        let dim = ScreenDimension { width: 4, height: 3 };
        let frame = FrameBuffer::new(dim, RawColor::BLACK, 1.1, false).unwrap();
        assert!(!frame.has_stencil());
        assert_eq!(frame.stencil_at(UVec2::ZERO), None);
    }

    #[test]
    fn rejects_empty_dimension() {
        let dim = ScreenDimension { width: 0, height: 3 };
        assert!(FrameBuffer::new(dim, RawColor::BLACK, 1.1, false).is_err());
    }

    #[test]
    fn image_export_flips_rows() {
        let dim = ScreenDimension { width: 2, height: 2 };
        let mut frame = FrameBuffer::new(dim, RawColor::BLACK, 1.1, false).unwrap();
        frame.color[index_from_screen(UVec2::new(1, 0), dim)] = RawColor::RED;
        let img = frame.to_image();
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
    }
}
