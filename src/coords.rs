use crate::error::{RasterError, Result};
use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Pixel coordinates, `0 <= x < width` and `0 <= y < height`
pub type ScreenPosition = UVec2;

/// Normalized device coordinates, nominally in [-1, 1] after projection
pub type NdcPosition = Vec2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenDimension {
    pub width: u32,
    pub height: u32,
}

impl ScreenDimension {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let dim = Self { width, height };
        dim.validate()?;
        Ok(dim)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::InvalidDimension {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, pos: ScreenPosition) -> bool {
        pos.x < self.width && pos.y < self.height
    }
}

// Converts screen coordinates to NDC for one axis
#[inline]
pub fn axis_ndc_from_screen(pos: u32, length: u32) -> f32 {
    pos as f32 * 2.0 / length as f32 - 1.0
}

// Converts NDC to screen coordinates for one axis, truncating towards zero.
// Negative results saturate to 0.
#[inline]
pub fn axis_screen_from_ndc(pos: f32, length: u32) -> u32 {
    ((pos + 1.0) * length as f32 * 0.5) as u32
}

// Converts the middle of a pixel to NDC for one axis
#[inline]
pub fn axis_pixel_midpoint(pos: u32, length: u32) -> f32 {
    (pos as f32 + 0.5) * 2.0 / length as f32 - 1.0
}

pub fn ndc_from_screen(pos: ScreenPosition, dim: ScreenDimension) -> NdcPosition {
    Vec2::new(
        axis_ndc_from_screen(pos.x, dim.width),
        axis_ndc_from_screen(pos.y, dim.height),
    )
}

pub fn screen_from_ndc(ndc: NdcPosition, dim: ScreenDimension) -> ScreenPosition {
    UVec2::new(
        axis_screen_from_ndc(ndc.x, dim.width),
        axis_screen_from_ndc(ndc.y, dim.height),
    )
}

/// Samples the pixel center in NDC, so coverage is evaluated at centers rather than corners.
pub fn pixel_midpoint(pos: ScreenPosition, dim: ScreenDimension) -> NdcPosition {
    Vec2::new(
        axis_pixel_midpoint(pos.x, dim.width),
        axis_pixel_midpoint(pos.y, dim.height),
    )
}

/// Row-major index of a pixel. Every frame buffer plane is addressed through this.
#[inline]
pub fn index_from_screen(pos: ScreenPosition, dim: ScreenDimension) -> usize {
    pos.y as usize * dim.width as usize + pos.x as usize
}
