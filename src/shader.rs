use crate::coords::ScreenPosition;
use crate::framebuffer::RawColor;
use glam::UVec2;

// A candidate pixel produced and consumed inside one tile unit of work
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fragment {
    pub position: ScreenPosition,
    pub color: RawColor,
    pub depth: f32,
    pub stencil: Option<u32>,
}

pub struct TileContext {
    pub tile: UVec2,
    pub screen_min: ScreenPosition,
    pub screen_max: ScreenPosition,
    pub triangle_index: u32,
    pub barycentric: [f32; 3],
}

/// Computes the color of a fragment that passed the coverage test.
///
/// Shaders run concurrently on many tiles, hence `Sync`.
pub trait FragmentShader: Sync {
    fn shade(&self, fragment: &Fragment, tile: &TileContext) -> RawColor;
}

// Placeholder shading stage: every fragment gets the same color
pub struct ConstantShader {
    pub color: RawColor,
}

impl Default for ConstantShader {
    fn default() -> Self {
        Self {
            color: RawColor::RED,
        }
    }
}

impl FragmentShader for ConstantShader {
    fn shade(&self, _fragment: &Fragment, _tile: &TileContext) -> RawColor {
        self.color
    }
}

impl<F> FragmentShader for F
where
    F: Fn(&Fragment, &TileContext) -> RawColor + Sync,
{
    fn shade(&self, fragment: &Fragment, tile: &TileContext) -> RawColor {
        self(fragment, tile)
    }
}
