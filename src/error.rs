//! Error types for the rasterizer pipeline

use thiserror::Error;

/// Result type for rasterizer operations
pub type Result<T> = std::result::Result<T, RasterError>;

/// Errors that can occur while configuring or dispatching a pipeline stage.
///
/// Bin queue overflow is not an error: it is a capacity limit reported through
/// [`crate::binrasterizer::BinStats`].
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("invalid screen dimension {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },

    #[error("invalid bin configuration: {0}")]
    InvalidBinConfig(String),

    #[error("producer count {count} exceeds the maximum of {max}")]
    ProducerCountExceeded { count: u32, max: u32 },

    #[error("render dimension {0} is below the minimum of 3")]
    InvalidRenderDimension(usize),

    #[error("point dimension mismatch: expected {expected}, got {actual}")]
    PointDimensionMismatch { expected: usize, actual: usize },

    #[error("near and far planes coincide on axis {axis}")]
    DegenerateClipRange { axis: usize },

    #[error("frame buffer is {actual_width}x{actual_height}, pipeline expects {width}x{height}")]
    FrameBufferMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("bin queue layout does not match the fine rasterizer configuration")]
    QueueLayoutMismatch,

    #[error("failed to allocate {slots} bin queue slots")]
    QueueAllocation { slots: u128 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("scene error: {0}")]
    Scene(#[from] serde_json::Error),
}
