//! Tile-based binning software rasterizer.
//!
//! Rendering runs in three strictly sequenced stages:
//! 1. [`vertexshader`] projects points into NDC with normalized depth.
//! 2. [`binrasterizer`] distributes triangle indices into fixed-capacity
//!    per-tile queues, one slot range per producer.
//! 3. [`finerasterizer`] merges each tile's queues in ascending triangle order,
//!    tests every pixel center and depth-tests into the [`framebuffer`].
//!
//! Parallel work is partitioned so no two jobs ever write the same memory,
//! which keeps every stage free of locks and atomics.

pub mod binrasterizer;
pub mod coords;
pub mod error;
pub mod finerasterizer;
pub mod framebuffer;
pub mod math;
pub mod pipeline;
pub mod shader;
pub mod tilerasterizer;
pub mod vertexshader;

pub use binrasterizer::{
    BinQueueConfig, BinQueues, BinRasterizer, BinStats, MAX_WORK_GROUP_COUNT, allocate_bin_queues,
};
pub use coords::{NdcPosition, ScreenDimension, ScreenPosition};
pub use error::{RasterError, Result};
pub use finerasterizer::{FineRasterizer, FineStats};
pub use framebuffer::{FrameBuffer, RawColor};
pub use math::Triangle;
pub use pipeline::{FrameStats, Pipeline, RasterConfig};
pub use shader::{ConstantShader, Fragment, FragmentShader, TileContext};
pub use vertexshader::{ClipVolume, PointBuffer, VertexShadingStage};
