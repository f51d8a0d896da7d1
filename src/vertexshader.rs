use crate::error::{RasterError, Result};
use crate::math::Triangle;
use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// Lowest render dimension: x, y and depth
pub const MIN_RENDER_DIMENSION: usize = 3;

// Below this many points the per-point work is too small to split further
const POINTS_PER_BATCH: usize = 256;

/// Points stored back to back, `dimension` floats each.
/// Coordinate 2 is depth, coordinates from 3 up are extra perspective divisors.
#[derive(Clone, Debug, PartialEq)]
pub struct PointBuffer {
    dimension: usize,
    coords: Vec<f32>,
}

impl PointBuffer {
    pub fn new(dimension: usize, coords: Vec<f32>) -> Result<Self> {
        if dimension < MIN_RENDER_DIMENSION {
            return Err(RasterError::InvalidRenderDimension(dimension));
        }
        if coords.len() % dimension != 0 {
            return Err(RasterError::PointDimensionMismatch {
                expected: dimension,
                actual: coords.len() % dimension,
            });
        }
        Ok(Self { dimension, coords })
    }

    pub fn zeroed(dimension: usize, count: usize) -> Result<Self> {
        Self::new(dimension, vec![0.0; dimension * count])
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.coords.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    pub fn point(&self, index: usize) -> &[f32] {
        let start = index * self.dimension;
        &self.coords[start..start + self.dimension]
    }

    // Every three consecutive points form a triangle, trailing points are ignored
    pub fn triangle_count(&self) -> usize {
        self.len() / 3
    }

    /// The rasterizer's view of triangle `index`: x, y and depth of its three points.
    pub fn triangle(&self, index: usize) -> Triangle {
        let vertex = |i: usize| {
            let p = self.point(index * 3 + i);
            Vec3::new(p[0], p[1], p[2])
        };
        Triangle::new(vertex(0), vertex(1), vertex(2))
    }

    pub fn triangles(&self) -> Vec<Triangle> {
        (0..self.triangle_count()).map(|i| self.triangle(i)).collect()
    }
}

/// Per-axis near and far bounds of the view volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipVolume {
    pub near: Vec<f32>,
    pub far: Vec<f32>,
}

impl ClipVolume {
    pub fn new(near: Vec<f32>, far: Vec<f32>) -> Self {
        Self { near, far }
    }

    pub fn validate(&self, dimension: usize) -> Result<()> {
        for bounds in [&self.near, &self.far] {
            if bounds.len() != dimension {
                return Err(RasterError::PointDimensionMismatch {
                    expected: dimension,
                    actual: bounds.len(),
                });
            }
        }
        if let Some(axis) = (0..dimension).find(|&d| self.near[d] == self.far[d]) {
            return Err(RasterError::DegenerateClipRange { axis });
        }
        Ok(())
    }
}

// Maps a value expected in [near, far] to [0, 1]
#[inline]
fn normalize(value: f32, near: f32, far: f32) -> f32 {
    (value - near) / (far - near)
}

// Perspective divide of every coordinate below d by coordinate d
#[inline]
fn perspective_step(d: usize, result: &mut [f32]) {
    let divisor = result[d];
    for coord in &mut result[..d] {
        *coord /= divisor;
    }
}

// Perspective projection with normalization to [-1, 1] for one axis
#[inline]
fn perspective_bounded_axis(axis_value: f32, projection_value: f32, min: f32, max: f32) -> f32 {
    (2.0 * axis_value / projection_value - max - min) / (max - min)
}

/// Projects one point. `point` and `result` must both hold `clip.near.len()` floats.
///
/// Extra dimensions are consumed outermost first so each divisor is used
/// before it gets normalized. Normalization always reads the input value.
pub fn shade_vertex(point: &[f32], clip: &ClipVolume, result: &mut [f32]) {
    let dimension = point.len();
    result.copy_from_slice(point);

    for d in (MIN_RENDER_DIMENSION..dimension).rev() {
        perspective_step(d, result);
        result[d] = normalize(point[d], clip.near[d], clip.far[d]);
    }

    result[0] = perspective_bounded_axis(result[0], result[2], clip.near[0], clip.far[0]);
    result[1] = perspective_bounded_axis(result[1], result[2], clip.near[1], clip.far[1]);
    result[2] = normalize(point[2], clip.near[2], clip.far[2]);
}

pub struct VertexShadingStage;

impl VertexShadingStage {
    /// Projects every point in parallel, one unit of work per point.
    pub fn shade(points: &PointBuffer, clip: &ClipVolume) -> Result<PointBuffer> {
        let mut result = PointBuffer::zeroed(points.dimension(), points.len())?;
        Self::shade_into(points, clip, &mut result)?;
        Ok(result)
    }

    pub fn shade_into(points: &PointBuffer, clip: &ClipVolume, result: &mut PointBuffer) -> Result<()> {
        let dimension = points.dimension();
        clip.validate(dimension)?;
        if result.dimension() != dimension || result.len() != points.len() {
            return Err(RasterError::PointDimensionMismatch {
                expected: points.coords.len(),
                actual: result.coords.len(),
            });
        }

        result
            .coords
            .par_chunks_mut(dimension)
            .with_min_len(POINTS_PER_BATCH)
            .zip(points.coords.par_chunks(dimension))
            .for_each(|(out, point)| shade_vertex(point, clip, out));

        tracing::debug!(points = points.len(), dimension, "vertex shading done");
        Ok(())
    }
}
