use crate::coords::NdcPosition;
use glam::{Vec2, Vec3};

// A projected triangle as the rasterizer sees it: x and y in NDC, z is normalized depth
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self {
            vertices: [p0, p1, p2],
        }
    }

    #[inline]
    pub fn ndc(&self, i: usize) -> NdcPosition {
        self.vertices[i].truncate()
    }

    pub fn area(&self) -> f32 {
        area(self.ndc(0), self.ndc(1), self.ndc(2))
    }

    // Bounding box in NDC as (min, max)
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let p0 = self.ndc(0);
        let p1 = self.ndc(1);
        let p2 = self.ndc(2);
        (p0.min(p1).min(p2), p0.max(p1).max(p2))
    }
}

// Signed area (times two) spanned by p0->p1 and p2->p0
#[inline]
pub fn area(p0: Vec2, p1: Vec2, p2: Vec2) -> f32 {
    let a = p1 - p0;
    let b = p0 - p2;
    a.perp_dot(b)
}

/// Barycentric coordinates of `position` relative to the triangle's xy projection.
///
/// All three weights are computed as signed area ratios, so they stay
/// consistent regardless of winding. Returns `None` for a zero-area triangle.
pub fn barycentric2d(triangle: &Triangle, position: NdcPosition) -> Option<[f32; 3]> {
    let p0 = triangle.ndc(0);
    let p1 = triangle.ndc(1);
    let p2 = triangle.ndc(2);

    let area_total = area(p0, p1, p2);
    if area_total == 0.0 || !area_total.is_finite() {
        return None;
    }
    let one_over_area = 1.0 / area_total;

    Some([
        area(position, p1, p2) * one_over_area,
        area(p0, position, p2) * one_over_area,
        area(p0, p1, position) * one_over_area,
    ])
}

// Edges count as inside, there is no tie-breaking rule between neighbours
#[inline]
pub fn is_point_in_triangle(barycentric: &[f32; 3]) -> bool {
    barycentric[0] >= 0.0 && barycentric[1] >= 0.0 && barycentric[2] >= 0.0
}

// Barycentric-weighted depth, written relative to vertex 0 so flat triangles interpolate exactly
#[inline]
pub fn depth_at_point(triangle: &Triangle, barycentric: &[f32; 3]) -> f32 {
    let z0 = triangle.vertices[0].z;
    let dz1 = triangle.vertices[1].z - z0;
    let dz2 = triangle.vertices[2].z - z0;
    z0 + barycentric[1] * dz1 + barycentric[2] * dz2
}
