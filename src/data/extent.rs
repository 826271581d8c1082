//! Structured index ranges.
//!
//! An [`Extent`] is the `[imin, imax, jmin, jmax, kmin, kmax]` index box used for
//! whole extents, update extents and data extents. An extent with any `min > max`
//! is empty; `[0, -1, 0, -1, 0, -1]` is the canonical empty extent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive 3D index range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent(pub [i32; 6]);

impl Extent {
    pub const EMPTY: Extent = Extent([0, -1, 0, -1, 0, -1]);

    pub const fn new(imin: i32, imax: i32, jmin: i32, jmax: i32, kmin: i32, kmax: i32) -> Self {
        Self([imin, imax, jmin, jmax, kmin, kmax])
    }

    /// Extent of a `nx * ny * nz` point grid starting at the origin.
    pub fn from_dimensions(dims: [usize; 3]) -> Self {
        let hi = |n: usize| n as i32 - 1;
        Self([0, hi(dims[0]), 0, hi(dims[1]), 0, hi(dims[2])])
    }

    #[inline]
    pub fn min(&self, axis: usize) -> i32 {
        self.0[2 * axis]
    }

    #[inline]
    pub fn max(&self, axis: usize) -> i32 {
        self.0[2 * axis + 1]
    }

    /// True when any axis has `min > max`.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min(axis) > self.max(axis))
    }

    /// Number of points along each axis (0 for empty axes).
    pub fn dimensions(&self) -> [usize; 3] {
        let mut dims = [0usize; 3];
        for (axis, dim) in dims.iter_mut().enumerate() {
            let n = self.max(axis) - self.min(axis) + 1;
            *dim = n.max(0) as usize;
        }
        dims
    }

    pub fn number_of_points(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.dimensions().iter().product()
    }

    /// True when `other` lies inside `self` on every axis. An empty `other`
    /// is contained by anything.
    pub fn contains(&self, other: &Extent) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|axis| other.min(axis) >= self.min(axis) && other.max(axis) <= self.max(axis))
    }

    /// Clamp every bound into `whole`. The result never exceeds `whole`, though
    /// it may come out empty when the two boxes do not overlap.
    pub fn clamped_to(&self, whole: &Extent) -> Extent {
        let mut out = self.0;
        for axis in 0..3 {
            out[2 * axis] = self.min(axis).max(whole.min(axis));
            out[2 * axis + 1] = self.max(axis).min(whole.max(axis));
        }
        Extent(out)
    }

    /// Smallest extent holding both. Empty operands are ignored.
    pub fn union(&self, other: &Extent) -> Extent {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut out = self.0;
        for axis in 0..3 {
            out[2 * axis] = self.min(axis).min(other.min(axis));
            out[2 * axis + 1] = self.max(axis).max(other.max(axis));
        }
        Extent(out)
    }

    /// Grow by `levels` on every side, never past `whole`.
    pub fn grown(&self, levels: usize, whole: &Extent) -> Extent {
        let g = levels as i32;
        let mut out = self.0;
        for axis in 0..3 {
            out[2 * axis] = (self.min(axis) - g).max(whole.min(axis));
            out[2 * axis + 1] = (self.max(axis) + g).min(whole.max(axis));
        }
        Extent(out)
    }

    /// Linear point index of `(i, j, k)` within this extent, x fastest.
    pub fn point_index(&self, i: i32, j: i32, k: i32) -> Option<usize> {
        let point = Extent([i, i, j, j, k, k]);
        if self.is_empty() || !self.contains(&point) {
            return None;
        }
        let [nx, ny, _] = self.dimensions();
        let di = (i - self.min(0)) as usize;
        let dj = (j - self.min(1)) as usize;
        let dk = (k - self.min(2)) as usize;
        Some(di + nx * (dj + ny * dk))
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = &self.0;
        write!(
            f,
            "Extent[{} {} {} {} {} {}]",
            e[0], e[1], e[2], e[3], e[4], e[5]
        )
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
