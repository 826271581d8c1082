//! Timestamps, time-step lookup and piece-to-extent splitting.

use crate::data::Extent;
use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Global monotonically increasing modification clock.
pub struct TimeStamp;

impl TimeStamp {
    /// Next tick. Never returns 0, so 0 can mean "never".
    pub fn next() -> u64 {
        CLOCK.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Modification time of one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModifiedTime(u64);

impl ModifiedTime {
    pub fn new() -> Self {
        let mut t = Self(0);
        t.modified();
        t
    }

    pub fn modified(&mut self) {
        self.0 = TimeStamp::next();
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Resolve a requested time value into an index of `steps`.
///
/// Returns the first index whose step is not less than `requested`, the last
/// index when every step is smaller, and 0 when nothing was requested or
/// there are no steps.
pub fn resolve_time_index(steps: &[f64], requested: Option<f64>) -> usize {
    let Some(t) = requested else {
        return 0;
    };
    if steps.is_empty() {
        return 0;
    }
    steps
        .iter()
        .position(|&step| step >= t)
        .unwrap_or(steps.len() - 1)
}

/// Extent of `piece` out of `number_of_pieces` when `extent` is split into
/// blocks by repeatedly halving its longest axis, then grown by
/// `ghost_levels` and clamped to `extent`.
///
/// Pieces that cannot be given any cells come back empty.
pub fn piece_to_extent(
    piece: usize,
    number_of_pieces: usize,
    ghost_levels: usize,
    extent: &Extent,
) -> Extent {
    if extent.is_empty() || piece >= number_of_pieces.max(1) {
        return Extent::EMPTY;
    }
    match split_extent(piece, number_of_pieces.max(1), *extent) {
        Some(block) if ghost_levels > 0 => block.grown(ghost_levels, extent),
        Some(block) => block,
        None => Extent::EMPTY,
    }
}

fn split_extent(mut piece: usize, mut number_of_pieces: usize, mut ext: Extent) -> Option<Extent> {
    while number_of_pieces > 1 {
        // Longest axis by cell count; z wins ties, then y.
        let sizes = [0, 1, 2].map(|axis| ext.max(axis) - ext.min(axis));
        let axis = [0usize, 1, 2]
            .into_iter()
            .max_by_key(|&axis| sizes[axis])
            .filter(|&axis| sizes[axis] >= 1);
        let Some(axis) = axis else {
            // Single point left: only the first piece gets it.
            return (piece == 0).then_some(ext);
        };

        let first_half = number_of_pieces / 2;
        let mid = ext.min(axis) + (sizes[axis] as i64 * first_half as i64 / number_of_pieces as i64) as i32;
        if piece < first_half {
            ext.0[2 * axis + 1] = mid;
            number_of_pieces = first_half;
        } else {
            ext.0[2 * axis] = mid;
            piece -= first_half;
            number_of_pieces -= first_half;
        }
    }
    Some(ext)
}
