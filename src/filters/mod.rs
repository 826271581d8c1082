//! Concrete algorithms.
//!
//! - [`ImageSource`]: structured source that fills any requested sub-extent.
//! - [`ExtractExtent`]: narrows what is requested from upstream.
//! - [`PointDensityFilter`]: points to image, slice-parallel.
//! - [`TemporalAccumulator`]: multi-pass collector over all input time steps.

pub mod extract_extent;
pub mod image_source;
pub mod point_density;
pub mod temporal_accumulator;

pub use extract_extent::ExtractExtent;
pub use image_source::{ImageSource, ScalarFunction};
pub use point_density::{DensityMode, PointDensityFilter};
pub use temporal_accumulator::{MultiPassState, TemporalAccumulator};
