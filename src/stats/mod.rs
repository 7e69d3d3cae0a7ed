//! Streaming statistics for latency and bandwidth samples.
//!
//! Samples are never stored. Each series keeps running moments plus a
//! fixed-size logarithmic histogram, which bounds memory no matter how long
//! sampling runs while keeping percentile estimates usable across many
//! orders of magnitude.

pub mod accumulator;
pub mod plot;
pub mod tracker;

pub use accumulator::{bin_index, bin_lower_bound, StatAccumulator, BIN_BASE, NUM_BINS};
pub use plot::{plot_points, trimmed_range, HistogramPoint, PlotWriter, MIN_PLOT_SAMPLES};
pub use tracker::{GlobalStatTracker, StatTracker};
