//! Walk classification and street coverage engine.
//!
//! Takes GPS trajectories and a street network, filters out trajectories
//! (or trajectory segments) that look like transit rides, and measures how
//! much of every street lies within the buffered geometry of the remaining
//! walks.

pub mod algo;
pub mod analysis;
pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;

pub use error::Error;

/// Length in metres
pub type Meters = f64;
/// Duration in seconds
pub type Seconds = f64;

/// Number of points per segment used by segment-level classification
pub const DEFAULT_SEGMENT_SIZE: usize = 5;
