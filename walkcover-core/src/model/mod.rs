//! Data model for walks and the street network
//!
//! All types here are flat values. Trajectories and streets are inputs that
//! the engine only borrows; coverage results are produced as new values.

pub mod crs;
pub mod streets;
pub mod trajectory;

pub use crs::Crs;
pub use streets::{Street, StreetCoverage, StreetNetwork};
pub use trajectory::{Trajectory, parse_timestamp, parse_timestamps};
