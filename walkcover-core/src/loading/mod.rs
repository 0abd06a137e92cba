//! Configuration: region calibration profiles and analysis options.

mod config;
mod regions;

pub use config::{AnalysisOptions, ClassificationMode};
pub use regions::{RegionProfile, RegionRegistry};
