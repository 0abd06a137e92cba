use serde::{Deserialize, Serialize};

use crate::algo::aggregate::COMMON_AREA_GRID;
use crate::algo::coverage::Accumulation;
use crate::{DEFAULT_SEGMENT_SIZE, Error, Meters, Seconds};

/// How trajectories are split before classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ClassificationMode {
    /// Keep or drop each trajectory as a whole
    WholeTrajectory,
    /// Classify fixed-size segments and keep only the walking ones
    Segmented { segment_size: usize },
}

impl Default for ClassificationMode {
    fn default() -> Self {
        ClassificationMode::Segmented {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

/// Options for a walk analysis run
///
/// `min_walk_duration` and `min_walk_distance` pre-filter trajectories
/// before any rule runs; they default to 60 s and 100 m. Set both to
/// `0.0` to classify purely by the region's rules, so only missing metrics
/// and the transit rules reject a trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub classification: ClassificationMode,
    pub accumulation: Accumulation,
    /// Trajectories shorter than this are ignored
    pub min_walk_duration: Seconds,
    /// Trajectories with a shorter path are ignored
    pub min_walk_distance: Meters,
    /// Ignore trajectories outside the region extent
    pub restrict_to_region: bool,
    /// Side of a common-area grid cell, in degrees
    pub common_area_grid: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            classification: ClassificationMode::default(),
            accumulation: Accumulation::default(),
            min_walk_duration: 60.0,
            min_walk_distance: 100.0,
            restrict_to_region: false,
            common_area_grid: COMMON_AREA_GRID,
        }
    }
}

impl AnalysisOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if let ClassificationMode::Segmented { segment_size } = self.classification
            && segment_size < 2
        {
            return Err(Error::InvalidConfig(format!(
                "segment_size must be at least 2, got {segment_size}"
            )));
        }

        if self.min_walk_duration < 0.0 || self.min_walk_distance < 0.0 {
            return Err(Error::InvalidConfig(
                "minimum walk duration and distance must not be negative".to_string(),
            ));
        }

        if !(self.common_area_grid.is_finite() && self.common_area_grid > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "common area grid must be a positive size, got {}",
                self.common_area_grid
            )));
        }

        Ok(())
    }
}
