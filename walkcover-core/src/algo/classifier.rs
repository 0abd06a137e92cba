//! Rule-based walking / transit classification
//!
//! Rules are evaluated in order and the first one that fires decides the
//! verdict. The same classifier serves whole trajectories and segments;
//! segments additionally get the point-density check, which catches long
//! straight runs that were interpolated across a GPS gap.

use serde::Serialize;

use crate::algo::metrics::Metrics;
use crate::loading::RegionProfile;
use crate::Meters;

/// Tolerance over the calibrated maximum walking speed
pub const SPEED_TOLERANCE: f64 = 1.2;
/// Sinuosity below this is a nearly straight line
pub const STRAIGHT_SINUOSITY: f64 = 1.05;
/// Straightness is only suspicious over trips longer than this
pub const STRAIGHT_MIN_DIRECT_DISTANCE: Meters = 2000.0;
/// Slow movement is only suspicious over trips longer than this
pub const SLOW_MIN_DIRECT_DISTANCE: Meters = 500.0;
/// Segment paths shorter than this skip the interpolation check
pub const INTERPOLATED_MIN_PATH_DISTANCE: Meters = 500.0;

/// What is being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Trajectory,
    Segment,
}

/// Why a trajectory or segment was considered transit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitReason {
    /// Metrics could not be computed
    NoMetrics,
    /// Start and end are further apart than any plausible walk
    TooFar,
    /// Faster than walking, even with tolerance
    TooFast,
    /// Long and almost perfectly straight
    TooStraight,
    /// Sustained implausibly slow motion over a non-trivial distance
    TooSlow,
    /// Straight, sparse segment typical of interpolation across a gap
    Interpolated,
}

impl TransitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitReason::NoMetrics => "no_metrics",
            TransitReason::TooFar => "too_far",
            TransitReason::TooFast => "too_fast",
            TransitReason::TooStraight => "too_straight",
            TransitReason::TooSlow => "too_slow",
            TransitReason::Interpolated => "interpolated",
        }
    }
}

/// Classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "reason")]
pub enum Verdict {
    Walking,
    Transit(TransitReason),
    /// Shorter than the configured minimum walk
    TooShort,
    /// Outside the region being analyzed
    OutsideRegion,
    /// Walking, but its geometry could not be moved into the street frame
    Unprojectable,
}

impl Verdict {
    pub fn is_walking(&self) -> bool {
        matches!(self, Verdict::Walking)
    }

    pub fn is_transit(&self) -> bool {
        matches!(self, Verdict::Transit(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Walking => "walking",
            Verdict::Transit(_) => "transit",
            Verdict::TooShort => "too_short",
            Verdict::OutsideRegion => "outside_region",
            Verdict::Unprojectable => "unprojectable",
        }
    }

    pub fn reason(&self) -> Option<TransitReason> {
        match self {
            Verdict::Transit(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Classifier bound to one region's thresholds
#[derive(Debug, Clone, Copy)]
pub struct TransitClassifier<'a> {
    profile: &'a RegionProfile,
}

impl<'a> TransitClassifier<'a> {
    pub fn new(profile: &'a RegionProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &RegionProfile {
        self.profile
    }

    /// Applies the rules in order. Missing metrics are classified as
    /// transit so that unreadable input is excluded from coverage.
    pub fn classify(&self, metrics: Option<&Metrics>, granularity: Granularity) -> Verdict {
        let Some(m) = metrics else {
            return Verdict::Transit(TransitReason::NoMetrics);
        };
        let profile = self.profile;

        if m.direct_distance > profile.max_direct_distance {
            return Verdict::Transit(TransitReason::TooFar);
        }

        if m.avg_speed > profile.max_walking_speed * SPEED_TOLERANCE {
            return Verdict::Transit(TransitReason::TooFast);
        }

        if m.direct_distance > STRAIGHT_MIN_DIRECT_DISTANCE && m.sinuosity < STRAIGHT_SINUOSITY {
            return Verdict::Transit(TransitReason::TooStraight);
        }

        if m.avg_speed < profile.min_walking_speed && m.direct_distance > SLOW_MIN_DIRECT_DISTANCE {
            return Verdict::Transit(TransitReason::TooSlow);
        }

        if granularity == Granularity::Segment
            && m.sinuosity < STRAIGHT_SINUOSITY
            && m.path_distance > INTERPOLATED_MIN_PATH_DISTANCE
            && m.point_density < profile.min_point_density
        {
            return Verdict::Transit(TransitReason::Interpolated);
        }

        Verdict::Walking
    }

    pub fn is_probable_transit(&self, metrics: Option<&Metrics>, granularity: Granularity) -> bool {
        self.classify(metrics, granularity).is_transit()
    }
}
