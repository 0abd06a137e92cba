//! Recorded GPS trajectories

use chrono::{DateTime, NaiveDateTime, Utc};
use geo::{BoundingRect, Coord, LineString, Rect};
use log::warn;

use crate::algo::metrics::{Metrics, calculate_metrics};
use crate::model::Crs;

/// Naive layouts accepted after RFC 3339, interpreted as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// A recorded path of GPS samples
///
/// `timestamps` holds either one entry per point or a single
/// `[start, end]` pair. It is empty when the source timestamps could not
/// be parsed, in which case no metrics can be computed for the trajectory.
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// Identifier of the source record (file name, activity id, ...)
    pub source_id: String,
    pub geometry: LineString<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub crs: Crs,
}

impl Trajectory {
    pub fn new(
        source_id: impl Into<String>,
        geometry: LineString<f64>,
        timestamps: Vec<DateTime<Utc>>,
        crs: Crs,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            geometry,
            timestamps,
            crs,
        }
    }

    /// Builds a trajectory from raw timestamp strings.
    ///
    /// If any timestamp fails to parse the trajectory is kept without
    /// timestamps, so it still shows up in batch counts but is classified
    /// as transit.
    pub fn from_raw_timestamps<S: AsRef<str>>(
        source_id: impl Into<String>,
        geometry: LineString<f64>,
        raw_timestamps: &[S],
        crs: Crs,
    ) -> Self {
        let source_id = source_id.into();
        let timestamps = parse_timestamps(raw_timestamps).unwrap_or_else(|| {
            warn!("Could not parse timestamps for trajectory {source_id}");
            Vec::new()
        });
        Self::new(source_id, geometry, timestamps, crs)
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.geometry.0
    }

    pub fn len(&self) -> usize {
        self.geometry.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// Whether there is one timestamp per point, which segment splitting needs
    pub fn has_point_timestamps(&self) -> bool {
        !self.timestamps.is_empty() && self.timestamps.len() == self.len()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Kinematic metrics over the whole trajectory
    pub fn metrics(&self) -> Option<Metrics> {
        calculate_metrics(self.coords(), &self.timestamps, self.crs)
    }
}

/// Parse a single timestamp: RFC 3339 first, then naive ISO-8601 as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Parse all timestamps, or `None` if any of them is malformed
pub fn parse_timestamps<S: AsRef<str>>(raw: &[S]) -> Option<Vec<DateTime<Utc>>> {
    raw.iter().map(|s| parse_timestamp(s.as_ref())).collect()
}
