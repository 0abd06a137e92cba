//! Kinematic metrics of a trajectory or trajectory segment

use chrono::{DateTime, Utc};
use geo::{Coord, Distance, Euclidean, Haversine, Point};
use itertools::Itertools;
use serde::Serialize;

use crate::model::Crs;
use crate::{Meters, Seconds};

/// Distance, speed and shape of a run of GPS samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Start-to-end distance
    pub direct_distance: Meters,
    /// Sum of consecutive point distances
    pub path_distance: Meters,
    pub duration: Seconds,
    /// Metres per second; 0 when the duration is not positive
    pub avg_speed: f64,
    /// `path_distance / direct_distance`, 1 when start and end coincide
    pub sinuosity: f64,
    /// Points per kilometre of path; infinite for a zero-length path
    pub point_density: f64,
    pub point_count: usize,
}

impl Metrics {
    /// Average speed in km/h
    pub fn avg_speed_kmh(&self) -> f64 {
        self.avg_speed * 3.6
    }
}

/// Distance between two coordinates in metres, in the given frame
pub(crate) fn metric_distance(a: Coord<f64>, b: Coord<f64>, crs: Crs) -> Meters {
    match crs {
        Crs::Wgs84 => Haversine.distance(Point::from(a), Point::from(b)),
        Crs::Utm { .. } => Euclidean.distance(Point::from(a), Point::from(b)),
    }
}

/// Whether a coordinate can be a position in `crs`
fn is_valid_position(coord: Coord<f64>, crs: Crs) -> bool {
    match crs {
        Crs::Wgs84 => coord.x.abs() <= 180.0 && coord.y.abs() <= 90.0,
        Crs::Utm { .. } => coord.x.is_finite() && coord.y.is_finite(),
    }
}

/// Computes metrics for a run of coordinates.
///
/// `timestamps` is either one entry per coordinate or a `[start, end]` pair.
/// Returns `None` when there are fewer than two coordinates, when a
/// coordinate is not a valid position (non-finite, or outside lon/lat
/// range for WGS84), when the timestamps do not line up with the
/// coordinates, or when they go backwards. Callers should treat a missing
/// result as transit.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_metrics(
    coords: &[Coord<f64>],
    timestamps: &[DateTime<Utc>],
    crs: Crs,
) -> Option<Metrics> {
    if coords.len() < 2 {
        return None;
    }
    if !coords.iter().all(|c| is_valid_position(*c, crs)) {
        return None;
    }
    if timestamps.len() != coords.len() && timestamps.len() != 2 {
        return None;
    }
    if !timestamps.is_sorted() {
        return None;
    }

    let (start, end) = (timestamps.first()?, timestamps.last()?);
    let duration = (*end - *start).num_milliseconds() as f64 / 1000.0;

    let direct_distance = metric_distance(coords[0], coords[coords.len() - 1], crs);
    let path_distance: Meters = coords
        .iter()
        .tuple_windows()
        .map(|(a, b)| metric_distance(*a, *b, crs))
        .sum();

    let avg_speed = if duration > 0.0 {
        path_distance / duration
    } else {
        0.0
    };

    let sinuosity = if direct_distance > 0.0 {
        path_distance / direct_distance
    } else {
        1.0
    };

    let point_density = if path_distance > 0.0 {
        coords.len() as f64 / (path_distance / 1000.0)
    } else {
        f64::INFINITY
    };

    Some(Metrics {
        direct_distance,
        path_distance,
        duration,
        avg_speed,
        sinuosity,
        point_density,
        point_count: coords.len(),
    })
}
