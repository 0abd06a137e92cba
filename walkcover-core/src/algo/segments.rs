//! Splitting trajectories into short, overlapping segments
//!
//! A trajectory can mix walking with a bus or train ride. Classifying
//! short segments keeps the walking portions and drops only the transit
//! ones. Consecutive segments share one point so no time gap is lost
//! between them.

use chrono::{DateTime, Utc};
use geo::{Coord, LineString};

use crate::Error;
use crate::algo::metrics::{Metrics, calculate_metrics};
use crate::model::Crs;

/// A borrowed run of consecutive trajectory points
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    /// Index of the first point within the source trajectory
    pub start_index: usize,
    pub coords: &'a [Coord<f64>],
    /// Per-point timestamps, empty if the source had none
    pub timestamps: &'a [DateTime<Utc>],
}

impl Segment<'_> {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn metrics(&self, crs: Crs) -> Option<Metrics> {
        calculate_metrics(self.coords, self.timestamps, crs)
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::new(self.coords.to_vec())
    }
}

/// Lazy iterator over fixed-size segments of a trajectory
///
/// Every segment but the last has exactly `size` points; each segment
/// starts on the last point of the previous one. A trailing run shorter
/// than two points is dropped.
#[derive(Debug, Clone)]
pub struct SegmentSplitter<'a> {
    coords: &'a [Coord<f64>],
    timestamps: &'a [DateTime<Utc>],
    size: usize,
    next_start: usize,
}

impl<'a> SegmentSplitter<'a> {
    /// # Errors
    ///
    /// Returns an error if `size < 2`, or if `timestamps` is neither empty
    /// nor one per coordinate
    pub fn new(
        coords: &'a [Coord<f64>],
        timestamps: &'a [DateTime<Utc>],
        size: usize,
    ) -> Result<Self, Error> {
        if size < 2 {
            return Err(Error::InvalidConfig(format!(
                "segment size must be at least 2, got {size}"
            )));
        }
        if !timestamps.is_empty() && timestamps.len() != coords.len() {
            return Err(Error::InvalidData(format!(
                "{} timestamps for {} points",
                timestamps.len(),
                coords.len()
            )));
        }

        Ok(Self {
            coords,
            timestamps,
            size,
            next_start: 0,
        })
    }
}

impl<'a> Iterator for SegmentSplitter<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start;
        let len = self.coords.len();
        if start + 1 >= len {
            return None;
        }

        let end = (start + self.size).min(len);
        self.next_start = if end - start == self.size { end - 1 } else { len };

        let timestamps: &[DateTime<Utc>] = if self.timestamps.is_empty() {
            &[]
        } else {
            &self.timestamps[start..end]
        };

        Some(Segment {
            start_index: start,
            coords: &self.coords[start..end],
            timestamps,
        })
    }
}
