//! Street network: input geometries and per-street coverage output

use geo::{BoundingRect, LineString, Rect};
use serde::Serialize;

use crate::Meters;
use crate::model::Crs;

/// A street segment
///
/// `covered` and `coverage_percent` are outputs of the coverage engine and
/// start as `false` / `0.0`.
#[derive(Debug, Clone)]
pub struct Street {
    pub street_id: String,
    pub name: Option<String>,
    pub geometry: LineString<f64>,
    pub covered: bool,
    pub coverage_percent: f64,
}

impl Street {
    pub fn new(street_id: impl Into<String>, name: Option<String>, geometry: LineString<f64>) -> Self {
        Self {
            street_id: street_id.into(),
            name,
            geometry,
            covered: false,
            coverage_percent: 0.0,
        }
    }

    /// Copy of this street carrying the given coverage result
    pub fn with_coverage(&self, coverage: &StreetCoverage) -> Self {
        Self {
            covered: coverage.covered,
            coverage_percent: coverage.coverage_percent,
            ..self.clone()
        }
    }
}

/// Streets sharing one reference frame
#[derive(Debug, Clone)]
pub struct StreetNetwork {
    pub streets: Vec<Street>,
    pub crs: Crs,
}

impl StreetNetwork {
    pub fn new(streets: Vec<Street>, crs: Crs) -> Self {
        Self { streets, crs }
    }

    pub fn len(&self) -> usize {
        self.streets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streets.is_empty()
    }

    /// Bounds of all street geometries in the network's own frame
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.streets
            .iter()
            .filter_map(|street| street.geometry.bounding_rect())
            .reduce(|acc, rect| {
                Rect::new(
                    geo::coord! { x: acc.min().x.min(rect.min().x), y: acc.min().y.min(rect.min().y) },
                    geo::coord! { x: acc.max().x.max(rect.max().x), y: acc.max().y.max(rect.max().y) },
                )
            })
    }
}

/// Coverage of a single street, measured in the metric frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreetCoverage {
    pub street_id: String,
    /// Street length
    pub length: Meters,
    /// Portion of the street inside walk buffers, capped at `length`
    pub covered_length: Meters,
    pub coverage_percent: f64,
    pub covered: bool,
}

impl StreetCoverage {
    /// Coverage record from raw measurements; applies the 100% cap and the
    /// zero-length guard.
    pub fn from_lengths(street_id: impl Into<String>, length: Meters, covered_length: Meters) -> Self {
        let street_id = street_id.into();
        if length <= 0.0 || !length.is_finite() {
            return Self {
                street_id,
                length: 0.0,
                covered_length: 0.0,
                coverage_percent: 0.0,
                covered: false,
            };
        }

        let coverage_percent = (covered_length / length * 100.0).clamp(0.0, 100.0);
        Self {
            street_id,
            length,
            covered_length: covered_length.clamp(0.0, length),
            coverage_percent,
            covered: coverage_percent > 0.0,
        }
    }
}
