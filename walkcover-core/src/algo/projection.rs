//! Reprojection of walks and streets into one metric frame
//!
//! Buffers and intersection lengths are only meaningful in metres, so all
//! geometries are moved into a single UTM zone before any of that work.

use geo::{Coord, LineString, MapCoords};
use log::debug;
use proj4rs::{proj::Proj, transform::transform};

use crate::model::{Crs, StreetNetwork};
use crate::Error;

fn build_proj(crs: Crs) -> Result<Proj, Error> {
    let definition = crs.proj4();
    Proj::from_proj_string(&definition)
        .map_err(|e| Error::Projection(format!("failed to build projection {crs}: {e}")))
}

fn transform_coord(from: &Proj, from_crs: Crs, to: &Proj, to_crs: Crs, coord: Coord<f64>) -> Result<Coord<f64>, Error> {
    // proj4rs works in radians for geographic frames
    let mut point = if from_crs.is_geographic() {
        (coord.x.to_radians(), coord.y.to_radians(), 0.0)
    } else {
        (coord.x, coord.y, 0.0)
    };

    transform(from, to, &mut point)
        .map_err(|e| Error::Projection(format!("{from_crs} -> {to_crs} failed at {coord:?}: {e}")))?;
    if !point.0.is_finite() || !point.1.is_finite() {
        return Err(Error::Projection(format!("{from_crs} -> {to_crs} has no finite image for {coord:?}")));
    }

    if to_crs.is_geographic() {
        Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
    } else {
        Ok(Coord { x: point.0, y: point.1 })
    }
}

/// Reprojects a line between two frames
///
/// # Errors
///
/// Returns an error if a coordinate cannot be transformed
pub fn reproject_line(line: &LineString<f64>, from: Crs, to: Crs) -> Result<LineString<f64>, Error> {
    if from == to {
        return Ok(line.clone());
    }
    let from_proj = build_proj(from)?;
    let to_proj = build_proj(to)?;
    line.try_map_coords(|coord| transform_coord(&from_proj, from, &to_proj, to, coord))
}

/// A UTM frame shared by walks and streets during coverage computation
pub struct MetricFrame {
    crs: Crs,
    proj: Proj,
    geographic: Proj,
}

impl std::fmt::Debug for MetricFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricFrame").field("crs", &self.crs).finish_non_exhaustive()
    }
}

impl MetricFrame {
    /// # Errors
    ///
    /// Returns an error if `crs` is not a metric (UTM) frame
    pub fn new(crs: Crs) -> Result<Self, Error> {
        if crs.is_geographic() {
            return Err(Error::Projection(format!("{crs} is not a metric frame")));
        }
        Ok(Self {
            crs,
            proj: build_proj(crs)?,
            geographic: build_proj(Crs::Wgs84)?,
        })
    }

    /// Frame for a street network: its own UTM zone, or the zone at the
    /// centre of its lon/lat extent
    ///
    /// # Errors
    ///
    /// Returns an error for an empty network
    pub fn for_network(network: &StreetNetwork) -> Result<Self, Error> {
        match network.crs {
            Crs::Utm { .. } => Self::new(network.crs),
            Crs::Wgs84 => {
                let bounds = network.bounding_rect().ok_or_else(|| {
                    Error::InvalidData("cannot choose a metric frame for an empty street network".to_string())
                })?;
                let crs = Crs::utm_for(bounds.center());
                debug!("Using {crs} as metric frame for {} streets", network.len());
                Self::new(crs)
            }
        }
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Moves a line from `source` into this frame
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate cannot be transformed
    pub fn project_line(&self, line: &LineString<f64>, source: Crs) -> Result<LineString<f64>, Error> {
        if source == self.crs {
            return Ok(line.clone());
        }

        match source {
            Crs::Wgs84 => line.try_map_coords(|coord| {
                transform_coord(&self.geographic, Crs::Wgs84, &self.proj, self.crs, coord)
            }),
            Crs::Utm { .. } => {
                let from = build_proj(source)?;
                line.try_map_coords(|coord| transform_coord(&from, source, &self.proj, self.crs, coord))
            }
        }
    }

    /// Projects every street of a network, preserving order
    ///
    /// # Errors
    ///
    /// Returns an error if any street cannot be transformed
    pub fn project_network(&self, network: &StreetNetwork) -> Result<Vec<LineString<f64>>, Error> {
        network
            .streets
            .iter()
            .map(|street| self.project_line(&street.geometry, network.crs))
            .collect()
    }
}
