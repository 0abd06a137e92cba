use chrono::{DateTime, Utc};
use geo::{Coord, LineString};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_stub_gen::derive::{gen_stub_pyclass, gen_stub_pyfunction, gen_stub_pymethods};
use wkt::ToWkt;

use walkcover_core::prelude::*;

pub(crate) fn parse_crs(crs: &str) -> PyResult<Crs> {
    crs.parse::<Crs>()
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

fn to_line(coords: Vec<(f64, f64)>) -> LineString<f64> {
    coords.into_iter().map(|(x, y)| Coord { x, y }).collect()
}

/// Trajectory
///
/// A recorded GPS track. ``coords`` are ``(x, y)`` pairs in ``crs``
/// (``(lon, lat)`` for EPSG:4326). ``timestamps`` holds either one entry per
/// point or a ``[start, end]`` pair, as ISO-8601 strings.
///
/// Unparseable timestamps do not raise: the trajectory is kept without
/// timestamps and later classified as transit.
#[gen_stub_pyclass]
#[pyclass(name = "Trajectory")]
#[derive(Clone)]
pub struct PyTrajectory {
    pub(crate) inner: Trajectory,
}

#[gen_stub_pymethods]
#[pymethods]
impl PyTrajectory {
    #[new]
    #[pyo3(signature = (source_id, coords, timestamps, crs = "EPSG:4326"))]
    pub fn new(
        source_id: String,
        coords: Vec<(f64, f64)>,
        timestamps: Vec<String>,
        crs: &str,
    ) -> PyResult<Self> {
        let crs = parse_crs(crs)?;
        Ok(Self {
            inner: Trajectory::from_raw_timestamps(source_id, to_line(coords), &timestamps, crs),
        })
    }

    /// Build a trajectory from timezone-aware ``datetime`` objects
    #[staticmethod]
    #[pyo3(signature = (source_id, coords, timestamps, crs = "EPSG:4326"))]
    pub fn from_datetimes(
        source_id: String,
        coords: Vec<(f64, f64)>,
        timestamps: Vec<DateTime<Utc>>,
        crs: &str,
    ) -> PyResult<Self> {
        let crs = parse_crs(crs)?;
        Ok(Self {
            inner: Trajectory::new(source_id, to_line(coords), timestamps, crs),
        })
    }

    #[getter]
    fn source_id(&self) -> String {
        self.inner.source_id.clone()
    }

    #[getter]
    fn crs(&self) -> String {
        self.inner.crs.to_string()
    }

    fn coords(&self) -> Vec<(f64, f64)> {
        self.inner.coords().iter().map(|c| (c.x, c.y)).collect()
    }

    fn timestamps(&self) -> Vec<String> {
        self.inner.timestamps.iter().map(DateTime::to_rfc3339).collect()
    }

    fn to_wkt(&self) -> String {
        self.inner.geometry.to_wkt().to_string()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Trajectory({}, {} points, {})",
            self.inner.source_id,
            self.inner.len(),
            self.inner.crs
        )
    }
}

pub(crate) fn metrics_to_py(py: Python<'_>, metrics: &Metrics) -> PyResult<Py<PyAny>> {
    let dict = PyDict::new(py);
    dict.set_item("direct_distance", metrics.direct_distance)?;
    dict.set_item("path_distance", metrics.path_distance)?;
    dict.set_item("duration", metrics.duration)?;
    dict.set_item("avg_speed", metrics.avg_speed)?;
    dict.set_item("avg_speed_kmh", metrics.avg_speed_kmh())?;
    dict.set_item("sinuosity", metrics.sinuosity)?;
    dict.set_item("point_density", metrics.point_density)?;
    dict.set_item("point_count", metrics.point_count)?;
    Ok(dict.into())
}

/// Distance, speed and shape metrics of a trajectory
///
/// Returns
/// -------
/// dict or None
///     ``None`` when the trajectory has fewer than two points or its
///     timestamps are missing, mismatched or out of order
#[gen_stub_pyfunction]
#[pyfunction]
pub fn calculate_metrics(py: Python<'_>, trajectory: &PyTrajectory) -> PyResult<Option<Py<PyAny>>> {
    trajectory
        .inner
        .metrics()
        .map(|metrics| metrics_to_py(py, &metrics))
        .transpose()
}
