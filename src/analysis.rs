use geo::LineString;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_stub_gen::derive::{gen_stub_pyclass, gen_stub_pyfunction, gen_stub_pymethods};
use wkt::TryFromWkt;

use walkcover_core::prelude::*;

use crate::regions::PyRegionRegistry;
use crate::trajectory::{PyTrajectory, metrics_to_py, parse_crs};

fn value_error(message: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(message)
}

fn runtime_error(message: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(message)
}

/// Configuration problems are the caller's fault, the rest is ours
fn core_error(context: &str, error: walkcover_core::Error) -> PyErr {
    match error {
        walkcover_core::Error::UnknownRegion(_)
        | walkcover_core::Error::UnknownCrs(_)
        | walkcover_core::Error::InvalidConfig(_)
        | walkcover_core::Error::InvalidData(_)
        | walkcover_core::Error::ConfigParse(_) => value_error(format!("{context}: {error}")),
        walkcover_core::Error::Projection(_) | walkcover_core::Error::GeoJsonError(_) => {
            runtime_error(format!("{context}: {error}"))
        }
    }
}

fn parse_accumulation(accumulation: &str) -> PyResult<Accumulation> {
    match accumulation.to_lowercase().as_str() {
        "union" => Ok(Accumulation::Union),
        "per_walk" => Ok(Accumulation::PerWalk),
        other => Err(value_error(format!(
            "Unknown accumulation '{other}', expected 'union' or 'per_walk'"
        ))),
    }
}

fn verdict_to_py(py: Python<'_>, walk: &WalkClassification) -> PyResult<Py<PyAny>> {
    let dict = PyDict::new(py);
    dict.set_item("source_id", &walk.source_id)?;
    dict.set_item("verdict", walk.verdict.as_str())?;
    dict.set_item("reason", walk.verdict.reason().map(|r| r.as_str()))?;
    dict.set_item("is_transit", walk.verdict.is_transit())?;
    dict.set_item("total_segments", walk.total_segments)?;
    dict.set_item("kept_segments", walk.kept_segments)?;
    dict.set_item("start_time", walk.start_time)?;
    match &walk.metrics {
        Some(metrics) => dict.set_item("metrics", metrics_to_py(py, metrics)?)?,
        None => dict.set_item("metrics", py.None())?,
    }
    Ok(dict.into())
}

/// Analysis
///
/// Result of ``analyze_walks``: per-street coverage, per-trajectory
/// verdicts and network totals.
#[gen_stub_pyclass]
#[pyclass(name = "Analysis")]
pub struct PyAnalysis {
    inner: Analysis,
}

#[gen_stub_pymethods]
#[pymethods]
impl PyAnalysis {
    #[getter]
    fn region(&self) -> String {
        self.inner.region.clone()
    }

    #[getter]
    fn total_walks(&self) -> usize {
        self.inner.result.total_walks
    }

    #[getter]
    fn valid_walks(&self) -> usize {
        self.inner.result.valid_walks
    }

    #[getter]
    fn total_streets(&self) -> usize {
        self.inner.result.total_streets
    }

    #[getter]
    fn covered_streets(&self) -> usize {
        self.inner.result.covered_streets
    }

    #[getter]
    fn coverage_percent(&self) -> f64 {
        self.inner.result.coverage_percent
    }

    #[getter]
    fn walked_percent(&self) -> f64 {
        self.inner.result.walked_percent
    }

    /// ``(street_id, coverage_percent, covered)`` for every street, in input order
    fn street_coverage(&self) -> Vec<(String, f64, bool)> {
        self.inner
            .street_coverage
            .iter()
            .map(|c| (c.street_id.clone(), c.coverage_percent, c.covered))
            .collect()
    }

    /// One dict per input trajectory, in input order
    fn walks(&self, py: Python<'_>) -> PyResult<Vec<Py<PyAny>>> {
        self.inner
            .walks
            .iter()
            .map(|walk| verdict_to_py(py, walk))
            .collect()
    }

    /// ``(lon, lat, visits, walks)`` of the busiest grid cells, busiest first
    fn common_areas(&self) -> Vec<(f64, f64, usize, usize)> {
        self.inner
            .common_areas
            .iter()
            .map(|area| (area.lon, area.lat, area.visits, area.walks))
            .collect()
    }

    /// Network totals, walk averages and walking patterns as a JSON string
    fn summary_json(&self) -> PyResult<String> {
        let summary = serde_json::json!({
            "region": self.inner.region,
            "coverage": self.inner.result,
            "walks": self.inner.summary,
            "temporal": self.inner.temporal,
            "common_areas": self.inner.common_areas,
        });
        serde_json::to_string(&summary).map_err(|e| runtime_error(e.to_string()))
    }

    /// Streets and kept walks as a GeoJSON ``FeatureCollection`` string
    fn to_geojson(&self, py: Python<'_>) -> PyResult<String> {
        py.detach(|| {
            self.inner
                .to_geojson_string()
                .map_err(|e| core_error("Failed to build GeoJSON", e))
        })
    }

    fn __repr__(&self) -> String {
        format!(
            "Analysis({}: {}/{} walks valid, {}/{} streets covered, {:.1}%)",
            self.inner.region,
            self.inner.result.valid_walks,
            self.inner.result.total_walks,
            self.inner.result.covered_streets,
            self.inner.result.total_streets,
            self.inner.result.coverage_percent
        )
    }
}

/// Classify a single trajectory as walking or transit
///
/// Parameters
/// ----------
/// trajectory : Trajectory
/// region : str, default="london"
/// registry : RegionRegistry, optional
///     Profiles to look ``region`` up in; the built-in ones if omitted
/// segment_size : int, optional, default=5
///     Classify segments of this many points and keep the walking ones,
///     as ``analyze_walks`` does. ``None`` classifies the trajectory as a
///     whole.
///
/// Returns
/// -------
/// dict
///     ``verdict``, ``reason``, ``is_transit``, segment counts and metrics
#[gen_stub_pyfunction]
#[pyfunction]
#[pyo3(signature = (trajectory, region = "london", registry = None, segment_size = Some(DEFAULT_SEGMENT_SIZE)))]
pub fn classify_trajectory(
    py: Python<'_>,
    trajectory: &PyTrajectory,
    region: &str,
    registry: Option<&PyRegionRegistry>,
    segment_size: Option<usize>,
) -> PyResult<Py<PyAny>> {
    let builtin;
    let registry = match registry {
        Some(registry) => &registry.inner,
        None => {
            builtin = RegionRegistry::builtin();
            &builtin
        }
    };

    let options = AnalysisOptions {
        classification: classification_mode(segment_size),
        ..AnalysisOptions::default()
    };
    let analyzer =
        WalkAnalyzer::new(registry, region, options).map_err(|e| core_error("Invalid analysis", e))?;

    verdict_to_py(py, &analyzer.classify(&trajectory.inner))
}

fn classification_mode(segment_size: Option<usize>) -> ClassificationMode {
    match segment_size {
        Some(segment_size) => ClassificationMode::Segmented { segment_size },
        None => ClassificationMode::WholeTrajectory,
    }
}

fn parse_streets(streets: Vec<(String, Option<String>, String)>, crs: Crs) -> PyResult<StreetNetwork> {
    let streets = streets
        .into_iter()
        .map(|(street_id, name, wkt)| {
            let geometry = LineString::<f64>::try_from_wkt_str(&wkt).map_err(|e| {
                value_error(format!("Invalid WKT for street {street_id}: {e}"))
            })?;
            Ok(Street::new(street_id, name, geometry))
        })
        .collect::<PyResult<Vec<_>>>()?;
    Ok(StreetNetwork::new(streets, crs))
}

/// Classify trajectories and measure street coverage by the walks
///
/// Parameters
/// ----------
/// trajectories : list[Trajectory]
/// streets : list[tuple[str, str | None, str]]
///     ``(street_id, name, wkt)`` with LINESTRING geometries
/// streets_crs : str, default="EPSG:4326"
/// region : str, default="london"
/// registry : RegionRegistry, optional
/// segment_size : int, optional, default=5
///     ``None`` classifies whole trajectories
/// accumulation : str, default="union"
///     ``"union"`` counts overlapping walks once, ``"per_walk"`` sums them
/// min_walk_duration : float, default=60
/// min_walk_distance : float, default=100
///     Pass ``0`` for both to reject trajectories by the region's rules only
/// restrict_to_region : bool, default=False
///     Skip trajectories outside the region extent
/// common_area_grid : float, default=0.001
///     Cell size in degrees for ``Analysis.common_areas``
///
/// Returns
/// -------
/// Analysis
///
/// Raises
/// ------
/// ValueError
///     For unknown regions, coordinate systems or invalid options
/// RuntimeError
///     If the streets cannot be reprojected. Walks that cannot be are
///     reported with the ``unprojectable`` verdict instead.
///
/// Notes
/// -----
/// The function releases the GIL during processing.
#[gen_stub_pyfunction]
#[pyfunction]
#[pyo3(signature = (
    trajectories,
    streets,
    streets_crs = "EPSG:4326",
    region = "london",
    registry = None,
    segment_size = Some(DEFAULT_SEGMENT_SIZE),
    accumulation = "union",
    min_walk_duration = 60.0,
    min_walk_distance = 100.0,
    restrict_to_region = false,
    common_area_grid = COMMON_AREA_GRID
))]
#[allow(clippy::too_many_arguments)]
pub fn analyze_walks(
    py: Python<'_>,
    trajectories: Vec<PyRef<'_, PyTrajectory>>,
    streets: Vec<(String, Option<String>, String)>,
    streets_crs: &str,
    region: &str,
    registry: Option<&PyRegionRegistry>,
    segment_size: Option<usize>,
    accumulation: &str,
    min_walk_duration: f64,
    min_walk_distance: f64,
    restrict_to_region: bool,
    common_area_grid: f64,
) -> PyResult<PyAnalysis> {
    let network = parse_streets(streets, parse_crs(streets_crs)?)?;
    let trajectories: Vec<Trajectory> = trajectories.iter().map(|t| t.inner.clone()).collect();
    let registry = registry.map_or_else(RegionRegistry::builtin, |r| r.inner.clone());

    let options = AnalysisOptions {
        classification: classification_mode(segment_size),
        accumulation: parse_accumulation(accumulation)?,
        min_walk_duration,
        min_walk_distance,
        restrict_to_region,
        common_area_grid,
    };

    py.detach(|| {
        let analyzer = WalkAnalyzer::new(&registry, region, options)
            .map_err(|e| core_error("Invalid analysis", e))?;
        let inner = analyzer
            .analyze(&trajectories, &network)
            .map_err(|e| core_error("Walk analysis failed", e))?;
        Ok(PyAnalysis { inner })
    })
}
