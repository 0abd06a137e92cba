use pyo3::prelude::*;
use pyo3_stub_gen::derive::{gen_stub_pyclass, gen_stub_pymethods};

use walkcover_core::prelude::*;

/// RegionRegistry
///
/// Calibrated walking thresholds per region. A new registry holds the
/// built-in profiles (``london``, ``blacksburg``, ``mumbai``); use
/// ``RegionRegistry.from_toml`` to load custom ones.
///
/// Example:
///
/// .. code-block:: python
///
///     registry = RegionRegistry.from_toml(open("regions.toml").read())
///     registry.names()
#[gen_stub_pyclass]
#[pyclass(name = "RegionRegistry")]
#[derive(Clone)]
pub struct PyRegionRegistry {
    pub(crate) inner: RegionRegistry,
}

#[gen_stub_pymethods]
#[pymethods]
impl PyRegionRegistry {
    #[new]
    pub fn new() -> Self {
        Self {
            inner: RegionRegistry::builtin(),
        }
    }

    /// Parse profiles from TOML, one ``[regions.<name>]`` table per region
    ///
    /// Raises
    /// ------
    /// ValueError
    ///     If the document is malformed or a profile is invalid
    #[staticmethod]
    pub fn from_toml(source: &str) -> PyResult<Self> {
        let inner = RegionRegistry::from_toml_str(source).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Failed to load region registry: {e}"
            ))
        })?;
        Ok(Self { inner })
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.names().into_iter().map(str::to_string).collect()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.inner.contains(region)
    }

    /// Profile of ``region`` as a JSON string
    pub fn profile_json(&self, region: &str) -> PyResult<String> {
        let profile = self
            .inner
            .get(region)
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))?;
        serde_json::to_string(profile)
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __contains__(&self, region: &str) -> bool {
        self.inner.contains(region)
    }

    fn __repr__(&self) -> String {
        format!("RegionRegistry({})", self.inner.names().join(", "))
    }
}

impl Default for PyRegionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
