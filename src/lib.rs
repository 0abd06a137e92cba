use pyo3::prelude::*;
use pyo3_stub_gen::define_stub_info_gatherer;

use analysis::{PyAnalysis, analyze_walks, classify_trajectory};
use regions::PyRegionRegistry;
use trajectory::{PyTrajectory, calculate_metrics};

pub mod analysis;
pub mod regions;
pub mod trajectory;

/// A Python module implemented in Rust.
#[pymodule]
fn walkcover(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<PyRegionRegistry>()?;
    m.add_class::<PyTrajectory>()?;
    m.add_function(wrap_pyfunction!(calculate_metrics, m)?)?;

    m.add_class::<PyAnalysis>()?;
    m.add_function(wrap_pyfunction!(classify_trajectory, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_walks, m)?)?;
    Ok(())
}

define_stub_info_gatherer!(stub_info);
