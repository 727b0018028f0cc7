//! Bindings for a Python scene host that drives its own rigid-body rope but
//! wants the crossing search and render-index arithmetic from this crate.

use nalgebra::Point3;
use pyo3::prelude::*;

use crate::dataset;
use crate::detect::{DetectorParams, KnotDetector};

/// First crossing along the rope, as
/// `(pull_index, hold_index, (dx, dy, dz), is_fallback)`.
#[pyfunction]
#[pyo3(signature = (positions, depth_thresh = 0.4, idx_thresh = 3, pull_offset = 3))]
fn find_crossing(
    positions: Vec<(f64, f64, f64)>,
    depth_thresh: f64,
    idx_thresh: usize,
    pull_offset: usize,
) -> PyResult<(usize, usize, (f64, f64, f64), bool)> {
    let detector = KnotDetector::new(DetectorParams {
        depth_thresh,
        idx_thresh,
        pull_offset,
        ..DetectorParams::default()
    });
    let points: Vec<_> = positions
        .into_iter()
        .map(|(x, y, z)| Point3::new(x, y, z))
        .collect();
    let event = detector.find_crossing(&points);
    let v = event.suggested_vector;
    Ok((
        event.pull_index,
        event.hold_index,
        (v.x, v.y, v.z),
        event.is_fallback(),
    ))
}

/// Image index for `frame`, or `None` when it is off the render stride.
#[pyfunction]
fn output_index(frame: u32, render_offset: i64, render_step: u32) -> PyResult<Option<u64>> {
    Ok(dataset::output_index(frame, render_offset, render_step))
}

/// The name of this function must match the lib.name in Cargo.toml
#[pymodule]
fn knotsynth(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(find_crossing, m)?)?;
    m.add_function(wrap_pyfunction!(output_index, m)?)?;
    Ok(())
}
