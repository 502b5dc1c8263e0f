use crate::{
    check_map_shape, CubeView, Moment, MomentError, MomentOutputs, MomentSelection, ReduceOptions,
    ReduceParams, Strategy,
};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray3, PyReadwriteArray2};
use pyo3::exceptions::{PyMemoryError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;

fn to_py_err(err: MomentError) -> PyErr {
    match err {
        MomentError::AllocationFailed { .. } => PyMemoryError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn options_for(strategy: &str) -> PyResult<ReduceOptions> {
    let strategy: Strategy = strategy.parse().map_err(to_py_err)?;
    Ok(ReduceOptions::default().with_strategy(strategy))
}

/// Moment maps of a `(channels, height, width)` float32 cube.
///
/// Returns a dict keyed "0"/"1"/"2" holding `(height, width)` arrays for the
/// requested moments.
#[pyfunction]
#[pyo3(signature = (data, v, dv, compute0=true, compute1=true, compute2=true, strategy="single_pass"))]
#[allow(clippy::too_many_arguments)]
pub fn moments<'py>(
    py: Python<'py>,
    data: PyReadonlyArray3<'py, f32>,
    v: PyReadonlyArray1<'py, f32>,
    dv: f64,
    compute0: bool,
    compute1: bool,
    compute2: bool,
    strategy: &str,
) -> PyResult<&'py PyDict> {
    let shape = data.shape();
    let (channels, height, width) = (shape[0], shape[1], shape[2]);
    let cube_data = data.as_slice()?;
    let axis = v.as_slice()?;
    let options = options_for(strategy)?;
    let selection = MomentSelection::new(compute0, compute1, compute2);

    let maps = py
        .allow_threads(|| {
            let cube = CubeView::new(cube_data, channels, height, width)?;
            crate::reduce(&cube, axis, dv, selection, &options)
        })
        .map_err(to_py_err)?;

    let out = PyDict::new(py);
    for moment in selection.iter() {
        if let Some(map) = maps.get(moment) {
            let arr = map.to_vec().into_pyarray(py).reshape([height, width])?;
            out.set_item(moment.label(), arr)?;
        }
    }
    Ok(out)
}

/// In-place variant: writes into caller-allocated `(height, width)` float32
/// arrays. A moment is computed iff its array is given; `None` arrays are
/// never touched. Arrays of any other shape raise `ValueError`.
#[pyfunction]
#[pyo3(signature = (data, v, dv, mom0=None, mom1=None, mom2=None, strategy="single_pass"))]
#[allow(clippy::too_many_arguments)]
pub fn moments_into<'py>(
    py: Python<'py>,
    data: PyReadonlyArray3<'py, f32>,
    v: PyReadonlyArray1<'py, f32>,
    dv: f64,
    mut mom0: Option<PyReadwriteArray2<'py, f32>>,
    mut mom1: Option<PyReadwriteArray2<'py, f32>>,
    mut mom2: Option<PyReadwriteArray2<'py, f32>>,
    strategy: &str,
) -> PyResult<()> {
    let shape = data.shape();
    let (channels, height, width) = (shape[0], shape[1], shape[2]);
    let cube_data = data.as_slice()?;
    let axis = v.as_slice()?;
    let options = options_for(strategy)?;
    let selection = MomentSelection::new(mom0.is_some(), mom1.is_some(), mom2.is_some());
    for (moment, arr) in [(Moment::Zero, &mom0), (Moment::One, &mom1), (Moment::Two, &mom2)] {
        if let Some(arr) = arr {
            check_map_shape(moment, arr.shape(), height, width).map_err(to_py_err)?;
        }
    }

    let m0 = mom0.as_mut().map(|a| a.as_slice_mut()).transpose()?;
    let m1 = mom1.as_mut().map(|a| a.as_slice_mut()).transpose()?;
    let m2 = mom2.as_mut().map(|a| a.as_slice_mut()).transpose()?;

    py.allow_threads(|| {
        let cube = CubeView::new(cube_data, channels, height, width)?;
        crate::reduce_into(&cube, axis, dv, selection, MomentOutputs::new(m0, m1, m2), &options)
    })
    .map_err(to_py_err)
}

/// Runs a JSON moment request (`startChan`, `endChan`, `moments`, optional
/// `dv`/`strategy`/`parallel`/`bunit`/`vUnit`) over a cube with its full
/// coordinate axis. Each map "N" comes with its unit label under "N_unit".
#[pyfunction]
pub fn moments_request<'py>(
    py: Python<'py>,
    data: PyReadonlyArray3<'py, f32>,
    v: PyReadonlyArray1<'py, f32>,
    request: &str,
) -> PyResult<&'py PyDict> {
    let shape = data.shape();
    let (channels, height, width) = (shape[0], shape[1], shape[2]);
    let cube_data = data.as_slice()?;
    let axis = v.as_slice()?;
    let params = ReduceParams::from_json(request).map_err(to_py_err)?;

    let maps = py
        .allow_threads(|| {
            let cube = CubeView::new(cube_data, channels, height, width)?;
            crate::compute_moments(&cube, axis, &params)
        })
        .map_err(to_py_err)?;

    let out = PyDict::new(py);
    for moment in Moment::ALL {
        if let Some(map) = maps.get(moment) {
            let arr: &PyArray2<f32> = map.to_vec().into_pyarray(py).reshape([height, width])?;
            out.set_item(moment.label(), arr)?;
        }
        if let Some(unit) = maps.unit(moment) {
            out.set_item(format!("{}_unit", moment.label()), unit)?;
        }
    }
    Ok(out)
}

#[pymodule]
fn momentcore(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(moments, m)?)?;
    m.add_function(wrap_pyfunction!(moments_into, m)?)?;
    m.add_function(wrap_pyfunction!(moments_request, m)?)?;
    Ok(())
}
