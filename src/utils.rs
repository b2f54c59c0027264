//! utils — conversion of Python arguments into crate types.
//!
//! Only compiled with the `python-bindings` feature. The helpers accept the
//! same loosely-typed inputs the Python client has always accepted (strings,
//! paths, dicts, numpy arrays, previous results) and map them onto
//! [`StanData`], [`Inits`], and [`LaplaceMode`].

#[cfg(feature = "python-bindings")]
use std::path::PathBuf;

#[cfg(feature = "python-bindings")]
use ndarray::{Array1, ArrayD};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArrayDyn,
};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyAny, PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple},
};

#[cfg(feature = "python-bindings")]
use serde_json::{Map, Number, Value};

#[cfg(feature = "python-bindings")]
use crate::{
    algorithms::LaplaceMode,
    inits::{Inits, StanData},
    native::{HmcMetric, OptimizationAlgorithm},
    PyStanOutput,
};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Any-dimensional float64 array, e.g. an initial inverse metric.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_array_dyn(raw_data: &Bound<'_, PyAny>) -> PyResult<ArrayD<f64>> {
    let arr: PyReadonlyArrayDyn<f64> = raw_data
        .extract()
        .map_err(|_| PyTypeError::new_err("expected a numpy.ndarray of float64"))?;
    Ok(arr.as_array().to_owned())
}

#[cfg(feature = "python-bindings")]
fn json_float(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String("NaN".to_string()),
        None if value > 0.0 => Value::String("Inf".to_string()),
        None => Value::String("-Inf".to_string()),
    }
}

/// Convert a Python object into JSON.
///
/// Dicts, lists, tuples, scalars, and anything with `tolist()` (numpy arrays
/// and scalars) are accepted. Non-finite floats become the strings the
/// engine's JSON reader understands.
#[cfg(feature = "python-bindings")]
pub fn to_json(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::Null);
    }
    // bool before int: Python bools are ints.
    if let Ok(flag) = obj.downcast::<PyBool>() {
        return Ok(Value::Bool(flag.is_true()));
    }
    if obj.is_instance_of::<PyInt>() {
        return Ok(Value::Number(Number::from(obj.extract::<i64>()?)));
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(json_float(obj.extract::<f64>()?));
    }
    if let Ok(text) = obj.downcast::<PyString>() {
        return Ok(Value::String(text.to_str()?.to_string()));
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut map = Map::new();
        for (key, value) in dict.iter() {
            map.insert(key.str()?.to_str()?.to_string(), to_json(&value)?);
        }
        return Ok(Value::Object(map));
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let items = obj.try_iter()?.map(|item| to_json(&item?)).collect::<PyResult<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }
    if obj.hasattr("tolist")? {
        return to_json(&obj.call_method0("tolist")?);
    }
    Err(PyTypeError::new_err(format!(
        "cannot encode object of type {} as Stan JSON",
        obj.get_type().name()?
    )))
}

/// Model data: `None` or `""` for no data, a string (JSON text or path), a
/// `PathLike`, or a JSON-like object.
#[cfg(feature = "python-bindings")]
pub fn extract_stan_data(obj: Option<&Bound<'_, PyAny>>) -> PyResult<StanData> {
    let Some(obj) = obj.filter(|obj| !obj.is_none()) else {
        return Ok(StanData::default());
    };
    if let Ok(text) = obj.downcast::<PyString>() {
        return Ok(StanData::Text(text.to_str()?.to_string()));
    }
    if obj.hasattr("__fspath__")? {
        return Ok(StanData::Path(obj.extract::<PathBuf>()?));
    }
    Ok(StanData::Value(to_json(obj)?))
}

/// Inits: a previous `StanOutput`, a list of per-chain documents, or a
/// single document.
#[cfg(feature = "python-bindings")]
pub fn extract_inits(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Option<Inits>> {
    let Some(obj) = obj.filter(|obj| !obj.is_none()) else {
        return Ok(None);
    };
    if let Ok(output) = obj.downcast::<PyStanOutput>() {
        return Ok(Some(Inits::Prior(output.borrow().inner.clone())));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        let per_unit = list
            .iter()
            .map(|item| extract_stan_data(Some(&item)))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(Some(Inits::PerUnit(per_unit)));
    }
    Ok(Some(Inits::Single(extract_stan_data(Some(obj))?)))
}

/// Laplace mode: a previous `StanOutput`, a 1-D numpy array, or a document.
#[cfg(feature = "python-bindings")]
pub fn extract_laplace_mode<'py>(
    py: Python<'py>, obj: &Bound<'py, PyAny>,
) -> PyResult<LaplaceMode> {
    if let Ok(output) = obj.downcast::<PyStanOutput>() {
        return Ok(LaplaceMode::Prior(output.borrow().inner.clone()));
    }
    if obj.extract::<PyReadonlyArray1<f64>>().is_ok() {
        let arr = extract_f64_array(py, obj)?;
        let values = arr
            .as_slice()
            .map_err(|_| PyValueError::new_err("mode must be a contiguous float64 array"))?;
        return Ok(LaplaceMode::Vector(Array1::from(values.to_vec())));
    }
    Ok(LaplaceMode::Data(extract_stan_data(Some(obj))?))
}

#[cfg(feature = "python-bindings")]
pub fn extract_metric(name: &str) -> PyResult<HmcMetric> {
    match name.to_lowercase().as_str() {
        "unit" => Ok(HmcMetric::Unit),
        "dense" => Ok(HmcMetric::Dense),
        "diagonal" | "diag" => Ok(HmcMetric::Diagonal),
        other => Err(PyValueError::new_err(format!(
            "invalid metric {other:?} (expected 'unit', 'dense', or 'diagonal')"
        ))),
    }
}

#[cfg(feature = "python-bindings")]
pub fn extract_algorithm(name: &str) -> PyResult<OptimizationAlgorithm> {
    match name.to_lowercase().as_str() {
        "newton" => Ok(OptimizationAlgorithm::Newton),
        "bfgs" => Ok(OptimizationAlgorithm::Bfgs),
        "lbfgs" | "l-bfgs" => Ok(OptimizationAlgorithm::Lbfgs),
        other => Err(PyValueError::new_err(format!(
            "invalid algorithm {other:?} (expected 'newton', 'bfgs', or 'lbfgs')"
        ))),
    }
}
