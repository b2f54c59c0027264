//! tinystan — safe bindings for compiled TinyStan model libraries.
//!
//! Purpose
//! -------
//! Drive a precompiled Stan model (a shared object built by TinyStan)
//! through its four inference algorithms: HMC sampling, Pathfinder,
//! optimization, and Laplace sampling. The numerics live in the native
//! library; this crate owns the boundary around it. When the
//! `python-bindings` feature is enabled, this module also defines the
//! Python classes of the `_tinystan` extension module.
//!
//! Key behaviors
//! -------------
//! - Size every output buffer exactly before the native call and label its
//!   last axis with the algorithm's diagnostic names plus the model's
//!   parameter names.
//! - Encode data, inits, and Laplace modes into the strings the engine
//!   reads.
//! - Translate native failures into [`StanError`], releasing every native
//!   error object and model instance exactly once.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work happens inside the native library; nothing here
//!   re-implements sampling or optimization.
//! - Argument errors are detected before the native algorithm runs.
//!
//! Conventions
//! -----------
//! - Options structs carry the engine's defaults; override fields with
//!   struct-update syntax.
//! - The last axis of every output array is the parameter-name axis.
//!
//! Downstream usage
//! ----------------
//! - Rust callers load a library with [`Model::load`] and call
//!   [`Model::sample`], [`Model::pathfinder`], [`Model::optimize`], or
//!   [`Model::laplace_sample`].
//! - Other backends (or test doubles) implement [`Engine`] and use
//!   [`Model::with_engine`].
//! - The Python package imports `_tinystan` and re-exports `Model` and
//!   `StanOutput`.
//!
//! Testing notes
//! -------------
//! - Unit tests drive an in-memory engine that counts constructor,
//!   destructor, and error-object calls.
//! - `tests/` exercises the public API end to end with its own engine.

pub mod algorithms;
pub mod buffer;
pub mod compile;
pub mod errors;
pub mod inits;
pub mod model;
pub mod names;
pub mod native;
pub mod output;
pub mod session;
pub mod utils;

pub use algorithms::{
    LaplaceMode, LaplaceOptions, OptimizeOptions, PathfinderOptions, SampleOptions,
};
pub use compile::compile_model;
pub use errors::{ErrorCategory, StanError, StanResult};
pub use inits::{Inits, StanData};
pub use model::{Model, ModelOptions};
pub use native::{Engine, HmcMetric, NativeLibrary, OptimizationAlgorithm};
pub use output::StanOutput;

#[cfg(feature = "python-bindings")]
use std::path::PathBuf;

#[cfg(feature = "python-bindings")]
use numpy::{PyArray2, PyArrayDyn, ToPyArray};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::PyValueError,
    prelude::*,
    types::{PyAny, PyList},
};

#[cfg(feature = "python-bindings")]
use crate::utils::{
    extract_algorithm, extract_f64_array_dyn, extract_inits, extract_laplace_mode,
    extract_metric, extract_stan_data,
};

/// PyModel — Python-facing wrapper for a loaded model library.
///
/// Purpose
/// -------
/// Expose [`Model`] to Python with the keyword arguments and defaults of the
/// TinyStan Python client, forwarding every call to the Rust invokers.
///
/// Parameters
/// ----------
/// Constructed from Python via `Model(model, *, capture_stan_prints=True,
/// stanc_args=None, make_args=None, warn=True)`:
/// - `model`: path to a compiled library, or to a `.stan` file to compile.
///
/// Notes
/// -----
/// - The GIL is released for the duration of each native call.
#[cfg(feature = "python-bindings")]
#[pyclass(name = "Model", module = "tinystan")]
pub struct PyModel {
    inner: Model,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyModel {
    #[new]
    #[pyo3(signature = (
        model, *, capture_stan_prints = true, stanc_args = None, make_args = None, warn = true
    ))]
    pub fn new(
        model: PathBuf, capture_stan_prints: bool, stanc_args: Option<Vec<String>>,
        make_args: Option<Vec<String>>, warn: bool,
    ) -> PyResult<PyModel> {
        let options = ModelOptions {
            capture_stan_prints,
            stanc_args: stanc_args.unwrap_or_default(),
            make_args: make_args.unwrap_or_default(),
            warn,
        };
        Ok(PyModel { inner: Model::load(model, &options)? })
    }

    /// `(major, minor, patch)` of the native API.
    pub fn api_version(&self) -> (i32, i32, i32) {
        self.inner.api_version()
    }

    #[getter]
    pub fn lib_path(&self) -> PathBuf {
        self.inner.lib_path().to_path_buf()
    }

    #[pyo3(signature = (
        data = None, *, num_chains = 4, inits = None, seed = None, id = 1, init_radius = 2.0,
        num_warmup = 1000, num_samples = 1000, metric = "diagonal", init_inv_metric = None,
        save_metric = false, adapt = true, delta = 0.8, gamma = 0.05, kappa = 0.75, t0 = 10.0,
        init_buffer = 75, term_buffer = 50, window = 25, save_warmup = false, stepsize = 1.0,
        stepsize_jitter = 0.0, max_depth = 10, refresh = 0, num_threads = -1
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn sample(
        &self, py: Python<'_>, data: Option<&Bound<'_, PyAny>>, num_chains: usize,
        inits: Option<&Bound<'_, PyAny>>, seed: Option<u32>, id: u32, init_radius: f64,
        num_warmup: usize, num_samples: usize, metric: &str,
        init_inv_metric: Option<&Bound<'_, PyAny>>, save_metric: bool, adapt: bool, delta: f64,
        gamma: f64, kappa: f64, t0: f64, init_buffer: u32, term_buffer: u32, window: u32,
        save_warmup: bool, stepsize: f64, stepsize_jitter: f64, max_depth: usize,
        refresh: usize, num_threads: i32,
    ) -> PyResult<PyStanOutput> {
        let data = extract_stan_data(data)?;
        let options = SampleOptions {
            num_chains,
            inits: extract_inits(inits)?,
            seed,
            id,
            init_radius,
            num_warmup,
            num_samples,
            metric: extract_metric(metric)?,
            init_inv_metric: init_inv_metric.map(extract_f64_array_dyn).transpose()?,
            save_metric,
            adapt,
            delta,
            gamma,
            kappa,
            t0,
            init_buffer,
            term_buffer,
            window,
            save_warmup,
            stepsize,
            stepsize_jitter,
            max_depth,
            refresh,
            num_threads,
        };
        let output = py.allow_threads(|| self.inner.sample(&data, &options))?;
        Ok(PyStanOutput { inner: output })
    }

    #[pyo3(signature = (
        data = None, *, num_paths = 4, inits = None, seed = None, id = 1, init_radius = 2.0,
        num_draws = 1000, max_history_size = 5, init_alpha = 0.001, tol_obj = 1e-12,
        tol_rel_obj = 1e4, tol_grad = 1e-8, tol_rel_grad = 1e7, tol_param = 1e-8,
        num_iterations = 1000, num_elbo_draws = 100, num_multi_draws = 1000,
        calculate_lp = true, psis_resample = true, refresh = 0, num_threads = -1
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn pathfinder(
        &self, py: Python<'_>, data: Option<&Bound<'_, PyAny>>, num_paths: usize,
        inits: Option<&Bound<'_, PyAny>>, seed: Option<u32>, id: u32, init_radius: f64,
        num_draws: usize, max_history_size: usize, init_alpha: f64, tol_obj: f64,
        tol_rel_obj: f64, tol_grad: f64, tol_rel_grad: f64, tol_param: f64,
        num_iterations: usize, num_elbo_draws: usize, num_multi_draws: usize,
        calculate_lp: bool, psis_resample: bool, refresh: usize, num_threads: i32,
    ) -> PyResult<PyStanOutput> {
        let data = extract_stan_data(data)?;
        let options = PathfinderOptions {
            num_paths,
            inits: extract_inits(inits)?,
            seed,
            id,
            init_radius,
            num_draws,
            max_history_size,
            init_alpha,
            tol_obj,
            tol_rel_obj,
            tol_grad,
            tol_rel_grad,
            tol_param,
            num_iterations,
            num_elbo_draws,
            num_multi_draws,
            calculate_lp,
            psis_resample,
            refresh,
            num_threads,
        };
        let output = py.allow_threads(|| self.inner.pathfinder(&data, &options))?;
        Ok(PyStanOutput { inner: output })
    }

    #[pyo3(signature = (
        data = None, *, init = None, seed = None, id = 1, init_radius = 2.0,
        algorithm = "lbfgs", jacobian = false, num_iterations = 2000, max_history_size = 5,
        init_alpha = 0.001, tol_obj = 1e-12, tol_rel_obj = 1e4, tol_grad = 1e-8,
        tol_rel_grad = 1e7, tol_param = 1e-8, refresh = 0, num_threads = -1
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn optimize(
        &self, py: Python<'_>, data: Option<&Bound<'_, PyAny>>, init: Option<&Bound<'_, PyAny>>,
        seed: Option<u32>, id: u32, init_radius: f64, algorithm: &str, jacobian: bool,
        num_iterations: usize, max_history_size: usize, init_alpha: f64, tol_obj: f64,
        tol_rel_obj: f64, tol_grad: f64, tol_rel_grad: f64, tol_param: f64, refresh: usize,
        num_threads: i32,
    ) -> PyResult<PyStanOutput> {
        let data = extract_stan_data(data)?;
        let options = OptimizeOptions {
            inits: extract_inits(init)?,
            seed,
            id,
            init_radius,
            algorithm: extract_algorithm(algorithm)?,
            jacobian,
            num_iterations,
            max_history_size,
            init_alpha,
            tol_obj,
            tol_rel_obj,
            tol_grad,
            tol_rel_grad,
            tol_param,
            refresh,
            num_threads,
        };
        let output = py.allow_threads(|| self.inner.optimize(&data, &options))?;
        Ok(PyStanOutput { inner: output })
    }

    #[pyo3(signature = (
        mode, data = None, *, num_draws = 1000, jacobian = true, calculate_lp = true,
        save_hessian = false, seed = None, refresh = 0, num_threads = -1
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn laplace_sample(
        &self, py: Python<'_>, mode: &Bound<'_, PyAny>, data: Option<&Bound<'_, PyAny>>,
        num_draws: usize, jacobian: bool, calculate_lp: bool, save_hessian: bool,
        seed: Option<u32>, refresh: usize, num_threads: i32,
    ) -> PyResult<PyStanOutput> {
        let mode = extract_laplace_mode(py, mode)?;
        let data = extract_stan_data(data)?;
        let options = LaplaceOptions {
            num_draws,
            jacobian,
            calculate_lp,
            save_hessian,
            seed,
            refresh,
            num_threads,
        };
        let output = py.allow_threads(|| self.inner.laplace_sample(&mode, &data, &options))?;
        Ok(PyStanOutput { inner: output })
    }
}

/// PyStanOutput — Python-facing wrapper for [`StanOutput`].
///
/// Arrays are copied into fresh numpy arrays on access.
#[cfg(feature = "python-bindings")]
#[pyclass(name = "StanOutput", module = "tinystan")]
#[derive(Clone)]
pub struct PyStanOutput {
    pub(crate) inner: StanOutput,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyStanOutput {
    #[getter]
    pub fn parameters(&self) -> Vec<String> {
        self.inner.parameters().to_vec()
    }

    #[getter]
    pub fn data<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.inner.data().to_pyarray(py)
    }

    #[getter]
    pub fn metric<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArrayDyn<f64>>> {
        self.inner.metric().map(|metric| metric.to_pyarray(py))
    }

    #[getter]
    pub fn hessian<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.hessian().map(|hessian| hessian.to_pyarray(py))
    }

    /// Values of one variable, containers reshaped to their dimensions.
    pub fn get<'py>(&self, py: Python<'py>, name: &str) -> PyResult<Bound<'py, PyArrayDyn<f64>>> {
        self.inner
            .get(name)
            .map(|values| values.to_pyarray(py))
            .ok_or_else(|| PyValueError::new_err(format!("no variable named {name:?}")))
    }

    pub fn variables(&self) -> Vec<String> {
        self.inner.variables()
    }

    /// One inits dict per chain, drawn from this output.
    #[pyo3(signature = (chains = 4, seed = None))]
    pub fn create_inits<'py>(
        &self, py: Python<'py>, chains: usize, seed: Option<u32>,
    ) -> PyResult<Bound<'py, PyList>> {
        let seed = algorithms::resolve_seed(seed);
        let inits = self.inner.create_inits(chains, u64::from(seed))?;
        let json = py.import("json")?;
        let objects = inits
            .iter()
            .map(|init| json.call_method1("loads", (init.to_string(),)))
            .collect::<PyResult<Vec<_>>>()?;
        PyList::new(py, objects)
    }

    pub fn __repr__(&self) -> String {
        format!(
            "StanOutput(parameters={}, shape={:?})",
            self.inner.parameters().len(),
            self.inner.data().shape()
        )
    }
}

/// Compile a `.stan` file with the TinyStan build tree and return the
/// library path.
#[cfg(feature = "python-bindings")]
#[pyfunction]
#[pyo3(name = "compile_model", signature = (stan_file, *, stanc_args = None, make_args = None))]
fn py_compile_model(
    stan_file: PathBuf, stanc_args: Option<Vec<String>>, make_args: Option<Vec<String>>,
) -> PyResult<PathBuf> {
    let path = compile_model(
        &stan_file,
        &stanc_args.unwrap_or_default(),
        &make_args.unwrap_or_default(),
    )?;
    Ok(path)
}

/// _tinystan — PyO3 module initializer for the Python extension.
///
/// Purpose
/// -------
/// Define the `_tinystan` Python module with the `Model` and `StanOutput`
/// classes and the `compile_model` function used by the public `tinystan`
/// package.
///
/// Errors
/// ------
/// - `PyErr`
///   If adding a class or function to the module fails.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _tinystan<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    m.add_class::<PyStanOutput>()?;
    m.add_function(wrap_pyfunction!(py_compile_model, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
