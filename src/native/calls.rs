//! native::calls — one descriptor per native algorithm entry point.
//!
//! Each struct lists, in native positional order, every argument of the
//! corresponding `tinystan_*` function except the model handle and the
//! error slot, which every call shares. Buffer pointers and their element
//! counts are carried together as slices, and nullable arguments are
//! `Option`s, so an engine implementation cannot pass a pointer with a
//! mismatched length or forget a null.
//!
//! When the native signature changes, the descriptor and the matching
//! function-pointer type in [`super::library`] are the only two places
//! that need to follow.

use std::ffi::CStr;
use std::os::raw::{c_int, c_uint};

/// HmcMetric — shape of the HMC inverse metric.
///
/// The discriminants are the integers the native library expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmcMetric {
    Unit = 0,
    Dense = 1,
    #[default]
    Diagonal = 2,
}

impl HmcMetric {
    pub fn code(self) -> c_int {
        self as c_int
    }

    /// Per-chain metric shape for a model with `free_params` parameters.
    pub fn shape(self, free_params: usize) -> Vec<usize> {
        match self {
            HmcMetric::Dense => vec![free_params, free_params],
            HmcMetric::Unit | HmcMetric::Diagonal => vec![free_params],
        }
    }
}

/// OptimizationAlgorithm — optimizer selection for `tinystan_optimize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationAlgorithm {
    Newton = 0,
    Bfgs = 1,
    #[default]
    Lbfgs = 2,
}

impl OptimizationAlgorithm {
    pub fn code(self) -> c_int {
        self as c_int
    }
}

/// Arguments of `tinystan_sample`.
#[derive(Debug)]
pub struct SampleCall<'a> {
    pub num_chains: usize,
    /// Separator-joined inits, or null.
    pub inits: Option<&'a CStr>,
    pub seed: c_uint,
    pub id: c_uint,
    pub init_radius: f64,
    pub num_warmup: c_int,
    pub num_samples: c_int,
    pub metric: HmcMetric,
    /// `(chains, …)` initial inverse metric, or null.
    pub init_inv_metric: Option<&'a [f64]>,
    pub adapt: bool,
    pub delta: f64,
    pub gamma: f64,
    pub kappa: f64,
    pub t0: f64,
    pub init_buffer: c_uint,
    pub term_buffer: c_uint,
    pub window: c_uint,
    pub save_warmup: bool,
    pub stepsize: f64,
    pub stepsize_jitter: f64,
    pub max_depth: c_int,
    pub refresh: c_int,
    pub num_threads: c_int,
    /// Draws buffer; its length is passed as the buffer size.
    pub out: &'a mut [f64],
    /// Adapted metric per chain, or null.
    pub metric_out: Option<&'a mut [f64]>,
}

/// Arguments of `tinystan_pathfinder`.
#[derive(Debug)]
pub struct PathfinderCall<'a> {
    pub num_paths: usize,
    pub inits: Option<&'a CStr>,
    pub seed: c_uint,
    pub id: c_uint,
    pub init_radius: f64,
    pub num_draws: c_int,
    pub max_history_size: c_int,
    pub init_alpha: f64,
    pub tol_obj: f64,
    pub tol_rel_obj: f64,
    pub tol_grad: f64,
    pub tol_rel_grad: f64,
    pub tol_param: f64,
    pub num_iterations: c_int,
    pub num_elbo_draws: c_int,
    pub num_multi_draws: c_int,
    pub calculate_lp: bool,
    pub psis_resample: bool,
    pub refresh: c_int,
    pub num_threads: c_int,
    pub out: &'a mut [f64],
}

/// Arguments of `tinystan_optimize`.
#[derive(Debug)]
pub struct OptimizeCall<'a> {
    pub inits: Option<&'a CStr>,
    pub seed: c_uint,
    pub id: c_uint,
    pub init_radius: f64,
    pub algorithm: OptimizationAlgorithm,
    pub num_iterations: c_int,
    pub jacobian: bool,
    pub max_history_size: c_int,
    pub init_alpha: f64,
    pub tol_obj: f64,
    pub tol_rel_obj: f64,
    pub tol_grad: f64,
    pub tol_rel_grad: f64,
    pub tol_param: f64,
    pub refresh: c_int,
    pub num_threads: c_int,
    pub out: &'a mut [f64],
}

/// Arguments of `tinystan_laplace_sample`.
///
/// At most one of `theta_hat` and `theta_json` is set; with neither, the
/// engine reports the missing mode itself.
#[derive(Debug)]
pub struct LaplaceCall<'a> {
    pub theta_hat: Option<&'a [f64]>,
    pub theta_json: Option<&'a CStr>,
    pub seed: c_uint,
    pub num_draws: c_int,
    pub jacobian: bool,
    pub calculate_lp: bool,
    pub refresh: c_int,
    pub num_threads: c_int,
    pub out: &'a mut [f64],
    pub hessian_out: Option<&'a mut [f64]>,
}
