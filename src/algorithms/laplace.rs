//! algorithms::laplace — sampling from a Laplace approximation at a mode.
//!
//! Purpose
//! -------
//! Draw from the normal approximation of the posterior centred at a
//! previously found mode, optionally returning the Hessian at that mode.
//!
//! Key behaviors
//! -------------
//! - The mode is given as a numeric vector of constrained values, as a
//!   JSON document, or as the result of a previous optimization.
//! - A previous result must be a single vector. Its leading diagnostic
//!   columns (`lp__`) are dropped before it is used as the mode.
//! - A numeric mode must hold exactly one value per model name; this is
//!   checked inside the session, before the native call.
//!
//! Conventions
//! -----------
//! - Output shape is `(num_draws, 2 + model names)`, labelled
//!   `log_p__, log_q__, …`. The Hessian is `(P, P)` over free parameters.

use std::ffi::CString;

use ndarray::{Array1, Ix2};

use crate::algorithms::{require_positive, resolve_seed, to_c_int};
use crate::buffer::{laplace_shape, OutputBuffer};
use crate::errors::{StanError, StanResult};
use crate::inits::StanData;
use crate::model::Model;
use crate::names::{self, LAPLACE_VARIABLES};
use crate::native::{bridge, Engine, ErrorSlot, LaplaceCall};
use crate::output::StanOutput;

/// LaplaceMode — where the approximation is centred.
#[derive(Debug, Clone, PartialEq)]
pub enum LaplaceMode {
    /// Constrained parameter values, one per model name.
    Vector(Array1<f64>),
    /// A JSON document (text, path, or value) with the parameter values.
    Data(StanData),
    /// The result of [`Model::optimize`].
    Prior(StanOutput),
}

impl From<Array1<f64>> for LaplaceMode {
    fn from(mode: Array1<f64>) -> Self {
        LaplaceMode::Vector(mode)
    }
}

impl From<StanData> for LaplaceMode {
    fn from(data: StanData) -> Self {
        LaplaceMode::Data(data)
    }
}

impl From<StanOutput> for LaplaceMode {
    fn from(output: StanOutput) -> Self {
        LaplaceMode::Prior(output)
    }
}

/// The mode in the form the engine takes it.
enum ResolvedMode {
    Vector(Vec<f64>),
    Json(CString),
}

impl LaplaceMode {
    fn resolve(&self) -> StanResult<ResolvedMode> {
        match self {
            LaplaceMode::Vector(values) => Ok(ResolvedMode::Vector(values.to_vec())),
            LaplaceMode::Data(data) => Ok(ResolvedMode::Json(data.to_cstring()?)),
            LaplaceMode::Prior(output) => {
                let ndim = output.data().ndim();
                if ndim != 1 {
                    return Err(StanError::ModeNotSingleVector { ndim });
                }
                let diagnostics =
                    output.parameters().iter().take_while(|name| name.ends_with("__")).count();
                Ok(ResolvedMode::Vector(output.data().iter().skip(diagnostics).copied().collect()))
            }
        }
    }
}

/// LaplaceOptions — arguments of [`Model::laplace_sample`].
///
/// Defaults: `num_draws` 1000, `jacobian` on, `calculate_lp` on,
/// `save_hessian` off, random seed, `refresh` 0, `num_threads` -1.
#[derive(Debug, Clone, PartialEq)]
pub struct LaplaceOptions {
    pub num_draws: usize,
    pub jacobian: bool,
    pub calculate_lp: bool,
    pub save_hessian: bool,
    pub seed: Option<u32>,
    pub refresh: usize,
    pub num_threads: i32,
}

impl Default for LaplaceOptions {
    fn default() -> Self {
        LaplaceOptions {
            num_draws: 1000,
            jacobian: true,
            calculate_lp: true,
            save_hessian: false,
            seed: None,
            refresh: 0,
            num_threads: -1,
        }
    }
}

impl<E: Engine> Model<E> {
    /// Sample from the Laplace approximation at `mode`.
    ///
    /// # Errors
    /// - `NonPositiveCount` for `num_draws = 0`; `CountOutOfRange`.
    /// - `ModeNotSingleVector` if `mode` is a multi-dimensional result.
    /// - `ModeLengthMismatch` if a numeric mode has the wrong length.
    /// - Engine-side: `Construction`, `Native`, `UnknownNative`.
    pub fn laplace_sample(
        &self, mode: &LaplaceMode, data: &StanData, options: &LaplaceOptions,
    ) -> StanResult<StanOutput> {
        let num_draws = require_positive("num_draws", options.num_draws)?;
        let num_draws_c = to_c_int("num_draws", num_draws)?;
        let refresh = to_c_int("refresh", options.refresh)?;

        let seed = resolve_seed(options.seed);
        let mode = mode.resolve()?;

        let session = self.session(data, seed)?;
        let param_names = names::resolve(&LAPLACE_VARIABLES, &session);
        let expected = param_names.len() - LAPLACE_VARIABLES.len();
        if let ResolvedMode::Vector(values) = &mode {
            if values.len() != expected {
                return Err(StanError::ModeLengthMismatch { expected, found: values.len() });
            }
        }

        let mut out = OutputBuffer::zeros(&laplace_shape(num_draws, param_names.len()))?;
        let free_params = session.num_free_params();
        let mut hessian_out = if options.save_hessian {
            Some(OutputBuffer::zeros(&[free_params, free_params])?)
        } else {
            None
        };

        let (theta_hat, theta_json) = match &mode {
            ResolvedMode::Vector(values) => (Some(values.as_slice()), None),
            ResolvedMode::Json(json) => (None, Some(json.as_c_str())),
        };

        tracing::debug!(num_draws, out_len = out.len(), seed, "invoking native laplace sampler");
        let call = LaplaceCall {
            theta_hat,
            theta_json,
            seed,
            num_draws: num_draws_c,
            jacobian: options.jacobian,
            calculate_lp: options.calculate_lp,
            refresh,
            num_threads: options.num_threads,
            out: out.as_mut_slice(),
            hessian_out: hessian_out.as_mut().map(OutputBuffer::as_mut_slice),
        };
        let mut err = ErrorSlot::new();
        let return_code = self.engine().laplace_sample(session.handle(), call, &mut err);
        bridge::check(self.engine(), return_code, err)?;
        drop(session);

        let output = StanOutput::new(param_names, out.into_array()?);
        match hessian_out {
            Some(hessian) => {
                let hessian = hessian
                    .into_array()?
                    .into_dimensionality::<Ix2>()
                    .map_err(|err| StanError::InvalidInput { reason: err.to_string() })?;
                Ok(output.with_hessian(hessian))
            }
            None => Ok(output),
        }
    }
}
