//! algorithms::optimize — posterior mode (or MLE) by optimization.
//!
//! The result is a single vector: `lp__` followed by one value per model
//! name. A model without free parameters is passed to the engine, which
//! decides what to report for it.

use crate::algorithms::{resolve_seed, to_c_int};
use crate::buffer::{optimize_shape, OutputBuffer};
use crate::errors::StanResult;
use crate::inits::{encode_inits, Inits, StanData};
use crate::model::Model;
use crate::names::{self, OPTIMIZE_VARIABLES};
use crate::native::{bridge, Engine, ErrorSlot, OptimizationAlgorithm, OptimizeCall};
use crate::output::StanOutput;

/// OptimizeOptions — arguments of [`Model::optimize`].
///
/// Defaults: `id` 1, `init_radius` 2.0, `algorithm` L-BFGS, `jacobian` off,
/// `num_iterations` 2000, `max_history_size` 5, `init_alpha` 0.001,
/// `tol_obj` 1e-12, `tol_rel_obj` 1e4, `tol_grad` 1e-8, `tol_rel_grad` 1e7,
/// `tol_param` 1e-8, `refresh` 0, `num_threads` -1.
///
/// Notes
/// -----
/// - `jacobian = true` finds the mode of the posterior on the unconstrained
///   scale (as used by Laplace sampling); `false` gives the MAP/MLE.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOptions {
    pub inits: Option<Inits>,
    pub seed: Option<u32>,
    pub id: u32,
    pub init_radius: f64,
    pub algorithm: OptimizationAlgorithm,
    pub jacobian: bool,
    pub num_iterations: usize,
    pub max_history_size: usize,
    pub init_alpha: f64,
    pub tol_obj: f64,
    pub tol_rel_obj: f64,
    pub tol_grad: f64,
    pub tol_rel_grad: f64,
    pub tol_param: f64,
    pub refresh: usize,
    pub num_threads: i32,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            inits: None,
            seed: None,
            id: 1,
            init_radius: 2.0,
            algorithm: OptimizationAlgorithm::Lbfgs,
            jacobian: false,
            num_iterations: 2000,
            max_history_size: 5,
            init_alpha: 0.001,
            tol_obj: 1e-12,
            tol_rel_obj: 1e4,
            tol_grad: 1e-8,
            tol_rel_grad: 1e7,
            tol_param: 1e-8,
            refresh: 0,
            num_threads: -1,
        }
    }
}

impl<E: Engine> Model<E> {
    /// Find a mode of the model.
    ///
    /// # Errors
    /// - `CountOutOfRange`, `InvalidInput`, `UnreadablePath`.
    /// - Engine-side: `Construction`, `Native`, `UnknownNative`.
    pub fn optimize(&self, data: &StanData, options: &OptimizeOptions) -> StanResult<StanOutput> {
        let num_iterations = to_c_int("num_iterations", options.num_iterations)?;
        let max_history_size = to_c_int("max_history_size", options.max_history_size)?;
        let refresh = to_c_int("refresh", options.refresh)?;

        let seed = resolve_seed(options.seed);
        let session = self.session(data, seed)?;
        let param_names = names::resolve(&OPTIMIZE_VARIABLES, &session);
        let mut out = OutputBuffer::zeros(&optimize_shape(param_names.len()))?;
        let inits = encode_inits(options.inits.as_ref(), 1, seed, self.separator())?;

        tracing::debug!(
            algorithm = ?options.algorithm,
            out_len = out.len(),
            seed,
            "invoking native optimizer"
        );
        let call = OptimizeCall {
            inits: inits.as_deref(),
            seed,
            id: options.id,
            init_radius: options.init_radius,
            algorithm: options.algorithm,
            num_iterations,
            jacobian: options.jacobian,
            max_history_size,
            init_alpha: options.init_alpha,
            tol_obj: options.tol_obj,
            tol_rel_obj: options.tol_rel_obj,
            tol_grad: options.tol_grad,
            tol_rel_grad: options.tol_rel_grad,
            tol_param: options.tol_param,
            refresh,
            num_threads: options.num_threads,
            out: out.as_mut_slice(),
        };
        let mut err = ErrorSlot::new();
        let return_code = self.engine().optimize(session.handle(), call, &mut err);
        bridge::check(self.engine(), return_code, err)?;
        drop(session);

        Ok(StanOutput::new(param_names, out.into_array()?))
    }
}
