//! algorithms::pathfinder — Pathfinder variational inference.
//!
//! Runs `num_paths` single-path Pathfinders and, by default, combines them
//! with PSIS resampling into `num_multi_draws` draws. Without resampling
//! (or without log densities, which resampling needs) every draw of every
//! path is returned, `num_draws · num_paths` rows in total.

use crate::algorithms::{require_positive, resolve_seed, to_c_int};
use crate::buffer::{pathfinder_shape, OutputBuffer};
use crate::errors::{StanError, StanResult};
use crate::inits::{encode_inits, Inits, StanData};
use crate::model::Model;
use crate::names::{self, PATHFINDER_VARIABLES};
use crate::native::{bridge, Engine, ErrorSlot, PathfinderCall};
use crate::output::StanOutput;

/// PathfinderOptions — arguments of [`Model::pathfinder`].
///
/// Defaults: `num_paths` 4, `id` 1, `init_radius` 2.0, `num_draws` 1000,
/// `max_history_size` 5, `init_alpha` 0.001, `tol_obj` 1e-12,
/// `tol_rel_obj` 1e4, `tol_grad` 1e-8, `tol_rel_grad` 1e7, `tol_param` 1e-8,
/// `num_iterations` 1000, `num_elbo_draws` 100, `num_multi_draws` 1000,
/// `calculate_lp` and `psis_resample` on, `refresh` 0, `num_threads` -1.
#[derive(Debug, Clone, PartialEq)]
pub struct PathfinderOptions {
    pub num_paths: usize,
    pub inits: Option<Inits>,
    pub seed: Option<u32>,
    pub id: u32,
    pub init_radius: f64,
    pub num_draws: usize,
    pub max_history_size: usize,
    pub init_alpha: f64,
    pub tol_obj: f64,
    pub tol_rel_obj: f64,
    pub tol_grad: f64,
    pub tol_rel_grad: f64,
    pub tol_param: f64,
    pub num_iterations: usize,
    pub num_elbo_draws: usize,
    pub num_multi_draws: usize,
    pub calculate_lp: bool,
    pub psis_resample: bool,
    pub refresh: usize,
    pub num_threads: i32,
}

impl Default for PathfinderOptions {
    fn default() -> Self {
        PathfinderOptions {
            num_paths: 4,
            inits: None,
            seed: None,
            id: 1,
            init_radius: 2.0,
            num_draws: 1000,
            max_history_size: 5,
            init_alpha: 0.001,
            tol_obj: 1e-12,
            tol_rel_obj: 1e4,
            tol_grad: 1e-8,
            tol_rel_grad: 1e7,
            tol_param: 1e-8,
            num_iterations: 1000,
            num_elbo_draws: 100,
            num_multi_draws: 1000,
            calculate_lp: true,
            psis_resample: true,
            refresh: 0,
            num_threads: -1,
        }
    }
}

impl<E: Engine> Model<E> {
    /// Approximate the posterior with Pathfinder.
    ///
    /// # Errors
    /// - `NonPositiveCount` for a zero `num_draws`, `num_paths`, or
    ///   `num_multi_draws`; `CountOutOfRange`; `NoParameters`.
    /// - Engine-side: `Construction`, `Native`, `UnknownNative`.
    pub fn pathfinder(
        &self, data: &StanData, options: &PathfinderOptions,
    ) -> StanResult<StanOutput> {
        let num_draws = require_positive("num_draws", options.num_draws)?;
        let num_paths = require_positive("num_paths", options.num_paths)?;
        let num_multi_draws = require_positive("num_multi_draws", options.num_multi_draws)?;
        let num_draws_c = to_c_int("num_draws", num_draws)?;
        let num_multi_draws_c = to_c_int("num_multi_draws", num_multi_draws)?;
        let max_history_size = to_c_int("max_history_size", options.max_history_size)?;
        let num_iterations = to_c_int("num_iterations", options.num_iterations)?;
        let num_elbo_draws = to_c_int("num_elbo_draws", options.num_elbo_draws)?;
        let refresh = to_c_int("refresh", options.refresh)?;

        let seed = resolve_seed(options.seed);
        let session = self.session(data, seed)?;
        if session.num_free_params() == 0 {
            return Err(StanError::NoParameters);
        }

        let param_names = names::resolve(&PATHFINDER_VARIABLES, &session);
        let shape = pathfinder_shape(
            num_draws,
            num_paths,
            num_multi_draws,
            options.calculate_lp,
            options.psis_resample,
            param_names.len(),
        )?;
        let mut out = OutputBuffer::zeros(&shape)?;
        let inits = encode_inits(options.inits.as_ref(), num_paths, seed, self.separator())?;

        tracing::debug!(num_paths, out_len = out.len(), seed, "invoking native pathfinder");
        let call = PathfinderCall {
            num_paths,
            inits: inits.as_deref(),
            seed,
            id: options.id,
            init_radius: options.init_radius,
            num_draws: num_draws_c,
            max_history_size,
            init_alpha: options.init_alpha,
            tol_obj: options.tol_obj,
            tol_rel_obj: options.tol_rel_obj,
            tol_grad: options.tol_grad,
            tol_rel_grad: options.tol_rel_grad,
            tol_param: options.tol_param,
            num_iterations,
            num_elbo_draws,
            num_multi_draws: num_multi_draws_c,
            calculate_lp: options.calculate_lp,
            psis_resample: options.psis_resample,
            refresh,
            num_threads: options.num_threads,
            out: out.as_mut_slice(),
        };
        let mut err = ErrorSlot::new();
        let return_code = self.engine().pathfinder(session.handle(), call, &mut err);
        bridge::check(self.engine(), return_code, err)?;
        drop(session);

        Ok(StanOutput::new(param_names, out.into_array()?))
    }
}
