//! algorithms::sample — HMC sampling with NUTS.
//!
//! Purpose
//! -------
//! Run `num_chains` chains of the engine's adaptive HMC sampler and return
//! every draw, labelled with the sampler diagnostics and the model's
//! parameter names.
//!
//! Key behaviors
//! -------------
//! - Output shape is `(num_chains, num_warmup·save_warmup + num_samples,
//!   7 + model names)`.
//! - An initial inverse metric shaped for one chain is repeated for every
//!   chain; one already shaped `(num_chains, …)` is passed unchanged; any
//!   other shape is rejected before the native call.
//! - With `save_metric`, the adapted metric of each chain is returned in
//!   [`StanOutput::metric`], shaped `(num_chains, P)` or
//!   `(num_chains, P, P)` for a dense metric.
//!
//! Invariants & assumptions
//! ------------------------
//! - `num_chains ≥ 1` and `num_samples ≥ 1` are checked before a model
//!   instance is constructed.
//! - A model with no free parameters is rejected inside the session,
//!   before the native sampler runs.

use ndarray::{ArrayD, IxDyn};

use crate::algorithms::{require_positive, resolve_seed, to_c_int};
use crate::buffer::{sample_shape, OutputBuffer};
use crate::errors::{StanError, StanResult};
use crate::inits::{encode_inits, Inits, StanData};
use crate::model::Model;
use crate::names::{self, HMC_SAMPLER_VARIABLES};
use crate::native::{bridge, Engine, ErrorSlot, HmcMetric, SampleCall};
use crate::output::StanOutput;

/// SampleOptions — arguments of [`Model::sample`].
///
/// Fields
/// ------
/// Run layout:
/// - `num_chains` (4), `num_warmup` (1000), `num_samples` (1000),
///   `save_warmup` (false).
/// - `inits`: initial values, `None` for the engine's random inits.
/// - `seed`: `None` draws a fresh random seed. `id` (1): chain id offset.
/// - `init_radius` (2.0): range of random initial values.
///
/// Metric and adaptation:
/// - `metric` (Diagonal), `init_inv_metric` (none), `save_metric` (false).
/// - `adapt` (true), `delta` (0.8), `gamma` (0.05), `kappa` (0.75),
///   `t0` (10), `init_buffer` (75), `term_buffer` (50), `window` (25).
///
/// Integrator:
/// - `stepsize` (1.0), `stepsize_jitter` (0.0), `max_depth` (10).
///
/// Engine:
/// - `refresh` (0, no progress output), `num_threads` (-1, all cores).
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOptions {
    pub num_chains: usize,
    pub inits: Option<Inits>,
    pub seed: Option<u32>,
    pub id: u32,
    pub init_radius: f64,
    pub num_warmup: usize,
    pub num_samples: usize,
    pub metric: HmcMetric,
    pub init_inv_metric: Option<ArrayD<f64>>,
    pub save_metric: bool,
    pub adapt: bool,
    pub delta: f64,
    pub gamma: f64,
    pub kappa: f64,
    pub t0: f64,
    pub init_buffer: u32,
    pub term_buffer: u32,
    pub window: u32,
    pub save_warmup: bool,
    pub stepsize: f64,
    pub stepsize_jitter: f64,
    pub max_depth: usize,
    pub refresh: usize,
    pub num_threads: i32,
}

impl Default for SampleOptions {
    fn default() -> Self {
        SampleOptions {
            num_chains: 4,
            inits: None,
            seed: None,
            id: 1,
            init_radius: 2.0,
            num_warmup: 1000,
            num_samples: 1000,
            metric: HmcMetric::Diagonal,
            init_inv_metric: None,
            save_metric: false,
            adapt: true,
            delta: 0.8,
            gamma: 0.05,
            kappa: 0.75,
            t0: 10.0,
            init_buffer: 75,
            term_buffer: 50,
            window: 25,
            save_warmup: false,
            stepsize: 1.0,
            stepsize_jitter: 0.0,
            max_depth: 10,
            refresh: 0,
            num_threads: -1,
        }
    }
}

/// Flatten an initial inverse metric into the `(num_chains, …)` layout.
///
/// # Errors
/// - [`StanError::MetricShapeMismatch`] for any shape other than
///   `per_chain` or `(num_chains, per_chain…)`.
fn broadcast_metric(
    init: &ArrayD<f64>, num_chains: usize, per_chain: &[usize],
) -> StanResult<Vec<f64>> {
    let mut all_chains = Vec::with_capacity(per_chain.len() + 1);
    all_chains.push(num_chains);
    all_chains.extend_from_slice(per_chain);

    if init.shape() == per_chain {
        let repeated = init.broadcast(IxDyn(&all_chains)).ok_or_else(|| {
            StanError::MetricShapeMismatch {
                expected: all_chains.clone(),
                expected_per_chain: per_chain.to_vec(),
                found: init.shape().to_vec(),
            }
        })?;
        return Ok(repeated.iter().copied().collect());
    }
    if init.shape() == all_chains.as_slice() {
        return Ok(init.iter().copied().collect());
    }
    Err(StanError::MetricShapeMismatch {
        expected: all_chains,
        expected_per_chain: per_chain.to_vec(),
        found: init.shape().to_vec(),
    })
}

impl<E: Engine> Model<E> {
    /// Draw from the posterior with adaptive HMC.
    ///
    /// Parameters
    /// ----------
    /// - `data`: model data (JSON text, path, or value).
    /// - `options`: see [`SampleOptions`].
    ///
    /// Returns
    /// -------
    /// - A [`StanOutput`] of shape `(num_chains, draws, names)`, with the
    ///   adapted metric attached when `save_metric` is set.
    ///
    /// # Errors
    /// - Caller-side: `NonPositiveCount`, `CountOutOfRange`, `NoParameters`,
    ///   `MetricShapeMismatch`, `InvalidInput`, `UnreadablePath`.
    /// - Engine-side: `Construction`, `Native`, `UnknownNative`.
    pub fn sample(&self, data: &StanData, options: &SampleOptions) -> StanResult<StanOutput> {
        // These counts size the output buffer.
        let num_chains = require_positive("num_chains", options.num_chains)?;
        let num_samples = require_positive("num_samples", options.num_samples)?;
        let num_warmup_c = to_c_int("num_warmup", options.num_warmup)?;
        let num_samples_c = to_c_int("num_samples", num_samples)?;
        let max_depth = to_c_int("max_depth", options.max_depth)?;
        let refresh = to_c_int("refresh", options.refresh)?;

        let seed = resolve_seed(options.seed);
        let session = self.session(data, seed)?;
        let free_params = session.num_free_params();
        if free_params == 0 {
            return Err(StanError::NoParameters);
        }

        let param_names = names::resolve(&HMC_SAMPLER_VARIABLES, &session);
        let shape = sample_shape(
            num_chains,
            options.num_warmup,
            num_samples,
            options.save_warmup,
            param_names.len(),
        )?;
        let mut out = OutputBuffer::zeros(&shape)?;

        let per_chain = options.metric.shape(free_params);
        let init_inv_metric = options
            .init_inv_metric
            .as_ref()
            .map(|init| broadcast_metric(init, num_chains, &per_chain))
            .transpose()?;
        let mut metric_out = if options.save_metric {
            let mut metric_shape = vec![num_chains];
            metric_shape.extend_from_slice(&per_chain);
            Some(OutputBuffer::zeros(&metric_shape)?)
        } else {
            None
        };

        let inits = encode_inits(options.inits.as_ref(), num_chains, seed, self.separator())?;

        tracing::debug!(num_chains, out_len = out.len(), seed, "invoking native sampler");
        let call = SampleCall {
            num_chains,
            inits: inits.as_deref(),
            seed,
            id: options.id,
            init_radius: options.init_radius,
            num_warmup: num_warmup_c,
            num_samples: num_samples_c,
            metric: options.metric,
            init_inv_metric: init_inv_metric.as_deref(),
            adapt: options.adapt,
            delta: options.delta,
            gamma: options.gamma,
            kappa: options.kappa,
            t0: options.t0,
            init_buffer: options.init_buffer,
            term_buffer: options.term_buffer,
            window: options.window,
            save_warmup: options.save_warmup,
            stepsize: options.stepsize,
            stepsize_jitter: options.stepsize_jitter,
            max_depth,
            refresh,
            num_threads: options.num_threads,
            out: out.as_mut_slice(),
            metric_out: metric_out.as_mut().map(OutputBuffer::as_mut_slice),
        };
        let mut err = ErrorSlot::new();
        let return_code = self.engine().sample(session.handle(), call, &mut err);
        bridge::check(self.engine(), return_code, err)?;
        drop(session);

        let output = StanOutput::new(param_names, out.into_array()?);
        match metric_out {
            Some(metric) => Ok(output.with_metric(metric.into_array()?)),
            None => Ok(output),
        }
    }
}
