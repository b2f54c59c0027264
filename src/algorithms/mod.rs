//! algorithms — the four inference entry points of a
//! [`Model`](crate::model::Model).
//!
//! Purpose
//! -------
//! Implement `sample`, `pathfinder`, `optimize`, and `laplace_sample` as
//! inherent methods on `Model`, each with an options struct carrying the
//! engine's defaults.
//!
//! Key behaviors
//! -------------
//! Every invoker follows the same sequence:
//! 1. Validate the counts that size the output buffer, and check that
//!    every count fits the native `int` it is passed as.
//! 2. Resolve the seed ([`resolve_seed`]).
//! 3. Acquire a [`ModelSession`](crate::session::ModelSession).
//! 4. Resolve column names and allocate the output buffer.
//! 5. Encode inits (or the Laplace mode).
//! 6. Make exactly one native call and pass its status to the error bridge.
//! 7. Wrap the buffer and names into a [`StanOutput`](crate::StanOutput).
//!
//! Invariants & assumptions
//! ------------------------
//! - Any error raised in steps 1–5 means the native algorithm was not
//!   called. Steps 3–7 run inside the session, which is released on every
//!   exit path.
//! - No partial output is returned after a failure.
//!
//! Downstream usage
//! ----------------
//! - Options are built with struct-update syntax:
//!   `SampleOptions { num_chains: 2, ..Default::default() }`.

pub mod laplace;
pub mod optimize;
pub mod pathfinder;
pub mod sample;

use std::os::raw::c_int;

use crate::errors::{StanError, StanResult};

pub use laplace::{LaplaceMode, LaplaceOptions};
pub use optimize::OptimizeOptions;
pub use pathfinder::PathfinderOptions;
pub use sample::SampleOptions;

/// Seed for one run: the caller's seed if given (including `0`), a fresh
/// random one otherwise.
pub fn resolve_seed(seed: Option<u32>) -> u32 {
    seed.unwrap_or_else(rand::random::<u32>)
}

/// Convert a count to the native `int` argument type.
pub(crate) fn to_c_int(name: &'static str, value: usize) -> StanResult<c_int> {
    c_int::try_from(value).map_err(|_| StanError::CountOutOfRange { name, value })
}

/// Reject a zero count that sizes an output buffer.
pub(crate) fn require_positive(name: &'static str, value: usize) -> StanResult<usize> {
    if value == 0 {
        return Err(StanError::NonPositiveCount { name, value });
    }
    Ok(value)
}
