//! native::bridge — translation of native status codes into `StanError`.
//!
//! Purpose
//! -------
//! Turn the `(return code, error slot)` pair produced by every native call
//! into a [`StanResult`], and release the native error object on the way.
//!
//! Key behaviors
//! -------------
//! - [`check`]: status `0` is success; any other status becomes
//!   [`StanError::Native`] when the slot holds an error object, and
//!   [`StanError::UnknownNative`] when it does not.
//! - [`check_construction`]: the constructor reports failure through a null
//!   handle rather than a status; failures become
//!   [`StanError::Construction`].
//! - Message and category are copied out *before* the error object is
//!   freed, and the object is freed exactly once: the slot is consumed, so
//!   no caller can read it again.
//!
//! Invariants & assumptions
//! ------------------------
//! - Callers never inspect error objects themselves; every native call is
//!   followed by exactly one call into this module.

use std::os::raw::c_int;

use crate::errors::{ErrorCategory, StanError, StanResult};
use crate::native::{Engine, ErrorSlot};

/// Status reported for a constructor that returned a null handle.
const CONSTRUCTION_FAILED: c_int = 1;

/// Read category and message from the slot's error object, then free it.
fn drain<E: Engine + ?Sized>(
    engine: &E, mut slot: ErrorSlot,
) -> Option<(ErrorCategory, String)> {
    let err = slot.take()?;
    let message = engine.error_message(&err);
    let category = ErrorCategory::from_code(engine.error_type(&err));
    engine.free_error(err);
    Some((category, message))
}

/// Check the status of an algorithm call.
///
/// # Errors
/// - [`StanError::Native`] with the engine's category and message.
/// - [`StanError::UnknownNative`] if the engine failed without an error
///   object.
pub fn check<E: Engine + ?Sized>(
    engine: &E, return_code: c_int, slot: ErrorSlot,
) -> StanResult<()> {
    if return_code == 0 {
        return Ok(());
    }
    match drain(engine, slot) {
        Some((category, message)) => {
            tracing::debug!(return_code, %category, "native call failed");
            Err(StanError::Native { category, message })
        }
        None => Err(StanError::UnknownNative { code: return_code }),
    }
}

/// Convert a failed model construction into an error.
///
/// # Errors
/// - [`StanError::Construction`] with the engine's category and message.
/// - [`StanError::UnknownNative`] (code 1) if no error object was stored.
pub fn check_construction<E: Engine + ?Sized>(engine: &E, slot: ErrorSlot) -> StanError {
    match drain(engine, slot) {
        Some((category, message)) => StanError::Construction { category, message },
        None => StanError::UnknownNative { code: CONSTRUCTION_FAILED },
    }
}
