//! session — scoped ownership of one native model instance.
//!
//! Purpose
//! -------
//! Bracket every algorithm call with exactly one constructor call and
//! exactly one destructor call on the native model, whichever way the
//! call exits.
//!
//! Key behaviors
//! -------------
//! - [`ModelSession::acquire`] constructs the native model from serialized
//!   data and a seed. Failure goes through the error bridge and leaves no
//!   handle behind, so nothing is destroyed.
//! - `Drop` destroys the handle. Normal return, `?` propagation of a
//!   validation or native error, and panic unwinding all run it.
//! - The free-parameter count is queried once at acquisition and cached.
//!
//! Invariants & assumptions
//! ------------------------
//! - A session never outlives the engine it borrows (`'e`).
//! - The handle is private; invokers borrow it for the duration of one
//!   native call and cannot move it out.
//!
//! Testing notes
//! -------------
//! - Unit tests drive the mock engine and assert that its construct and
//!   destroy counters stay paired across success, construction failure,
//!   early returns, and unwinding.

use std::ffi::CStr;
use std::ptr::NonNull;

use crate::errors::StanResult;
use crate::native::{bridge, Engine, ErrorSlot, ModelPtr};

/// ModelSession — guard over a live native model handle.
///
/// Fields
/// ------
/// - `engine`: the library that created the handle and will destroy it.
/// - `handle`: exclusively owned model handle.
/// - `free_params`: number of unconstrained parameters of the instance.
pub struct ModelSession<'e, E: Engine + ?Sized> {
    engine: &'e E,
    handle: ModelPtr,
    free_params: usize,
}

impl<'e, E: Engine + ?Sized> ModelSession<'e, E> {
    /// Construct a native model instance.
    ///
    /// # Errors
    /// - [`StanError::Construction`](crate::errors::StanError::Construction)
    ///   with the engine's message, or
    ///   [`StanError::UnknownNative`](crate::errors::StanError::UnknownNative)
    ///   if the constructor failed without an error object.
    pub fn acquire(engine: &'e E, data: &CStr, seed: u32) -> StanResult<ModelSession<'e, E>> {
        let mut err = ErrorSlot::new();
        let handle = match engine.create_model(data, seed, &mut err) {
            Some(handle) => handle,
            None => return Err(bridge::check_construction(engine, err)),
        };
        let free_params = engine.num_free_params(&handle);
        tracing::trace!(seed, free_params, "model session acquired");
        Ok(ModelSession { engine, handle, free_params })
    }

    pub fn handle(&self) -> &ModelPtr {
        &self.handle
    }

    pub fn engine(&self) -> &'e E {
        self.engine
    }

    pub fn num_free_params(&self) -> usize {
        self.free_params
    }

    /// Raw comma-separated parameter names reported by the instance.
    pub fn param_names(&self) -> String {
        self.engine.param_names(&self.handle)
    }
}

impl<E: Engine + ?Sized> Drop for ModelSession<'_, E> {
    fn drop(&mut self) {
        // The placeholder is never passed to the engine.
        let handle = std::mem::replace(&mut self.handle, ModelPtr::new(NonNull::dangling()));
        self.engine.destroy_model(handle);
        tracing::trace!("model session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, StanError};
    use crate::native::mock::MockEngine;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Pairing of constructor and destructor calls on every exit path.
    // - Translation of constructor failures.
    //
    // They intentionally DO NOT cover:
    // - Invoker behaviour inside a session (see `algorithms`).
    // -------------------------------------------------------------------------

    fn data() -> &'static CStr {
        c"{}"
    }

    #[test]
    // Purpose
    // -------
    // Verify that repeated sessions leave construct/destroy balanced.
    //
    // Given
    // -----
    // - 1000 sequential acquire/drop cycles.
    //
    // Expect
    // ------
    // - 1000 models created, 1000 destroyed.
    fn thousand_sessions_balance_construct_and_destroy() {
        // Arrange
        let engine = MockEngine::new("mu", 1);

        // Act
        for seed in 0..1000 {
            let session = ModelSession::acquire(&engine, data(), seed).unwrap();
            assert_eq!(session.num_free_params(), 1);
        }

        // Assert
        let counters = engine.counters();
        assert_eq!(counters.models_created, 1000);
        assert_eq!(counters.models_destroyed, 1000);
    }

    #[test]
    // Purpose
    // -------
    // Ensure a failed construction reports the engine's message and never
    // calls the destructor.
    //
    // Given
    // -----
    // - A mock whose constructor fails with a runtime error.
    //
    // Expect
    // ------
    // - `Construction { Runtime, .. }`, zero destroys, the error freed.
    fn construction_failure_skips_destroy() {
        // Arrange
        let engine = MockEngine::new("mu", 1);
        engine.fail_construction(Some((0, "variable y not found")));

        // Act
        let result = ModelSession::acquire(&engine, data(), 3);

        // Assert
        match result {
            Err(StanError::Construction { category, message }) => {
                assert_eq!(category, ErrorCategory::Runtime);
                assert_eq!(message, "variable y not found");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("construction should have failed"),
        }
        let counters = engine.counters();
        assert_eq!(counters.models_destroyed, 0);
        assert_eq!(counters.errors_freed, counters.errors_created);
    }

    #[test]
    // Purpose
    // -------
    // Verify a constructor failure without an error object maps to code 1.
    //
    // Given
    // -----
    // - A mock whose constructor returns null and stores nothing.
    //
    // Expect
    // ------
    // - `UnknownNative { code: 1 }`.
    fn construction_failure_without_error_is_unknown() {
        let engine = MockEngine::new("mu", 1);
        engine.fail_construction(None);

        let err = ModelSession::acquire(&engine, data(), 3).err();

        assert_eq!(err, Some(StanError::UnknownNative { code: 1 }));
    }

    #[test]
    // Purpose
    // -------
    // Ensure early returns and panics inside a session still release it.
    //
    // Given
    // -----
    // - A helper that returns an error through `?` while holding a
    //   session, and a closure that panics while holding one.
    //
    // Expect
    // ------
    // - Both sessions are destroyed.
    fn session_released_on_early_return_and_unwind() {
        // Arrange
        let engine = MockEngine::new("mu", 1);
        fn failing(engine: &MockEngine) -> StanResult<()> {
            let _session = ModelSession::acquire(engine, data(), 1)?;
            Err(StanError::NoParameters)
        }

        // Act
        let early = failing(&engine);
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = ModelSession::acquire(&engine, data(), 2).unwrap();
            panic!("boom");
        }));

        // Assert
        assert_eq!(early, Err(StanError::NoParameters));
        assert!(unwound.is_err());
        assert_eq!(engine.counters().models_created, 2);
        assert_eq!(engine.counters().models_destroyed, 2);
    }
}
