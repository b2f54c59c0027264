//! native — the call surface of a compiled TinyStan model library.
//!
//! Purpose
//! -------
//! Describe, in one place, everything the binding layer needs from the
//! native engine: model construction and destruction, name/size queries,
//! the four algorithm entry points, error-object accessors, the separator
//! character, the API version, and print-callback registration.
//!
//! Key behaviors
//! -------------
//! - Define the opaque handle types [`ModelPtr`] and [`ErrorPtr`] and the
//!   out-parameter [`ErrorSlot`] the engine writes error objects into.
//! - Define the [`Engine`] trait, the seam between the safe invokers and a
//!   concrete library. [`NativeLibrary`] implements it over `libloading`;
//!   tests implement it in memory.
//! - Re-export the per-algorithm call descriptors from [`calls`] and the
//!   error bridge from [`bridge`].
//!
//! Invariants & assumptions
//! ------------------------
//! - A `ModelPtr` is only ever produced by `Engine::create_model` and only
//!   ever consumed by `Engine::destroy_model`. It is neither `Copy` nor
//!   `Clone`, and it is `!Send`, so it cannot outlive or escape the session
//!   that owns it.
//! - An `ErrorPtr` is consumed by `Engine::free_error`; its message and
//!   category must be read before that.
//! - Engine implementations may assume call descriptors are internally
//!   consistent: output slices have exactly the element count the engine
//!   will write.
//!
//! Conventions
//! -----------
//! - Engine methods mirror the native signatures one-to-one; the only
//!   translation they perform is between Rust and C representations
//!   (slices ↔ pointer + length, `Option` ↔ null, `CStr` ↔ `char*`).

pub mod bridge;
pub mod calls;
pub mod library;
pub mod print;

#[cfg(test)]
pub(crate) mod mock;

use std::ffi::{c_void, CStr};
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

pub use bridge::check;
pub use calls::{
    HmcMetric, LaplaceCall, OptimizationAlgorithm, OptimizeCall, PathfinderCall, SampleCall,
};
pub use library::NativeLibrary;
pub use print::{PrintCallback, PrintRedirect};

/// Opaque handle to a native model instance.
#[derive(Debug)]
pub struct ModelPtr(NonNull<c_void>);

impl ModelPtr {
    /// Wrap a non-null handle returned by a model constructor.
    pub fn new(ptr: NonNull<c_void>) -> ModelPtr {
        ModelPtr(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Opaque handle to a native error object.
#[derive(Debug)]
pub struct ErrorPtr(NonNull<c_void>);

impl ErrorPtr {
    pub fn new(ptr: NonNull<c_void>) -> ErrorPtr {
        ErrorPtr(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Out-parameter the engine stores an error object into.
///
/// Starts out null. After a failing call it may hold a handle, which is
/// taken exactly once by the error bridge.
#[derive(Debug)]
pub struct ErrorSlot(*mut c_void);

impl ErrorSlot {
    pub fn new() -> ErrorSlot {
        ErrorSlot(ptr::null_mut())
    }

    /// Pointer handed to the native call as its `err` argument.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_void {
        &mut self.0
    }

    /// Store an error object (used by in-process engines).
    pub fn set(&mut self, err: ErrorPtr) {
        self.0 = err.as_ptr();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Take the stored error object, leaving the slot empty.
    pub fn take(&mut self) -> Option<ErrorPtr> {
        let raw = std::mem::replace(&mut self.0, ptr::null_mut());
        NonNull::new(raw).map(ErrorPtr)
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        ErrorSlot::new()
    }
}

/// Engine — the native call surface of one loaded model library.
///
/// Purpose
/// -------
/// Abstract the concrete library so that invokers, sessions, and the error
/// bridge are written once against a trait, and can be exercised without a
/// compiled model.
///
/// Key behaviors
/// -------------
/// - `create_model` returns `None` on failure, in which case the engine has
///   (when it could) stored an error object in `err`.
/// - Algorithm entry points return the native status code; `0` is success.
/// - Error accessors read an error object without freeing it;
///   `free_error` consumes it.
///
/// Notes
/// -----
/// - Methods take `&self`: an engine is shared by every session of a
///   [`Model`](crate::model::Model), while the per-call state lives in the
///   session and the call descriptor.
pub trait Engine {
    fn create_model(&self, data: &CStr, seed: u32, err: &mut ErrorSlot) -> Option<ModelPtr>;
    fn destroy_model(&self, model: ModelPtr);

    /// Comma-separated parameter names of the model.
    fn param_names(&self, model: &ModelPtr) -> String;
    fn num_free_params(&self, model: &ModelPtr) -> usize;

    fn sample(&self, model: &ModelPtr, call: SampleCall<'_>, err: &mut ErrorSlot) -> c_int;
    fn pathfinder(&self, model: &ModelPtr, call: PathfinderCall<'_>, err: &mut ErrorSlot) -> c_int;
    fn optimize(&self, model: &ModelPtr, call: OptimizeCall<'_>, err: &mut ErrorSlot) -> c_int;
    fn laplace_sample(
        &self, model: &ModelPtr, call: LaplaceCall<'_>, err: &mut ErrorSlot,
    ) -> c_int;

    fn error_message(&self, err: &ErrorPtr) -> String;
    fn error_type(&self, err: &ErrorPtr) -> c_int;
    fn free_error(&self, err: ErrorPtr);

    /// Byte used to join per-chain inits into a single payload.
    fn separator(&self) -> u8;
    /// `(major, minor, patch)` of the native API.
    fn api_version(&self) -> (i32, i32, i32);
    fn set_print_callback(&self, callback: PrintCallback);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Ensure an `ErrorSlot` hands out its error object exactly once.
    //
    // Given
    // -----
    // - A slot holding a (dangling, never dereferenced) error handle.
    //
    // Expect
    // ------
    // - The first `take` yields the handle, the second yields `None`.
    fn error_slot_take_empties_the_slot() {
        // Arrange
        let mut slot = ErrorSlot::new();
        assert!(slot.is_empty());
        slot.set(ErrorPtr::new(NonNull::dangling()));

        // Act
        let first = slot.take();
        let second = slot.take();

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(slot.is_empty());
    }
}
