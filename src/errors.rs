//! errors — unified error surface for the TinyStan binding layer.
//!
//! Purpose
//! -------
//! Provide a single error enum and result alias for every fallible
//! operation in the crate: caller-side argument validation, native model
//! construction, native algorithm failures, and the environment around the
//! native library (loading, symbol resolution, compilation).
//!
//! Key behaviors
//! -------------
//! - Define [`StanError`] and [`StanResult`] as the canonical error and
//!   result types returned by invokers, sessions, and encoders.
//! - Define [`ErrorCategory`], the 1:1 image of the integer category the
//!   native library attaches to its error objects.
//! - Attach human-readable `Display` messages that embed the offending
//!   payload (argument name, expected vs found shape, native message).
//! - Map errors to Python exceptions when the `python-bindings` feature is
//!   enabled (`RuntimeError`, `ValueError`, `KeyboardInterrupt`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Caller-side variants are produced *before* any native call is made;
//!   seeing one of them guarantees the native library was not invoked.
//! - `Native` and `Construction` values are only produced by the error
//!   bridge after the native error object has been read and freed, so the
//!   messages they carry are owned copies.
//!
//! Conventions
//! -----------
//! - Variants are grouped by origin with `// ---- … ----` separators.
//! - Messages are phrased in terms of the user-visible argument names
//!   (`num_chains`, `init_inv_metric`, …).
//!
//! Testing notes
//! -------------
//! - Unit tests check payload embedding in `Display`, the integer →
//!   category mapping, and the invalid-argument classification.

use std::fmt;
use std::os::raw::c_int;
use std::path::PathBuf;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyKeyboardInterrupt, PyRuntimeError, PyValueError},
    PyErr,
};

/// Crate-wide result alias.
pub type StanResult<T> = Result<T, StanError>;

/// ErrorCategory — classification attached to native error objects.
///
/// The native library reports an integer alongside every error message:
/// `0` for a recoverable runtime failure, `1` for an invalid argument, and
/// `2` when the user interrupted the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Recoverable runtime failure inside the engine.
    Runtime,
    /// The engine rejected one of its arguments.
    InvalidArgument,
    /// The run was interrupted by the user.
    Interrupt,
}

impl ErrorCategory {
    /// Map the native integer code onto a category.
    ///
    /// Codes outside `{0, 1, 2}` are treated as [`ErrorCategory::Runtime`]
    /// and logged at `warn`.
    pub fn from_code(code: c_int) -> ErrorCategory {
        match code {
            0 => ErrorCategory::Runtime,
            1 => ErrorCategory::InvalidArgument,
            2 => ErrorCategory::Interrupt,
            other => {
                tracing::warn!(
                    code = other,
                    "unrecognized native error category, treating as runtime"
                );
                ErrorCategory::Runtime
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Runtime => write!(f, "runtime error"),
            ErrorCategory::InvalidArgument => write!(f, "invalid argument"),
            ErrorCategory::Interrupt => write!(f, "interrupted"),
        }
    }
}

/// StanError — every failure the binding layer can report.
///
/// Variants
/// --------
/// Caller-side validation (raised before any native call):
/// - `NonPositiveCount { name, value }`: a count that sizes an output
///   buffer was zero.
/// - `CountOutOfRange { name, value }`: a count does not fit the native
///   `int` argument.
/// - `NoParameters`: the model has no free parameters to work with.
/// - `MetricShapeMismatch { expected, expected_per_chain, found }`: the
///   initial inverse metric has neither the per-chain nor the all-chain
///   shape.
/// - `ModeLengthMismatch { expected, found }`: a numeric Laplace mode has
///   the wrong length.
/// - `ModeNotSingleVector { ndim }`: a prior result used as a Laplace
///   mode was not produced by a single-vector algorithm.
/// - `InvalidInput { reason }`: a serialized input could not be passed to
///   the library (e.g. interior NUL byte).
/// - `UnreadablePath { path, reason }`: a path input cannot be opened.
/// - `BufferTooLarge { shape }`: the output shape overflows `usize`.
///
/// Native failures:
/// - `Construction { category, message }`: the model constructor failed.
/// - `Native { category, message }`: an algorithm call failed.
/// - `UnknownNative { code }`: a non-zero status with no error object.
///
/// Environment:
/// - `LibraryLoad`, `MissingSymbol`, `Compilation`.
#[derive(Debug, Clone, PartialEq)]
pub enum StanError {
    // ---- Argument validation ----
    NonPositiveCount { name: &'static str, value: usize },
    CountOutOfRange { name: &'static str, value: usize },
    NoParameters,
    MetricShapeMismatch { expected: Vec<usize>, expected_per_chain: Vec<usize>, found: Vec<usize> },
    ModeLengthMismatch { expected: usize, found: usize },
    ModeNotSingleVector { ndim: usize },
    InvalidInput { reason: String },
    UnreadablePath { path: PathBuf, reason: String },
    BufferTooLarge { shape: Vec<usize> },

    // ---- Native failures ----
    Construction { category: ErrorCategory, message: String },
    Native { category: ErrorCategory, message: String },
    UnknownNative { code: c_int },

    // ---- Environment ----
    LibraryLoad { path: PathBuf, reason: String },
    MissingSymbol { symbol: &'static str, reason: String },
    Compilation { reason: String },
}

impl StanError {
    /// Whether the error describes a bad argument, either detected locally
    /// or reported as such by the engine.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            StanError::NonPositiveCount { .. }
            | StanError::CountOutOfRange { .. }
            | StanError::NoParameters
            | StanError::MetricShapeMismatch { .. }
            | StanError::ModeLengthMismatch { .. }
            | StanError::ModeNotSingleVector { .. }
            | StanError::InvalidInput { .. }
            | StanError::UnreadablePath { .. }
            | StanError::BufferTooLarge { .. } => true,
            StanError::Construction { category, .. } | StanError::Native { category, .. } => {
                *category == ErrorCategory::InvalidArgument
            }
            _ => false,
        }
    }

    /// Native category carried by the error, if it came from the engine.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            StanError::Construction { category, .. } | StanError::Native { category, .. } => {
                Some(*category)
            }
            _ => None,
        }
    }
}

impl std::error::Error for StanError {}

impl fmt::Display for StanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // ---- Argument validation ----
            StanError::NonPositiveCount { name, value } => {
                write!(f, "{name} must be at least 1, got {value}")
            }
            StanError::CountOutOfRange { name, value } => {
                write!(f, "{name} = {value} does not fit in a native int")
            }
            StanError::NoParameters => write!(f, "Model has no parameters."),
            StanError::MetricShapeMismatch { expected, expected_per_chain, found } => write!(
                f,
                "Invalid initial metric size. Expected a {expected:?} or \
                 {expected_per_chain:?} matrix, got {found:?}."
            ),
            StanError::ModeLengthMismatch { expected, found } => write!(
                f,
                "Mode array has incorrect length. Expected {expected} but got {found}"
            ),
            StanError::ModeNotSingleVector { ndim } => write!(
                f,
                "Laplace can only be used with optimization output (got a {ndim}-dimensional result)"
            ),
            StanError::InvalidInput { reason } => write!(f, "Invalid input: {reason}"),
            StanError::UnreadablePath { path, reason } => {
                write!(f, "Cannot read {}: {reason}", path.display())
            }
            StanError::BufferTooLarge { shape } => {
                write!(f, "Output buffer of shape {shape:?} is too large to allocate")
            }

            // ---- Native failures ----
            StanError::Construction { category, message } => {
                write!(f, "Model construction failed ({category}): {message}")
            }
            StanError::Native { category, message } => write!(f, "{category}: {message}"),
            StanError::UnknownNative { code } => {
                write!(f, "Unknown error, function returned code {code}")
            }

            // ---- Environment ----
            StanError::LibraryLoad { path, reason } => {
                write!(f, "Failed to load library {}: {reason}", path.display())
            }
            StanError::MissingSymbol { symbol, reason } => {
                write!(f, "Library does not export {symbol}: {reason}")
            }
            StanError::Compilation { reason } => write!(f, "Compilation failed: {reason}"),
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<StanError> for PyErr {
    fn from(err: StanError) -> PyErr {
        match err.category() {
            Some(ErrorCategory::Interrupt) => PyKeyboardInterrupt::new_err(err.to_string()),
            Some(ErrorCategory::Runtime) => PyRuntimeError::new_err(err.to_string()),
            _ if err.is_invalid_argument() => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The native integer → `ErrorCategory` mapping.
    // - Payload embedding in `Display` for caller-side and native variants.
    // - The invalid-argument classification used by the Python mapping.
    //
    // They intentionally DO NOT cover:
    // - The `From<StanError> for PyErr` conversion, which needs the Python
    //   C API and is exercised from Python.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that the three documented native codes map 1:1 onto categories.
    //
    // Given
    // -----
    // - Codes 0, 1, 2.
    //
    // Expect
    // ------
    // - Runtime, InvalidArgument, Interrupt respectively.
    fn error_category_maps_native_codes_one_to_one() {
        // Act / Assert
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::Runtime);
        assert_eq!(ErrorCategory::from_code(1), ErrorCategory::InvalidArgument);
        assert_eq!(ErrorCategory::from_code(2), ErrorCategory::Interrupt);
    }

    #[test]
    // Purpose
    // -------
    // Ensure unexpected category codes degrade to a runtime error instead
    // of panicking.
    //
    // Given
    // -----
    // - Codes 17 and -1.
    //
    // Expect
    // ------
    // - `ErrorCategory::Runtime` for both (each logged at `warn`).
    fn error_category_unknown_code_falls_back_to_runtime() {
        assert_eq!(ErrorCategory::from_code(17), ErrorCategory::Runtime);
        assert_eq!(ErrorCategory::from_code(-1), ErrorCategory::Runtime);
    }

    #[test]
    // Purpose
    // -------
    // Verify that count errors name the offending argument and value.
    //
    // Given
    // -----
    // - `NonPositiveCount { name: "num_chains", value: 0 }`.
    //
    // Expect
    // ------
    // - The message contains "num_chains" and "0".
    fn non_positive_count_display_names_argument() {
        // Arrange
        let err = StanError::NonPositiveCount { name: "num_chains", value: 0 };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("num_chains"), "Got: {msg}");
        assert!(msg.contains('0'), "Got: {msg}");
    }

    #[test]
    // Purpose
    // -------
    // Verify that the unknown native failure reports the raw return code.
    //
    // Given
    // -----
    // - `UnknownNative { code: -3 }`.
    //
    // Expect
    // ------
    // - The message contains "-3".
    fn unknown_native_display_includes_code() {
        let msg = StanError::UnknownNative { code: -3 }.to_string();
        assert!(msg.contains("-3"), "Got: {msg}");
    }

    #[test]
    // Purpose
    // -------
    // Ensure the invalid-argument classification covers both local
    // validation errors and engine-reported invalid arguments, and excludes
    // runtime failures.
    //
    // Given
    // -----
    // - A local `ModeLengthMismatch`, a native InvalidArgument error, and a
    //   native Runtime error.
    //
    // Expect
    // ------
    // - true, true, false.
    fn is_invalid_argument_classifies_local_and_native_errors() {
        // Arrange
        let local = StanError::ModeLengthMismatch { expected: 2, found: 3 };
        let native_arg = StanError::Native {
            category: ErrorCategory::InvalidArgument,
            message: "bad".to_string(),
        };
        let native_rt =
            StanError::Native { category: ErrorCategory::Runtime, message: "boom".to_string() };

        // Assert
        assert!(local.is_invalid_argument());
        assert!(native_arg.is_invalid_argument());
        assert!(!native_rt.is_invalid_argument());
        assert_eq!(native_rt.category(), Some(ErrorCategory::Runtime));
        assert_eq!(local.category(), None);
    }
}
