//! native::library — `Engine` implementation over a dynamically loaded
//! TinyStan model library.
//!
//! Purpose
//! -------
//! Open a compiled model shared object with `libloading`, resolve every
//! `tinystan_*` entry point once, and forward [`Engine`] calls to them.
//!
//! Key behaviors
//! -------------
//! - Resolve all symbols eagerly in [`NativeLibrary::open`]; a missing
//!   symbol fails the load with [`StanError::MissingSymbol`] instead of
//!   failing later in the middle of an algorithm call.
//! - Keep the `libloading::Library` alive for as long as the function
//!   pointers copied out of it.
//! - Track every canonical path this process has mapped and warn (via
//!   `tracing`) when the same image is loaded twice: the dynamic loader
//!   hands back the already-mapped code, so a rebuilt library on disk is
//!   silently ignored.
//!
//! Invariants & assumptions
//! ------------------------
//! - The library was built against the TinyStan C API whose signatures are
//!   spelled out below; there is no way to verify this at load time beyond
//!   symbol presence, so `api_version` is logged for diagnosis.
//! - Every pointer passed to the engine comes from a live Rust borrow that
//!   outlives the (blocking) native call.

use std::collections::HashSet;
use std::ffi::{c_char, c_void, CStr};
use std::os::raw::{c_int, c_uint};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::{Mutex, OnceLock};

use libloading::Library;

use crate::errors::{StanError, StanResult};
use crate::native::{
    Engine, ErrorPtr, ErrorSlot, LaplaceCall, ModelPtr, OptimizeCall, PathfinderCall,
    PrintCallback, SampleCall,
};

// ============================================================================
// Native function signatures
// ============================================================================

type FnCreateModel =
    unsafe extern "C" fn(data: *const c_char, seed: c_uint, err: *mut *mut c_void) -> *mut c_void;
type FnDestroyModel = unsafe extern "C" fn(model: *mut c_void);
type FnModelParamNames = unsafe extern "C" fn(model: *const c_void) -> *const c_char;
type FnModelNumFreeParams = unsafe extern "C" fn(model: *const c_void) -> usize;
type FnApiVersion = unsafe extern "C" fn(major: *mut c_int, minor: *mut c_int, patch: *mut c_int);
type FnSeparatorChar = unsafe extern "C" fn() -> c_char;
type FnSetPrintCallback = unsafe extern "C" fn(callback: PrintCallback);
type FnGetErrorMessage = unsafe extern "C" fn(err: *const c_void) -> *const c_char;
type FnGetErrorType = unsafe extern "C" fn(err: *const c_void) -> c_int;
type FnFreeError = unsafe extern "C" fn(err: *mut c_void);

type FnSample = unsafe extern "C" fn(
    model: *const c_void,
    num_chains: usize,
    inits: *const c_char,
    seed: c_uint,
    id: c_uint,
    init_radius: f64,
    num_warmup: c_int,
    num_samples: c_int,
    metric: c_int,
    metric_init: *const f64,
    adapt: bool,
    delta: f64,
    gamma: f64,
    kappa: f64,
    t0: f64,
    init_buffer: c_uint,
    term_buffer: c_uint,
    window: c_uint,
    save_warmup: bool,
    stepsize: f64,
    stepsize_jitter: f64,
    max_depth: c_int,
    refresh: c_int,
    num_threads: c_int,
    out: *mut f64,
    out_size: usize,
    metric_out: *mut f64,
    err: *mut *mut c_void,
) -> c_int;

type FnPathfinder = unsafe extern "C" fn(
    model: *const c_void,
    num_paths: usize,
    inits: *const c_char,
    seed: c_uint,
    id: c_uint,
    init_radius: f64,
    num_draws: c_int,
    max_history_size: c_int,
    init_alpha: f64,
    tol_obj: f64,
    tol_rel_obj: f64,
    tol_grad: f64,
    tol_rel_grad: f64,
    tol_param: f64,
    num_iterations: c_int,
    num_elbo_draws: c_int,
    num_multi_draws: c_int,
    calculate_lp: bool,
    psis_resample: bool,
    refresh: c_int,
    num_threads: c_int,
    out: *mut f64,
    out_size: usize,
    err: *mut *mut c_void,
) -> c_int;

type FnOptimize = unsafe extern "C" fn(
    model: *const c_void,
    inits: *const c_char,
    seed: c_uint,
    id: c_uint,
    init_radius: f64,
    algorithm: c_int,
    num_iterations: c_int,
    jacobian: bool,
    max_history_size: c_int,
    init_alpha: f64,
    tol_obj: f64,
    tol_rel_obj: f64,
    tol_grad: f64,
    tol_rel_grad: f64,
    tol_param: f64,
    refresh: c_int,
    num_threads: c_int,
    out: *mut f64,
    out_size: usize,
    err: *mut *mut c_void,
) -> c_int;

type FnLaplaceSample = unsafe extern "C" fn(
    model: *const c_void,
    theta_hat: *const f64,
    theta_json: *const c_char,
    seed: c_uint,
    num_draws: c_int,
    jacobian: bool,
    calculate_lp: bool,
    refresh: c_int,
    num_threads: c_int,
    out: *mut f64,
    out_size: usize,
    hessian_out: *mut f64,
    err: *mut *mut c_void,
) -> c_int;

// ============================================================================
// Dynamic library loading
// ============================================================================

/// Function pointers resolved from one loaded library.
struct TinyStanApi {
    create_model: FnCreateModel,
    destroy_model: FnDestroyModel,
    model_param_names: FnModelParamNames,
    model_num_free_params: FnModelNumFreeParams,
    api_version: FnApiVersion,
    separator_char: FnSeparatorChar,
    set_print_callback: FnSetPrintCallback,
    get_error_message: FnGetErrorMessage,
    get_error_type: FnGetErrorType,
    free_error: FnFreeError,
    sample: FnSample,
    pathfinder: FnPathfinder,
    optimize: FnOptimize,
    laplace_sample: FnLaplaceSample,
}

/// Canonical paths of every library opened by this process.
static LOADED_LIBRARIES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn loaded_libraries() -> std::sync::MutexGuard<'static, HashSet<PathBuf>> {
    let registry = LOADED_LIBRARIES.get_or_init(|| Mutex::new(HashSet::new()));
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_loaded(path: &Path) -> bool {
    loaded_libraries().contains(path)
}

/// Record `path` as mapped into this process; returns `true` if it already
/// was.
fn record_load(path: &Path) -> bool {
    !loaded_libraries().insert(path.to_path_buf())
}

fn load_symbol<T: Copy>(library: &Library, symbol: &'static str) -> StanResult<T> {
    // SAFETY: `T` is one of the `Fn*` aliases above, which spell out the
    // exported C signature of `symbol`.
    let resolved = unsafe { library.get::<T>(symbol.as_bytes()) };
    resolved
        .map(|sym| *sym)
        .map_err(|err| StanError::MissingSymbol { symbol, reason: err.to_string() })
}

fn lossy_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: the library returns NUL-terminated strings that stay valid at
    // least until the owning object is modified or freed.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn opt_cstr(value: Option<&CStr>) -> *const c_char {
    value.map_or(ptr::null(), CStr::as_ptr)
}

fn opt_slice(value: Option<&[f64]>) -> *const f64 {
    value.map_or(ptr::null(), <[f64]>::as_ptr)
}

fn opt_slice_mut(value: Option<&mut [f64]>) -> *mut f64 {
    value.map_or(ptr::null_mut(), <[f64]>::as_mut_ptr)
}

/// NativeLibrary — a loaded TinyStan model library.
///
/// Fields
/// ------
/// - `api`: resolved entry points, valid while `_library` is alive.
/// - `path`: canonical path the library was loaded from.
/// - `_library`: owning handle; dropping it unmaps the code behind `api`.
pub struct NativeLibrary {
    api: TinyStanApi,
    path: PathBuf,
    _library: Library,
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary").field("path", &self.path).finish_non_exhaustive()
    }
}

impl NativeLibrary {
    /// Load a compiled model library and resolve its entry points.
    ///
    /// Parameters
    /// ----------
    /// - `path`: location of the shared object.
    /// - `warn`: emit a warning when the same image was already loaded by
    ///   this process.
    ///
    /// Errors
    /// ------
    /// - [`StanError::LibraryLoad`] if the loader rejects the file.
    /// - [`StanError::MissingSymbol`] if any `tinystan_*` entry point is
    ///   absent.
    pub fn open(path: &Path, warn: bool) -> StanResult<NativeLibrary> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        if warn && is_loaded(&path) {
            tracing::warn!(
                path = %path.display(),
                "Loading a shared object that has already been loaded. If the file has changed \
                 since the last time it was loaded, this load may not update the library!"
            );
        }

        tracing::debug!(path = %path.display(), "loading model library");
        // SAFETY: loading runs the library's static initializers; model
        // libraries have no initialization side effects beyond the C++ runtime.
        let library = unsafe { Library::new(&path) }
            .map_err(|err| StanError::LibraryLoad { path: path.clone(), reason: err.to_string() })?;
        // Only an image the loader actually mapped can go stale.
        record_load(&path);

        let api = TinyStanApi {
            create_model: load_symbol(&library, "tinystan_create_model")?,
            destroy_model: load_symbol(&library, "tinystan_destroy_model")?,
            model_param_names: load_symbol(&library, "tinystan_model_param_names")?,
            model_num_free_params: load_symbol(&library, "tinystan_model_num_free_params")?,
            api_version: load_symbol(&library, "tinystan_api_version")?,
            separator_char: load_symbol(&library, "tinystan_separator_char")?,
            set_print_callback: load_symbol(&library, "tinystan_set_print_callback")?,
            get_error_message: load_symbol(&library, "tinystan_get_error_message")?,
            get_error_type: load_symbol(&library, "tinystan_get_error_type")?,
            free_error: load_symbol(&library, "tinystan_free_stan_error")?,
            sample: load_symbol(&library, "tinystan_sample")?,
            pathfinder: load_symbol(&library, "tinystan_pathfinder")?,
            optimize: load_symbol(&library, "tinystan_optimize")?,
            laplace_sample: load_symbol(&library, "tinystan_laplace_sample")?,
        };

        let lib = NativeLibrary { api, path, _library: library };
        let (major, minor, patch) = lib.api_version();
        tracing::debug!(major, minor, patch, "model library loaded");
        Ok(lib)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for NativeLibrary {
    fn create_model(&self, data: &CStr, seed: u32, err: &mut ErrorSlot) -> Option<ModelPtr> {
        // SAFETY: `data` is NUL-terminated and outlives the call; `err` points
        // to a writable null-initialized slot.
        let raw = unsafe { (self.api.create_model)(data.as_ptr(), seed, err.as_mut_ptr()) };
        NonNull::new(raw).map(ModelPtr::new)
    }

    fn destroy_model(&self, model: ModelPtr) {
        // SAFETY: `model` came from `create_model` and is consumed here, so it
        // is destroyed at most once.
        unsafe { (self.api.destroy_model)(model.as_ptr()) }
    }

    fn param_names(&self, model: &ModelPtr) -> String {
        // SAFETY: `model` is a live handle.
        lossy_string(unsafe { (self.api.model_param_names)(model.as_ptr()) })
    }

    fn num_free_params(&self, model: &ModelPtr) -> usize {
        // SAFETY: `model` is a live handle.
        unsafe { (self.api.model_num_free_params)(model.as_ptr()) }
    }

    fn sample(&self, model: &ModelPtr, mut call: SampleCall<'_>, err: &mut ErrorSlot) -> c_int {
        let out_size = call.out.len();
        // SAFETY: every buffer is a live slice whose length matches what the
        // engine writes for this descriptor; nullable arguments map to null.
        unsafe {
            (self.api.sample)(
                model.as_ptr(),
                call.num_chains,
                opt_cstr(call.inits),
                call.seed,
                call.id,
                call.init_radius,
                call.num_warmup,
                call.num_samples,
                call.metric.code(),
                opt_slice(call.init_inv_metric),
                call.adapt,
                call.delta,
                call.gamma,
                call.kappa,
                call.t0,
                call.init_buffer,
                call.term_buffer,
                call.window,
                call.save_warmup,
                call.stepsize,
                call.stepsize_jitter,
                call.max_depth,
                call.refresh,
                call.num_threads,
                call.out.as_mut_ptr(),
                out_size,
                opt_slice_mut(call.metric_out),
                err.as_mut_ptr(),
            )
        }
    }

    fn pathfinder(
        &self, model: &ModelPtr, mut call: PathfinderCall<'_>, err: &mut ErrorSlot,
    ) -> c_int {
        let out_size = call.out.len();
        // SAFETY: see `sample`.
        unsafe {
            (self.api.pathfinder)(
                model.as_ptr(),
                call.num_paths,
                opt_cstr(call.inits),
                call.seed,
                call.id,
                call.init_radius,
                call.num_draws,
                call.max_history_size,
                call.init_alpha,
                call.tol_obj,
                call.tol_rel_obj,
                call.tol_grad,
                call.tol_rel_grad,
                call.tol_param,
                call.num_iterations,
                call.num_elbo_draws,
                call.num_multi_draws,
                call.calculate_lp,
                call.psis_resample,
                call.refresh,
                call.num_threads,
                call.out.as_mut_ptr(),
                out_size,
                err.as_mut_ptr(),
            )
        }
    }

    fn optimize(
        &self, model: &ModelPtr, mut call: OptimizeCall<'_>, err: &mut ErrorSlot,
    ) -> c_int {
        let out_size = call.out.len();
        // SAFETY: see `sample`.
        unsafe {
            (self.api.optimize)(
                model.as_ptr(),
                opt_cstr(call.inits),
                call.seed,
                call.id,
                call.init_radius,
                call.algorithm.code(),
                call.num_iterations,
                call.jacobian,
                call.max_history_size,
                call.init_alpha,
                call.tol_obj,
                call.tol_rel_obj,
                call.tol_grad,
                call.tol_rel_grad,
                call.tol_param,
                call.refresh,
                call.num_threads,
                call.out.as_mut_ptr(),
                out_size,
                err.as_mut_ptr(),
            )
        }
    }

    fn laplace_sample(
        &self, model: &ModelPtr, mut call: LaplaceCall<'_>, err: &mut ErrorSlot,
    ) -> c_int {
        let out_size = call.out.len();
        // SAFETY: see `sample`; `theta_hat`, when present, has exactly one
        // entry per constrained parameter (checked by the invoker).
        unsafe {
            (self.api.laplace_sample)(
                model.as_ptr(),
                opt_slice(call.theta_hat),
                opt_cstr(call.theta_json),
                call.seed,
                call.num_draws,
                call.jacobian,
                call.calculate_lp,
                call.refresh,
                call.num_threads,
                call.out.as_mut_ptr(),
                out_size,
                opt_slice_mut(call.hessian_out),
                err.as_mut_ptr(),
            )
        }
    }

    fn error_message(&self, err: &ErrorPtr) -> String {
        // SAFETY: `err` has not been freed yet.
        lossy_string(unsafe { (self.api.get_error_message)(err.as_ptr()) })
    }

    fn error_type(&self, err: &ErrorPtr) -> c_int {
        // SAFETY: `err` has not been freed yet.
        unsafe { (self.api.get_error_type)(err.as_ptr()) }
    }

    fn free_error(&self, err: ErrorPtr) {
        // SAFETY: `err` is consumed, so it is freed exactly once.
        unsafe { (self.api.free_error)(err.as_ptr()) }
    }

    fn separator(&self) -> u8 {
        // SAFETY: takes no arguments and returns a plain char.
        unsafe { (self.api.separator_char)() as u8 }
    }

    fn api_version(&self) -> (i32, i32, i32) {
        let (mut major, mut minor, mut patch): (c_int, c_int, c_int) = (0, 0, 0);
        // SAFETY: three valid, writable `int` locations.
        unsafe { (self.api.api_version)(&mut major, &mut minor, &mut patch) };
        (major, minor, patch)
    }

    fn set_print_callback(&self, callback: PrintCallback) {
        // SAFETY: `callback` is a plain `extern "C"` function with a 'static
        // lifetime.
        unsafe { (self.api.set_print_callback)(callback) }
    }
}
