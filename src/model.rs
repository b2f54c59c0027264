//! model — user-facing handle over one loaded model library.
//!
//! Purpose
//! -------
//! Own an [`Engine`] together with the state that is per loaded library
//! rather than per call: the separator byte and whether native output has
//! been redirected. The four algorithms are implemented on [`Model`] in
//! [`crate::algorithms`].
//!
//! Key behaviors
//! -------------
//! - [`Model::load`] opens a compiled library, compiling a `.stan` source
//!   first when given one.
//! - [`Model::with_engine`] wraps any engine (a mock in tests).
//! - Each algorithm call obtains its own session through
//!   [`Model::session`], which also installs the print callback the first
//!   time it is needed.
//!
//! Invariants & assumptions
//! ------------------------
//! - The separator is read once per library, at construction.

use std::path::Path;

use crate::compile::compile_model;
use crate::errors::StanResult;
use crate::inits::StanData;
use crate::native::{Engine, NativeLibrary, PrintRedirect};
use crate::session::ModelSession;

/// ModelOptions — how a library is located and loaded.
///
/// Fields
/// ------
/// - `capture_stan_prints`: forward native output to this process' stdout
///   and stderr (default `true`).
/// - `stanc_args`: extra arguments for the Stan compiler, used when loading
///   a `.stan` file.
/// - `make_args`: extra arguments for `make`, same condition.
/// - `warn`: warn when a library is loaded twice (default `true`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOptions {
    pub capture_stan_prints: bool,
    pub stanc_args: Vec<String>,
    pub make_args: Vec<String>,
    pub warn: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            capture_stan_prints: true,
            stanc_args: Vec::new(),
            make_args: Vec::new(),
            warn: true,
        }
    }
}

/// Model — a loaded model library and its per-library state.
///
/// Fields
/// ------
/// - `engine`: the native call surface.
/// - `separator`: byte joining per-chain inits.
/// - `capture_stan_prints`: whether to install the print callback.
/// - `print_redirect`: records whether it has been installed.
pub struct Model<E: Engine = NativeLibrary> {
    engine: E,
    separator: u8,
    capture_stan_prints: bool,
    print_redirect: PrintRedirect,
}

impl Model<NativeLibrary> {
    /// Load a compiled model library, or compile and load a `.stan` file.
    ///
    /// # Errors
    /// - [`StanError::Compilation`](crate::errors::StanError::Compilation)
    ///   if a `.stan` file fails to build.
    /// - [`StanError::LibraryLoad`](crate::errors::StanError::LibraryLoad) or
    ///   [`StanError::MissingSymbol`](crate::errors::StanError::MissingSymbol)
    ///   if the library cannot be used.
    pub fn load(path: impl AsRef<Path>, options: &ModelOptions) -> StanResult<Model> {
        let path = path.as_ref();
        let library = if path.extension().is_some_and(|ext| ext == "stan") {
            let lib_path = compile_model(path, &options.stanc_args, &options.make_args)?;
            NativeLibrary::open(&lib_path, options.warn)?
        } else {
            NativeLibrary::open(path, options.warn)?
        };
        Ok(Model::with_engine(library, options.capture_stan_prints))
    }

    pub fn lib_path(&self) -> &Path {
        self.engine.path()
    }
}

impl<E: Engine> Model<E> {
    pub fn with_engine(engine: E, capture_stan_prints: bool) -> Model<E> {
        let separator = engine.separator();
        Model { engine, separator, capture_stan_prints, print_redirect: PrintRedirect::new() }
    }

    /// `(major, minor, patch)` version of the native API.
    pub fn api_version(&self) -> (i32, i32, i32) {
        self.engine.api_version()
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Construct a native model instance for one algorithm call.
    pub(crate) fn session(&self, data: &StanData, seed: u32) -> StanResult<ModelSession<'_, E>> {
        if self.capture_stan_prints {
            self.print_redirect.ensure_registered(&self.engine);
        }
        let data = data.to_cstring()?;
        ModelSession::acquire(&self.engine, &data, seed)
    }
}

impl<E: Engine + std::fmt::Debug> std::fmt::Debug for Model<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("engine", &self.engine)
            .field("separator", &self.separator)
            .field("capture_stan_prints", &self.capture_stan_prints)
            .finish()
    }
}
