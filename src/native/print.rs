//! native::print — routing of native text output to the host's streams.
//!
//! The engine writes progress and diagnostics through a callback. Without
//! one, output goes to the native process' own console (or nowhere, e.g.
//! inside a notebook). [`forward_print`] writes each message as one line to
//! the host's stdout or stderr.
//!
//! Registration is process-wide state inside the loaded library: the
//! callback pointer lives in a global of the shared object. [`PrintRedirect`]
//! records that registration has happened for one loaded library so that
//! later sessions do not re-register it.

use std::ffi::c_char;
use std::io::Write;
use std::sync::OnceLock;

use crate::native::Engine;

/// Signature of the native print callback: message bytes, their length,
/// and whether the message is an error.
pub type PrintCallback = extern "C" fn(msg: *const c_char, len: usize, is_error: bool);

/// Write one native message to stdout or stderr.
///
/// Write failures are ignored; unwinding out of this function would cross
/// the FFI boundary.
pub extern "C" fn forward_print(msg: *const c_char, len: usize, is_error: bool) {
    if msg.is_null() {
        return;
    }
    // SAFETY: the engine passes a buffer of `len` readable bytes that stays
    // valid for the duration of the callback.
    let bytes = unsafe { std::slice::from_raw_parts(msg.cast::<u8>(), len) };
    let text = String::from_utf8_lossy(bytes);
    if is_error {
        let _ = writeln!(std::io::stderr().lock(), "{text}");
    } else {
        let _ = writeln!(std::io::stdout().lock(), "{text}");
    }
}

/// PrintRedirect — one-shot registration of [`forward_print`].
///
/// Owned by the [`Model`](crate::model::Model) that owns the loaded
/// library. The first call to [`ensure_registered`](Self::ensure_registered)
/// installs the callback; every later call is a no-op.
#[derive(Debug, Default)]
pub struct PrintRedirect {
    registered: OnceLock<()>,
}

impl PrintRedirect {
    pub fn new() -> PrintRedirect {
        PrintRedirect { registered: OnceLock::new() }
    }

    pub fn ensure_registered<E: Engine + ?Sized>(&self, engine: &E) {
        self.registered.get_or_init(|| {
            tracing::trace!("registering native print callback");
            engine.set_print_callback(forward_print);
        });
    }

    pub fn is_registered(&self) -> bool {
        self.registered.get().is_some()
    }
}
