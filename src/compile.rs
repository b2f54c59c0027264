//! compile — build a model library from Stan source.
//!
//! The TinyStan build tree (located through the `TINYSTAN` environment
//! variable) knows how to turn `foo.stan` into `foo_model.so`; this module
//! only checks the input, runs `make` there, and reports the outcome.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::{StanError, StanResult};

/// Environment variable holding the TinyStan source tree.
pub const TINYSTAN_ENV: &str = "TINYSTAN";

/// Library the build produces for `stan_file`: `dir/foo.stan` becomes
/// `dir/foo_model.so`.
///
/// # Errors
/// - [`StanError::InvalidInput`] unless the file name ends in `.stan`.
pub fn library_path(stan_file: &Path) -> StanResult<PathBuf> {
    let stem = stan_file
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(".stan"))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| StanError::InvalidInput {
            reason: format!("{} is not a .stan file", stan_file.display()),
        })?;
    Ok(stan_file.with_file_name(format!("{stem}_model.so")))
}

fn tinystan_root() -> StanResult<PathBuf> {
    match env::var_os(TINYSTAN_ENV) {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => Err(StanError::Compilation {
            reason: format!("{TINYSTAN_ENV} is not set to the TinyStan source directory"),
        }),
    }
}

/// Compile `stan_file` into a shared library and return its path.
///
/// Parameters
/// ----------
/// - `stan_file`: path to a readable `.stan` file.
/// - `stanc_args`: extra Stan compiler flags, passed as `STANCFLAGS`. The
///   file's directory is always added as an include path.
/// - `make_args`: extra arguments for `make`.
///
/// # Errors
/// - [`StanError::InvalidInput`] / [`StanError::UnreadablePath`] for a bad
///   input file.
/// - [`StanError::Compilation`] if the build tree is unknown, `make`
///   cannot be started, or the build fails (with the tool's stderr).
pub fn compile_model(
    stan_file: &Path, stanc_args: &[String], make_args: &[String],
) -> StanResult<PathBuf> {
    let stan_file = std::path::absolute(stan_file).map_err(|err| StanError::UnreadablePath {
        path: stan_file.to_path_buf(),
        reason: err.to_string(),
    })?;
    let output = library_path(&stan_file)?;
    File::open(&stan_file).map_err(|err| StanError::UnreadablePath {
        path: stan_file.clone(),
        reason: err.to_string(),
    })?;
    let root = tinystan_root()?;

    let include = stan_file.parent().map(|dir| format!("--include-paths={}", dir.display()));
    let stancflags: Vec<String> = include.into_iter().chain(stanc_args.iter().cloned()).collect();

    tracing::info!(
        stan_file = %stan_file.display(),
        output = %output.display(),
        "compiling Stan model"
    );
    let result = Command::new("make")
        .current_dir(&root)
        .arg(&output)
        .arg(format!("STANCFLAGS={}", stancflags.join(" ")))
        .args(make_args)
        .output()
        .map_err(|err| StanError::Compilation {
            reason: format!("failed to run make in {}: {err}", root.display()),
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(StanError::Compilation { reason: stderr.trim().to_string() });
    }
    tracing::debug!(output = %output.display(), "compilation finished");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Verify the output naming convention of the build tree.
    //
    // Given
    // -----
    // - `/models/bernoulli.stan`, `bernoulli.txt`, and `.stan`.
    //
    // Expect
    // ------
    // - `/models/bernoulli_model.so`; the other two are rejected.
    fn library_path_follows_build_convention() {
        assert_eq!(
            library_path(Path::new("/models/bernoulli.stan")).unwrap(),
            PathBuf::from("/models/bernoulli_model.so")
        );
        assert!(matches!(
            library_path(Path::new("bernoulli.txt")),
            Err(StanError::InvalidInput { .. })
        ));
        assert!(library_path(Path::new(".stan")).is_err());
    }

    #[test]
    fn compile_missing_source_is_unreadable() {
        let result = compile_model(Path::new("/no/such/model.stan"), &[], &[]);
        assert!(matches!(result, Err(StanError::UnreadablePath { .. })));
    }
}
