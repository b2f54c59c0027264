//! inits — serialization of model data and initial values.
//!
//! Purpose
//! -------
//! The engine accepts data and initial values as one C string each. Data
//! is a JSON document or a path to one; initial values for several chains
//! (or paths) are several such documents joined by the library's separator
//! byte. This module turns the caller-facing variants into those strings.
//!
//! Key behaviors
//! -------------
//! - [`StanData`] is one document: raw text passed verbatim, a path that
//!   is checked readable before being passed, or a `serde_json::Value`.
//! - [`Inits`] is "one document for every unit", "one document per unit",
//!   or a previous result to draw initial values from.
//! - [`encode_inits`] returns `None` when no inits are given, which the
//!   engine receives as a null pointer.
//!
//! Invariants & assumptions
//! ------------------------
//! - A list of `k` documents is always joined into exactly `k` segments.
//!   The engine, not this module, decides whether `k` matches the number
//!   of chains; a mismatch is only logged.
//! - Strings handed to the engine never contain an interior NUL byte.

use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{StanError, StanResult};
use crate::output::StanOutput;

/// StanData — one JSON document for the engine.
///
/// Variants
/// --------
/// - `Text`: raw JSON text, or a path string; passed through unchanged.
/// - `Path`: a file path; must be readable.
/// - `Value`: structured JSON, serialized with `serde_json`.
#[derive(Debug, Clone, PartialEq)]
pub enum StanData {
    Text(String),
    Path(PathBuf),
    Value(Value),
}

impl Default for StanData {
    fn default() -> Self {
        StanData::Text(String::new())
    }
}

impl StanData {
    /// Serialized form passed to the engine.
    ///
    /// # Errors
    /// - [`StanError::UnreadablePath`] if a `Path` cannot be opened.
    /// - [`StanError::InvalidInput`] if a path is not valid UTF-8 or a
    ///   value cannot be serialized.
    pub fn encode(&self) -> StanResult<String> {
        match self {
            StanData::Text(text) => Ok(text.clone()),
            StanData::Path(path) => {
                File::open(path).map_err(|err| StanError::UnreadablePath {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
                path.to_str().map(str::to_string).ok_or_else(|| StanError::InvalidInput {
                    reason: format!("path {} is not valid UTF-8", path.display()),
                })
            }
            StanData::Value(value) => serde_json::to_string(value)
                .map_err(|err| StanError::InvalidInput { reason: err.to_string() }),
        }
    }

    /// [`encode`](Self::encode) as a C string.
    pub fn to_cstring(&self) -> StanResult<CString> {
        to_cstring(self.encode()?)
    }
}

impl From<&str> for StanData {
    fn from(text: &str) -> Self {
        StanData::Text(text.to_string())
    }
}

impl From<String> for StanData {
    fn from(text: String) -> Self {
        StanData::Text(text)
    }
}

impl From<PathBuf> for StanData {
    fn from(path: PathBuf) -> Self {
        StanData::Path(path)
    }
}

impl From<&Path> for StanData {
    fn from(path: &Path) -> Self {
        StanData::Path(path.to_path_buf())
    }
}

impl From<Value> for StanData {
    fn from(value: Value) -> Self {
        StanData::Value(value)
    }
}

/// Inits — initial values for an algorithm run.
#[derive(Debug, Clone, PartialEq)]
pub enum Inits {
    /// The same document for every chain or path.
    Single(StanData),
    /// One document per chain or path.
    PerUnit(Vec<StanData>),
    /// Draw initial values from a previous result.
    Prior(StanOutput),
}

impl From<StanData> for Inits {
    fn from(data: StanData) -> Self {
        Inits::Single(data)
    }
}

impl From<Vec<StanData>> for Inits {
    fn from(list: Vec<StanData>) -> Self {
        Inits::PerUnit(list)
    }
}

impl From<StanOutput> for Inits {
    fn from(output: StanOutput) -> Self {
        Inits::Prior(output)
    }
}

fn to_cstring(bytes: impl Into<Vec<u8>>) -> StanResult<CString> {
    CString::new(bytes).map_err(|err| StanError::InvalidInput {
        reason: format!("string contains a NUL byte at position {}", err.nul_position()),
    })
}

/// Encode inits for `units` chains (or paths).
///
/// Parameters
/// ----------
/// - `inits`: what the caller supplied, if anything.
/// - `units`: number of chains or paths of the run.
/// - `seed`: drives the row selection of `Inits::Prior`.
/// - `separator`: the library's separator byte.
///
/// Returns
/// -------
/// - `None` for no inits, otherwise the encoded C string.
pub fn encode_inits(
    inits: Option<&Inits>, units: usize, seed: u32, separator: u8,
) -> StanResult<Option<CString>> {
    let segments = match inits {
        None => return Ok(None),
        Some(Inits::Single(data)) => vec![data.encode()?],
        Some(Inits::PerUnit(list)) => {
            if list.len() != units {
                tracing::debug!(given = list.len(), units, "inits count differs from unit count");
            }
            list.iter().map(StanData::encode).collect::<StanResult<Vec<_>>>()?
        }
        Some(Inits::Prior(output)) => output
            .create_inits(units, u64::from(seed))?
            .iter()
            .map(|value| StanData::Value(value.clone()).encode())
            .collect::<StanResult<Vec<_>>>()?,
    };
    let mut joined = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            joined.push(separator);
        }
        joined.extend_from_slice(segment.as_bytes());
    }
    to_cstring(joined).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Serialization of every `StanData` variant and its failure modes.
    // - Joining per-unit inits and drawing inits from a prior result.
    //
    // They intentionally DO NOT cover:
    // - How the engine interprets the strings.
    // -------------------------------------------------------------------------

    const SEP: u8 = 0x1c;

    #[test]
    fn no_inits_encode_to_null() {
        assert_eq!(encode_inits(None, 4, 1, SEP), Ok(None));
    }

    #[test]
    // Purpose
    // -------
    // Ensure text passes through unchanged and values are serialized.
    //
    // Given
    // -----
    // - Text `{"mu": 1}` and the value `{"mu": 2.5}`.
    //
    // Expect
    // ------
    // - The same text back, and compact JSON for the value.
    fn stan_data_text_and_value_encoding() {
        assert_eq!(StanData::from(r#"{"mu": 1}"#).encode().unwrap(), r#"{"mu": 1}"#);
        assert_eq!(StanData::from(json!({"mu": 2.5})).encode().unwrap(), r#"{"mu":2.5}"#);
        assert_eq!(StanData::default().encode().unwrap(), "");
    }

    #[test]
    // Purpose
    // -------
    // Verify a path is checked before it is handed to the engine.
    //
    // Given
    // -----
    // - A path that does not exist, and one that does.
    //
    // Expect
    // ------
    // - `UnreadablePath` for the first, the path string for the second.
    fn stan_data_path_must_be_readable() {
        // Arrange
        let missing = PathBuf::from("/definitely/not/here/data.json");
        let existing = std::env::temp_dir().join("tinystan_inits_path_test.json");
        std::fs::write(&existing, "{}").unwrap();

        // Act
        let missing_result = StanData::from(missing.clone()).encode();
        let existing_result = StanData::from(existing.as_path()).encode();

        // Assert
        assert!(matches!(
            missing_result,
            Err(StanError::UnreadablePath { path, .. }) if path == missing
        ));
        assert_eq!(existing_result.unwrap(), existing.to_str().unwrap());
        std::fs::remove_file(&existing).unwrap();
    }

    #[test]
    fn interior_nul_is_rejected() {
        let result = StanData::from("{\0}").to_cstring();
        assert!(matches!(result, Err(StanError::InvalidInput { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Verify that k per-unit documents become exactly k segments.
    //
    // Given
    // -----
    // - Three documents for a run with three chains.
    //
    // Expect
    // ------
    // - Splitting the result on the separator recovers the three inputs.
    fn per_unit_inits_join_into_k_segments() {
        // Arrange
        let list: Vec<StanData> =
            vec![json!({"mu": 1}).into(), r#"{"mu": 2}"#.into(), json!({"mu": 3}).into()];

        // Act
        let encoded = encode_inits(Some(&Inits::from(list)), 3, 0, SEP).unwrap().unwrap();

        // Assert
        let text = encoded.to_str().unwrap();
        let segments: Vec<&str> = text.split(char::from(SEP)).collect();
        assert_eq!(segments, vec![r#"{"mu":1}"#, r#"{"mu": 2}"#, r#"{"mu":3}"#]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure a length mismatch is passed through for the engine to judge.
    //
    // Given
    // -----
    // - Two documents for a run with four chains.
    //
    // Expect
    // ------
    // - Two segments, no error.
    fn per_unit_inits_length_mismatch_is_passed_through() {
        let list = vec![StanData::from("{}"), StanData::from("{}")];
        let encoded = encode_inits(Some(&Inits::PerUnit(list)), 4, 0, SEP).unwrap().unwrap();
        assert_eq!(encoded.as_bytes().iter().filter(|&&b| b == SEP).count(), 1);
    }

    #[test]
    // Purpose
    // -------
    // Verify a previous result is expanded into one document per unit.
    //
    // Given
    // -----
    // - A (5, 2) Pathfinder-style output [lp__, mu] and 3 chains.
    //
    // Expect
    // ------
    // - Three JSON segments, each holding only `mu`; same seed, same text.
    fn prior_output_inits_expand_per_unit() {
        // Arrange
        let data = Array2::from_shape_fn((5, 2), |(d, p)| (d * 10 + p) as f64).into_dyn();
        let prior = Inits::Prior(StanOutput::new(vec!["lp__".into(), "mu".into()], data));

        // Act
        let first = encode_inits(Some(&prior), 3, 42, SEP).unwrap().unwrap();
        let second = encode_inits(Some(&prior), 3, 42, SEP).unwrap().unwrap();

        // Assert
        assert_eq!(first, second);
        let text = first.to_str().unwrap();
        let segments: Vec<Value> =
            text.split(char::from(SEP)).map(|s| serde_json::from_str(s).unwrap()).collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            let object = segment.as_object().unwrap();
            assert_eq!(object.len(), 1);
            assert!(object.contains_key("mu"));
        }
    }
}
