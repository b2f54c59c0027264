//! output — labelled algorithm results.
//!
//! Purpose
//! -------
//! Hold the populated output buffer of one algorithm call together with the
//! ordered names of its last axis, plus any secondary outputs (adapted
//! metric, Hessian). Provide per-variable extraction and the generation of
//! initial values for a follow-up run.
//!
//! Key behaviors
//! -------------
//! - Column names follow the engine's flattening: scalars by name,
//!   containers as `name.i.j…` with 1-based indices. [`StanOutput::get`]
//!   reassembles a container into trailing dimensions.
//! - [`StanOutput::create_inits`] draws rows deterministically from a
//!   seeded ChaCha stream and emits one JSON object per row, skipping
//!   diagnostic columns (names ending in `__`).
//!
//! Conventions
//! -----------
//! - The last axis of `data` is always the parameter axis; the leading axes
//!   (chains, draws) are called draw axes below.
//! - Non-finite values are written to JSON as `"NaN"`, `"Inf"`, `"-Inf"`,
//!   the spellings the engine's JSON reader accepts.

use std::collections::HashMap;

use ndarray::{Array2, ArrayD, ArrayView2, IxDyn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Number, Value};

use crate::errors::{StanError, StanResult};

/// One model variable and the columns that hold it.
///
/// `columns` is in row-major order over `dims`; a slot no column maps to
/// is `None`.
#[derive(Debug, Clone, PartialEq)]
struct Variable {
    name: String,
    dims: Vec<usize>,
    columns: Vec<Option<usize>>,
}

/// StanOutput — names plus values of one algorithm run.
///
/// Fields
/// ------
/// - `parameters`: labels of the last axis of `data`, diagnostics first.
/// - `data`: values; `(chains, draws, names)` for sampling,
///   `(draws, names)` for Pathfinder and Laplace, `(names,)` for
///   optimization.
/// - `metric`: adapted inverse metric per chain, when it was requested.
/// - `hessian`: Hessian at the mode, when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct StanOutput {
    parameters: Vec<String>,
    data: ArrayD<f64>,
    metric: Option<ArrayD<f64>>,
    hessian: Option<Array2<f64>>,
}

impl StanOutput {
    pub fn new(parameters: Vec<String>, data: ArrayD<f64>) -> StanOutput {
        StanOutput { parameters, data, metric: None, hessian: None }
    }

    pub fn with_metric(mut self, metric: ArrayD<f64>) -> StanOutput {
        self.metric = Some(metric);
        self
    }

    pub fn with_hessian(mut self, hessian: Array2<f64>) -> StanOutput {
        self.hessian = Some(hessian);
        self
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn metric(&self) -> Option<&ArrayD<f64>> {
        self.metric.as_ref()
    }

    pub fn hessian(&self) -> Option<&Array2<f64>> {
        self.hessian.as_ref()
    }

    /// Distinct variable names in column order.
    pub fn variables(&self) -> Vec<String> {
        self.layout().into_iter().map(|v| v.name).collect()
    }

    /// Values of one variable.
    ///
    /// A scalar comes back with the draw axes as its shape; a container
    /// gets its own dimensions appended. Returns `None` for unknown names.
    pub fn get(&self, name: &str) -> Option<ArrayD<f64>> {
        let variable = self.layout().into_iter().find(|v| v.name == name)?;
        let rows = self.rows().ok()?;
        let ndim = self.data.ndim();
        let mut shape = self.data.shape()[..ndim.saturating_sub(1)].to_vec();
        shape.extend_from_slice(&variable.dims);

        let mut values = Vec::with_capacity(rows.nrows() * variable.columns.len());
        for row in rows.rows() {
            values.extend(variable.columns.iter().map(|c| c.map_or(f64::NAN, |c| row[c])));
        }
        ArrayD::from_shape_vec(IxDyn(&shape), values).ok()
    }

    /// Initial values for `units` follow-up runs, one JSON object each.
    ///
    /// Rows are drawn without replacement when there are at least `units`
    /// of them and with replacement otherwise. The same `seed` always picks
    /// the same rows.
    ///
    /// # Errors
    /// - [`StanError::NonPositiveCount`] if `units == 0`.
    /// - [`StanError::InvalidInput`] if the output holds no draws.
    pub fn create_inits(&self, units: usize, seed: u64) -> StanResult<Vec<Value>> {
        if units == 0 {
            return Err(StanError::NonPositiveCount { name: "units", value: units });
        }
        let rows = self.rows()?;
        let num_rows = rows.nrows();
        if num_rows == 0 {
            return Err(StanError::InvalidInput {
                reason: "cannot create inits from an output without draws".to_string(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let picks: Vec<usize> = if num_rows >= units {
            rand::seq::index::sample(&mut rng, num_rows, units).into_vec()
        } else {
            (0..units).map(|_| rng.random_range(0..num_rows)).collect()
        };

        let variables: Vec<Variable> =
            self.layout().into_iter().filter(|v| !v.name.ends_with("__")).collect();
        let inits = picks
            .into_iter()
            .map(|pick| {
                let row = rows.row(pick);
                let mut object = Map::new();
                for variable in &variables {
                    let values: Vec<f64> = variable
                        .columns
                        .iter()
                        .map(|c| c.map_or(f64::NAN, |c| row[c]))
                        .collect();
                    object.insert(variable.name.clone(), nested(&variable.dims, &values));
                }
                Value::Object(object)
            })
            .collect();
        Ok(inits)
    }

    /// The data viewed as `(rows, names)`, flattening the draw axes.
    fn rows(&self) -> StanResult<ArrayView2<'_, f64>> {
        let num_names = self.parameters.len();
        let num_rows = if num_names == 0 { 0 } else { self.data.len() / num_names };
        self.data
            .view()
            .into_shape_with_order((num_rows, num_names))
            .map_err(|err| StanError::InvalidInput { reason: err.to_string() })
    }

    /// Group columns into variables, preserving first-appearance order.
    fn layout(&self) -> Vec<Variable> {
        let mut order: Vec<String> = Vec::new();
        let mut entries: HashMap<String, Vec<(Vec<usize>, usize)>> = HashMap::new();
        for (column, full_name) in self.parameters.iter().enumerate() {
            let (base, indices) = split_indices(full_name);
            if !entries.contains_key(base) {
                order.push(base.to_string());
            }
            entries.entry(base.to_string()).or_default().push((indices, column));
        }

        order
            .into_iter()
            .map(|name| {
                let cells = entries.remove(&name).unwrap_or_default();
                let rank = cells.iter().map(|(idx, _)| idx.len()).max().unwrap_or(0);
                let mut dims = vec![0; rank];
                for (idx, _) in cells.iter().filter(|(idx, _)| idx.len() == rank) {
                    for (d, &i) in dims.iter_mut().zip(idx) {
                        *d = (*d).max(i);
                    }
                }
                let size = dims.iter().product::<usize>();
                let mut columns = vec![None; size];
                for (idx, column) in cells {
                    if idx.len() != rank {
                        continue;
                    }
                    let offset = idx.iter().zip(&dims).fold(0, |acc, (&i, &d)| acc * d + (i - 1));
                    columns[offset] = Some(column);
                }
                Variable { name, dims, columns }
            })
            .collect()
    }
}

/// Split `theta.2.3` into `("theta", [2, 3])`. Names whose suffix is not a
/// list of positive integers are treated as scalars.
fn split_indices(full_name: &str) -> (&str, Vec<usize>) {
    if let Some((base, rest)) = full_name.split_once('.') {
        let indices: Option<Vec<usize>> =
            rest.split('.').map(|s| s.parse::<usize>().ok().filter(|&i| i >= 1)).collect();
        if let Some(indices) = indices {
            return (base, indices);
        }
    }
    (full_name, Vec::new())
}

fn json_number(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String("NaN".to_string()),
        None if value > 0.0 => Value::String("Inf".to_string()),
        None => Value::String("-Inf".to_string()),
    }
}

/// Build a nested JSON array of shape `dims` from row-major `values`.
fn nested(dims: &[usize], values: &[f64]) -> Value {
    match dims {
        [] => values.first().map_or(Value::Null, |&v| json_number(v)),
        [_] => Value::Array(values.iter().map(|&v| json_number(v)).collect()),
        [_, inner @ ..] => {
            let chunk = inner.iter().product::<usize>().max(1);
            Value::Array(values.chunks(chunk).map(|c| nested(inner, c)).collect())
        }
    }
}
