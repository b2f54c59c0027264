//! buffer — exact sizing and allocation of algorithm output storage.
//!
//! Purpose
//! -------
//! The engine writes results into caller-owned flat memory and cannot grow
//! it, so the shape of every output must be known before the call. This
//! module computes those shapes from the algorithm arguments, allocates
//! zeroed storage, and turns the filled storage into an `ArrayD<f64>`
//! without copying.
//!
//! Key behaviors
//! -------------
//! - One shape function per algorithm ([`sample_shape`],
//!   [`pathfinder_shape`], [`optimize_shape`], [`laplace_shape`]); the last
//!   axis is always the parameter-name axis.
//! - All size arithmetic is checked. An overflow is reported as
//!   [`StanError::BufferTooLarge`] instead of wrapping into an undersized
//!   buffer the engine would overrun.
//!
//! Invariants & assumptions
//! ------------------------
//! - `OutputBuffer::len() == shape.iter().product()` at all times.
//! - Storage is row-major (C order), matching the engine's write order.

use ndarray::{ArrayD, IxDyn};

use crate::errors::{StanError, StanResult};

/// Draws per chain written by the sampler: warmup draws only count when
/// they are saved.
pub fn sample_shape(
    num_chains: usize, num_warmup: usize, num_samples: usize, save_warmup: bool, num_names: usize,
) -> StanResult<Vec<usize>> {
    let warmup = if save_warmup { num_warmup } else { 0 };
    let draws = warmup.checked_add(num_samples).ok_or_else(|| StanError::BufferTooLarge {
        shape: vec![num_chains, num_warmup, num_samples, num_names],
    })?;
    Ok(vec![num_chains, draws, num_names])
}

/// Pathfinder returns the PSIS-resampled draws when both the log density
/// and resampling are on, and every draw of every path otherwise.
pub fn pathfinder_shape(
    num_draws: usize, num_paths: usize, num_multi_draws: usize, calculate_lp: bool,
    psis_resample: bool, num_names: usize,
) -> StanResult<Vec<usize>> {
    if calculate_lp && psis_resample {
        return Ok(vec![num_multi_draws, num_names]);
    }
    let draws = num_draws
        .checked_mul(num_paths)
        .ok_or_else(|| StanError::BufferTooLarge { shape: vec![num_draws, num_paths, num_names] })?;
    Ok(vec![draws, num_names])
}

pub fn optimize_shape(num_names: usize) -> Vec<usize> {
    vec![num_names]
}

pub fn laplace_shape(num_draws: usize, num_names: usize) -> Vec<usize> {
    vec![num_draws, num_names]
}

/// OutputBuffer — zero-initialized row-major storage of a known shape.
///
/// Fields
/// ------
/// - `shape`: logical shape of the result.
/// - `data`: flat storage handed to the engine as `(pointer, length)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBuffer {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl OutputBuffer {
    /// Allocate a zeroed buffer for `shape`.
    ///
    /// # Errors
    /// - [`StanError::BufferTooLarge`] if the element count overflows.
    pub fn zeros(shape: &[usize]) -> StanResult<OutputBuffer> {
        let len = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| StanError::BufferTooLarge { shape: shape.to_vec() })?;
        Ok(OutputBuffer { shape: shape.to_vec(), data: vec![0.0; len] })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Reinterpret the storage as an n-dimensional array (no copy).
    pub fn into_array(self) -> StanResult<ArrayD<f64>> {
        let OutputBuffer { shape, data } = self;
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|_| StanError::BufferTooLarge { shape: shape.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Per-algorithm shape formulas, including the Pathfinder branch.
    // - Overflow detection and zero-initialization.
    // - Conversion into `ArrayD` preserving element order.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify saved warmup draws are counted and unsaved ones are not.
    //
    // Given
    // -----
    // - 2 chains, 100 warmup, 100 samples, 9 names.
    //
    // Expect
    // ------
    // - (2, 100, 9) without saving warmup, (2, 200, 9) with it.
    fn sample_shape_counts_warmup_only_when_saved() {
        assert_eq!(sample_shape(2, 100, 100, false, 9).unwrap(), vec![2, 100, 9]);
        assert_eq!(sample_shape(2, 100, 100, true, 9).unwrap(), vec![2, 200, 9]);
        assert_eq!(sample_shape(1, 0, 1, true, 7).unwrap(), vec![1, 1, 7]);
    }

    #[test]
    // Purpose
    // -------
    // Check both Pathfinder output layouts.
    //
    // Given
    // -----
    // - 1000 draws, 4 paths, 250 multi-path draws, 4 names.
    //
    // Expect
    // ------
    // - Resampled: (250, 4). Any flag off: (4000, 4).
    fn pathfinder_shape_depends_on_resampling_flags() {
        assert_eq!(pathfinder_shape(1000, 4, 250, true, true, 4).unwrap(), vec![250, 4]);
        assert_eq!(pathfinder_shape(1000, 4, 250, false, true, 4).unwrap(), vec![4000, 4]);
        assert_eq!(pathfinder_shape(1000, 4, 250, true, false, 4).unwrap(), vec![4000, 4]);
    }

    #[test]
    fn optimize_and_laplace_shapes() {
        assert_eq!(optimize_shape(3), vec![3]);
        assert_eq!(laplace_shape(10, 5), vec![10, 5]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure size overflow is reported instead of wrapping.
    //
    // Given
    // -----
    // - A shape whose product exceeds `usize::MAX`.
    //
    // Expect
    // ------
    // - `BufferTooLarge` from both the shape function and the allocator.
    fn overflowing_shapes_are_rejected() {
        let shape = [usize::MAX, 2];
        assert_eq!(
            OutputBuffer::zeros(&shape),
            Err(StanError::BufferTooLarge { shape: shape.to_vec() })
        );
        assert!(matches!(
            pathfinder_shape(usize::MAX, 2, 1, false, false, 3),
            Err(StanError::BufferTooLarge { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Verify allocation is zeroed and conversion keeps row-major order.
    //
    // Given
    // -----
    // - A (2, 3) buffer whose flat storage is written as 0..6.
    //
    // Expect
    // ------
    // - Freshly allocated storage is all zero; element [1, 0] is 3.
    fn into_array_preserves_row_major_layout() {
        // Arrange
        let mut buffer = OutputBuffer::zeros(&[2, 3]).unwrap();
        assert_eq!(buffer.len(), 6);
        assert!(buffer.as_mut_slice().iter().all(|&v| v == 0.0));

        // Act
        for (i, v) in buffer.as_mut_slice().iter_mut().enumerate() {
            *v = i as f64;
        }
        let array = buffer.into_array().unwrap();

        // Assert
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array[[1, 0]], 3.0);
        assert_eq!(array[[0, 2]], 2.0);
    }
}
