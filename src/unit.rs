//! Unit computation seam
//!
//! The metric itself (filtering, Hilbert transform, modulation index) is
//! supplied by the caller through [`UnitComputation`]. The engine only
//! relies on its shape contract: every leading axis of the input is
//! preserved, and the trailing sample axis is replaced by whatever the
//! metric produces (typically an `(n_pha, n_amp)` matrix).
//!
//! ```text
//! vectorized:       (chunk, S, T) -> (chunk, S, n_pha, n_amp)
//! thread-parallel:         (S, T) ->        (S, n_pha, n_amp)
//! ```
//!
//! Implementations must be safe to call from several worker threads at
//! once; any precomputed state (filter coefficients, templates) is read-only.

use crate::bands::FrequencyAxes;
use crate::error::UnitError;
use crate::tensor::{Tensor, TensorView};

/// A batched metric applied to one chunk or one unit
pub trait UnitComputation: Send + Sync {
    /// Apply the metric
    ///
    /// # Errors
    ///
    /// Returns [`UnitError`] if the metric cannot be computed for `input`
    fn compute(&self, input: &TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError>;
}

impl<F> UnitComputation for F
where
    F: Fn(&TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError> + Send + Sync,
{
    fn compute(&self, input: &TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError> {
        self(input)
    }
}

/// Deterministic stand-in metric: a fixed `(n_pha, n_amp)` template scaled
/// by the mean of each sample trace
///
/// Every trace is reduced independently, so results do not depend on how
/// traces are batched. Used for parity tests and backend benchmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanScaledTemplate {
    n_pha: usize,
    n_amp: usize,
    template: Vec<f32>,
}

impl MeanScaledTemplate {
    /// Template with entries `1, 2, ..., n_pha * n_amp` in row-major order
    #[must_use]
    pub fn new(n_pha: usize, n_amp: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let template = (0..n_pha * n_amp).map(|i| (i + 1) as f32).collect();
        Self {
            n_pha,
            n_amp,
            template,
        }
    }

    /// Template shaped after a handler's frequency axes
    #[must_use]
    pub fn for_axes(axes: &FrequencyAxes) -> Self {
        Self::new(axes.phase.len(), axes.amplitude.len())
    }

    /// Output matrix shape `(n_pha, n_amp)`
    #[must_use]
    pub const fn output_dims(&self) -> (usize, usize) {
        (self.n_pha, self.n_amp)
    }
}

impl UnitComputation for MeanScaledTemplate {
    fn compute(&self, input: &TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError> {
        let shape = input.shape();
        let n_samples = shape[shape.len() - 1];
        if n_samples == 0 {
            return Err(UnitError::new("sample axis is empty"));
        }

        let n_traces = input.data().len() / n_samples;
        let mut out = Vec::with_capacity(n_traces * self.template.len());
        for trace in input.data().chunks_exact(n_samples) {
            #[allow(clippy::cast_precision_loss)]
            let mean = trace.iter().sum::<f32>() / n_samples as f32;
            if !mean.is_finite() {
                return Err(UnitError::new(format!("non-finite trace mean {}", mean)));
            }
            out.extend(self.template.iter().map(|&t| t * mean));
        }

        let mut out_shape = shape[..shape.len() - 1].to_vec();
        out_shape.push(self.n_pha);
        out_shape.push(self.n_amp);
        Tensor::from_vec(out_shape, out).map_err(|e| UnitError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_scales_by_trace_mean() {
        let unit = MeanScaledTemplate::new(2, 3);
        let input = Tensor::from_vec(vec![2, 4], vec![1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 6.0, 8.0])
            .expect("test");
        let out = unit.compute(&input.view()).expect("test");
        assert_eq!(out.shape(), &[2, 2, 3]);
        assert_eq!(&out.data()[..6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(&out.data()[6..], &[5.0, 10.0, 15.0, 20.0, 25.0, 30.0]);
    }

    #[test]
    fn test_rank_one_input() {
        let unit = MeanScaledTemplate::new(5, 4);
        let input = Tensor::from_vec(vec![3], vec![3.0, 3.0, 3.0]).expect("test");
        let out = unit.compute(&input.view()).expect("test");
        assert_eq!(out.shape(), &[5, 4]);
        assert_eq!(out.data()[19], 60.0);
    }

    #[test]
    fn test_empty_sample_axis_fails() {
        let unit = MeanScaledTemplate::new(1, 1);
        let input = Tensor::<f32>::from_vec(vec![2, 0], vec![]).expect("test");
        assert!(unit.compute(&input.view()).is_err());
    }

    fn negate(input: &TensorView<'_, f32>) -> Result<Tensor<f32>, UnitError> {
        let data = input.data().iter().map(|v| -v).collect();
        Tensor::from_vec(input.shape().to_vec(), data).map_err(|e| UnitError::new(e.to_string()))
    }

    #[test]
    fn test_functions_are_unit_computations() {
        let unit: &dyn UnitComputation = &negate;
        let input = Tensor::from_vec(vec![2], vec![1.0, -2.0]).expect("test");
        let out = unit.compute(&input.view()).expect("test");
        assert_eq!(out.data(), &[-1.0, 2.0]);
    }
}
