//! Driver-side helpers
//!
//! Utilities a benchmark driver layers on top of a [`Handler`]: a trial
//! loop that catches failures per configuration instead of aborting the
//! sweep, cross-backend parity checks, speed ratios, and the optional
//! segment-averaging post-step. None of these are part of the handler's
//! compute contract.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BenchError, Result};
use crate::handler::{Handler, HandlerStats};
use crate::tensor::{Element, Tensor, TensorData};
use crate::timing::IntervalStat;

/// Outcome of repeated `compute` calls on one handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    /// Handler name
    pub name: String,
    /// Calls requested
    pub requested: usize,
    /// Calls that completed successfully
    pub completed: usize,
    /// Shape of the last successful result
    pub output_shape: Option<Vec<usize>>,
    /// Timing, when every interval could be paired
    pub stats: Option<HandlerStats>,
    /// First failure, if any
    pub error: Option<String>,
}

impl TrialReport {
    /// Whether every requested call completed
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.completed == self.requested
    }
}

/// Call `compute` up to `n_calc` times, stopping at the first failure
///
/// Failures are logged and captured in the report rather than returned,
/// so a sweep over many configurations can move on.
pub fn run_trial(handler: &mut dyn Handler, signal: &TensorData, n_calc: usize) -> TrialReport {
    let mut report = TrialReport {
        name: handler.name().to_string(),
        requested: n_calc,
        completed: 0,
        output_shape: None,
        stats: None,
        error: None,
    };

    for i in 0..n_calc {
        match handler.compute(signal) {
            Ok(result) => {
                report.completed += 1;
                report.output_shape = Some(result.shape().to_vec());
            }
            Err(err) => {
                warn!(handler = %report.name, iteration = i, error = %err, "compute failed");
                report.error = Some(err.to_string());
                break;
            }
        }
    }

    match handler.stats() {
        Ok(stats) => {
            info!(
                handler = %report.name,
                calc_mean_sec = stats.calc.mean_seconds,
                calc_std_sec = stats.calc.std_seconds,
                calc_n = stats.calc.count,
                "trial complete"
            );
            report.stats = Some(stats);
        }
        Err(err) => {
            if report.error.is_none() {
                report.error = Some(err.to_string());
            }
        }
    }
    report
}

/// Element-wise agreement between two results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    /// Elements compared
    pub n_elements: usize,
    /// Largest `|a - b|`
    pub max_abs_diff: f64,
    /// Largest `|a - b| / |b|` over elements with `b != 0`
    pub max_rel_diff: f64,
    /// Elements failing `|a - b| <= atol + rtol * |b|`
    pub mismatches: usize,
}

impl ParityReport {
    /// Whether every element is within tolerance
    #[must_use]
    pub const fn allclose(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compare two results element-wise in f64
///
/// NaN on either side counts as a mismatch.
///
/// # Errors
///
/// Returns [`BenchError::Shape`] if the shapes differ
pub fn compare_outputs(a: &TensorData, b: &TensorData, atol: f64, rtol: f64) -> Result<ParityReport> {
    if a.shape() != b.shape() {
        return Err(BenchError::Shape {
            reason: format!("cannot compare shapes {:?} and {:?}", a.shape(), b.shape()),
        });
    }
    let a = a.to_f32();
    let b = b.to_f32();

    let mut report = ParityReport {
        n_elements: a.len(),
        max_abs_diff: 0.0,
        max_rel_diff: 0.0,
        mismatches: 0,
    };
    for (&x, &y) in a.data().iter().zip(b.data()) {
        let (x, y) = (f64::from(x), f64::from(y));
        let diff = (x - y).abs();
        if diff.is_nan() || diff > atol + rtol * y.abs() {
            report.mismatches += 1;
        }
        if diff.is_finite() {
            report.max_abs_diff = report.max_abs_diff.max(diff);
            if y != 0.0 {
                report.max_rel_diff = report.max_rel_diff.max(diff / y.abs());
            }
        }
    }
    Ok(report)
}

/// How many times faster `candidate` ran than `reference`
///
/// Returns `None` if the candidate's mean is not positive.
#[must_use]
pub fn speed_ratio(reference: &IntervalStat, candidate: &IntervalStat) -> Option<f64> {
    (candidate.mean_seconds > 0.0).then(|| reference.mean_seconds / candidate.mean_seconds)
}

/// Average a tensor over one axis, removing it
///
/// # Errors
///
/// Returns [`BenchError::Shape`] if `axis` is out of range, the axis is
/// empty, or the tensor is rank 1
pub fn mean_over_axis<T: Element>(tensor: &Tensor<T>, axis: usize) -> Result<Tensor<T>> {
    let shape = tensor.shape();
    if shape.len() < 2 || axis >= shape.len() {
        return Err(BenchError::Shape {
            reason: format!("cannot reduce axis {} of shape {:?}", axis, shape),
        });
    }
    let len = shape[axis];
    if len == 0 {
        return Err(BenchError::Shape {
            reason: format!("axis {} of shape {:?} is empty", axis, shape),
        });
    }

    let outer: usize = shape[..axis].iter().product();
    let inner: usize = shape[axis + 1..].iter().product();
    let data = tensor.data();
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / len as f32;

    let mut out = Vec::with_capacity(outer * inner);
    for o in 0..outer {
        for i in 0..inner {
            let sum: f32 = (0..len)
                .map(|k| data[(o * len + k) * inner + i].to_f32())
                .sum();
            out.push(T::from_f32(sum * scale));
        }
    }

    let mut out_shape = shape.to_vec();
    out_shape.remove(axis);
    Tensor::from_vec(out_shape, out)
}

/// [`mean_over_axis`] for a precision-tagged tensor
///
/// # Errors
///
/// See [`mean_over_axis`]
pub fn mean_over_axis_data(tensor: &TensorData, axis: usize) -> Result<TensorData> {
    Ok(match tensor {
        TensorData::F16(t) => TensorData::F16(mean_over_axis(t, axis)?),
        TensorData::F32(t) => TensorData::F32(mean_over_axis(t, axis)?),
    })
}
