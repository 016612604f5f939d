//! Execution backends
//!
//! A backend takes a folded `(folded_length, segments, samples)` view and
//! applies the unit computation to all of it, returning
//! `(folded_length, *unit_output_dims)` in input order.
//!
//! ## Variants
//!
//! - [`VectorizedBackend`] - one call per chunk of `chunk_size` elements,
//!   chunks processed in order on the calling thread
//! - [`ThreadParallelBackend`] - one task per element on an owned worker
//!   pool, results gathered by index
//!
//! Both validate rank and precision before dispatching anything, and both
//! run the unit computation in f32 (fp16 inputs are widened per chunk or
//! unit and the result narrowed back).

mod parallel;
mod vectorized;

use std::any::Any;

pub use parallel::ThreadParallelBackend;
pub use vectorized::VectorizedBackend;

use crate::config::{BackendKind, HandlerConfig};
use crate::error::{BenchError, Result, UnitError};
use crate::tensor::{Element, Precision, Tensor, TensorView};
use crate::unit::UnitComputation;

/// Rank of the folded input every backend accepts
pub const FOLDED_RANK: usize = 3;

/// Common contract of the execution backends
pub trait ExecutionBackend: Send + Sync {
    /// Build the backend from the fields of `config` it uses
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if those fields are invalid
    fn from_config(config: &HandlerConfig) -> Result<Self>
    where
        Self: Sized;

    /// Which variant this is
    fn kind(&self) -> BackendKind;

    /// Precision the backend accepts and produces
    fn precision(&self) -> Precision;

    /// Apply `unit` over the folded batch axis
    ///
    /// # Errors
    ///
    /// - [`BenchError::Validation`] if the input is rejected before dispatch
    /// - [`BenchError::UnitComputation`] / [`BenchError::UnitFailures`] if
    ///   the unit computation fails
    /// - [`BenchError::Shape`] if unit outputs cannot be reassembled
    fn run<T: Element>(
        &self,
        folded: &TensorView<'_, T>,
        unit: &dyn UnitComputation,
    ) -> Result<Tensor<T>>;
}

/// Reject inputs a backend must not start on
///
/// # Errors
///
/// Returns [`BenchError::Validation`] on rank, precision, sample-length or
/// empty-batch mismatch
pub fn validate_folded<T: Element>(
    folded: &TensorView<'_, T>,
    precision: Precision,
    sequence_length: usize,
) -> Result<()> {
    if folded.rank() != FOLDED_RANK {
        return Err(BenchError::Validation {
            reason: format!(
                "expected folded rank {} (batch, segment, sample), got shape {:?}",
                FOLDED_RANK,
                folded.shape()
            ),
        });
    }
    if T::PRECISION != precision {
        return Err(BenchError::Validation {
            reason: format!(
                "input precision {} does not match configured {}",
                T::PRECISION,
                precision
            ),
        });
    }
    let samples = folded.shape()[FOLDED_RANK - 1];
    if samples != sequence_length {
        return Err(BenchError::Validation {
            reason: format!(
                "sample axis has length {}, configured sequence_length is {}",
                samples, sequence_length
            ),
        });
    }
    if folded.shape()[0] == 0 {
        return Err(BenchError::Validation {
            reason: "folded batch axis is empty".to_string(),
        });
    }
    Ok(())
}

/// Run `unit` in f32 and convert the result back to `T`
pub(crate) fn apply_unit<T: Element>(
    unit: &dyn UnitComputation,
    input: &TensorView<'_, T>,
) -> std::result::Result<Tensor<T>, UnitError> {
    let output = match T::as_f32_view(input) {
        Some(view) => unit.compute(&view)?,
        None => unit.compute(&input.to_f32().view())?,
    };
    Ok(T::from_f32_tensor(output))
}

/// Describe a caught unit panic
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("unit task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("unit task panicked: {}", s)
    } else {
        "unit task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[test]
    fn test_validate_rank() {
        let t = Tensor::from_vec(vec![2, 8], vec![0.0f32; 16]).expect("test");
        assert!(matches!(
            validate_folded(&t.view(), Precision::F32, 8),
            Err(BenchError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_precision() {
        let t = Tensor::from_vec(vec![2, 1, 8], vec![f16::ZERO; 16]).expect("test");
        assert!(validate_folded(&t.view(), Precision::F16, 8).is_ok());
        assert!(matches!(
            validate_folded(&t.view(), Precision::F32, 8),
            Err(BenchError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_sequence_length() {
        let t = Tensor::from_vec(vec![2, 1, 8], vec![0.0f32; 16]).expect("test");
        assert!(validate_folded(&t.view(), Precision::F32, 16).is_err());
    }

    #[test]
    fn test_apply_unit_narrows_to_input_precision() {
        let unit = crate::unit::MeanScaledTemplate::new(1, 2);
        let t = Tensor::from_vec(vec![1, 2], vec![f16::from_f32(1.0), f16::from_f32(3.0)])
            .expect("test");
        let out = apply_unit(&unit, &t.view()).expect("test");
        assert_eq!(out.shape(), &[1, 1, 2]);
        assert_eq!(out.data(), &[f16::from_f32(2.0), f16::from_f32(4.0)]);
    }

    #[test]
    fn test_panic_message_reads_payload() {
        assert_eq!(panic_message(&"boom"), "unit task panicked: boom");
        assert_eq!(
            panic_message(&String::from("bang")),
            "unit task panicked: bang"
        );
        assert_eq!(panic_message(&7u8), "unit task panicked");
    }
}
