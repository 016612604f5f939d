//! Thread-parallel backend
//!
//! Treats every element of the folded batch axis as an independent unit.
//! Each unit's `(segments, samples)` slice is handed to the unit
//! computation on a worker of a rayon pool owned by the backend; the pool
//! is built once and reused across runs.
//!
//! Results are gathered by unit index through an indexed parallel
//! iterator, so output order never depends on completion order. All
//! units run to completion; every failing index (including panics) is
//! reported together once the pool has joined.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use super::{apply_unit, panic_message, validate_folded, ExecutionBackend};
use crate::config::{BackendKind, HandlerConfig};
use crate::error::{BenchError, Result, UnitError, UnitFailure};
use crate::tensor::{Element, Precision, Tensor, TensorView};
use crate::unit::UnitComputation;

/// One task per unit on an owned worker pool
pub struct ThreadParallelBackend {
    pool: ThreadPool,
    precision: Precision,
    sequence_length: usize,
}

impl std::fmt::Debug for ThreadParallelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadParallelBackend")
            .field("threads", &self.pool.current_num_threads())
            .field("precision", &self.precision)
            .field("sequence_length", &self.sequence_length)
            .finish()
    }
}

impl ThreadParallelBackend {
    /// Create a backend with a pool of `threads` workers
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if `threads` is zero or the pool
    /// cannot be built
    pub fn new(threads: usize, precision: Precision, sequence_length: usize) -> Result<Self> {
        if threads == 0 {
            return Err(BenchError::Config {
                reason: "worker pool needs at least one thread".to_string(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pacbench-worker-{}", i))
            .build()
            .map_err(|e| BenchError::Config {
                reason: format!("failed to build worker pool: {}", e),
            })?;
        debug!(threads, "worker pool created");
        Ok(Self {
            pool,
            precision,
            sequence_length,
        })
    }

    /// Number of workers in the pool
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ExecutionBackend for ThreadParallelBackend {
    fn from_config(config: &HandlerConfig) -> Result<Self> {
        Self::new(
            config.device.resolve_threads(),
            config.precision,
            config.sequence_length,
        )
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ThreadParallel
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    #[tracing::instrument(
        name = "thread_parallel_run",
        skip_all,
        fields(folded_length = folded.shape().first().copied().unwrap_or(0), threads = self.threads())
    )]
    fn run<T: Element>(
        &self,
        folded: &TensorView<'_, T>,
        unit: &dyn UnitComputation,
    ) -> Result<Tensor<T>> {
        validate_folded(folded, self.precision, self.sequence_length)?;

        let start = Instant::now();
        let n_units = folded.shape()[0];

        let outcomes: Vec<std::result::Result<Tensor<T>, UnitError>> = self.pool.install(|| {
            (0..n_units)
                .into_par_iter()
                .map(|index| {
                    let slice = folded
                        .index_axis0(index)
                        .map_err(|e| UnitError::new(e.to_string()))?;
                    catch_unwind(AssertUnwindSafe(|| apply_unit(unit, &slice)))
                        .unwrap_or_else(|payload| Err(UnitError::new(panic_message(&*payload))))
                })
                .collect()
        });

        let mut outputs = Vec::with_capacity(n_units);
        let mut failures = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(tensor) => outputs.push(tensor),
                Err(error) => failures.push(UnitFailure { index, error }),
            }
        }
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                total = n_units,
                "thread-parallel run had failing units"
            );
            return Err(BenchError::UnitFailures { failures });
        }

        let unit_shape = outputs[0].shape().to_vec();
        let mut data = Vec::with_capacity(n_units * outputs[0].len());
        for (index, output) in outputs.into_iter().enumerate() {
            if output.shape() != unit_shape.as_slice() {
                return Err(BenchError::Shape {
                    reason: format!(
                        "unit {} returned shape {:?}, unit 0 returned {:?}",
                        index,
                        output.shape(),
                        unit_shape
                    ),
                });
            }
            data.extend(output.into_data());
        }

        let mut shape = Vec::with_capacity(unit_shape.len() + 1);
        shape.push(n_units);
        shape.extend(unit_shape);
        let result = Tensor::from_vec(shape, data)?;

        debug!(
            n_units,
            elapsed_us = start.elapsed().as_micros() as u64,
            output_shape = ?result.shape(),
            "thread-parallel run complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::MeanScaledTemplate;

    fn folded_input(n: usize, segments: usize, samples: usize) -> Tensor<f32> {
        let data = (0..n * segments * samples).map(|i| i as f32).collect();
        Tensor::from_vec(vec![n, segments, samples], data).expect("test")
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(ThreadParallelBackend::new(0, Precision::F32, 4).is_err());
    }

    #[test]
    fn test_units_see_kept_axes_only() {
        let backend = ThreadParallelBackend::new(2, Precision::F32, 4).expect("test");
        let input = folded_input(3, 2, 4);
        let check = |view: &TensorView<'_, f32>| -> std::result::Result<Tensor<f32>, UnitError> {
            assert_eq!(view.shape(), &[2, 4]);
            Ok(view.to_tensor())
        };
        let out = backend.run(&input.view(), &check).expect("test");
        assert_eq!(out, input);
    }

    #[test]
    fn test_matches_template_shape() {
        let backend = ThreadParallelBackend::new(4, Precision::F32, 4).expect("test");
        let input = folded_input(6, 3, 4);
        let out = backend
            .run(&input.view(), &MeanScaledTemplate::new(5, 4))
            .expect("test");
        assert_eq!(out.shape(), &[6, 3, 5, 4]);
    }

    struct FailOdd;

    impl UnitComputation for FailOdd {
        fn compute(&self, input: &TensorView<'_, f32>) -> std::result::Result<Tensor<f32>, UnitError> {
            // Each unit is (1, 1) holding its own index
            let idx = input.data()[0] as usize;
            if idx % 2 == 1 {
                return Err(UnitError::new(format!("odd unit {}", idx)));
            }
            Ok(input.to_tensor())
        }
    }

    #[test]
    fn test_all_failures_are_collected() {
        let backend = ThreadParallelBackend::new(3, Precision::F32, 1).expect("test");
        let input = folded_input(8, 1, 1);
        let err = backend.run(&input.view(), &FailOdd).unwrap_err();
        assert_eq!(err.failed_indices(), vec![1, 3, 5, 7]);
    }

    struct PanicAt(usize);

    impl UnitComputation for PanicAt {
        fn compute(&self, input: &TensorView<'_, f32>) -> std::result::Result<Tensor<f32>, UnitError> {
            if input.data()[0] as usize == self.0 {
                panic!("unit exploded");
            }
            Ok(input.to_tensor())
        }
    }

    #[test]
    fn test_panics_become_unit_failures() {
        let backend = ThreadParallelBackend::new(2, Precision::F32, 1).expect("test");
        let input = folded_input(4, 1, 1);
        let err = backend.run(&input.view(), &PanicAt(2)).unwrap_err();
        match err {
            BenchError::UnitFailures { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 2);
                assert!(failures[0].error.message().contains("unit exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pool_is_reused_across_runs() {
        let backend = ThreadParallelBackend::new(2, Precision::F32, 4).expect("test");
        let input = folded_input(5, 1, 4);
        let unit = MeanScaledTemplate::new(2, 2);
        let first = backend.run(&input.view(), &unit).expect("test");
        let second = backend.run(&input.view(), &unit).expect("test");
        assert_eq!(first, second);
        assert_eq!(backend.threads(), 2);
    }
}
