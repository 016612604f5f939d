//! Chunked vectorized backend
//!
//! Slices the folded batch axis into chunks of at most `chunk_size` and
//! hands each chunk to the unit computation in one call, on the calling
//! thread. Outputs are concatenated along axis 0 in chunk order, so for a
//! unit computation that treats batch elements independently the result is
//! the same for every chunk size. A panicking unit computation is reported
//! as a failure of the chunk it was given, like any other unit error.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::debug;

use super::{apply_unit, panic_message, validate_folded, ExecutionBackend};
use crate::chunk::ChunkPlan;
use crate::config::{BackendKind, HandlerConfig};
use crate::error::{BenchError, Result, UnitError};
use crate::tensor::{concat_axis0, Element, Precision, Tensor, TensorView};
use crate::unit::UnitComputation;

/// Single-threaded, chunk-at-a-time backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorizedBackend {
    chunk_size: usize,
    precision: Precision,
    sequence_length: usize,
}

impl VectorizedBackend {
    /// Create a backend dispatching chunks of at most `chunk_size`
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if `chunk_size` is zero
    pub fn new(chunk_size: usize, precision: Precision, sequence_length: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BenchError::Config {
                reason: "chunk_size must be > 0".to_string(),
            });
        }
        Ok(Self {
            chunk_size,
            precision,
            sequence_length,
        })
    }

    /// Maximum elements per unit-computation call
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl ExecutionBackend for VectorizedBackend {
    fn from_config(config: &HandlerConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.precision, config.sequence_length)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Vectorized
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    #[tracing::instrument(
        name = "vectorized_run",
        skip_all,
        fields(folded_length = folded.shape().first().copied().unwrap_or(0), chunk_size = self.chunk_size)
    )]
    fn run<T: Element>(
        &self,
        folded: &TensorView<'_, T>,
        unit: &dyn UnitComputation,
    ) -> Result<Tensor<T>> {
        validate_folded(folded, self.precision, self.sequence_length)?;

        let start = Instant::now();
        let plan = ChunkPlan::new(folded.shape()[0], self.chunk_size)?;
        let mut parts = Vec::with_capacity(plan.n_chunks());

        for chunk in &plan {
            let slice = folded.slice_axis0(chunk.start, chunk.end)?;
            let output = catch_unwind(AssertUnwindSafe(|| apply_unit(unit, &slice)))
                .unwrap_or_else(|payload| Err(UnitError::new(panic_message(&*payload))))
                .map_err(|source| BenchError::UnitComputation {
                    index: chunk.start,
                    source,
                })?;
            if output.shape()[0] != chunk.len() {
                return Err(BenchError::Shape {
                    reason: format!(
                        "unit computation returned {} rows for chunk [{}, {})",
                        output.shape()[0],
                        chunk.start,
                        chunk.end
                    ),
                });
            }
            parts.push(output);
        }

        let result = concat_axis0(parts)?;
        debug!(
            n_chunks = plan.n_chunks(),
            elapsed_us = start.elapsed().as_micros() as u64,
            output_shape = ?result.shape(),
            "vectorized run complete"
        );
        Ok(result)
    }
}
