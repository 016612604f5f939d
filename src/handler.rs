//! Benchmark handlers
//!
//! A handler owns one configuration, one execution backend, the derived
//! frequency axes and a timing recorder, and exposes a single
//! [`Handler::compute`] entry point that folds the signal, runs the
//! backend and unfolds the result. Handlers for both backends implement
//! the same [`Handler`] trait so a benchmark driver can swap them freely.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Initializing ("init_start") -> Ready ("init_end")
//! Ready -> Computing ("calc_start") -> Ready ("calc_end" | "calc_failed")
//! ```
//!
//! Every handler logs under its own scope (`"handler#<id>:<label>"`), so
//! several handlers can share one [`TimingRecorder`] and still report only
//! their own intervals.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use pacbench::config::HandlerConfig;
//! use pacbench::handler::build_handler;
//! use pacbench::tensor::{Tensor, TensorData};
//! use pacbench::unit::MeanScaledTemplate;
//!
//! let config = HandlerConfig::new(16, 512.0);
//! let mut handler = build_handler(config, Arc::new(MeanScaledTemplate::new(5, 4))).unwrap();
//! let signal = Tensor::from_vec(vec![2, 3, 4, 16], vec![1.0f32; 384]).unwrap();
//! let pac = handler.compute(&TensorData::from(signal)).unwrap();
//! assert_eq!(pac.shape(), &[2, 3, 4, 5, 4]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{validate_folded, ExecutionBackend, ThreadParallelBackend, VectorizedBackend};
use crate::bands::FrequencyAxes;
use crate::config::{BackendKind, HandlerConfig};
use crate::error::{BenchError, Result};
use crate::fold::{fold, unfold};
use crate::tensor::{Element, Tensor, TensorData};
use crate::timing::{
    IntervalStat, TimingRecorder, CALC_END, CALC_FAILED, CALC_START, INIT_END, INIT_START,
};
use crate::unit::UnitComputation;

/// Rank of the signal accepted by [`Handler::compute`]: (batch, channel, segment, sample)
pub const SIGNAL_RANK: usize = 4;

/// Trailing axes kept out of the fold: (segment, sample)
const KEPT_AXES: usize = 2;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(0);

/// Lifecycle state of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerState {
    /// Nothing built yet
    Uninitialized,
    /// Building the backend and frequency axes
    Initializing,
    /// Accepting `compute` calls
    Ready,
    /// Inside a backend run
    Computing,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Computing => "computing",
        };
        write!(f, "{}", name)
    }
}

/// Init and calc timing of one handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerStats {
    /// Handler name
    pub name: String,
    /// Model initialisation timing
    pub init: IntervalStat,
    /// Backend run timing
    pub calc: IntervalStat,
}

/// Contract shared by every handler
pub trait Handler: Send {
    /// Backend name
    fn name(&self) -> &'static str;

    /// Configuration the handler was built from
    fn config(&self) -> &HandlerConfig;

    /// Current lifecycle state
    fn state(&self) -> HandlerState;

    /// Compute the metric for a `(batch, channel, segment, sample)` signal
    ///
    /// Returns `(batch, channel, *backend_dims)`.
    ///
    /// # Errors
    ///
    /// - [`BenchError::NotReady`] outside the `Ready` state
    /// - [`BenchError::Shape`] if the signal is not rank 4 or has an empty
    ///   batch/channel axis
    /// - [`BenchError::Validation`] on precision or sample-length mismatch
    /// - unit computation errors from the backend
    fn compute(&mut self, signal: &TensorData) -> Result<TensorData>;

    /// Phase and amplitude axes derived at initialisation
    fn frequency_axes(&self) -> &FrequencyAxes;

    /// Init and calc interval statistics
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Stats`] if either label pair is unmatched
    fn stats(&self) -> Result<HandlerStats>;

    /// Recorder holding this handler's timeline
    fn recorder(&self) -> &TimingRecorder;

    /// Label under which this handler records `event` (e.g. [`CALC_START`])
    fn timing_label(&self, event: &str) -> String;

    /// Rebuild the backend and frequency axes, recording another init pair
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if the backend cannot be rebuilt; the
    /// previous backend stays in place
    fn reinitialize(&mut self) -> Result<()>;
}

/// Handler over a concrete backend
pub struct PacHandler<B: ExecutionBackend> {
    config: HandlerConfig,
    backend: B,
    unit: Arc<dyn UnitComputation>,
    axes: FrequencyAxes,
    recorder: TimingRecorder,
    scope: String,
    state: HandlerState,
}

/// Puts the handler back in `Ready` when dropped, including on unwind
struct ReadyOnDrop<'a>(&'a mut HandlerState);

impl Drop for ReadyOnDrop<'_> {
    fn drop(&mut self) {
        *self.0 = HandlerState::Ready;
    }
}

fn scoped(scope: &str, event: &str) -> String {
    format!("{}:{}", scope, event)
}

impl<B: ExecutionBackend> fmt::Debug for PacHandler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacHandler")
            .field("backend", &self.backend.kind())
            .field("state", &self.state)
            .field("scope", &self.scope)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build the backend and axes between an init_start/init_end pair
fn init_model<B: ExecutionBackend>(
    config: &HandlerConfig,
    recorder: &TimingRecorder,
    scope: &str,
) -> Result<(B, FrequencyAxes)> {
    let start = Instant::now();
    recorder.record(&scoped(scope, INIT_START));
    let backend = B::from_config(config)?;
    let axes = FrequencyAxes::from_specs(&config.phase_bands, &config.amplitude_bands);
    recorder.record(&scoped(scope, INIT_END));
    info!(
        scope,
        backend = backend.kind().name(),
        precision = %config.precision,
        n_pha = axes.phase.len(),
        n_amp = axes.amplitude.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "handler initialised"
    );
    Ok((backend, axes))
}

impl<B: ExecutionBackend> PacHandler<B> {
    /// Validate `config` and initialise a handler with its own recorder
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if the configuration is invalid or
    /// the backend cannot be built
    pub fn new(config: HandlerConfig, unit: Arc<dyn UnitComputation>) -> Result<Self> {
        Self::with_recorder(config, unit, TimingRecorder::new())
    }

    /// Like [`PacHandler::new`] but logging to a shared recorder
    ///
    /// The handler's events are scoped, so [`Handler::stats`] only pairs
    /// intervals this handler recorded.
    ///
    /// # Errors
    ///
    /// See [`PacHandler::new`]
    pub fn with_recorder(
        config: HandlerConfig,
        unit: Arc<dyn UnitComputation>,
        recorder: TimingRecorder,
    ) -> Result<Self> {
        config.validate()?;
        let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed);
        let scope = format!("handler#{}", id);
        let (backend, axes) = init_model::<B>(&config, &recorder, &scope)?;
        Ok(Self {
            config,
            backend,
            unit,
            axes,
            recorder,
            scope,
            state: HandlerState::Ready,
        })
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Phase band centres in Hz
    #[must_use]
    pub fn freqs_pha(&self) -> &[f64] {
        &self.axes.phase.centers
    }

    /// Amplitude band centres in Hz
    #[must_use]
    pub fn freqs_amp(&self) -> &[f64] {
        &self.axes.amplitude.centers
    }

    fn compute_typed<T: Element>(&mut self, signal: &Tensor<T>) -> Result<Tensor<T>> {
        let (folded, plan) = fold(signal, KEPT_AXES)?;
        // Rejected inputs never open a timing interval
        validate_folded(&folded, self.config.precision, self.config.sequence_length)?;

        self.state = HandlerState::Computing;
        self.recorder.record(&scoped(&self.scope, CALC_START));
        let outcome = {
            let _ready = ReadyOnDrop(&mut self.state);
            self.backend.run(&folded, self.unit.as_ref())
        };

        match outcome {
            Ok(result) => {
                self.recorder.record(&scoped(&self.scope, CALC_END));
                unfold(result, &plan)
            }
            Err(err) => {
                self.recorder.record(&scoped(&self.scope, CALC_FAILED));
                Err(err)
            }
        }
    }
}

impl<B: ExecutionBackend> Handler for PacHandler<B> {
    fn name(&self) -> &'static str {
        self.backend.kind().name()
    }

    fn config(&self) -> &HandlerConfig {
        &self.config
    }

    fn state(&self) -> HandlerState {
        self.state
    }

    #[tracing::instrument(skip_all, fields(backend = self.name(), shape = ?signal.shape()))]
    fn compute(&mut self, signal: &TensorData) -> Result<TensorData> {
        if self.state != HandlerState::Ready {
            return Err(BenchError::NotReady {
                state: self.state.to_string(),
            });
        }
        if signal.rank() != SIGNAL_RANK {
            return Err(BenchError::Shape {
                reason: format!(
                    "signal must be rank {} (batch, channel, segment, sample), got shape {:?}",
                    SIGNAL_RANK,
                    signal.shape()
                ),
            });
        }

        let start = Instant::now();
        let result = match signal {
            TensorData::F16(t) => self.compute_typed(t).map(TensorData::F16),
            TensorData::F32(t) => self.compute_typed(t).map(TensorData::F32),
        }?;
        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            output_shape = ?result.shape(),
            "compute complete"
        );
        Ok(result)
    }

    fn frequency_axes(&self) -> &FrequencyAxes {
        &self.axes
    }

    fn stats(&self) -> Result<HandlerStats> {
        let pair = |start: &str, end: &str| {
            self.recorder
                .interval_stats(&self.timing_label(start), &self.timing_label(end))
        };
        Ok(HandlerStats {
            name: self.name().to_string(),
            init: pair(INIT_START, INIT_END)?,
            calc: pair(CALC_START, CALC_END)?,
        })
    }

    fn recorder(&self) -> &TimingRecorder {
        &self.recorder
    }

    fn timing_label(&self, event: &str) -> String {
        scoped(&self.scope, event)
    }

    fn reinitialize(&mut self) -> Result<()> {
        let previous = self.state;
        self.state = HandlerState::Initializing;
        match init_model::<B>(&self.config, &self.recorder, &self.scope) {
            Ok((backend, axes)) => {
                self.backend = backend;
                self.axes = axes;
                self.state = HandlerState::Ready;
                Ok(())
            }
            Err(err) => {
                self.state = previous;
                Err(err)
            }
        }
    }
}

/// Build the handler selected by `config.backend`
///
/// # Errors
///
/// Returns [`BenchError::Config`] if the configuration is invalid
pub fn build_handler(
    config: HandlerConfig,
    unit: Arc<dyn UnitComputation>,
) -> Result<Box<dyn Handler>> {
    build_handler_with_recorder(config, unit, TimingRecorder::new())
}

/// Build the handler selected by `config.backend`, logging to `recorder`
///
/// # Errors
///
/// Returns [`BenchError::Config`] if the configuration is invalid
pub fn build_handler_with_recorder(
    config: HandlerConfig,
    unit: Arc<dyn UnitComputation>,
    recorder: TimingRecorder,
) -> Result<Box<dyn Handler>> {
    Ok(match config.backend {
        BackendKind::Vectorized => Box::new(PacHandler::<VectorizedBackend>::with_recorder(
            config, unit, recorder,
        )?),
        BackendKind::ThreadParallel => Box::new(
            PacHandler::<ThreadParallelBackend>::with_recorder(config, unit, recorder)?,
        ),
    })
}
