//! pacbench: batched dimension-folding execution engine
//!
//! Benchmarks interchangeable backends that turn a batched
//! `(batch, channel, segment, sample)` signal into a phase-amplitude
//! coupling style metric array, under controlled batch shape, chunk size,
//! precision and threading.
//!
//! ## Architecture
//!
//! ```text
//! signal -> Handler::compute
//!             -> fold (B, C, S, T) -> (B*C, S, T)
//!             -> backend.run         (vectorized chunks | thread-parallel units)
//!             -> unfold              (B*C, ...) -> (B, C, ...)
//!          -> result + init/calc IntervalStats
//! ```
//!
//! ## Modules
//!
//! - [`tensor`] - owned tensors, zero-copy views, precision tagging
//! - [`fold`] - fold leading axes into one and back
//! - [`chunk`] - chunk scheduling over the folded batch axis
//! - [`unit`] - the pluggable unit computation
//! - [`backend`] - vectorized and thread-parallel execution
//! - [`timing`] - labelled event log and interval statistics
//! - [`bands`] - band specs and frequency axes
//! - [`config`] - handler configuration
//! - [`handler`] - the handler contract and its implementation
//! - [`bench`] - trial loop, parity and speed helpers for drivers
//! - [`telemetry`] - tracing subscriber setup
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use pacbench::{build_handler, BackendKind, HandlerConfig, MeanScaledTemplate, Tensor, TensorData};
//!
//! let config = HandlerConfig::new(16, 512.0).with_backend(BackendKind::ThreadParallel);
//! let mut handler = build_handler(config, Arc::new(MeanScaledTemplate::new(5, 4))).unwrap();
//! let signal = Tensor::from_vec(vec![2, 3, 4, 16], vec![0.5f32; 384]).unwrap();
//! let pac = handler.compute(&TensorData::from(signal)).unwrap();
//! assert_eq!(pac.shape(), &[2, 3, 4, 5, 4]);
//! assert_eq!(handler.stats().unwrap().calc.count, 1);
//! ```

pub mod backend;
pub mod bands;
pub mod bench;
pub mod chunk;
pub mod config;
pub mod error;
pub mod fold;
pub mod handler;
pub mod telemetry;
pub mod tensor;
pub mod timing;
pub mod unit;

pub use backend::{ExecutionBackend, ThreadParallelBackend, VectorizedBackend};
pub use bands::{BandSpec, FrequencyAxes, Resolution};
pub use config::{BackendKind, DeviceSpec, HandlerConfig};
pub use error::{BenchError, Result, UnitError};
pub use handler::{build_handler, Handler, HandlerState, HandlerStats, PacHandler};
pub use tensor::{Precision, Tensor, TensorData, TensorView};
pub use timing::{IntervalStat, TimingRecorder};
pub use unit::{MeanScaledTemplate, UnitComputation};
