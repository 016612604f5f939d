//! Handler configuration
//!
//! A [`HandlerConfig`] is built once per benchmark run and handed to the
//! handler, which keeps its own copy and never mutates it. Only CPU devices
//! are executable; the device string may pin the thread-parallel worker
//! count (`"cpu:8"`).
//!
//! ## Example
//!
//! ```
//! use pacbench::config::{BackendKind, HandlerConfig};
//! use pacbench::tensor::Precision;
//!
//! let config = HandlerConfig::new(2048, 512.0)
//!     .with_chunk_size(16)
//!     .with_precision(Precision::F16)
//!     .with_backend(BackendKind::ThreadParallel);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bands::BandSpec;
use crate::error::{BenchError, Result};
use crate::tensor::Precision;

/// Execution backend variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Chunked, single-threaded dispatch of batched unit computations
    #[default]
    Vectorized,
    /// One task per folded-batch element on a worker pool
    ThreadParallel,
}

impl BackendKind {
    /// Backend name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Vectorized => "vectorized",
            Self::ThreadParallel => "thread-parallel",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Execution device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    /// Host CPU, worker count = available hardware parallelism
    #[default]
    Cpu,
    /// Host CPU with a fixed worker count
    CpuThreads(NonZeroUsize),
}

impl DeviceSpec {
    /// Explicit worker count, if pinned
    #[must_use]
    pub const fn threads(&self) -> Option<NonZeroUsize> {
        match self {
            Self::Cpu => None,
            Self::CpuThreads(n) => Some(*n),
        }
    }

    /// Worker count to use: the pinned count or hardware parallelism
    #[must_use]
    pub fn resolve_threads(&self) -> usize {
        match self {
            Self::Cpu => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            Self::CpuThreads(n) => n.get(),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Self::Cpu);
        }
        if let Some(count) = s.strip_prefix("cpu:") {
            let n = count
                .parse::<usize>()
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| BenchError::Config {
                    reason: format!("invalid thread count '{}' in device spec", count),
                })?;
            return Ok(Self::CpuThreads(n));
        }
        Err(BenchError::Config {
            reason: format!("unsupported device '{}' (expected 'cpu' or 'cpu:<threads>')", s),
        })
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = BenchError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeviceSpec> for String {
    fn from(device: DeviceSpec) -> Self {
        device.to_string()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::CpuThreads(n) => write!(f, "cpu:{}", n),
        }
    }
}

fn default_phase_bands() -> BandSpec {
    BandSpec::default_phase()
}

fn default_amplitude_bands() -> BandSpec {
    BandSpec::default_amplitude()
}

const fn default_chunk_size() -> usize {
    3
}

/// Immutable parameters of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Samples per segment (last signal axis)
    pub sequence_length: usize,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Phase-providing bands
    #[serde(default = "default_phase_bands")]
    pub phase_bands: BandSpec,
    /// Amplitude-providing bands
    #[serde(default = "default_amplitude_bands")]
    pub amplitude_bands: BandSpec,
    /// Number of surrogates for the unit computation's null distribution
    #[serde(default)]
    pub surrogate_count: Option<usize>,
    /// Folded-batch elements per vectorized call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Signal and result precision
    #[serde(default)]
    pub precision: Precision,
    /// Execution backend
    #[serde(default)]
    pub backend: BackendKind,
    /// Execution device
    #[serde(default)]
    pub device: DeviceSpec,
}

impl HandlerConfig {
    /// Configuration with default bands, chunk size 3, fp32, vectorized, CPU
    #[must_use]
    pub fn new(sequence_length: usize, sampling_rate: f64) -> Self {
        Self {
            sequence_length,
            sampling_rate,
            phase_bands: default_phase_bands(),
            amplitude_bands: default_amplitude_bands(),
            surrogate_count: None,
            chunk_size: default_chunk_size(),
            precision: Precision::F32,
            backend: BackendKind::Vectorized,
            device: DeviceSpec::Cpu,
        }
    }

    /// Set phase bands
    #[must_use]
    pub fn with_phase_bands(mut self, bands: BandSpec) -> Self {
        self.phase_bands = bands;
        self
    }

    /// Set amplitude bands
    #[must_use]
    pub fn with_amplitude_bands(mut self, bands: BandSpec) -> Self {
        self.amplitude_bands = bands;
        self
    }

    /// Set surrogate count
    #[must_use]
    pub fn with_surrogates(mut self, count: usize) -> Self {
        self.surrogate_count = Some(count);
        self
    }

    /// Set vectorized chunk size
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set precision
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set backend
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set device
    #[must_use]
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }

    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(BenchError::Config {
                reason: "sequence_length must be > 0".to_string(),
            });
        }
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(BenchError::Config {
                reason: format!("sampling_rate {} must be finite and > 0", self.sampling_rate),
            });
        }
        self.phase_bands.validate(self.sampling_rate)?;
        self.amplitude_bands.validate(self.sampling_rate)?;
        if self.backend == BackendKind::Vectorized && self.chunk_size == 0 {
            return Err(BenchError::Config {
                reason: "chunk_size must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
