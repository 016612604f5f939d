//! Frequency band specifications and derived frequency axes
//!
//! A handler is configured with one [`BandSpec`] for the phase-providing
//! bands and one for the amplitude-providing bands. Band centres are spaced
//! linearly between `min_hz` and `max_hz`; each band extends a fixed
//! fraction of its centre to either side (a quarter for phase, an eighth
//! for amplitude).
//!
//! Named resolutions follow the tensorpac presets:
//!
//! | Preset  | Bands |
//! |---------|-------|
//! | `lres`  | 10    |
//! | `mres`  | 30    |
//! | `hres`  | 50    |
//! | `demon` | 70    |
//! | `hulk`  | 100   |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Named band-count preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 10 bands
    Lres,
    /// 30 bands
    Mres,
    /// 50 bands
    Hres,
    /// 70 bands
    Demon,
    /// 100 bands
    Hulk,
}

impl Resolution {
    /// Number of bands for this preset
    #[must_use]
    pub const fn n_bands(&self) -> usize {
        match self {
            Self::Lres => 10,
            Self::Mres => 30,
            Self::Hres => 50,
            Self::Demon => 70,
            Self::Hulk => 100,
        }
    }

    /// Preset with exactly `n_bands` bands, if one exists
    #[must_use]
    pub const fn from_n_bands(n_bands: usize) -> Option<Self> {
        match n_bands {
            10 => Some(Self::Lres),
            30 => Some(Self::Mres),
            50 => Some(Self::Hres),
            70 => Some(Self::Demon),
            100 => Some(Self::Hulk),
            _ => None,
        }
    }

    /// Preset name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Lres => "lres",
            Self::Mres => "mres",
            Self::Hres => "hres",
            Self::Demon => "demon",
            Self::Hulk => "hulk",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which side of the coupling a band provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    /// Low-frequency phase bands, half-width = centre / 4
    Phase,
    /// High-frequency amplitude bands, half-width = centre / 8
    Amplitude,
}

impl BandKind {
    const fn width_divisor(self) -> f64 {
        match self {
            Self::Phase => 4.0,
            Self::Amplitude => 8.0,
        }
    }
}

/// Linearly spaced frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    /// Lowest band centre in Hz
    pub min_hz: f64,
    /// Highest band centre in Hz
    pub max_hz: f64,
    /// Number of bands
    pub n_bands: usize,
}

impl BandSpec {
    /// Create a band spec
    #[must_use]
    pub const fn new(min_hz: f64, max_hz: f64, n_bands: usize) -> Self {
        Self {
            min_hz,
            max_hz,
            n_bands,
        }
    }

    /// Default phase bands: 2-20 Hz, 50 bands
    #[must_use]
    pub const fn default_phase() -> Self {
        Self::new(2.0, 20.0, 50)
    }

    /// Default amplitude bands: 80-160 Hz, 50 bands
    #[must_use]
    pub const fn default_amplitude() -> Self {
        Self::new(80.0, 160.0, 50)
    }

    /// Replace the band count with a named preset
    #[must_use]
    pub const fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.n_bands = resolution.n_bands();
        self
    }

    /// Check the spec against a sampling rate
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if the range is empty or not
    /// positive, there are no bands, or `max_hz` reaches Nyquist
    pub fn validate(&self, sampling_rate: f64) -> Result<()> {
        if self.n_bands == 0 {
            return Err(BenchError::Config {
                reason: "n_bands must be > 0".to_string(),
            });
        }
        if !(self.min_hz.is_finite() && self.max_hz.is_finite()) || self.min_hz <= 0.0 {
            return Err(BenchError::Config {
                reason: format!(
                    "band range [{}, {}] Hz must be finite and positive",
                    self.min_hz, self.max_hz
                ),
            });
        }
        if self.min_hz >= self.max_hz {
            return Err(BenchError::Config {
                reason: format!(
                    "min_hz {} must be below max_hz {}",
                    self.min_hz, self.max_hz
                ),
            });
        }
        let nyquist = sampling_rate / 2.0;
        if self.max_hz >= nyquist {
            return Err(BenchError::Config {
                reason: format!(
                    "max_hz {} must be below Nyquist ({} Hz at fs = {})",
                    self.max_hz, nyquist, sampling_rate
                ),
            });
        }
        Ok(())
    }

    /// Band centres, `linspace(min_hz, max_hz, n_bands)`
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        match self.n_bands {
            0 => Vec::new(),
            1 => vec![self.min_hz],
            n => {
                #[allow(clippy::cast_precision_loss)]
                let step = (self.max_hz - self.min_hz) / (n - 1) as f64;
                (0..n).map(|i| self.min_hz + step * i as f64).collect()
            }
        }
    }

    /// Derive the axis for one side of the coupling
    #[must_use]
    pub fn axis(&self, kind: BandKind) -> FrequencyAxis {
        let centers = self.centers();
        let edges = centers
            .iter()
            .map(|&c| {
                let half_width = c / kind.width_divisor();
                (c - half_width, c + half_width)
            })
            .collect();
        FrequencyAxis { centers, edges }
    }
}

/// Centres and `(low, high)` edges of a set of bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyAxis {
    /// Band centres in Hz
    pub centers: Vec<f64>,
    /// Band edges in Hz
    pub edges: Vec<(f64, f64)>,
}

impl FrequencyAxis {
    /// Number of bands
    #[must_use]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Whether the axis has no bands
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// Phase and amplitude frequency axes of a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyAxes {
    /// Phase-providing bands
    pub phase: FrequencyAxis,
    /// Amplitude-providing bands
    pub amplitude: FrequencyAxis,
}

impl FrequencyAxes {
    /// Derive both axes from their specs
    #[must_use]
    pub fn from_specs(phase: &BandSpec, amplitude: &BandSpec) -> Self {
        Self {
            phase: phase.axis(BandKind::Phase),
            amplitude: amplitude.axis(BandKind::Amplitude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centers_linspace() {
        let spec = BandSpec::new(2.0, 20.0, 10);
        let c = spec.centers();
        assert_eq!(c.len(), 10);
        assert!((c[0] - 2.0).abs() < 1e-12);
        assert!((c[9] - 20.0).abs() < 1e-12);
        assert!((c[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_band() {
        assert_eq!(BandSpec::new(5.0, 9.0, 1).centers(), vec![5.0]);
    }

    #[test]
    fn test_band_edges_by_kind() {
        let spec = BandSpec::new(8.0, 16.0, 2);
        let pha = spec.axis(BandKind::Phase);
        let amp = spec.axis(BandKind::Amplitude);
        assert_eq!(pha.edges[0], (6.0, 10.0));
        assert_eq!(amp.edges[1], (14.0, 18.0));
    }

    #[test]
    fn test_resolution_presets() {
        assert_eq!(Resolution::from_n_bands(50), Some(Resolution::Hres));
        assert_eq!(Resolution::from_n_bands(42), None);
        let spec = BandSpec::default_phase().with_resolution(Resolution::Hulk);
        assert_eq!(spec.n_bands, 100);
        assert_eq!(Resolution::Demon.to_string(), "demon");
    }

    #[test]
    fn test_validate_nyquist() {
        let spec = BandSpec::default_amplitude();
        assert!(spec.validate(512.0).is_ok());
        assert!(matches!(
            spec.validate(256.0),
            Err(BenchError::Config { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(BandSpec::new(20.0, 2.0, 5).validate(512.0).is_err());
        assert!(BandSpec::new(0.0, 2.0, 5).validate(512.0).is_err());
        assert!(BandSpec::new(2.0, 20.0, 0).validate(512.0).is_err());
        assert!(BandSpec::new(2.0, f64::NAN, 5).validate(512.0).is_err());
    }
}
