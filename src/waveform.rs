//! Waveform tables for lookup-table synthesis.
//!
//! # Design Overview
//!
//! A [`WaveTable`] holds one cycle of a periodic waveform as unsigned DAC
//! codes in `[0, Resolution::max()]`. It is generated once at startup and
//! never mutated afterwards, so every oscillator in a bank shares the same
//! table behind an `Arc` with no locking.
//!
//! The shape of the cycle comes from a [`Waveform`]: a generator asked for
//! the level of each table entry as a fraction of full scale. Shapes are
//! interchangeable without touching the mixer:
//!
//! - [`Square`]: 50% duty, the first `len / 2` entries high, the rest low
//! - [`Sine`]: raised sine, `0.5 + 0.5 * sin(2πφ)`
//! - [`Sawtooth`]: rising ramp
//! - [`Triangle`]: rise over the first half, fall over the second
//! - [`Noise`]: seeded uniform noise, reproducible for a given seed
//!
//! ## Example Usage
//!
//! ```
//! use tonebank::waveform::{Resolution, Sine, WaveTable};
//!
//! let square = WaveTable::square(256, Resolution::default()).unwrap();
//! assert_eq!(square.get(0), 255);
//! assert_eq!(square.get(255), 0);
//!
//! let sine = WaveTable::generate(Sine, 512, Resolution::new(12).unwrap()).unwrap();
//! assert_eq!(sine.max(), 4095);
//! ```

use crate::error::{AmplitudeOutOfRangeSnafu, ConfigError, EmptyTableSnafu, InvalidResolutionSnafu};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snafu::ensure;
use std::f64::consts::PI;

/// Bit depth of the digital-to-analog output.
///
/// The output range is `[0, 2^bits - 1]`. Defaults to 8 bits (`[0, 255]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution(u8);

impl Resolution {
    /// 8-bit output, `[0, 255]`.
    pub const BITS_8: Resolution = Resolution(8);
    /// 12-bit output, `[0, 4095]`.
    pub const BITS_12: Resolution = Resolution(12);

    /// Creates a resolution of `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidResolution`] unless `1 <= bits <= 16`.
    pub fn new(bits: u8) -> Result<Self, ConfigError> {
        ensure!((1..=16).contains(&bits), InvalidResolutionSnafu { bits });
        Ok(Self(bits))
    }

    /// Number of bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Largest code the output accepts.
    pub fn max(self) -> u16 {
        ((1u32 << self.0) - 1) as u16
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::BITS_8
    }
}

/// A generator for one cycle of a periodic waveform.
///
/// `level` is called once for each table entry, in order, and returns the
/// amplitude of entry `index` out of `len` as a fraction of full scale.
/// Values outside `[0, 1]` are clamped.
pub trait Waveform {
    fn level(&mut self, index: usize, len: usize) -> f64;
}

impl<W: Waveform + ?Sized> Waveform for &mut W {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        (**self).level(index, len)
    }
}

impl<W: Waveform + ?Sized> Waveform for Box<W> {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        (**self).level(index, len)
    }
}

/// 50% duty square wave.
///
/// Decided by index rather than phase so an odd-length table still has
/// exactly `len / 2` high entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Square;

impl Waveform for Square {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        if index < len / 2 { 1.0 } else { 0.0 }
    }
}

/// Sine wave raised into the unipolar output range.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sine;

impl Waveform for Sine {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        0.5 + 0.5 * (phase(index, len) * 2.0 * PI).sin()
    }
}

/// Rising ramp from minimum to just below maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sawtooth;

impl Waveform for Sawtooth {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        phase(index, len)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Triangle;

impl Waveform for Triangle {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        let phase = phase(index, len);
        if phase < 0.5 {
            2.0 * phase
        } else {
            2.0 - 2.0 * phase
        }
    }
}

/// Uniform noise from a seeded generator.
///
/// The same seed always produces the same table.
pub struct Noise<R: Rng = StdRng> {
    rng: R,
}

impl Noise<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> Noise<R> {
    /// Uses a caller-provided generator.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Waveform for Noise<R> {
    fn level(&mut self, _index: usize, _len: usize) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

/// Wraps a phase function `[0, 1) -> [0, 1]` as a [`Waveform`].
pub struct FromPhase<F>(pub F);

impl<F: FnMut(f64) -> f64> Waveform for FromPhase<F> {
    fn level(&mut self, index: usize, len: usize) -> f64 {
        (self.0)(phase(index, len))
    }
}

fn phase(index: usize, len: usize) -> f64 {
    index as f64 / len as f64
}

/// One cycle of a waveform as DAC codes. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveTable {
    samples: Box<[u16]>,
    resolution: Resolution,
}

impl WaveTable {
    /// Samples `shape` into a table of `len` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyTable`] if `len` is zero.
    pub fn generate<W: Waveform>(
        mut shape: W,
        len: usize,
        resolution: Resolution,
    ) -> Result<Self, ConfigError> {
        ensure!(len > 0, EmptyTableSnafu);
        let max = f64::from(resolution.max());
        let samples = (0..len)
            .map(|index| {
                let level = shape.level(index, len);
                let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
                (level * max).round() as u16
            })
            .collect();

        Ok(Self {
            samples,
            resolution,
        })
    }

    /// The reference square table.
    pub fn square(len: usize, resolution: Resolution) -> Result<Self, ConfigError> {
        Self::generate(Square, len, resolution)
    }

    /// Uses pre-computed codes as the table.
    ///
    /// # Errors
    ///
    /// Fails on an empty table or on a code above `resolution.max()`.
    pub fn from_samples(samples: Vec<u16>, resolution: Resolution) -> Result<Self, ConfigError> {
        ensure!(!samples.is_empty(), EmptyTableSnafu);
        let max = resolution.max();
        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, v)| **v > max) {
            return AmplitudeOutOfRangeSnafu { index, value, max }.fail();
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            resolution,
        })
    }

    /// Number of entries in one cycle.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; an empty table can't be built.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Code at `index`. `index` must be below [`len`](Self::len).
    #[inline]
    pub fn get(&self, index: usize) -> u16 {
        self.samples[index]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.samples
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Largest code the table's output accepts.
    pub fn max(&self) -> u16 {
        self.resolution.max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_table_halves() {
        for len in [1, 2, 3, 7, 8, 255, 256] {
            let table = WaveTable::square(len, Resolution::BITS_8).unwrap();
            assert_eq!(table.len(), len);
            let highs = len / 2;
            assert!(table.as_slice()[..highs].iter().all(|&v| v == 255));
            assert!(table.as_slice()[highs..].iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(
            WaveTable::square(0, Resolution::BITS_8),
            Err(ConfigError::EmptyTable)
        );
        assert_eq!(
            WaveTable::from_samples(Vec::new(), Resolution::BITS_8),
            Err(ConfigError::EmptyTable)
        );
    }

    #[test]
    fn test_resolution_bounds() {
        assert_eq!(Resolution::new(1).unwrap().max(), 1);
        assert_eq!(Resolution::new(10).unwrap().max(), 1023);
        assert_eq!(Resolution::new(16).unwrap().max(), u16::MAX);
        assert_eq!(
            Resolution::new(0),
            Err(ConfigError::InvalidResolution { bits: 0 })
        );
        assert!(Resolution::new(17).is_err());
        assert_eq!(Resolution::default(), Resolution::BITS_8);
    }

    #[test]
    fn test_sine_table_peaks() {
        let table = WaveTable::generate(Sine, 256, Resolution::BITS_8).unwrap();
        assert_eq!(table.get(0), 128);
        assert_eq!(table.get(64), 255);
        assert_eq!(table.get(192), 0);
    }

    #[test]
    fn test_sawtooth_rises() {
        let table = WaveTable::generate(Sawtooth, 16, Resolution::BITS_8).unwrap();
        assert_eq!(table.get(0), 0);
        assert!(table.as_slice().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_triangle_symmetry() {
        let table = WaveTable::generate(Triangle, 8, Resolution::BITS_8).unwrap();
        assert_eq!(table.as_slice(), &[0, 64, 128, 191, 255, 191, 128, 64]);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let a = WaveTable::generate(Noise::seeded(7), 64, Resolution::BITS_8).unwrap();
        let b = WaveTable::generate(Noise::seeded(7), 64, Resolution::BITS_8).unwrap();
        let c = WaveTable::generate(Noise::seeded(8), 64, Resolution::BITS_8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_phase_clamps() {
        let table =
            WaveTable::generate(FromPhase(|p: f64| p * 4.0 - 1.0), 4, Resolution::BITS_8).unwrap();
        assert_eq!(table.as_slice(), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_from_samples_checks_range() {
        let err = WaveTable::from_samples(vec![0, 300, 5], Resolution::BITS_8).unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmplitudeOutOfRange {
                index: 1,
                value: 300,
                max: 255
            }
        );
        let ok = WaveTable::from_samples(vec![0, 1023], Resolution::new(10).unwrap()).unwrap();
        assert_eq!(ok.get(1), 1023);
    }
}
