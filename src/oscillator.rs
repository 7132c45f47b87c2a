//! Table-lookup phase accumulators.

use crate::error::{ConfigError, EmptyTableSnafu, InvalidFrequencySnafu, ZeroSampleRateSnafu};
use crate::waveform::WaveTable;
use snafu::ensure;

/// Table entries an oscillator advances per tick to approximate `frequency`.
///
/// Computes `floor(frequency * table_len / sample_rate)`. Truncation, not
/// rounding, so the approximated pitch is never above the requested one.
/// A frequency of 0 gives a step of 0: the oscillator holds one table entry.
///
/// # Errors
///
/// Rejects a zero sample rate, an empty table, and negative or non-finite
/// frequencies.
///
/// # Examples
///
/// ```
/// use tonebank::step_size;
///
/// assert_eq!(step_size(440.0, 256, 40000), Ok(2));
/// assert_eq!(step_size(0.0, 256, 40000), Ok(0));
/// assert!(step_size(440.0, 256, 0).is_err());
/// ```
pub fn step_size(frequency: f64, table_len: usize, sample_rate: u32) -> Result<usize, ConfigError> {
    ensure!(sample_rate > 0, ZeroSampleRateSnafu);
    ensure!(table_len > 0, EmptyTableSnafu);
    ensure!(
        frequency.is_finite() && frequency >= 0.0,
        InvalidFrequencySnafu { frequency }
    );

    Ok((frequency * table_len as f64 / f64::from(sample_rate)).floor() as usize)
}

/// One phase accumulator reading a shared [`WaveTable`].
///
/// The index always stays in `[0, table_len)`. The stride applied per tick
/// is the step reduced modulo the table length, which lands on the same
/// index as adding the full step while keeping the sum from overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOscillator {
    index: usize,
    step: usize,
    stride: usize,
    table_len: usize,
}

impl TableOscillator {
    /// Creates an oscillator at index 0.
    ///
    /// `table_len` must be non-zero; the bank only builds oscillators for
    /// tables that passed validation.
    pub fn new(step: usize, table_len: usize) -> Self {
        Self::starting_at(0, step, table_len)
    }

    /// Creates an oscillator at `index` (wrapped into the table).
    pub fn starting_at(index: usize, step: usize, table_len: usize) -> Self {
        debug_assert!(table_len > 0);
        Self {
            index: index % table_len,
            step,
            stride: step % table_len,
            table_len,
        }
    }

    /// Current table index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Step size as computed by [`step_size`].
    pub fn step(&self) -> usize {
        self.step
    }

    /// Table value at the current index.
    #[inline]
    pub fn sample(&self, table: &WaveTable) -> u16 {
        table.get(self.index)
    }

    /// Moves the index forward by one step, wrapping at the table end.
    #[inline]
    pub fn advance(&mut self) {
        let next = self.index + self.stride;
        self.index = if next >= self.table_len {
            next - self.table_len
        } else {
            next
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::Resolution;

    #[test]
    fn test_step_truncates() {
        assert_eq!(step_size(440.0, 256, 40000), Ok(2));
        assert_eq!(step_size(156.25, 256, 40000), Ok(1));
        assert_eq!(step_size(156.24, 256, 40000), Ok(0));
        assert_eq!(step_size(40000.0, 256, 40000), Ok(256));
    }

    #[test]
    fn test_step_zero_frequency() {
        assert_eq!(step_size(0.0, 1024, 44100), Ok(0));
    }

    #[test]
    fn test_step_rejects_bad_input() {
        assert_eq!(step_size(440.0, 256, 0), Err(ConfigError::ZeroSampleRate));
        assert_eq!(step_size(440.0, 0, 40000), Err(ConfigError::EmptyTable));
        assert_eq!(
            step_size(-1.0, 256, 40000),
            Err(ConfigError::InvalidFrequency { frequency: -1.0 })
        );
        assert!(step_size(f64::INFINITY, 256, 40000).is_err());
        assert!(step_size(f64::NAN, 256, 40000).is_err());
    }

    #[test]
    fn test_wraparound_matches_closed_form() {
        let len = 256;
        for (start, step) in [(0, 2), (5, 3), (200, 77), (10, 256), (1, 1000)] {
            let mut osc = TableOscillator::starting_at(start, step, len);
            for k in 1..=600 {
                osc.advance();
                assert_eq!(osc.index(), (start + k * step) % len);
            }
        }
    }

    #[test]
    fn test_zero_step_is_frozen() {
        let table = WaveTable::square(8, Resolution::BITS_8).unwrap();
        let mut osc = TableOscillator::starting_at(5, 0, 8);
        for _ in 0..100 {
            assert_eq!(osc.sample(&table), 0);
            osc.advance();
        }
        assert_eq!(osc.index(), 5);
    }

    #[test]
    fn test_sample_follows_index() {
        let table = WaveTable::square(4, Resolution::BITS_8).unwrap();
        let mut osc = TableOscillator::new(1, 4);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(osc.sample(&table));
            osc.advance();
        }
        assert_eq!(seen, vec![255, 255, 0, 0]);
    }
}
