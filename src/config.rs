//! Setup-time configuration for an [`OscillatorBank`](crate::OscillatorBank).
//!
//! The sample rate, channel count and slots per channel are const generics
//! on the bank itself. Everything else is collected here and checked once,
//! when the bank is built:
//!
//! - table length (default 256)
//! - DAC resolution (default 8 bits)
//! - waveform shape (default [`Square`])
//! - the frequency list of each channel
//!
//! ```
//! use tonebank::{BankConfig, OscillatorBank};
//!
//! let config = BankConfig::new()
//!     .channel(0, [261.63, 329.63, 392.0])
//!     .channel(1, [293.66, 369.99, 440.0]);
//!
//! let bank = OscillatorBank::<40000, 2, 3>::new(config).unwrap();
//! assert_eq!(bank.slot_count(), 6);
//! ```

use crate::waveform::{Resolution, Square, WaveTable, Waveform};

/// Builder for the startup parameters of a bank.
pub struct BankConfig {
    pub(crate) table_len: usize,
    pub(crate) resolution: Resolution,
    pub(crate) waveform: Box<dyn Waveform>,
    pub(crate) table: Option<WaveTable>,
    pub(crate) assignments: Vec<(usize, Vec<f64>)>,
}

impl BankConfig {
    /// 256-entry 8-bit square table, no frequencies assigned.
    pub fn new() -> Self {
        Self {
            table_len: 256,
            resolution: Resolution::default(),
            waveform: Box::new(Square),
            table: None,
            assignments: Vec::new(),
        }
    }

    /// Number of entries in the generated table.
    pub fn table_len(mut self, len: usize) -> Self {
        self.table_len = len;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Shape used to generate the table.
    pub fn waveform(mut self, waveform: impl Waveform + 'static) -> Self {
        self.waveform = Box::new(waveform);
        self
    }

    /// Uses a prepared table; `table_len`, `resolution` and `waveform`
    /// are then ignored.
    pub fn table(mut self, table: WaveTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Assigns the frequencies (Hz) of `channel`, in slot order.
    ///
    /// Assigning the same channel twice keeps the last list. Channels left
    /// unassigned, and slots past the end of a shorter list, stay silent.
    pub fn channel(mut self, channel: usize, frequencies: impl IntoIterator<Item = f64>) -> Self {
        let frequencies = frequencies.into_iter().collect();
        self.assignments.retain(|(existing, _)| *existing != channel);
        self.assignments.push((channel, frequencies));
        self
    }

    /// Assigns every channel at once, channel 0 first.
    pub fn channels<I, F>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: IntoIterator<Item = f64>,
    {
        for (channel, frequencies) in channels.into_iter().enumerate() {
            self = self.channel(channel, frequencies);
        }
        self
    }

    /// Generates (or takes) the wave table.
    pub(crate) fn build_table(&mut self) -> Result<WaveTable, crate::ConfigError> {
        match self.table.take() {
            Some(table) => Ok(table),
            None => WaveTable::generate(&mut self.waveform, self.table_len, self.resolution),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankConfig")
            .field("table_len", &self.table_len)
            .field("resolution", &self.resolution)
            .field("table", &self.table.as_ref().map(WaveTable::len))
            .field("assignments", &self.assignments)
            .finish_non_exhaustive()
    }
}
