//! The oscillator bank: additive table-lookup synthesis at a fixed tick rate.
//!
//! # Design Overview
//!
//! An `OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>` owns one
//! [`TableOscillator`] per assigned (channel, slot) pair, all reading the
//! same shared [`WaveTable`]. Each call to [`tick`](OscillatorBank::tick)
//! produces exactly one output sample:
//!
//! 1. For every channel the [`ActivationSource`] reports active, and every
//!    oscillator assigned to it: add the table value at the oscillator's
//!    index to a running sum, then advance the index by its step.
//! 2. Divide the sum by `CHANNELS * MAX_FREQS` and return it.
//!
//! Inactive channels add nothing and their oscillators hold their index.
//! Phase freezes on release; it is never reset, so a channel resumes from
//! where it stopped.
//!
//! ## Normalization
//!
//! The divisor is the total slot count, not the number of oscillators
//! sounding right now. The sum can never exceed `slots * max`, so the
//! output always stays inside the DAC range no matter how many channels
//! are held. The price is that a single held button plays at
//! `1 / CHANNELS` of full scale.
//!
//! ## Real-time contract
//!
//! `tick` is meant to run inside a timer interrupt or a
//! [`TickScheduler`](crate::TickScheduler) thread. It does not allocate,
//! lock, log or fail, and it costs O(`CHANNELS * MAX_FREQS`). Its budget
//! is one sample period (`1 / SAMPLE_RATE`); overrunning it is a missed
//! deadline, which the bank neither detects nor corrects by itself.
//!
//! ## Example Usage
//!
//! ```
//! use tonebank::{BankConfig, OscillatorBank};
//!
//! let config = BankConfig::new().channel(0, [440.0]);
//! let mut bank = OscillatorBank::<40000, 1, 1>::new(config).unwrap();
//!
//! // Held: the first half of the square table is at full scale.
//! assert_eq!(bank.tick(&[true]), 255);
//! // Released: nothing sounds and the phase stays put.
//! let index = bank.oscillator(0, 0).unwrap().index();
//! assert_eq!(bank.tick(&[false]), 0);
//! assert_eq!(bank.oscillator(0, 0).unwrap().index(), index);
//! ```

use crate::channel::ActivationSource;
use crate::config::BankConfig;
use crate::error::{
    ConfigError, InvalidChannelFrequencySnafu, NoSlotsSnafu, TooManyFrequenciesSnafu,
    UnknownChannelSnafu, ZeroSampleRateSnafu,
};
use crate::oscillator::{TableOscillator, step_size};
use crate::output::DacOutput;
use crate::signal::{AudioSignal, Signal};
use crate::waveform::WaveTable;
use log::debug;
use snafu::{OptionExt, ensure};
use std::sync::Arc;

/// Oscillator slot: the frequency it was configured with and its state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    frequency: f64,
    oscillator: TableOscillator,
}

/// A fixed set of table oscillators grouped by input channel.
///
/// # Type Parameters
///
/// * `SAMPLE_RATE` - Ticks per second
/// * `CHANNELS` - Number of input channels (buttons)
/// * `MAX_FREQS` - Oscillator slots per channel
#[derive(Debug, Clone)]
pub struct OscillatorBank<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize> {
    table: Arc<WaveTable>,
    slots: [[Option<Slot>; MAX_FREQS]; CHANNELS],
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize>
    OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>
{
    /// Total oscillator slots, the fixed normalization divisor.
    pub const SLOTS: usize = CHANNELS * MAX_FREQS;

    /// Builds the table and all oscillators from `config`.
    ///
    /// All oscillators start at index 0.
    ///
    /// # Errors
    ///
    /// Fails if the sample rate, channel count or slot count is zero, if
    /// the table can't be built, or if a channel assignment is out of
    /// range or carries an invalid frequency.
    pub fn new(mut config: BankConfig) -> Result<Self, ConfigError> {
        ensure!(SAMPLE_RATE > 0, ZeroSampleRateSnafu);
        ensure!(CHANNELS > 0 && MAX_FREQS > 0, NoSlotsSnafu);

        let table = config.build_table()?;
        let table_len = table.len();
        let mut slots = [[None; MAX_FREQS]; CHANNELS];

        for (channel, frequencies) in &config.assignments {
            let channel = *channel;
            ensure!(
                channel < CHANNELS,
                UnknownChannelSnafu {
                    channel,
                    channels: CHANNELS
                }
            );
            ensure!(
                frequencies.len() <= MAX_FREQS,
                TooManyFrequenciesSnafu {
                    channel,
                    count: frequencies.len(),
                    max: MAX_FREQS
                }
            );

            for (slot, &frequency) in frequencies.iter().enumerate() {
                let step = step_size(frequency, table_len, SAMPLE_RATE).ok().context(
                    InvalidChannelFrequencySnafu {
                        channel,
                        slot,
                        frequency,
                    },
                )?;
                debug!(
                    "Channel {} slot {}: {} Hz -> step {} of {}",
                    channel, slot, frequency, step, table_len
                );
                slots[channel][slot] = Some(Slot {
                    frequency,
                    oscillator: TableOscillator::new(step, table_len),
                });
            }
        }

        debug!(
            "Oscillator bank ready: {} Hz, {} channels x {} slots, {}-entry {}-bit table",
            SAMPLE_RATE,
            CHANNELS,
            MAX_FREQS,
            table_len,
            table.resolution().bits()
        );

        Ok(Self {
            table: Arc::new(table),
            slots,
        })
    }

    /// Produces one output sample in `[0, table max]`.
    ///
    /// Reads each channel's activation once, sums the active oscillators
    /// and advances them, then divides by [`SLOTS`](Self::SLOTS).
    #[inline]
    pub fn tick<A: ActivationSource + ?Sized>(&mut self, active: &A) -> u16 {
        let table = &*self.table;
        let mut sum: u64 = 0;

        for (channel, slots) in self.slots.iter_mut().enumerate() {
            if !active.is_active(channel) {
                continue;
            }
            for slot in slots.iter_mut().flatten() {
                sum += u64::from(slot.oscillator.sample(table));
                slot.oscillator.advance();
            }
        }

        (sum / Self::SLOTS as u64) as u16
    }

    /// Ticks once and writes the sample to `output`.
    #[inline]
    pub fn tick_into<A, O>(&mut self, active: &A, output: &mut O) -> u16
    where
        A: ActivationSource + ?Sized,
        O: DacOutput + ?Sized,
    {
        let sample = self.tick(active);
        output.write(sample);
        sample
    }

    /// Fills `buffer` with consecutive ticks under a fixed activation.
    pub fn render<A: ActivationSource + ?Sized>(&mut self, active: &A, buffer: &mut [u16]) {
        for sample in buffer.iter_mut() {
            *sample = self.tick(active);
        }
    }

    /// Oscillator assigned to `slot` of `channel`, if any.
    pub fn oscillator(&self, channel: usize, slot: usize) -> Option<&TableOscillator> {
        self.slot(channel, slot).map(|s| &s.oscillator)
    }

    /// Configured frequency of `slot` of `channel`, if any.
    pub fn frequency(&self, channel: usize, slot: usize) -> Option<f64> {
        self.slot(channel, slot).map(|s| s.frequency)
    }

    fn slot(&self, channel: usize, slot: usize) -> Option<&Slot> {
        self.slots.get(channel)?.get(slot)?.as_ref()
    }

    /// Number of oscillators that were actually assigned a frequency.
    pub fn assigned_count(&self) -> usize {
        self.slots.iter().flatten().flatten().count()
    }

    /// Total slots, assigned or not.
    pub fn slot_count(&self) -> usize {
        Self::SLOTS
    }

    pub fn table(&self) -> &Arc<WaveTable> {
        &self.table
    }

    /// Largest sample `tick` can return.
    pub fn max(&self) -> u16 {
        self.table.max()
    }

    /// Pairs the bank with an activation source to play it as a [`Signal`].
    pub fn into_signal<A: ActivationSource>(
        self,
        active: A,
    ) -> BankSignal<SAMPLE_RATE, CHANNELS, MAX_FREQS, A> {
        BankSignal { bank: self, active }
    }
}

/// A bank and its activation source, rendered as a `Signal`.
///
/// Samples are the DAC code as a fraction of full scale, so they lie in
/// `[0, 1]` and silence is `0.0`.
#[derive(Debug)]
pub struct BankSignal<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, A> {
    bank: OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>,
    active: A,
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, A>
    BankSignal<SAMPLE_RATE, CHANNELS, MAX_FREQS, A>
{
    pub fn bank(&self) -> &OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS> {
        &self.bank
    }

    pub fn activation(&self) -> &A {
        &self.active
    }

    pub fn into_parts(self) -> (OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>, A) {
        (self.bank, self.active)
    }
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, A: ActivationSource>
    Signal for BankSignal<SAMPLE_RATE, CHANNELS, MAX_FREQS, A>
{
    fn next_sample(&mut self) -> f64 {
        let sample = self.bank.tick(&self.active);
        f64::from(sample) / f64::from(self.bank.max())
    }
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, A: ActivationSource>
    AudioSignal<SAMPLE_RATE> for BankSignal<SAMPLE_RATE, CHANNELS, MAX_FREQS, A>
{
}
