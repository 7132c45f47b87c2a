//! Error types for bank setup, output sinks and the tick scheduler.
//!
//! Nothing in the per-tick path returns an error: every failure mode is
//! detected before the first tick (configuration) or reported once the
//! producer has stopped (sinks, scheduler).

use snafu::prelude::*;

/// Rejected setup values. Initialization aborts on any of these.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Sample rate must be greater than zero"))]
    ZeroSampleRate,
    #[snafu(display("Waveform table must hold at least one sample"))]
    EmptyTable,
    #[snafu(display("Frequency must be finite and non-negative, got {frequency} Hz"))]
    InvalidFrequency { frequency: f64 },
    #[snafu(display("Channel {channel}, slot {slot}: invalid frequency {frequency} Hz"))]
    InvalidChannelFrequency {
        channel: usize,
        slot: usize,
        frequency: f64,
    },
    #[snafu(display("Channel {channel} was given {count} frequencies, at most {max} fit"))]
    TooManyFrequencies {
        channel: usize,
        count: usize,
        max: usize,
    },
    #[snafu(display("Channel {channel} does not exist, the bank has {channels} channels"))]
    UnknownChannel { channel: usize, channels: usize },
    #[snafu(display("Bank needs at least one channel and one slot per channel"))]
    NoSlots,
    #[snafu(display("DAC resolution must be 1 to 16 bits, got {bits}"))]
    InvalidResolution { bits: u8 },
    #[snafu(display("Table sample {index} is {value}, above the DAC maximum {max}"))]
    AmplitudeOutOfRange { index: usize, value: u16, max: u16 },
    #[snafu(display("Tempo must be greater than zero"))]
    ZeroTempo,
    #[snafu(display(
        "Melody step {index}: {length_units} units at tempo {tempo} is longer than the maximum note"
    ))]
    NoteTooLong {
        index: usize,
        length_units: u32,
        tempo: u32,
    },
}

/// Failures of the WAV export sink.
#[cfg(feature = "wav-export")]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OutputError {
    #[snafu(display("Failed to open WAV output: {source}"))]
    WavCreate { source: hound::Error },
    #[snafu(display("Failed to write WAV sample: {source}"))]
    WavWrite { source: hound::Error },
    #[snafu(display("Failed to finalize WAV output: {source}"))]
    WavFinalize { source: hound::Error },
}

/// Failures starting or joining the tick thread.
#[cfg(feature = "bank")]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SchedulerError {
    #[snafu(display("Failed to spawn the tick thread: {source}"))]
    Spawn { source: std::io::Error },
    #[snafu(display("Tick thread panicked"))]
    Panicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::ZeroSampleRate.to_string(),
            "Sample rate must be greater than zero"
        );
        let err = ConfigError::TooManyFrequencies {
            channel: 2,
            count: 5,
            max: 3,
        };
        assert_eq!(
            err.to_string(),
            "Channel 2 was given 5 frequencies, at most 3 fit"
        );
    }

    #[test]
    fn test_context_selectors_build_errors() {
        let result: Result<(), ConfigError> = InvalidResolutionSnafu { bits: 20u8 }.fail();
        assert_eq!(result, Err(ConfigError::InvalidResolution { bits: 20 }));
    }
}
