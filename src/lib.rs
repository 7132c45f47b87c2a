//! Tonebank - fixed-rate lookup-table tone generation for small boards
//!
//! The crate provides an additive oscillator bank in the style of a
//! microcontroller tone generator: every input channel (a button) gates a
//! handful of table oscillators, and one output sample per timer tick is
//! the normalized sum of whatever is held. A melody player that toggles a
//! single tone pin is available behind the `melody` feature.

#[cfg(feature = "melody")]
extern crate self as tonebank;

pub mod error;
pub mod signal;
pub mod waveform;

#[cfg(feature = "bank")]
pub mod bank;
#[cfg(feature = "bank")]
pub mod channel;
#[cfg(feature = "bank")]
pub mod config;
#[cfg(feature = "bank")]
pub mod oscillator;
#[cfg(feature = "bank")]
pub mod output;
#[cfg(feature = "bank")]
pub mod scheduler;

#[cfg(feature = "melody")]
pub mod melody;

// Re-export commonly used types at the crate root
pub use error::ConfigError;
pub use signal::{AudioSignal, Signal};
pub use waveform::{Resolution, WaveTable, Waveform};

#[cfg(feature = "bank")]
pub use bank::{BankSignal, OscillatorBank};
#[cfg(feature = "bank")]
pub use channel::{ActivationSource, ChannelGates};
#[cfg(feature = "bank")]
pub use config::BankConfig;
#[cfg(feature = "bank")]
pub use error::SchedulerError;
#[cfg(feature = "bank")]
pub use oscillator::{TableOscillator, step_size};
#[cfg(feature = "bank")]
pub use output::DacOutput;
#[cfg(feature = "bank")]
pub use scheduler::{TickScheduler, TickStats};

#[cfg(feature = "melody")]
pub use melody::{Melody, MelodyPlayer, Note};
#[cfg(feature = "melody")]
pub use tonebank_macros::note;

#[cfg(feature = "wav-export")]
pub use error::OutputError;
