//! Renders a scripted button sequence through the oscillator bank to a WAV
//! file, one DAC code per tick.
//!
//! Usage: cargo run --example render_wav --features wav-export [OUT.wav]

use anyhow::Result;
use log::{LevelFilter, info};
use tonebank::output::WavSink;
use tonebank::waveform::Resolution;
use tonebank::{BankConfig, OscillatorBank};

const SAMPLE_RATE: u32 = 40000;
const CHANNELS: usize = 3;
const MAX_FREQS: usize = 2;

/// (milliseconds, buttons held)
const SCRIPT: [(u32, [bool; CHANNELS]); 7] = [
    (400, [true, false, false]),
    (400, [false, true, false]),
    (400, [false, false, true]),
    (200, [false, false, false]),
    (600, [true, true, false]),
    (600, [true, true, true]),
    (300, [false, false, false]),
];

fn main() -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tonebank.wav".to_string());

    let resolution = Resolution::BITS_12;
    let config = BankConfig::new()
        .resolution(resolution)
        .channel(0, [220.0, 330.0])
        .channel(1, [277.18, 415.30])
        .channel(2, [440.0]);
    let mut bank = OscillatorBank::<SAMPLE_RATE, CHANNELS, MAX_FREQS>::new(config)?;
    let mut sink = WavSink::create(&path, SAMPLE_RATE, resolution)?;

    for (ms, held) in SCRIPT {
        let ticks = u64::from(SAMPLE_RATE) * u64::from(ms) / 1000;
        for _ in 0..ticks {
            bank.tick_into(&held, &mut sink);
        }
    }

    let written = sink.finalize()?;
    info!(
        "Wrote {} samples ({:.2}s) to {}",
        written,
        written as f64 / f64::from(SAMPLE_RATE),
        path
    );
    Ok(())
}
