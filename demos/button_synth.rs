//! Four "buttons" on the keyboard, each holding a chord of square waves.
//!
//! Hold A, S, D or F to gate a channel. Several can sound at once; the mix
//! is always divided by the full slot count, so a single chord is quieter
//! than all four together. Logs go to `button_synth.log`.

mod common;

use anyhow::Result;
use common::{KeyAction, KeyEvents, init_logging, is_quit_key, run_interactive_demo};
use crossterm::ExecutableCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use std::io::{Write, stdout};
use std::sync::Arc;
use tonebank::{BankConfig, ChannelGates, OscillatorBank};

const SAMPLE_RATE: u32 = 44100;
const CHANNELS: usize = 4;
const MAX_FREQS: usize = 3;
const KEYS: [char; CHANNELS] = ['a', 's', 'd', 'f'];

fn chords() -> [(&'static str, [f64; MAX_FREQS]); CHANNELS] {
    [
        ("C major", [261.63, 329.63, 392.00]),
        ("F major", [349.23, 440.00, 523.25]),
        ("G major", [392.00, 493.88, 587.33]),
        ("A minor", [440.00, 523.25, 659.25]),
    ]
}

fn draw_ui(gates: &ChannelGates) -> Result<()> {
    let mut stdout = stdout();
    stdout.execute(crossterm::terminal::Clear(
        crossterm::terminal::ClearType::All,
    ))?;
    stdout.execute(crossterm::cursor::MoveTo(0, 0))?;
    write!(stdout, "HOLD A/S/D/F to play  Q=quit\r\n\r\n")?;
    let held = gates.snapshot();
    for (i, (name, _)) in chords().iter().enumerate() {
        write!(
            stdout,
            "  [{}] {:<8} {}\r\n",
            KEYS[i].to_ascii_uppercase(),
            name,
            if held[i] { "ON " } else { "off" }
        )?;
    }
    stdout.flush()?;
    Ok(())
}

fn channel_for(code: KeyCode) -> Option<usize> {
    match code {
        KeyCode::Char(c) => KEYS.iter().position(|&k| k == c.to_ascii_lowercase()),
        _ => None,
    }
}

fn main() -> Result<()> {
    init_logging("button_synth.log")?;

    let config = BankConfig::new().channels(chords().map(|(_, freqs)| freqs));
    let bank = OscillatorBank::<SAMPLE_RATE, CHANNELS, MAX_FREQS>::new(config)?;
    let gates = Arc::new(ChannelGates::new(CHANNELS));
    let signal = bank.into_signal(Arc::clone(&gates));

    run_interactive_demo(
        signal,
        SAMPLE_RATE,
        KeyEvents::PressAndRelease,
        || draw_ui(&gates),
        |key_event: &KeyEvent| {
            if is_quit_key(key_event.code) && matches!(key_event.kind, KeyEventKind::Press) {
                return Ok(KeyAction::Exit);
            }
            if let Some(channel) = channel_for(key_event.code) {
                match key_event.kind {
                    KeyEventKind::Press | KeyEventKind::Repeat => gates.press(channel),
                    KeyEventKind::Release => gates.release(channel),
                }
                draw_ui(&gates)?;
            }
            Ok(KeyAction::Continue)
        },
    )?;

    println!("\nGoodbye!");
    Ok(())
}
