//! Sound card and terminal plumbing shared by the interactive demos.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, StreamConfig};
use crossterm::{
    ExecutableCommand,
    event::{
        self, Event, KeyCode, KeyEvent, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{LevelFilter, warn};
use std::io::stdout;
use std::panic;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonebank::Signal;

/// Output gain applied to every signal before it reaches the device.
const GAIN: f64 = 0.4;

/// Routes `log` records to a file, since the terminal is in raw mode while
/// a demo runs.
pub fn init_logging(path: &str) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Debug)
        .chain(fern::log_file(path)?)
        .apply()?;
    Ok(())
}

/// Which key events the demo wants to see.
#[allow(dead_code)] // each demo constructs one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvents {
    /// Presses only, the terminal default.
    Press,
    /// Presses, repeats and releases. Needs a terminal that supports the
    /// kitty keyboard protocol.
    PressAndRelease,
}

pub enum KeyAction {
    Continue,
    Exit,
}

/// Puts the terminal into raw mode on an alternate screen and restores it
/// on drop, including when a panic unwinds through the demo.
struct TerminalGuard {
    keys: KeyEvents,
}

impl TerminalGuard {
    fn enter(keys: KeyEvents) -> Result<Self> {
        // Enhancement flags must be pushed before switching screens.
        if keys == KeyEvents::PressAndRelease {
            stdout().execute(PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
            ))?;
        }
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        stdout().execute(crossterm::cursor::Hide)?;

        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal(keys);
            previous(info);
        }));
        Ok(Self { keys })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal(self.keys);
    }
}

fn restore_terminal(keys: KeyEvents) {
    if keys == KeyEvents::PressAndRelease {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    let _ = stdout().execute(crossterm::cursor::Show);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Plays `signal` on the default output device and feeds key events to
/// `on_key` until it returns [`KeyAction::Exit`].
///
/// Signals are generated at their own fixed rate. If the device runs at a
/// different rate the pitch shifts accordingly, which is logged once.
pub fn run_interactive_demo<S, F, K>(
    signal: S,
    sample_rate: u32,
    keys: KeyEvents,
    draw: F,
    on_key: K,
) -> Result<()>
where
    S: Signal + Send + 'static,
    F: FnOnce() -> Result<()>,
    K: Fn(&KeyEvent) -> Result<KeyAction>,
{
    let device = cpal::default_host()
        .default_output_device()
        .context("No output device available")?;
    let supported = device.default_output_config()?;
    if supported.sample_rate().0 != sample_rate {
        warn!(
            "Device runs at {} Hz, signal at {} Hz; pitch will be off",
            supported.sample_rate().0,
            sample_rate
        );
    }

    let format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let signal = Arc::new(Mutex::new(signal));
    let _stream = match format {
        SampleFormat::F32 => play::<f32, S>(&device, &config, signal)?,
        SampleFormat::I16 => play::<i16, S>(&device, &config, signal)?,
        SampleFormat::U16 => play::<u16, S>(&device, &config, signal)?,
        other => anyhow::bail!("Unsupported sample format: {}", other),
    };

    let _terminal = TerminalGuard::enter(keys)?;
    draw()?;
    loop {
        if event::poll(Duration::from_millis(20))?
            && let Event::Key(key) = event::read()?
            && let KeyAction::Exit = on_key(&key)?
        {
            return Ok(());
        }
    }
}

fn play<T, S>(
    device: &cpal::Device,
    config: &StreamConfig,
    signal: Arc<Mutex<S>>,
) -> Result<cpal::Stream>
where
    T: Sample + FromSample<f64> + cpal::SizedSample,
    S: Signal + Send + 'static,
{
    let channels = usize::from(config.channels);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let Ok(mut signal) = signal.lock() else {
                return;
            };
            for frame in data.chunks_mut(channels) {
                frame.fill(T::from_sample(signal.next_sample() * GAIN));
            }
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

/// Q or Esc.
pub fn is_quit_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
}
