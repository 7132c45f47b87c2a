//! Plays Korobeiniki the way a single tone pin would, on repeat.
//!
//! SPACE pauses and resumes, R restarts from the first note.

mod common;

use anyhow::Result;
use common::{KeyAction, KeyEvents, init_logging, is_quit_key, run_interactive_demo};
use crossterm::ExecutableCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use log::info;
use std::io::{Write, stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tonebank::{Melody, MelodyPlayer, Signal};

const SAMPLE_RATE: u32 = 44100;

/// Silences the player while paused without losing its position.
struct Pausable {
    player: MelodyPlayer<SAMPLE_RATE>,
    paused: Arc<AtomicBool>,
    restart: Arc<AtomicBool>,
}

impl Signal for Pausable {
    fn next_sample(&mut self) -> f64 {
        if self.restart.swap(false, Ordering::Relaxed) {
            self.player.reset();
        }
        if self.paused.load(Ordering::Relaxed) {
            0.0
        } else {
            self.player.next_sample()
        }
    }
}

fn draw_ui(melody: &Melody, paused: bool) -> Result<()> {
    let mut stdout = stdout();
    stdout.execute(crossterm::terminal::Clear(
        crossterm::terminal::ClearType::All,
    ))?;
    stdout.execute(crossterm::cursor::MoveTo(0, 0))?;
    write!(
        stdout,
        "Korobeiniki @ {} bpm, {} notes, {:.1}s per pass: {}\r\nSPACE=pause  R=restart  Q=quit",
        melody.tempo(),
        melody.len(),
        melody.duration_ms() as f64 / 1000.0,
        if paused { "PAUSED " } else { "PLAYING" }
    )?;
    stdout.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    init_logging("melody_player.log")?;

    let melody = Melody::korobeiniki();
    info!(
        "Loaded {} notes at tempo {}",
        melody.len(),
        melody.tempo()
    );

    let paused = Arc::new(AtomicBool::new(false));
    let restart = Arc::new(AtomicBool::new(false));
    let signal = Pausable {
        player: MelodyPlayer::looping(&melody)?,
        paused: Arc::clone(&paused),
        restart: Arc::clone(&restart),
    };

    run_interactive_demo(
        signal,
        SAMPLE_RATE,
        KeyEvents::Press,
        || draw_ui(&melody, false),
        |key_event: &KeyEvent| {
            if key_event.kind != KeyEventKind::Press {
                return Ok(KeyAction::Continue);
            }
            if is_quit_key(key_event.code) {
                return Ok(KeyAction::Exit);
            }
            match key_event.code {
                KeyCode::Char(' ') => {
                    let now_paused = !paused.fetch_xor(true, Ordering::Relaxed);
                    draw_ui(&melody, now_paused)?;
                }
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    restart.store(true, Ordering::Relaxed);
                    info!("Restarting melody");
                }
                _ => {}
            }
            Ok(KeyAction::Continue)
        },
    )?;

    println!("\nGoodbye!");
    Ok(())
}
