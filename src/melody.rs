//! Melody playback by toggling a single digital output.
//!
//! # Design Overview
//!
//! A [`Melody`] is a tempo plus an ordered list of (note, length) steps.
//! Playing it drives a tone pin with a 50% duty square wave for each note,
//! then holds it low for a pause:
//!
//! - note length: `(1000 / tempo) * length_units` ms, with the division
//!   done in integers first (tempo 144 gives 6 ms per unit, so 8 units
//!   last 48 ms and 4 units 24 ms)
//! - pause after each note: the note length times 1.30, truncated
//! - tone: pitch rounded to whole Hz, `period = 1_000_000 / hz` µs and
//!   `pulse = period / 2` µs high then low; whole cycles repeat while less
//!   than the note length has elapsed, so the last cycle may run over
//! - a 0 Hz note is a rest: the pin stays low for the note length
//! - between repetitions of the whole tune: 2000 ms of silence
//!
//! Hardware is reached through two small traits, [`TonePin`] and
//! [`Delay`], so the same timeline drives a GPIO on a board or a test
//! double on the desk. [`MelodyPlayer`] renders the identical timeline as
//! an audio [`Signal`] for playback through a sound card.
//!
//! ## Example Usage
//!
//! ```
//! use tonebank::melody::Melody;
//! use tonebank::note;
//!
//! let tune = Melody::new(144, [(note!("A4"), 8), (note!("rest"), 4)]).unwrap();
//! let events: Vec<_> = tune.events().collect();
//! assert_eq!(events[0].duration_ms, 48);
//! assert_eq!(events[0].pause_ms, 62);
//! assert!(events[1].note.is_rest());
//! ```

use crate::error::{ConfigError, NoteTooLongSnafu, ZeroSampleRateSnafu, ZeroTempoSnafu};
use crate::note;
use crate::signal::{AudioSignal, Signal};
use log::debug;
use snafu::ensure;

/// A pitch in Hz. A pitch of 0 is a rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: f64,
}

impl Note {
    pub const REST: Note = Note { pitch: 0.0 };

    pub fn from_hz(pitch: f64) -> Self {
        Self { pitch }
    }

    /// Pitch rounded to whole Hz, the resolution of the tone pin.
    ///
    /// Negative and non-finite pitches count as a rest.
    pub fn hz(&self) -> u32 {
        if self.pitch.is_finite() && self.pitch > 0.0 {
            self.pitch.round() as u32
        } else {
            0
        }
    }

    pub fn is_rest(&self) -> bool {
        self.hz() == 0
    }
}

/// Square wave timing for one note on the tone pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    /// Time high, then time low, per cycle.
    pub pulse_us: u32,
    /// Whole cycles played.
    pub cycles: u64,
}

impl Tone {
    /// Timing for `hz` held for `duration_ms`.
    ///
    /// Returns `None` when nothing can be toggled: a rest, or a pitch so
    /// high the half period rounds down to 0 µs.
    pub fn new(hz: u32, duration_ms: u32) -> Option<Self> {
        if hz == 0 {
            return None;
        }
        let period_us = 1_000_000 / hz;
        let pulse_us = period_us / 2;
        if pulse_us == 0 {
            return None;
        }
        let cycle_us = u64::from(pulse_us) * 2;
        let cycles = (u64::from(duration_ms) * 1000).div_ceil(cycle_us);
        Some(Self {
            pulse_us,
            cycles,
        })
    }

    pub fn cycle_us(&self) -> u32 {
        self.pulse_us * 2
    }

    /// Actual time spent toggling, including the overrun of the last cycle.
    pub fn length_us(&self) -> u64 {
        self.cycles * u64::from(self.cycle_us())
    }
}

/// One step of a melody with its timing resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    pub note: Note,
    pub duration_ms: u32,
    pub pause_ms: u32,
}

impl ToneEvent {
    pub fn tone(&self) -> Option<Tone> {
        Tone::new(self.note.hz(), self.duration_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelodyStep {
    pub note: Note,
    /// Multiples of the tempo unit (`1000 / tempo` ms). Larger is longer:
    /// 8 units last twice as long as 4.
    pub length_units: u32,
}

/// Output pin driven high and low to make a tone.
pub trait TonePin {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Blocking waits.
pub trait Delay {
    fn delay_us(&mut self, us: u32);

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// A tempo and a sequence of notes.
#[derive(Debug, Clone, PartialEq)]
pub struct Melody {
    tempo: u32,
    steps: Vec<MelodyStep>,
}

impl Melody {
    /// Silence between two repetitions of the tune.
    pub const REPEAT_GAP_MS: u32 = 2000;

    /// Longest single note, about 24.8 days.
    pub const MAX_NOTE_MS: u32 = u32::MAX / 2;

    /// Creates a melody from `(note, length_units)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTempo`] if `tempo` is 0, and
    /// [`ConfigError::NoteTooLong`] if a step would last longer than
    /// [`MAX_NOTE_MS`](Self::MAX_NOTE_MS).
    pub fn new(
        tempo: u32,
        steps: impl IntoIterator<Item = (Note, u32)>,
    ) -> Result<Self, ConfigError> {
        ensure!(tempo > 0, ZeroTempoSnafu);
        let steps: Vec<MelodyStep> = steps
            .into_iter()
            .map(|(note, length_units)| MelodyStep { note, length_units })
            .collect();
        for (index, step) in steps.iter().enumerate() {
            ensure!(
                note_length_ms(tempo, step.length_units).is_some(),
                NoteTooLongSnafu {
                    index,
                    length_units: step.length_units,
                    tempo
                }
            );
        }
        Ok(Self { tempo, steps })
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn steps(&self) -> &[MelodyStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Length of a note of `length_units` at this tempo, in ms.
    ///
    /// `None` past [`MAX_NOTE_MS`](Self::MAX_NOTE_MS).
    pub fn note_duration_ms(&self, length_units: u32) -> Option<u32> {
        note_length_ms(self.tempo, length_units)
    }

    /// Each step with its note length and the pause that follows it.
    pub fn events(&self) -> impl Iterator<Item = ToneEvent> + '_ {
        self.steps.iter().map(|step| {
            // Steps are validated in `new`, so the fallback never applies.
            let duration_ms = self
                .note_duration_ms(step.length_units)
                .unwrap_or(Self::MAX_NOTE_MS);
            ToneEvent {
                note: step.note,
                duration_ms,
                pause_ms: pause_after(duration_ms),
            }
        })
    }

    /// Nominal length of one pass in ms, notes plus pauses.
    pub fn duration_ms(&self) -> u64 {
        self.events()
            .map(|e| u64::from(e.duration_ms) + u64::from(e.pause_ms))
            .sum()
    }

    /// Plays the tune once on `pin`. The pin is left low.
    pub fn play_once<P: TonePin, D: Delay>(&self, pin: &mut P, delay: &mut D) {
        debug!(
            "Playing {} notes at tempo {} ({} ms)",
            self.len(),
            self.tempo,
            self.duration_ms()
        );
        pin.set_low();
        for event in self.events() {
            match event.tone() {
                Some(tone) => {
                    for _ in 0..tone.cycles {
                        pin.set_high();
                        delay.delay_us(tone.pulse_us);
                        pin.set_low();
                        delay.delay_us(tone.pulse_us);
                    }
                }
                None => delay.delay_ms(event.duration_ms),
            }
            delay.delay_ms(event.pause_ms);
        }
    }

    /// Plays the tune `repeats` times, each pass followed by the repeat gap.
    pub fn play<P: TonePin, D: Delay>(&self, pin: &mut P, delay: &mut D, repeats: usize) {
        for _ in 0..repeats {
            self.play_once(pin, delay);
            delay.delay_ms(Self::REPEAT_GAP_MS);
        }
    }

    /// Korobeiniki, the tune the board plays: 35 eighth notes at tempo 144.
    pub fn korobeiniki() -> Self {
        let notes = [
            note!("E5"), note!("B4"), note!("C5"), note!("D5"), note!("C5"), note!("B4"),
            note!("A4"), note!("A4"), note!("C5"), note!("E5"), note!("D5"), note!("C5"),
            note!("B4"), note!("C5"), note!("D5"), note!("E5"), note!("C5"), note!("A4"),
            note!("A4"), note!("D5"), note!("F5"), note!("A5"), note!("G5"), note!("F5"),
            note!("E5"), note!("D5"), note!("C5"), note!("B4"), note!("B4"), note!("C5"),
            note!("D5"), note!("E5"), note!("C5"), note!("A4"), note!("A4"),
        ];
        Self {
            tempo: 144,
            steps: notes
                .into_iter()
                .map(|note| MelodyStep {
                    note,
                    length_units: 8,
                })
                .collect(),
        }
    }
}

fn note_length_ms(tempo: u32, length_units: u32) -> Option<u32> {
    (1000 / tempo)
        .checked_mul(length_units)
        .filter(|&ms| ms <= Melody::MAX_NOTE_MS)
}

// At most MAX_NOTE_MS * 1.3, which still fits in a u32.
fn pause_after(duration_ms: u32) -> u32 {
    (f64::from(duration_ms) * 1.30) as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Tone { pulse_us: u64, cycle_us: u64 },
    Silence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    segment: Segment,
    samples: u64,
}

/// Renders a melody's pin timeline as audio at `SAMPLE_RATE`.
///
/// The pin level maps to `1.0` (high) and `-1.0` (low) while a note
/// sounds; pauses and rests are `0.0`.
#[derive(Debug, Clone)]
pub struct MelodyPlayer<const SAMPLE_RATE: u32> {
    spans: Vec<Span>,
    current: usize,
    position: u64,
    looping: bool,
    finished: bool,
}

impl<const SAMPLE_RATE: u32> MelodyPlayer<SAMPLE_RATE> {
    /// Plays `melody` forever, with the repeat gap between passes.
    pub fn looping(melody: &Melody) -> Result<Self, ConfigError> {
        Self::build(melody, true)
    }

    /// Plays `melody` once, then stays silent.
    pub fn once(melody: &Melody) -> Result<Self, ConfigError> {
        Self::build(melody, false)
    }

    fn build(melody: &Melody, looping: bool) -> Result<Self, ConfigError> {
        ensure!(SAMPLE_RATE > 0, ZeroSampleRateSnafu);

        let mut spans = Vec::with_capacity(melody.len() * 2 + 1);
        for event in melody.events() {
            match event.tone() {
                Some(tone) => spans.push(Span {
                    segment: Segment::Tone {
                        pulse_us: u64::from(tone.pulse_us),
                        cycle_us: u64::from(tone.cycle_us()),
                    },
                    samples: Self::samples_for_us(tone.length_us()),
                }),
                None => spans.push(Self::silence_ms(event.duration_ms)),
            }
            spans.push(Self::silence_ms(event.pause_ms));
        }
        if looping {
            spans.push(Self::silence_ms(Melody::REPEAT_GAP_MS));
        }
        spans.retain(|span| span.samples > 0);

        Ok(Self {
            finished: spans.is_empty(),
            spans,
            current: 0,
            position: 0,
            looping,
        })
    }

    fn samples_for_us(us: u64) -> u64 {
        (u128::from(us) * u128::from(SAMPLE_RATE) / 1_000_000) as u64
    }

    fn silence_ms(ms: u32) -> Span {
        Span {
            segment: Segment::Silence,
            samples: Self::samples_for_us(u64::from(ms) * 1000),
        }
    }

    /// Length of one pass in samples.
    pub fn pass_samples(&self) -> u64 {
        self.spans.iter().map(|span| span.samples).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Rewinds to the first note.
    pub fn reset(&mut self) {
        self.current = 0;
        self.position = 0;
        self.finished = self.spans.is_empty();
    }
}

impl<const SAMPLE_RATE: u32> Signal for MelodyPlayer<SAMPLE_RATE> {
    fn next_sample(&mut self) -> f64 {
        if self.finished {
            return 0.0;
        }

        let span = self.spans[self.current];
        let value = match span.segment {
            Segment::Tone { pulse_us, cycle_us } => {
                let elapsed_us =
                    u128::from(self.position) * 1_000_000 / u128::from(SAMPLE_RATE);
                if elapsed_us % u128::from(cycle_us) < u128::from(pulse_us) {
                    1.0
                } else {
                    -1.0
                }
            }
            Segment::Silence => 0.0,
        };

        self.position += 1;
        if self.position >= span.samples {
            self.position = 0;
            self.current += 1;
            if self.current == self.spans.len() {
                self.current = 0;
                self.finished = !self.looping;
            }
        }

        value
    }
}

impl<const SAMPLE_RATE: u32> AudioSignal<SAMPLE_RATE> for MelodyPlayer<SAMPLE_RATE> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PinEvent {
        High,
        Low,
        Wait(u32),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<PinEvent>,
    }

    impl Recorder {
        fn waited_us(&self) -> u64 {
            self.events
                .iter()
                .map(|e| match e {
                    PinEvent::Wait(us) => u64::from(*us),
                    _ => 0,
                })
                .sum()
        }

        fn highs(&self) -> usize {
            self.events.iter().filter(|e| **e == PinEvent::High).count()
        }
    }

    impl TonePin for Recorder {
        fn set_high(&mut self) {
            self.events.push(PinEvent::High);
        }

        fn set_low(&mut self) {
            self.events.push(PinEvent::Low);
        }
    }

    struct FakeDelay(Vec<PinEvent>);

    impl Delay for FakeDelay {
        fn delay_us(&mut self, us: u32) {
            self.0.push(PinEvent::Wait(us));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.push(PinEvent::Wait(ms * 1000));
        }
    }

    #[test]
    fn test_note_rounding() {
        assert_eq!(note!("B4").hz(), 494);
        assert_eq!(note!("E4").hz(), 330);
        assert_eq!(Note::from_hz(-3.0).hz(), 0);
        assert!(Note::REST.is_rest());
        assert!(note!("rest").is_rest());
    }

    #[test]
    fn test_tempo_arithmetic() {
        let melody = Melody::new(144, [(note!("A4"), 8), (note!("A4"), 4)]).unwrap();
        assert_eq!(melody.note_duration_ms(8), Some(48));
        assert_eq!(melody.note_duration_ms(4), Some(24));
        let events: Vec<_> = melody.events().collect();
        assert_eq!(events[0].pause_ms, 62);
        assert_eq!(events[1].pause_ms, 31);
        assert_eq!(melody.duration_ms(), 48 + 62 + 24 + 31);
    }

    #[test]
    fn test_overlong_note_rejected() {
        let err = Melody::new(1, [(note!("A4"), 8), (note!("A4"), 5_000_000)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NoteTooLong {
                index: 1,
                length_units: 5_000_000,
                tempo: 1
            }
        );
        assert!(Melody::new(1, [(note!("A4"), u32::MAX)]).is_err());

        // The longest accepted note still resolves without overflow.
        let units = Melody::MAX_NOTE_MS / 1000;
        let melody = Melody::new(1, [(note!("A4"), units)]).unwrap();
        let event = melody.events().next().unwrap();
        assert_eq!(event.duration_ms, units * 1000);
        assert!(event.pause_ms > event.duration_ms);
        assert_eq!(melody.note_duration_ms(u32::MAX), None);

        let mut player = MelodyPlayer::<8000>::once(&melody).unwrap();
        let tone_samples = event.tone().unwrap().length_us() * 8000 / 1_000_000;
        let pause_samples = u64::from(event.pause_ms) * 8;
        assert_eq!(player.pass_samples(), tone_samples + pause_samples);
        assert_eq!(player.next_sample(), 1.0);
    }

    #[test]
    fn test_long_tone_cycle_count() {
        // 500 kHz gives a 2 us cycle: 500 cycles per ms.
        let tone = Tone::new(500_000, Melody::MAX_NOTE_MS).unwrap();
        assert_eq!(tone.cycles, u64::from(Melody::MAX_NOTE_MS) * 500);
        assert_eq!(tone.length_us(), u64::from(Melody::MAX_NOTE_MS) * 1000);
    }

    #[test]
    fn test_zero_tempo_rejected() {
        assert_eq!(
            Melody::new(0, [(note!("A4"), 8)]),
            Err(ConfigError::ZeroTempo)
        );
    }

    #[test]
    fn test_tone_timing() {
        let tone = Tone::new(440, 48).unwrap();
        assert_eq!(tone.pulse_us, 1136);
        assert_eq!(tone.cycle_us(), 2272);
        assert_eq!(tone.cycles, 22);
        assert!(tone.length_us() >= 48_000);
        assert!(tone.length_us() - 48_000 < u64::from(tone.cycle_us()));

        assert_eq!(Tone::new(0, 48), None);
        assert_eq!(Tone::new(600_000, 48), None);
        assert_eq!(Tone::new(440, 0).unwrap().cycles, 0);
    }

    #[test]
    fn test_korobeiniki_table() {
        let tune = Melody::korobeiniki();
        assert_eq!(tune.tempo(), 144);
        assert_eq!(tune.len(), 35);
        assert!(tune.steps().iter().all(|s| s.length_units == 8));
        let hz: Vec<u32> = tune.steps().iter().take(6).map(|s| s.note.hz()).collect();
        assert_eq!(hz, vec![659, 494, 523, 587, 523, 494]);
        assert_eq!(tune.steps()[23].note.hz(), 698);
        assert_eq!(tune.duration_ms(), 35 * (48 + 62));
    }

    #[test]
    fn test_play_once_drives_pin() {
        let melody = Melody::new(144, [(note!("A4"), 8)]).unwrap();
        let mut pin = Recorder::default();
        let mut delay = FakeDelay(Vec::new());
        melody.play_once(&mut pin, &mut delay);

        assert_eq!(pin.highs(), 22);
        assert_eq!(pin.events.last(), Some(&PinEvent::Low));
        let pin_waits = Recorder { events: delay.0 };
        assert_eq!(pin_waits.waited_us(), 22 * 2272 + 62_000);
    }

    #[test]
    fn test_rest_keeps_pin_low() {
        let melody = Melody::new(100, [(Note::REST, 4)]).unwrap();
        let mut pin = Recorder::default();
        let mut delay = FakeDelay(Vec::new());
        melody.play(&mut pin, &mut delay, 2);

        assert_eq!(pin.highs(), 0);
        assert_eq!(
            delay.0,
            vec![
                PinEvent::Wait(40_000),
                PinEvent::Wait(52_000),
                PinEvent::Wait(2_000_000),
                PinEvent::Wait(40_000),
                PinEvent::Wait(52_000),
                PinEvent::Wait(2_000_000),
            ]
        );
    }

    #[test]
    fn test_player_renders_pin_levels() {
        let melody = Melody::new(144, [(note!("A4"), 8)]).unwrap();
        let mut player = MelodyPlayer::<8000>::once(&melody).unwrap();
        // 22 cycles of 2272 us, then a 62 ms pause.
        assert_eq!(player.pass_samples(), 399 + 496);

        let samples: Vec<f64> = (0..399 + 496 + 10).map(|_| player.next_sample()).collect();
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[9], 1.0);
        assert_eq!(samples[10], -1.0);
        assert!(samples[..399].iter().all(|&s| s == 1.0 || s == -1.0));
        assert!(samples[399..].iter().all(|&s| s == 0.0));
        assert!(player.is_finished());

        player.reset();
        assert!(!player.is_finished());
        assert_eq!(player.next_sample(), 1.0);
    }

    #[test]
    fn test_player_loops_with_gap() {
        let melody = Melody::new(144, [(note!("A4"), 8)]).unwrap();
        let mut player = MelodyPlayer::<8000>::looping(&melody).unwrap();
        let pass = player.pass_samples();
        assert_eq!(pass, 399 + 496 + 16_000);
        for _ in 0..pass {
            player.next_sample();
        }
        assert!(!player.is_finished());
        assert_eq!(player.next_sample(), 1.0);
    }

    #[test]
    fn test_empty_melody_is_silent() {
        let melody = Melody::new(120, []).unwrap();
        let mut player = MelodyPlayer::<8000>::once(&melody).unwrap();
        assert!(player.is_finished());
        assert_eq!(player.next_sample(), 0.0);
        assert!(MelodyPlayer::<0>::once(&melody).is_err());
    }
}
