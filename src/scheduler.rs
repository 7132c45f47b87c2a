//! Fixed-rate driver that stands in for the board's timer interrupt.
//!
//! # Design Overview
//!
//! [`TickScheduler::spawn`] moves a bank, an activation source and a
//! [`DacOutput`] onto a dedicated thread that calls
//! [`OscillatorBank::tick_into`] once per sample period. Deadlines are
//! absolute: tick `n` is due at `start + n * 1e9 / SAMPLE_RATE` ns,
//! computed exactly in integers, so neither wake-up jitter nor rounding of
//! the period accumulates into pitch drift. Waiting uses `spin_sleep`,
//! which sleeps coarsely and spins the remainder for sub-millisecond
//! accuracy.
//!
//! ## Deadline misses
//!
//! The budget of each tick is one period. Two things count as missed
//! deadlines:
//!
//! - a tick whose own execution takes longer than a period (one miss)
//! - every whole period that passes before a late tick gets to start
//!
//! Periods of the second kind get no sample at all. The schedule skips
//! forward over them instead of bursting through the backlog, like an
//! interrupt that fires while the previous one is still running. They are
//! also reported on their own as [`TickStats::skipped_ticks`], so a 100 ms
//! stall at 1 kHz shows up as about 100 misses. Misses are only counted.
//! Nothing is corrected and nothing is logged from inside the loop.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tonebank::{BankConfig, ChannelGates, OscillatorBank, TickScheduler};
//! use tonebank::output::SampleRecorder;
//!
//! let bank = OscillatorBank::<8000, 1, 1>::new(BankConfig::new().channel(0, [440.0])).unwrap();
//! let gates = Arc::new(ChannelGates::new(1));
//!
//! let scheduler =
//!     TickScheduler::spawn(bank, Arc::clone(&gates), SampleRecorder::with_capacity(8000)).unwrap();
//! gates.press(0);
//! std::thread::sleep(Duration::from_millis(100));
//!
//! let stopped = scheduler.stop().unwrap();
//! println!("{:?}", stopped.stats);
//! ```

use crate::bank::OscillatorBank;
use crate::channel::ActivationSource;
use crate::error::{PanickedSnafu, SchedulerError, SpawnSnafu};
use crate::output::DacOutput;
use log::{info, warn};
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Counters published by the tick thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks that ran over a period, plus every skipped period.
    pub missed_deadlines: u64,
    /// Periods that got no sample because the thread fell behind.
    pub skipped_ticks: u64,
    /// Longest single tick.
    pub worst_tick: Duration,
}

#[derive(Debug, Default)]
struct SharedStats {
    ticks: AtomicU64,
    missed: AtomicU64,
    skipped: AtomicU64,
    worst_nanos: AtomicU64,
}

impl SharedStats {
    fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            missed_deadlines: self.missed.load(Ordering::Relaxed),
            skipped_ticks: self.skipped.load(Ordering::Relaxed),
            worst_tick: Duration::from_nanos(self.worst_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// What [`TickScheduler::stop`] hands back.
#[derive(Debug)]
pub struct Stopped<B, O> {
    pub bank: B,
    pub output: O,
    pub stats: TickStats,
}

type Worker<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, O> =
    JoinHandle<(OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>, O)>;

/// Runs a bank on its own thread at `SAMPLE_RATE` ticks per second.
pub struct TickScheduler<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, O> {
    running: Arc<AtomicBool>,
    stats: Arc<SharedStats>,
    worker: Option<Worker<SAMPLE_RATE, CHANNELS, MAX_FREQS, O>>,
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, O>
    TickScheduler<SAMPLE_RATE, CHANNELS, MAX_FREQS, O>
where
    O: DacOutput + Send + 'static,
{
    /// Length of one tick, rounded down to whole nanoseconds. Only the
    /// per-tick budget uses it; deadlines are computed exactly.
    pub const PERIOD: Duration = Duration::from_nanos(1_000_000_000 / SAMPLE_RATE as u64);

    /// Starts ticking immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] if the OS refuses the thread.
    pub fn spawn<A>(
        mut bank: OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>,
        active: A,
        mut output: O,
    ) -> Result<Self, SchedulerError>
    where
        A: ActivationSource + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(SharedStats::default());
        let period = Self::PERIOD;

        let worker = {
            let running = Arc::clone(&running);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("tonebank-tick".into())
                .spawn(move || {
                    let start = Instant::now();
                    let mut slot: u64 = 0;
                    while running.load(Ordering::Relaxed) {
                        let deadline = start + slot_offset(slot, SAMPLE_RATE);
                        let now = Instant::now();
                        if now < deadline {
                            spin_sleep::sleep(deadline - now);
                        } else {
                            let skipped = whole_periods(now - deadline, SAMPLE_RATE);
                            if skipped > 0 {
                                slot += skipped;
                                stats.skipped.fetch_add(skipped, Ordering::Relaxed);
                                stats.missed.fetch_add(skipped, Ordering::Relaxed);
                            }
                        }

                        let started = Instant::now();
                        bank.tick_into(&active, &mut output);
                        let took = started.elapsed();

                        if took > period {
                            stats.missed.fetch_add(1, Ordering::Relaxed);
                        }
                        stats
                            .worst_nanos
                            .fetch_max(took.as_nanos() as u64, Ordering::Relaxed);
                        stats.ticks.fetch_add(1, Ordering::Relaxed);
                        slot += 1;
                    }
                    (bank, output)
                })
                .context(SpawnSnafu)?
        };

        info!(
            "Tick thread started at {} Hz ({:?} per tick)",
            SAMPLE_RATE, period
        );

        Ok(Self {
            running,
            stats,
            worker: Some(worker),
        })
    }

    /// Counters so far. The thread keeps running.
    pub fn stats(&self) -> TickStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stops the thread and returns what it owned.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Panicked`] if the tick thread panicked; the
    /// bank and output are lost in that case.
    pub fn stop(
        mut self,
    ) -> Result<Stopped<OscillatorBank<SAMPLE_RATE, CHANNELS, MAX_FREQS>, O>, SchedulerError> {
        self.running.store(false, Ordering::Relaxed);
        let worker = self.worker.take().context(PanickedSnafu)?;
        let (bank, output) = worker.join().ok().context(PanickedSnafu)?;
        let stats = self.stats.snapshot();

        if stats.missed_deadlines > 0 {
            warn!(
                "Tick thread missed {} deadlines over {} ticks, {} periods skipped (worst tick {:?}, budget {:?})",
                stats.missed_deadlines,
                stats.ticks,
                stats.skipped_ticks,
                stats.worst_tick,
                Self::PERIOD
            );
        }
        info!("Tick thread stopped after {} ticks", stats.ticks);

        Ok(Stopped {
            bank,
            output,
            stats,
        })
    }
}

/// Time from the start of the schedule to tick `slot`.
fn slot_offset(slot: u64, sample_rate: u32) -> Duration {
    let nanos = u128::from(slot) * 1_000_000_000 / u128::from(sample_rate);
    Duration::from_nanos(nanos as u64)
}

/// Whole sample periods contained in `late`.
fn whole_periods(late: Duration, sample_rate: u32) -> u64 {
    (late.as_nanos() * u128::from(sample_rate) / 1_000_000_000) as u64
}

impl<const SAMPLE_RATE: u32, const CHANNELS: usize, const MAX_FREQS: usize, O> Drop
    for TickScheduler<SAMPLE_RATE, CHANNELS, MAX_FREQS, O>
{
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelGates;
    use crate::config::BankConfig;
    use crate::output::{NullOutput, SampleRecorder};

    #[test]
    fn test_period_from_sample_rate() {
        assert_eq!(
            TickScheduler::<1000, 1, 1, SampleRecorder>::PERIOD,
            Duration::from_millis(1)
        );
        assert_eq!(
            TickScheduler::<40000, 1, 1, SampleRecorder>::PERIOD,
            Duration::from_micros(25)
        );
    }

    #[test]
    fn test_runs_and_returns_state() {
        let bank =
            OscillatorBank::<1000, 1, 1>::new(BankConfig::new().channel(0, [0.0])).unwrap();
        let gates = Arc::new(ChannelGates::new(1));
        gates.press(0);

        let scheduler =
            TickScheduler::spawn(bank, Arc::clone(&gates), SampleRecorder::with_capacity(1000))
                .unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(scheduler.is_running());
        let stopped = scheduler.stop().unwrap();

        assert!(stopped.stats.ticks > 0);
        assert!(stopped.stats.missed_deadlines >= stopped.stats.skipped_ticks);
        let recorded = stopped.output.samples();
        assert_eq!(recorded.len() as u64, stopped.stats.ticks.min(1000));
        // A zero-frequency oscillator at index 0 of the square table.
        assert!(recorded.iter().all(|&s| s == 255));
        assert_eq!(stopped.bank.oscillator(0, 0).unwrap().index(), 0);
    }

    #[test]
    fn test_released_gates_emit_silence() {
        let bank =
            OscillatorBank::<2000, 2, 1>::new(BankConfig::new().channels([[0.0], [0.0]])).unwrap();
        let gates = Arc::new(ChannelGates::new(2));
        let scheduler = TickScheduler::spawn(bank, Arc::clone(&gates), Vec::new()).unwrap();
        thread::sleep(Duration::from_millis(20));
        let stopped = scheduler.stop().unwrap();
        assert!(stopped.output.iter().all(|&s| s == 0));
    }

    /// Sleeps for `stall` on write number `stall_at`, counting writes.
    struct StallingOutput {
        writes: usize,
        stall_at: usize,
        stall: Duration,
    }

    impl DacOutput for StallingOutput {
        fn write(&mut self, _value: u16) {
            self.writes += 1;
            if self.writes == self.stall_at {
                thread::sleep(self.stall);
            }
        }
    }

    fn run_with_stall(stall: Duration) -> Stopped<OscillatorBank<1000, 1, 1>, StallingOutput> {
        let bank = OscillatorBank::<1000, 1, 1>::new(BankConfig::new().channel(0, [0.0])).unwrap();
        let output = StallingOutput {
            writes: 0,
            stall_at: 20,
            stall,
        };
        let scheduler = TickScheduler::spawn(bank, [true], output).unwrap();
        thread::sleep(stall + Duration::from_millis(150));
        scheduler.stop().unwrap()
    }

    #[test]
    fn test_slot_offsets_are_exact() {
        assert_eq!(slot_offset(0, 44100), Duration::ZERO);
        assert_eq!(slot_offset(44100, 44100), Duration::from_secs(1));
        assert_eq!(slot_offset(441_000, 44100), Duration::from_secs(10));
        // A rounded period would drift: 44100 * 22675 ns falls 32.5 us short.
        assert_eq!(
            TickScheduler::<44100, 1, 1, NullOutput>::PERIOD * 44100,
            Duration::from_nanos(999_967_500)
        );
        assert_eq!(slot_offset(1, 3), Duration::from_nanos(333_333_333));
        assert_eq!(slot_offset(3, 3), Duration::from_secs(1));
    }

    #[test]
    fn test_whole_periods() {
        assert_eq!(whole_periods(Duration::ZERO, 1000), 0);
        assert_eq!(whole_periods(Duration::from_micros(999), 1000), 0);
        assert_eq!(whole_periods(Duration::from_micros(2500), 1000), 2);
        assert_eq!(whole_periods(Duration::from_millis(100), 40000), 4000);
    }

    #[test]
    fn test_stall_is_counted_per_period() {
        let stopped = run_with_stall(Duration::from_millis(100));

        // The stalled tick overran its period and about 100 periods went by
        // without a sample.
        assert!(stopped.stats.worst_tick >= Duration::from_millis(100));
        assert!(stopped.stats.skipped_ticks >= 90, "{:?}", stopped.stats);
        assert!(stopped.stats.missed_deadlines > stopped.stats.skipped_ticks);
        assert_eq!(stopped.output.writes as u64, stopped.stats.ticks);
    }

    #[test]
    fn test_misses_scale_with_stall_length() {
        let short = run_with_stall(Duration::from_millis(20)).stats;
        let long = run_with_stall(Duration::from_millis(120)).stats;

        assert!(short.skipped_ticks >= 15, "{:?}", short);
        assert!(long.skipped_ticks >= 110, "{:?}", long);
        assert!(long.missed_deadlines > short.missed_deadlines);
    }

    #[test]
    fn test_drop_stops_thread() {
        let bank = OscillatorBank::<1000, 1, 1>::new(BankConfig::new()).unwrap();
        let scheduler = TickScheduler::spawn(bank, [false], NullOutput).unwrap();
        let stats = Arc::clone(&scheduler.stats);
        drop(scheduler);
        let ticks = stats.ticks.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(stats.ticks.load(Ordering::Relaxed), ticks);
    }
}
