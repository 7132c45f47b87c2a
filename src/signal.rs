//! Floating-point signal view used to play rendered output through an
//! audio host.
//!
//! The bank itself produces integer DAC codes. The `Signal` trait is the
//! bridge to anything that wants `f64` samples, such as a `cpal` output
//! stream or a WAV writer.

/// A source of samples.
pub trait Signal {
    /// Generates the next sample.
    ///
    /// # Returns
    ///
    /// A sample value, between -1.0 and 1.0 for audio signals
    fn next_sample(&mut self) -> f64;

    /// Fills a buffer with consecutive samples.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Mutable slice to fill with samples
    fn process(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

/// A signal whose sample rate is fixed in its type.
///
/// Signals rendered at different rates can't be handed to the same
/// consumer by accident, because `SAMPLE_RATE` is part of the type.
///
/// # Examples
///
/// ```
/// use tonebank::{AudioSignal, Signal};
///
/// struct Silence;
///
/// impl Signal for Silence {
///     fn next_sample(&mut self) -> f64 {
///         0.0
///     }
/// }
///
/// impl AudioSignal<40000> for Silence {}
///
/// assert_eq!(Silence.sample_rate(), 40000.0);
/// ```
pub trait AudioSignal<const SAMPLE_RATE: u32>: Signal {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> f64 {
        SAMPLE_RATE as f64
    }
}

impl<S: Signal + ?Sized> Signal for Box<S> {
    fn next_sample(&mut self) -> f64 {
        (**self).next_sample()
    }

    fn process(&mut self, buffer: &mut [f64]) {
        (**self).process(buffer)
    }
}
