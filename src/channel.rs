//! Channel activation: the per-button on/off state the bank reads each tick.
//!
//! The bank never owns or computes activation. Whoever watches the inputs
//! (a button poller, a keyboard handler, a test) writes the flags, and the
//! tick handler reads a snapshot through [`ActivationSource`].
//!
//! [`ChannelGates`] is the shared form used across threads. Each flag has a
//! single writer (the input context) and a single reader (the tick
//! context), and both sides use `Relaxed` atomics. The tick may therefore
//! act on a flag that is one tick stale. That inconsistency is accepted:
//! no lock sits in the real-time path, so the input side can never block
//! or invert the priority of the tick.

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read side of channel activation.
///
/// Channels the source doesn't know about read as inactive.
pub trait ActivationSource {
    fn is_active(&self, channel: usize) -> bool;
}

impl ActivationSource for [bool] {
    fn is_active(&self, channel: usize) -> bool {
        self.get(channel).copied().unwrap_or(false)
    }
}

impl<const N: usize> ActivationSource for [bool; N] {
    fn is_active(&self, channel: usize) -> bool {
        self.as_slice().is_active(channel)
    }
}

impl ActivationSource for Vec<bool> {
    fn is_active(&self, channel: usize) -> bool {
        self.as_slice().is_active(channel)
    }
}

impl<T: ActivationSource + ?Sized> ActivationSource for &T {
    fn is_active(&self, channel: usize) -> bool {
        (**self).is_active(channel)
    }
}

impl<T: ActivationSource + ?Sized> ActivationSource for Arc<T> {
    fn is_active(&self, channel: usize) -> bool {
        (**self).is_active(channel)
    }
}

/// No channel is ever active.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllInactive;

impl ActivationSource for AllInactive {
    fn is_active(&self, _channel: usize) -> bool {
        false
    }
}

/// Lock-free activation flags shared between an input thread and the tick.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tonebank::{ActivationSource, ChannelGates};
///
/// let gates = Arc::new(ChannelGates::new(4));
/// let input_side = Arc::clone(&gates);
///
/// input_side.press(2);
/// assert!(gates.is_active(2));
///
/// input_side.release(2);
/// assert!(!gates.is_active(2));
/// ```
#[derive(Debug)]
pub struct ChannelGates {
    flags: Box<[AtomicBool]>,
}

impl ChannelGates {
    /// Creates `channels` flags, all inactive.
    pub fn new(channels: usize) -> Self {
        Self {
            flags: (0..channels).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Sets a channel's flag. Unknown channels are ignored with a warning.
    pub fn set(&self, channel: usize, active: bool) {
        match self.flags.get(channel) {
            Some(flag) => flag.store(active, Ordering::Relaxed),
            None => warn!(
                "Ignoring activation of channel {} (only {} channels)",
                channel,
                self.flags.len()
            ),
        }
    }

    pub fn press(&self, channel: usize) {
        self.set(channel, true);
    }

    pub fn release(&self, channel: usize) {
        self.set(channel, false);
    }

    /// Flips a channel and returns its new state.
    pub fn toggle(&self, channel: usize) -> bool {
        match self.flags.get(channel) {
            Some(flag) => !flag.fetch_xor(true, Ordering::Relaxed),
            None => {
                warn!(
                    "Ignoring toggle of channel {} (only {} channels)",
                    channel,
                    self.flags.len()
                );
                false
            }
        }
    }

    /// Releases every channel.
    pub fn release_all(&self) {
        for flag in self.flags.iter() {
            flag.store(false, Ordering::Relaxed);
        }
    }

    /// Copies the current flags.
    pub fn snapshot(&self) -> Vec<bool> {
        self.flags
            .iter()
            .map(|flag| flag.load(Ordering::Relaxed))
            .collect()
    }
}

impl ActivationSource for ChannelGates {
    #[inline]
    fn is_active(&self, channel: usize) -> bool {
        self.flags
            .get(channel)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_slice_sources() {
        let flags = [true, false, true];
        assert!(flags.is_active(0));
        assert!(!flags.is_active(1));
        assert!(!flags.is_active(3));

        let flags = vec![false, true];
        assert!(flags.is_active(1));
        assert!(!AllInactive.is_active(0));
    }

    #[test]
    fn test_gates_press_release_toggle() {
        let gates = ChannelGates::new(3);
        assert_eq!(gates.len(), 3);
        assert_eq!(gates.snapshot(), vec![false, false, false]);

        gates.press(1);
        assert_eq!(gates.snapshot(), vec![false, true, false]);

        assert!(gates.toggle(0));
        assert!(!gates.toggle(1));
        assert_eq!(gates.snapshot(), vec![true, false, false]);

        gates.release_all();
        assert_eq!(gates.snapshot(), vec![false, false, false]);
    }

    #[test]
    fn test_gates_ignore_unknown_channels() {
        let gates = ChannelGates::new(2);
        gates.press(5);
        assert!(!gates.toggle(9));
        assert!(!gates.is_active(5));
        assert_eq!(gates.snapshot(), vec![false, false]);
    }

    #[test]
    fn test_gates_visible_across_threads() {
        let gates = Arc::new(ChannelGates::new(4));
        let writer = Arc::clone(&gates);
        thread::spawn(move || writer.press(3)).join().unwrap();
        assert!(gates.is_active(3));
    }
}
