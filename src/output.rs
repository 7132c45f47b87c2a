//! Destinations for the samples the bank emits.
//!
//! A [`DacOutput`] stands in for the board's digital-to-analog converter:
//! a single write per tick of a code in the DAC's range. Writes happen in
//! the real-time path, so implementations must not block and should not
//! allocate once warmed up.

/// Receives one sample per tick.
pub trait DacOutput {
    fn write(&mut self, value: u16);
}

/// Unbounded capture, mostly for tests.
impl DacOutput for Vec<u16> {
    fn write(&mut self, value: u16) {
        self.push(value);
    }
}

impl<O: DacOutput + ?Sized> DacOutput for &mut O {
    fn write(&mut self, value: u16) {
        (**self).write(value)
    }
}

impl<O: DacOutput + ?Sized> DacOutput for Box<O> {
    fn write(&mut self, value: u16) {
        (**self).write(value)
    }
}

/// Adapts a closure into a [`DacOutput`].
///
/// ```
/// use tonebank::output::{DacOutput, FnOutput};
///
/// let mut last = 0;
/// let mut dac = FnOutput(|value| last = value);
/// dac.write(42);
/// drop(dac);
/// assert_eq!(last, 42);
/// ```
pub struct FnOutput<F>(pub F);

impl<F: FnMut(u16)> DacOutput for FnOutput<F> {
    fn write(&mut self, value: u16) {
        (self.0)(value)
    }
}

/// Discards every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput;

impl DacOutput for NullOutput {
    fn write(&mut self, _value: u16) {}
}

/// Capture with a fixed capacity, allocated up front.
///
/// Samples past the capacity are counted and dropped, so the recorder
/// never reallocates inside the tick.
#[derive(Debug, Clone)]
pub struct SampleRecorder {
    samples: Vec<u16>,
    limit: usize,
    dropped: u64,
}

impl SampleRecorder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            limit: capacity,
            dropped: 0,
        }
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Samples that arrived after the recorder was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.limit
    }

    pub fn into_samples(self) -> Vec<u16> {
        self.samples
    }
}

impl DacOutput for SampleRecorder {
    fn write(&mut self, value: u16) {
        if self.is_full() {
            self.dropped += 1;
        } else {
            self.samples.push(value);
        }
    }
}

#[cfg(feature = "wav-export")]
pub use wav::WavSink;

#[cfg(feature = "wav-export")]
mod wav {
    use super::DacOutput;
    use crate::error::{OutputError, WavCreateSnafu, WavFinalizeSnafu, WavWriteSnafu};
    use crate::waveform::Resolution;
    use log::info;
    use snafu::ResultExt;
    use std::fs::File;
    use std::io::{BufWriter, Seek, Write};
    use std::path::Path;

    /// Writes DAC codes to a mono 16-bit WAV stream.
    ///
    /// Codes in `[0, max]` are mapped linearly onto `[-32767, 32767]`. A
    /// write failure is latched: later samples are skipped and the error
    /// is returned from [`finalize`](Self::finalize).
    pub struct WavSink<W: Write + Seek> {
        writer: hound::WavWriter<W>,
        max: u16,
        written: u64,
        error: Option<hound::Error>,
    }

    fn spec(sample_rate: u32) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    impl WavSink<BufWriter<File>> {
        /// Creates (or truncates) a WAV file at `path`.
        pub fn create<P: AsRef<Path>>(
            path: P,
            sample_rate: u32,
            resolution: Resolution,
        ) -> Result<Self, OutputError> {
            let path = path.as_ref();
            let writer = hound::WavWriter::create(path, spec(sample_rate)).context(WavCreateSnafu)?;
            info!("Writing {} Hz WAV to {}", sample_rate, path.display());
            Ok(Self::from_writer(writer, resolution))
        }
    }

    impl<W: Write + Seek> WavSink<W> {
        /// Writes into any seekable stream.
        pub fn new(inner: W, sample_rate: u32, resolution: Resolution) -> Result<Self, OutputError> {
            let writer = hound::WavWriter::new(inner, spec(sample_rate)).context(WavCreateSnafu)?;
            Ok(Self::from_writer(writer, resolution))
        }

        fn from_writer(writer: hound::WavWriter<W>, resolution: Resolution) -> Self {
            Self {
                writer,
                max: resolution.max(),
                written: 0,
                error: None,
            }
        }

        /// Samples successfully written so far.
        pub fn written(&self) -> u64 {
            self.written
        }

        /// Flushes the header and returns the number of samples written.
        pub fn finalize(self) -> Result<u64, OutputError> {
            if let Some(source) = self.error {
                return Err(source).context(WavWriteSnafu);
            }
            self.writer.finalize().context(WavFinalizeSnafu)?;
            Ok(self.written)
        }

        fn to_pcm(&self, value: u16) -> i16 {
            let unit = f64::from(value.min(self.max)) / f64::from(self.max);
            ((unit * 2.0 - 1.0) * f64::from(i16::MAX)).round() as i16
        }
    }

    impl<W: Write + Seek> DacOutput for WavSink<W> {
        fn write(&mut self, value: u16) {
            if self.error.is_some() {
                return;
            }
            let pcm = self.to_pcm(value);
            match self.writer.write_sample(pcm) {
                Ok(()) => self.written += 1,
                Err(err) => self.error = Some(err),
            }
        }
    }

}
