//! Decoded audio waveforms.

use std::time::Duration;

use crate::format::Format;

/// A decoded audio buffer: interleaved `f32` samples plus their format.
///
/// Waveforms are immutable once built; the merge engine produces new
/// buffers rather than editing inputs in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    format: Format,
    samples: Vec<f32>,
}

impl Waveform {
    /// Creates a waveform from interleaved samples.
    ///
    /// A trailing partial frame (sample count not divisible by the channel
    /// count) is truncated rather than carried around as garbage.
    pub fn new(format: Format, mut samples: Vec<f32>) -> Self {
        let ch = format.channels.max(1) as usize;
        let usable = samples.len() - samples.len() % ch;
        samples.truncate(usable);
        Self { format, samples }
    }

    /// Creates a silent waveform of the given frame count.
    pub fn silence(format: Format, frames: usize) -> Self {
        let ch = format.channels.max(1) as usize;
        Self {
            format,
            samples: vec![0.0; frames * ch],
        }
    }

    /// Returns the format of this waveform.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consumes the waveform and returns the underlying samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Returns the number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Returns true if the waveform holds no frames.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        self.format.duration(self.frames() as u64)
    }
}

impl AsRef<Waveform> for Waveform {
    fn as_ref(&self) -> &Waveform {
        self
    }
}
