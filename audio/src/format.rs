//! Audio format descriptors.

use std::fmt;
use std::time::Duration;

/// Sample encoding of the decoded audio source.
///
/// All in-memory processing happens on `f32` samples regardless of the
/// source encoding; this tag records what the source (and any re-encoded
/// output) uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 16-bit signed integer PCM.
    Int16,
    /// 32-bit IEEE float PCM.
    Float32,
}

impl SampleFormat {
    /// Returns the number of bits per sample.
    pub fn bits(&self) -> u16 {
        match self {
            SampleFormat::Int16 => 16,
            SampleFormat::Float32 => 32,
        }
    }

    /// Returns a short stable label ("i16" / "f32").
    pub fn label(&self) -> &'static str {
        match self {
            SampleFormat::Int16 => "i16",
            SampleFormat::Float32 => "f32",
        }
    }

    /// Parses a label produced by [`SampleFormat::label`].
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "i16" => Some(SampleFormat::Int16),
            "f32" => Some(SampleFormat::Float32),
            _ => None,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Describes the format of a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 for mono, 2 for stereo).
    pub channels: u16,
    /// Source sample encoding.
    pub sample_format: SampleFormat,
}

impl Format {
    /// Creates a mono float32 format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            sample_format: SampleFormat::Float32,
        }
    }

    /// Creates a stereo float32 format with the given sample rate.
    pub const fn stereo(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            sample_format: SampleFormat::Float32,
        }
    }

    /// Returns the same format with a different sample encoding.
    pub const fn with_sample_format(mut self, sample_format: SampleFormat) -> Self {
        self.sample_format = sample_format;
        self
    }

    /// Converts a millisecond duration to a whole number of frames,
    /// rounding to the nearest frame. Negative inputs yield zero.
    pub fn frames_in_ms(&self, ms: f64) -> usize {
        let ms = ms.max(0.0);
        (self.sample_rate as f64 * ms / 1000.0).round() as usize
    }

    /// Returns the duration spanned by the given number of frames.
    pub fn duration(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

// Common format presets
impl Format {
    /// 16kHz mono (common for TTS)
    pub const MONO_16K: Format = Format::mono(16000);
    /// 24kHz mono
    pub const MONO_24K: Format = Format::mono(24000);
    /// 44.1kHz mono (CD quality mono)
    pub const MONO_44K: Format = Format::mono(44100);
    /// 48kHz mono
    pub const MONO_48K: Format = Format::mono(48000);
    /// 44.1kHz stereo (CD quality)
    pub const STEREO_44K: Format = Format::stereo(44100);
    /// 48kHz stereo
    pub const STEREO_48K: Format = Format::stereo(48000);
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz · {} · {} ch",
            self.sample_rate, self.sample_format, self.channels
        )
    }
}
