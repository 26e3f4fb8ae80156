//! Stem audio assets and their bookkeeping records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stemline_audio::{Format, SampleFormat, Waveform};
use stemline_synth::VoiceConfig;

use crate::key::StemKey;

/// A pre-rendered, reusable audio fragment.
///
/// Created once per key on a cache miss and never mutated afterwards;
/// replacement goes through delete-then-recreate. Shared as `Arc<Stem>`
/// so concurrent readers never copy the sample data.
#[derive(Debug, Clone)]
pub struct Stem {
    key: StemKey,
    waveform: Waveform,
}

impl Stem {
    /// Creates a stem for the given key.
    pub fn new(key: StemKey, waveform: Waveform) -> Self {
        Self { key, waveform }
    }

    /// Returns the cache key this stem was produced for.
    pub fn key(&self) -> &StemKey {
        &self.key
    }

    /// Returns the audio.
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }
}

/// Audit record for one cache entry: synthesis inputs plus the declared
/// shape of the stored audio. `frames` is compared against the decoded
/// file on every read to detect corruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemMeta {
    pub key: StemKey,
    pub text: String,
    pub config: VoiceConfig,
    pub frames: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
    pub created: DateTime<Utc>,
}

impl StemMeta {
    /// Builds the record for a freshly synthesized stem.
    pub fn describe(stem: &Stem, text: &str, config: &VoiceConfig) -> Self {
        let format = stem.waveform().format();
        Self {
            key: stem.key().clone(),
            text: text.to_string(),
            config: config.clone(),
            frames: stem.waveform().frames() as u64,
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_format: format.sample_format.label().to_string(),
            created: Utc::now(),
        }
    }

    /// Reconstructs the declared audio format, if the stored label is known.
    pub fn format(&self) -> Option<Format> {
        Some(Format {
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_format: SampleFormat::from_label(&self.sample_format)?,
        })
    }
}
