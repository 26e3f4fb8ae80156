//! Offline tone synthesizer.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use stemline_audio::{Format, Waveform};

use crate::config::VoiceConfig;
use crate::error::Result;
use crate::synthesizer::Synthesizer;

/// A self-contained synthesizer that renders each text as a sine tone.
///
/// The pitch is derived from a hash of the text and the duration scales
/// with the text length, so distinct inputs produce audibly and
/// numerically distinct stems while identical inputs always produce
/// identical samples. Useful anywhere a provider-free `Synthesizer` is
/// needed: cache exercises, merge demos, and tests.
#[derive(Debug, Default)]
pub struct ToneSynthesizer {
    calls: AtomicUsize,
}

impl ToneSynthesizer {
    /// Creates a new tone synthesizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many synthesis calls this instance has served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

/// FNV-1a over the text; cheap and stable across processes.
fn text_hash(text: &str) -> u32 {
    let mut h: u32 = 2166136261;
    for b in text.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Waveform> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let freq = 200.0 + (text_hash(text) % 600) as f32;
        let base_ms = 200.0 + 40.0 * text.chars().count() as f64;
        let duration_ms = base_ms / config.speed.max(0.1) as f64;

        let format = Format::mono(config.sample_rate);
        let frames = format.frames_in_ms(duration_ms);
        let amplitude = 0.25 * config.volume;

        let samples = (0..frames)
            .map(|i| {
                let t = i as f32 / config.sample_rate as f32;
                amplitude * (TAU * freq * t).sin()
            })
            .collect();

        Ok(Waveform::new(format, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_text_identical_samples() {
        let synth = ToneSynthesizer::new();
        let cfg = VoiceConfig::default();
        let a = synth.synthesize("Hey John", &cfg).await.unwrap();
        let b = synth.synthesize("Hey John", &cfg).await.unwrap();
        assert_eq!(a.samples(), b.samples());
    }

    #[tokio::test]
    async fn test_distinct_text_distinct_samples() {
        let synth = ToneSynthesizer::new();
        let cfg = VoiceConfig::default();
        let a = synth.synthesize("Hey John", &cfg).await.unwrap();
        let b = synth.synthesize("Hey Sarah", &cfg).await.unwrap();
        assert_ne!(a.samples(), b.samples());
    }

    #[tokio::test]
    async fn test_call_counting() {
        let synth = ToneSynthesizer::new();
        let cfg = VoiceConfig::default();
        assert_eq!(synth.calls(), 0);
        synth.synthesize("one", &cfg).await.unwrap();
        synth.synthesize("two", &cfg).await.unwrap();
        assert_eq!(synth.calls(), 2);
    }

    #[tokio::test]
    async fn test_speed_shortens_output() {
        let synth = ToneSynthesizer::new();
        let slow = VoiceConfig::default();
        let fast = VoiceConfig {
            speed: 2.0,
            ..VoiceConfig::default()
        };
        let a = synth.synthesize("hello there", &slow).await.unwrap();
        let b = synth.synthesize("hello there", &fast).await.unwrap();
        assert!(b.frames() < a.frames());
    }

    #[tokio::test]
    async fn test_sample_rate_follows_config() {
        let synth = ToneSynthesizer::new();
        let cfg = VoiceConfig {
            sample_rate: 16000,
            ..VoiceConfig::default()
        };
        let w = synth.synthesize("hi", &cfg).await.unwrap();
        assert_eq!(w.format().sample_rate, 16000);
    }
}
