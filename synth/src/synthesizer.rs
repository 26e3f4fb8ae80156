//! The synthesis gateway interface.

use async_trait::async_trait;
use stemline_audio::Waveform;

use crate::config::VoiceConfig;
use crate::error::Result;

/// Interface for a text-to-speech synthesis provider.
///
/// This is the system's boundary with the outside world: callers hand it
/// text plus a [`VoiceConfig`] and get back a decoded waveform with its
/// format metadata. Implementations may hit the network; callers treat
/// every invocation as a suspension point and never assume it is cheap.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes the given text into audio.
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Waveform>;
}
