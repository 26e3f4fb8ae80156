//! HTTP synthesis provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client as ReqwestClient, StatusCode};
use serde::Serialize;
use stemline_audio::{wav, Waveform};
use tracing::debug;

use crate::config::VoiceConfig;
use crate::error::{Result, SynthesisError};
use crate::synthesizer::Synthesizer;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Path of the bytes-out synthesis endpoint.
const SPEECH_PATH: &str = "/tts/bytes";

/// A synthesizer backed by an HTTP text-to-speech provider.
///
/// Sends one JSON request per stem and expects a WAV body back. The
/// client performs no retries of its own — retry policy belongs to the
/// batch layer, and single-message callers surface errors directly.
///
/// # Example
///
/// ```rust,no_run
/// use stemline_synth::HttpSynthesizer;
///
/// let synth = HttpSynthesizer::builder("https://tts.example.com", "api-key")
///     .timeout(std::time::Duration::from_secs(30))
///     .build()?;
/// # Ok::<(), stemline_synth::SynthesisError>(())
/// ```
pub struct HttpSynthesizer {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
}

/// Builder for [`HttpSynthesizer`].
pub struct HttpSynthesizerBuilder {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpSynthesizer {
    /// Creates a client with default options.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::builder(base_url, api_key).build()
    }

    /// Creates a builder for more configuration options.
    pub fn builder(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> HttpSynthesizerBuilder {
        HttpSynthesizerBuilder {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpSynthesizerBuilder {
    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the synthesizer.
    pub fn build(self) -> Result<HttpSynthesizer> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        Ok(HttpSynthesizer {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
        })
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: VoiceRef<'a>,
    output_format: OutputFormat,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct VoiceRef<'a> {
    mode: &'static str,
    id: &'a str,
    tone: &'a str,
}

#[derive(Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

#[derive(Serialize)]
struct GenerationConfig {
    speed: f32,
    volume: f32,
}

impl<'a> SpeechRequest<'a> {
    fn new(text: &'a str, config: &'a VoiceConfig) -> Self {
        Self {
            model_id: &config.model,
            transcript: text,
            voice: VoiceRef {
                mode: "id",
                id: &config.voice,
                tone: &config.tone,
            },
            output_format: OutputFormat {
                container: "wav",
                encoding: "pcm_f32le",
                sample_rate: config.sample_rate,
            },
            generation_config: GenerationConfig {
                speed: config.speed,
                volume: config.volume,
            },
        }
    }
}

/// Maps a non-success HTTP status to a gateway error.
fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> SynthesisError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SynthesisError::RateLimited { retry_after };
    }
    if status.is_client_error() {
        return SynthesisError::InvalidRequest(format!("{status}: {body}"));
    }
    SynthesisError::Unavailable(format!("{status}: {body}"))
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Waveform> {
        let url = format!("{}{}", self.base_url, SPEECH_PATH);
        debug!(
            model = %config.model,
            voice = %config.voice,
            chars = text.len(),
            "requesting synthesis"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest::new(text, config))
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;

        wav::decode(&bytes).map_err(|e| SynthesisError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(3)),
            String::new(),
        );
        match err {
            SynthesisError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_client_error() {
        let err = classify_status(StatusCode::BAD_REQUEST, None, "bad transcript".into());
        assert!(matches!(err, SynthesisError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_status(StatusCode::BAD_GATEWAY, None, String::new());
        assert!(matches!(err, SynthesisError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_request_payload_shape() {
        let config = VoiceConfig {
            model: "m1".into(),
            voice: "v1".into(),
            tone: "warm".into(),
            speed: 1.1,
            volume: 0.9,
            sample_rate: 44100,
        };
        let payload = serde_json::to_value(SpeechRequest::new("Hey John", &config)).unwrap();
        assert_eq!(payload["model_id"], "m1");
        assert_eq!(payload["transcript"], "Hey John");
        assert_eq!(payload["voice"]["mode"], "id");
        assert_eq!(payload["voice"]["tone"], "warm");
        assert_eq!(payload["output_format"]["container"], "wav");
        assert_eq!(payload["output_format"]["sample_rate"], 44100);
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let synth = HttpSynthesizer::new("https://tts.example.com/", "key").unwrap();
        assert_eq!(synth.base_url, "https://tts.example.com");
    }
}
