//! Speech synthesis gateway.
//!
//! This crate defines the boundary between the stem pipeline and the
//! text-to-speech provider:
//!
//! - [`Synthesizer`]: the capability trait the rest of the system depends on
//! - [`VoiceConfig`]: every audio-affecting voice parameter
//! - [`SynthesisError`]: the gateway error taxonomy
//! - [`HttpSynthesizer`]: a provider client over HTTP
//! - [`ToneSynthesizer`]: a deterministic offline implementation
//!
//! The gateway performs no retries and no caching of its own — those
//! concerns live with the stem store and batch layers.

mod config;
mod error;
mod http;
mod synthesizer;
mod tone;

pub use config::VoiceConfig;
pub use error::{Result, SynthesisError};
pub use http::{HttpSynthesizer, HttpSynthesizerBuilder, DEFAULT_TIMEOUT};
pub use synthesizer::Synthesizer;
pub use tone::ToneSynthesizer;
