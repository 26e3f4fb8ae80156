//! Stem cache key derivation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stemline_synth::VoiceConfig;

/// A content-addressed stem identifier.
///
/// Derived (never random), so the same text and voice configuration map
/// to the same key in every process, forever. Rendered as 64 lowercase
/// hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StemKey(String);

impl StemKey {
    /// Derives the key for a text/voice-configuration pair.
    ///
    /// The text is normalized first (see [`normalize_text`]) and the
    /// configuration is serialized in its fixed canonical field order, so
    /// incidental whitespace or casing differences share a stem while any
    /// audio-affecting change produces a different key.
    pub fn derive(text: &str, config: &VoiceConfig) -> StemKey {
        let mut hasher = Sha256::new();
        hasher.update(b"text=");
        hasher.update(normalize_text(text).as_bytes());
        for (name, value) in config.canonical_fields() {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        StemKey(hex::encode(hasher.finalize()))
    }

    /// Returns the key as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when parsing a string that is not a valid key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stem key: {0}")]
pub struct InvalidKeyError(String);

impl FromStr for StemKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == 64
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(StemKey(s.to_string()))
        } else {
            Err(InvalidKeyError(s.to_string()))
        }
    }
}

/// Normalizes text for key derivation: leading/trailing whitespace is
/// dropped, internal whitespace runs collapse to a single space, and the
/// result is lowercased.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
