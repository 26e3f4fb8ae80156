//! Voice configuration.

use serde::{Deserialize, Serialize};

/// Parameters that shape the synthesized voice.
///
/// Every field here affects the rendered audio, so all of them participate
/// in stem cache key derivation via [`VoiceConfig::canonical_fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VoiceConfig {
    /// Provider model identifier.
    pub model: String,
    /// Provider voice identifier.
    pub voice: String,
    /// Tone directive (e.g. "neutral", "warm").
    pub tone: String,
    /// Speaking rate multiplier; 1.0 is natural pace.
    pub speed: f32,
    /// Output gain multiplier; 1.0 is provider default.
    pub volume: f32,
    /// Requested output sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            voice: String::new(),
            tone: "neutral".to_string(),
            speed: 1.0,
            volume: 1.0,
            sample_rate: 48000,
        }
    }
}

impl VoiceConfig {
    /// Returns `(name, value)` pairs in a fixed, declared order.
    ///
    /// Cache keys are derived from this serialization, so the order and
    /// the value rendering must never change: reordering fields or
    /// reformatting a number would silently invalidate every existing
    /// cache entry.
    pub fn canonical_fields(&self) -> [(&'static str, String); 6] {
        [
            ("model", self.model.clone()),
            ("voice", self.voice.clone()),
            ("tone", self.tone.clone()),
            ("speed", self.speed.to_string()),
            ("volume", self.volume.to_string()),
            ("sample_rate", self.sample_rate.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let cfg = VoiceConfig::default();
        assert_eq!(cfg.tone, "neutral");
        assert_eq!(cfg.speed, 1.0);
        assert_eq!(cfg.sample_rate, 48000);
    }

    #[test]
    fn test_canonical_field_order_is_stable() {
        let cfg = VoiceConfig {
            model: "m1".into(),
            voice: "v1".into(),
            ..VoiceConfig::default()
        };
        let names: Vec<&str> = cfg.canonical_fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["model", "voice", "tone", "speed", "volume", "sample_rate"]
        );
    }

    #[test]
    fn test_canonical_float_rendering() {
        let cfg = VoiceConfig {
            speed: 1.25,
            ..VoiceConfig::default()
        };
        let fields = cfg.canonical_fields();
        assert_eq!(fields[3], ("speed", "1.25".to_string()));
        assert_eq!(fields[4], ("volume", "1".to_string()));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let cfg: VoiceConfig = serde_json::from_str(r#"{"speed": 0.9}"#).unwrap();
        assert_eq!(cfg.speed, 0.9);
        assert_eq!(cfg.tone, "neutral");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<VoiceConfig, _> =
            serde_json::from_str(r#"{"speed": 1.0, "pitch": 3}"#);
        assert!(result.is_err());
    }
}
