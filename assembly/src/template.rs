//! Phrasing templates.
//!
//! A template is read-only configuration: an ordered list of text segments
//! (with `{placeholder}` slots), a timing map describing the transition
//! between each consecutive pair, and the voice configuration applied to
//! every segment. Documents are validated when loaded — a template that
//! parses is structurally sound, and a broken one is rejected before any
//! synthesis work can start.

use std::io::Read;

use serde::{Deserialize, Serialize};
use stemline_synth::VoiceConfig;
use thiserror::Error;

/// Error type for template loading and resolution.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),

    #[error("malformed template: {0}")]
    Malformed(String),

    #[error("segment '{segment}' references unbound placeholder '{placeholder}'")]
    MissingBinding { segment: String, placeholder: String },
}

/// One text fragment of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Segment {
    /// Identifier referenced by the timing map.
    pub id: String,
    /// Text pattern; may contain `{placeholder}` slots.
    pub text: String,
}

/// Timing directives for the transition between two named segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingEntry {
    /// Segment id on the left of the transition.
    pub from: String,
    /// Segment id on the right of the transition.
    pub to: String,
    /// Silence inserted at the transition, in milliseconds.
    pub gap_ms: f64,
    /// Crossfade overlap at the transition, in milliseconds.
    pub crossfade_ms: f64,
}

/// A validated phrasing template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    segments: Vec<Segment>,
    timing_map: Vec<TimingEntry>,
    #[serde(default)]
    voice_config: VoiceConfig,
}

impl Template {
    /// Builds a template from parts, validating the structure.
    pub fn new(
        segments: Vec<Segment>,
        timing_map: Vec<TimingEntry>,
        voice_config: VoiceConfig,
    ) -> Result<Self, TemplateError> {
        let template = Self {
            segments,
            timing_map,
            voice_config,
        };
        template.validate()?;
        Ok(template)
    }

    /// Parses and validates a JSON template document.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let template: Template =
            serde_json::from_str(json).map_err(|e| TemplateError::Parse(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    /// Reads, parses, and validates a JSON template document.
    pub fn from_reader(reader: impl Read) -> Result<Self, TemplateError> {
        let template: Template =
            serde_json::from_reader(reader).map_err(|e| TemplateError::Parse(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    /// Returns the ordered segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the timing map, one entry per consecutive segment pair.
    pub fn timing_map(&self) -> &[TimingEntry] {
        &self.timing_map
    }

    /// Returns the voice configuration applied to all segments.
    pub fn voice_config(&self) -> &VoiceConfig {
        &self.voice_config
    }

    /// Checks structural invariants.
    ///
    /// Cheap and idempotent; callers on the synthesis path re-run it so a
    /// template that skipped a validating constructor still cannot cause
    /// partial synthesis work.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.segments.is_empty() {
            return Err(TemplateError::Malformed("no segments".into()));
        }

        for (i, segment) in self.segments.iter().enumerate() {
            if segment.id.is_empty() {
                return Err(TemplateError::Malformed(format!("segment {i} has an empty id")));
            }
            if self.segments[..i].iter().any(|s| s.id == segment.id) {
                return Err(TemplateError::Malformed(format!(
                    "duplicate segment id '{}'",
                    segment.id
                )));
            }
        }

        let expected = self.segments.len() - 1;
        if self.timing_map.len() != expected {
            return Err(TemplateError::Malformed(format!(
                "timing map has {} transitions, expected {} for {} segments",
                self.timing_map.len(),
                expected,
                self.segments.len()
            )));
        }

        for (i, entry) in self.timing_map.iter().enumerate() {
            for id in [&entry.from, &entry.to] {
                if !self.segments.iter().any(|s| &s.id == id) {
                    return Err(TemplateError::Malformed(format!(
                        "transition {i} references undefined segment '{id}'"
                    )));
                }
            }
            if entry.from != self.segments[i].id || entry.to != self.segments[i + 1].id {
                return Err(TemplateError::Malformed(format!(
                    "transition {i} covers '{}' → '{}', expected '{}' → '{}'",
                    entry.from,
                    entry.to,
                    self.segments[i].id,
                    self.segments[i + 1].id
                )));
            }
            if !entry.gap_ms.is_finite() || entry.gap_ms < 0.0 {
                return Err(TemplateError::Malformed(format!(
                    "transition {i} has invalid gap_ms {}",
                    entry.gap_ms
                )));
            }
            if !entry.crossfade_ms.is_finite() || entry.crossfade_ms < 0.0 {
                return Err(TemplateError::Malformed(format!(
                    "transition {i} has invalid crossfade_ms {}",
                    entry.crossfade_ms
                )));
            }
        }

        Ok(())
    }
}
