//! Template resolution.
//!
//! Turns a template plus placeholder bindings into a concrete, ordered
//! list of (stem key, text) pairs with the timing directives between them.
//! Resolution is pure: no synthesis, no store access, so every structural
//! or binding problem surfaces before any external call is made.

use std::collections::BTreeMap;

use stemline_audio::Transition;
use stemline_store::StemKey;
use stemline_synth::VoiceConfig;

use crate::template::{Template, TemplateError};

/// Placeholder values, keyed by placeholder name.
///
/// A `BTreeMap` so that iteration (and anything derived from it, like
/// report ordering) is deterministic.
pub type Bindings = BTreeMap<String, String>;

/// Builds a bindings map from `(name, value)` pairs.
pub fn bindings<I, K, V>(pairs: I) -> Bindings
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// One segment resolved to concrete text and its cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    pub segment_id: String,
    pub key: StemKey,
    pub text: String,
}

/// A fully resolved assembly: ephemeral, lives for one merge.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    /// Resolved segments in template order.
    pub parts: Vec<ResolvedSegment>,
    /// Transition timing, one entry per consecutive part pair.
    pub transitions: Vec<Transition>,
    /// Voice configuration shared by every part.
    pub voice: VoiceConfig,
}

/// Resolves a template against bindings.
pub fn resolve(template: &Template, bindings: &Bindings) -> Result<AssemblyRequest, TemplateError> {
    template.validate()?;

    let mut parts = Vec::with_capacity(template.segments().len());
    for segment in template.segments() {
        let text = substitute(&segment.text, bindings, &segment.id)?;
        let key = StemKey::derive(&text, template.voice_config());
        parts.push(ResolvedSegment {
            segment_id: segment.id.clone(),
            key,
            text,
        });
    }

    let transitions = template
        .timing_map()
        .iter()
        .map(|entry| Transition {
            gap_ms: entry.gap_ms,
            crossfade_ms: entry.crossfade_ms,
        })
        .collect();

    Ok(AssemblyRequest {
        parts,
        transitions,
        voice: template.voice_config().clone(),
    })
}

/// Substitutes `{placeholder}` slots in a text pattern.
fn substitute(
    pattern: &str,
    bindings: &Bindings,
    segment_id: &str,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find('{') {
        let head = &rest[..start];
        if head.contains('}') {
            return Err(TemplateError::Malformed(format!(
                "segment '{segment_id}' has an unmatched '}}'"
            )));
        }
        out.push_str(head);

        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            TemplateError::Malformed(format!(
                "segment '{segment_id}' has an unterminated placeholder"
            ))
        })?;
        let name = &after[..end];
        if name.is_empty() || name.contains('{') {
            return Err(TemplateError::Malformed(format!(
                "segment '{segment_id}' has an invalid placeholder '{{{name}}}'"
            )));
        }

        let value = bindings
            .get(name)
            .ok_or_else(|| TemplateError::MissingBinding {
                segment: segment_id.to_string(),
                placeholder: name.to_string(),
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    if rest.contains('}') {
        return Err(TemplateError::Malformed(format!(
            "segment '{segment_id}' has an unmatched '}}'"
        )));
    }
    out.push_str(rest);
    Ok(out)
}
