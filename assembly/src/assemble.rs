//! Single-message assembly.

use std::sync::Arc;
use std::time::Duration;

use stemline_audio::{merge, MergeError, MergeOptions, TimingDiagnostic, Waveform};
use stemline_store::{Provenance, StemCache, StemKey, StoreError};
use thiserror::Error;
use tracing::{debug, info};

use crate::resolve::{resolve, Bindings};
use crate::template::{Template, TemplateError};

/// Error type for assembly operations.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Where one stem of an assembled message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemReport {
    pub segment_id: String,
    pub key: StemKey,
    pub provenance: Provenance,
}

/// A fully assembled message.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    /// The merged waveform; format metadata rides along inside it.
    pub waveform: Waveform,
    /// Per-segment provenance, in segment order.
    pub stems: Vec<StemReport>,
    /// Non-fatal timing adjustments from the merge.
    pub diagnostics: Vec<TimingDiagnostic>,
}

impl AssemblyOutput {
    /// Returns the playback duration of the assembled message.
    pub fn duration(&self) -> Duration {
        self.waveform.duration()
    }

    /// Returns how many stems were served from the cache.
    pub fn cache_hits(&self) -> usize {
        self.stems
            .iter()
            .filter(|s| s.provenance == Provenance::Cached)
            .count()
    }
}

/// Assembles one personalized message from a template and bindings.
///
/// Errors surface immediately — a single-request caller owns its own retry
/// policy; silent retries live only in the batch layer.
pub struct Assembler {
    cache: Arc<StemCache>,
    options: MergeOptions,
}

impl Assembler {
    /// Creates an assembler over the given stem cache.
    pub fn new(cache: Arc<StemCache>) -> Self {
        Self {
            cache,
            options: MergeOptions::default(),
        }
    }

    /// Replaces the merge options (crossfade curve, tail fade).
    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves, synthesizes-or-fetches, and merges one message.
    pub async fn assemble(
        &self,
        template: &Template,
        bindings: &Bindings,
    ) -> Result<AssemblyOutput, AssemblyError> {
        let request = resolve(template, bindings)?;
        info!(segments = request.parts.len(), "assembling message");

        let mut stems = Vec::with_capacity(request.parts.len());
        let mut reports = Vec::with_capacity(request.parts.len());
        for part in &request.parts {
            let (stem, provenance) = self
                .cache
                .get_or_create(&part.key, &part.text, &request.voice)
                .await?;
            debug!(segment = %part.segment_id, key = %part.key, ?provenance, "stem ready");
            reports.push(StemReport {
                segment_id: part.segment_id.clone(),
                key: part.key.clone(),
                provenance,
            });
            stems.push(stem);
        }

        let waveforms: Vec<&Waveform> = stems.iter().map(|s| s.waveform()).collect();
        let merged = merge(&waveforms, &request.transitions, &self.options)?;

        info!(
            duration_ms = merged.duration().as_millis() as u64,
            clamped = merged.diagnostics.len(),
            "message assembled"
        );
        Ok(AssemblyOutput {
            waveform: merged.waveform,
            stems: reports,
            diagnostics: merged.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::bindings;
    use crate::template::{Segment, TimingEntry};
    use stemline_store::MemoryStemStore;
    use stemline_synth::{Synthesizer, ToneSynthesizer, VoiceConfig};

    fn double_anchor() -> Template {
        Template::new(
            vec![
                Segment {
                    id: "greeting".into(),
                    text: "Hey {name}, it's Luis.".into(),
                },
                Segment {
                    id: "brand".into(),
                    text: "about your {developer} timeshare.".into(),
                },
            ],
            vec![TimingEntry {
                from: "greeting".into(),
                to: "brand".into(),
                gap_ms: 120.0,
                crossfade_ms: 20.0,
            }],
            VoiceConfig::default(),
        )
        .unwrap()
    }

    fn assembler() -> (Assembler, Arc<ToneSynthesizer>) {
        let synth = Arc::new(ToneSynthesizer::new());
        let cache = Arc::new(StemCache::new(
            Arc::new(MemoryStemStore::new()),
            synth.clone(),
        ));
        (Assembler::new(cache), synth)
    }

    #[tokio::test]
    async fn test_two_segment_scenario() {
        let (assembler, synth) = assembler();
        let template = double_anchor();
        let binds = bindings([("name", "John"), ("developer", "Hilton")]);

        let output = assembler.assemble(&template, &binds).await.unwrap();

        // Two distinct stems, both synthesized on the first pass
        assert_eq!(output.stems.len(), 2);
        assert_ne!(output.stems[0].key, output.stems[1].key);
        assert_eq!(output.cache_hits(), 0);
        assert_eq!(synth.calls(), 2);
        assert!(output.diagnostics.is_empty());

        // Duration = stem1 + stem2 + 120ms gap − 20ms crossfade
        let cfg = template.voice_config().clone();
        let d1 = synth
            .synthesize("Hey John, it's Luis.", &cfg)
            .await
            .unwrap()
            .frames();
        let d2 = synth
            .synthesize("about your Hilton timeshare.", &cfg)
            .await
            .unwrap()
            .frames();
        let format = output.waveform.format();
        let expected = d1 + d2 + format.frames_in_ms(120.0) - format.frames_in_ms(20.0);
        assert_eq!(output.waveform.frames(), expected);
    }

    #[tokio::test]
    async fn test_second_assembly_is_all_cache_hits() {
        let (assembler, synth) = assembler();
        let template = double_anchor();
        let binds = bindings([("name", "John"), ("developer", "Hilton")]);

        let first = assembler.assemble(&template, &binds).await.unwrap();
        let second = assembler.assemble(&template, &binds).await.unwrap();

        assert_eq!(second.cache_hits(), 2);
        assert_eq!(synth.calls(), 2, "cached stems must not re-synthesize");
        assert_eq!(
            first.waveform.samples(),
            second.waveform.samples(),
            "same stems and timing must merge bit-identically"
        );
    }

    #[tokio::test]
    async fn test_parallel_submissions_share_synthesis() {
        let (assembler, synth) = assembler();
        let assembler = Arc::new(assembler);
        let template = Arc::new(double_anchor());
        let binds = bindings([("name", "John"), ("developer", "Hilton")]);

        let a = {
            let assembler = assembler.clone();
            let template = template.clone();
            let binds = binds.clone();
            tokio::spawn(async move { assembler.assemble(&template, &binds).await })
        };
        let b = {
            let assembler = assembler.clone();
            let template = template.clone();
            let binds = binds.clone();
            tokio::spawn(async move { assembler.assemble(&template, &binds).await })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.waveform.samples(), b.waveform.samples());
        assert_eq!(synth.calls(), 2, "parallel identical requests stay at 2 calls");
    }

    #[tokio::test]
    async fn test_missing_binding_makes_no_gateway_calls() {
        let (assembler, synth) = assembler();
        let template = double_anchor();
        let binds = bindings([("name", "John")]);

        let err = assembler.assemble(&template, &binds).await.unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Template(TemplateError::MissingBinding { .. })
        ));
        assert_eq!(synth.calls(), 0);
    }
}
