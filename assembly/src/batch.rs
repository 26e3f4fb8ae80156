//! Batch stem provisioning.
//!
//! Drives the resolver and the stem cache over many binding sets — e.g.
//! the rotational cross-product of common names × brands — with bounded
//! concurrency and per-job retry. Batch mode exists to populate the cache
//! ahead of serving traffic; merging each job into a full message is
//! opt-in.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use stemline_audio::{merge, MergeOptions, TimingDiagnostic, Waveform};
use stemline_store::{Stem, StemCache, StemKey, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::resolve::{resolve, AssemblyRequest, Bindings};
use crate::template::{Template, TemplateError};

/// Bounded exponential backoff policy for retryable gateway failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry.
    pub initial_backoff: Duration,
    /// Ceiling on any single backoff.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff to sleep after the given failed attempt
    /// (1-based): initial, 2×initial, 4×initial, … capped at
    /// `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let backoff = self.initial_backoff.saturating_mul(1u32 << shift);
        backoff.min(self.max_backoff)
    }
}

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum jobs in flight at once.
    pub concurrency: usize,
    /// Retry policy for retryable gateway failures.
    pub retry: RetryPolicy,
    /// Also merge each job into a full message (cache population alone is
    /// the default).
    pub merge: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            merge: false,
        }
    }
}

/// Terminal state of one batch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed { error: String, attempts: u32 },
    /// The batch was cancelled before this job started.
    Skipped,
}

/// Outcome of one binding set.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Position in the input binding-set order.
    pub index: usize,
    pub bindings: Bindings,
    pub status: JobStatus,
    /// Stem keys this job resolves to (empty if resolution failed).
    pub keys: Vec<StemKey>,
    /// Timing diagnostics from the optional merge.
    pub diagnostics: Vec<TimingDiagnostic>,
}

/// Outcome of a whole batch, ordered by input binding-set order so that
/// repeated runs diff cleanly regardless of completion order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, JobStatus::Skipped))
    }

    /// Iterates over jobs that failed, with their last error.
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.status)).count()
    }
}

/// Builds the cross-product of binding axes, e.g. names × developers.
///
/// The first axis varies slowest, so the output order is stable and
/// predictable for reports.
pub fn cartesian(axes: &[(&str, Vec<String>)]) -> Vec<Bindings> {
    let mut sets = vec![Bindings::new()];
    for (name, values) in axes {
        let mut next = Vec::with_capacity(sets.len() * values.len());
        for set in &sets {
            for value in values {
                let mut set = set.clone();
                set.insert((*name).to_string(), value.clone());
                next.push(set);
            }
        }
        sets = next;
    }
    sets
}

/// Runs a batch over the given binding sets.
///
/// The template is validated up front: a malformed template fails the
/// whole batch before a single gateway call. Individual job failures are
/// isolated — they are recorded in the report and never abort sibling
/// jobs. Cancellation is best-effort: jobs not yet started report
/// [`JobStatus::Skipped`], jobs already running finish normally so the
/// cache is never left with a half-written entry.
pub async fn run_batch(
    cache: Arc<StemCache>,
    template: &Template,
    binding_sets: Vec<Bindings>,
    options: &BatchOptions,
    cancel: CancellationToken,
) -> Result<BatchReport, TemplateError> {
    template.validate()?;
    info!(
        jobs = binding_sets.len(),
        concurrency = options.concurrency,
        "starting batch run"
    );

    let jobs = futures::stream::iter(binding_sets.into_iter().enumerate().map(
        |(index, bindings)| {
            let cache = Arc::clone(&cache);
            let cancel = cancel.clone();
            async move { run_job(cache, template, index, bindings, options, cancel).await }
        },
    ))
    .buffered(options.concurrency.max(1))
    .collect::<Vec<JobReport>>()
    .await;

    let report = BatchReport { jobs };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped(),
        "batch run finished"
    );
    Ok(report)
}

async fn run_job(
    cache: Arc<StemCache>,
    template: &Template,
    index: usize,
    bindings: Bindings,
    options: &BatchOptions,
    cancel: CancellationToken,
) -> JobReport {
    if cancel.is_cancelled() {
        return JobReport {
            index,
            bindings,
            status: JobStatus::Skipped,
            keys: Vec::new(),
            diagnostics: Vec::new(),
        };
    }

    let request = match resolve(template, &bindings) {
        Ok(request) => request,
        Err(err) => {
            warn!(job = index, error = %err, "job failed to resolve");
            return JobReport {
                index,
                bindings,
                status: JobStatus::Failed {
                    error: err.to_string(),
                    attempts: 0,
                },
                keys: Vec::new(),
                diagnostics: Vec::new(),
            };
        }
    };
    let keys: Vec<StemKey> = request.parts.iter().map(|p| p.key.clone()).collect();

    let mut attempt = 0;
    loop {
        attempt += 1;
        match ensure_stems(&cache, &request).await {
            Ok(stems) => {
                let mut diagnostics = Vec::new();
                if options.merge {
                    let waveforms: Vec<&Waveform> =
                        stems.iter().map(|s| s.waveform()).collect();
                    match merge(&waveforms, &request.transitions, &MergeOptions::default()) {
                        Ok(merged) => diagnostics = merged.diagnostics,
                        Err(err) => {
                            warn!(job = index, error = %err, "job merge failed");
                            return JobReport {
                                index,
                                bindings,
                                status: JobStatus::Failed {
                                    error: err.to_string(),
                                    attempts: attempt,
                                },
                                keys,
                                diagnostics: Vec::new(),
                            };
                        }
                    }
                }
                info!(job = index, attempts = attempt, stems = keys.len(), "job succeeded");
                return JobReport {
                    index,
                    bindings,
                    status: JobStatus::Succeeded,
                    keys,
                    diagnostics,
                };
            }
            Err(err) => {
                let retryable =
                    matches!(&err, StoreError::Synthesis(e) if e.is_retryable());
                if retryable && attempt < options.retry.max_attempts {
                    let backoff = options.retry.backoff(attempt);
                    warn!(
                        job = index,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "job attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                warn!(job = index, attempts = attempt, error = %err, "job failed");
                return JobReport {
                    index,
                    bindings,
                    status: JobStatus::Failed {
                        error: err.to_string(),
                        attempts: attempt,
                    },
                    keys,
                    diagnostics: Vec::new(),
                };
            }
        }
    }
}

/// Ensures every stem of the request exists in the cache.
async fn ensure_stems(
    cache: &StemCache,
    request: &AssemblyRequest,
) -> Result<Vec<Arc<Stem>>, StoreError> {
    let mut stems = Vec::with_capacity(request.parts.len());
    for part in &request.parts {
        let (stem, _) = cache
            .get_or_create(&part.key, &part.text, &request.voice)
            .await?;
        stems.push(stem);
    }
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use stemline_audio::Format;
    use stemline_store::MemoryStemStore;
    use stemline_synth::{SynthesisError, Synthesizer, ToneSynthesizer, VoiceConfig};

    use crate::template::{Segment, TimingEntry};

    fn rotational_template() -> Template {
        Template::new(
            vec![
                Segment {
                    id: "name".into(),
                    text: "Hello {name}".into(),
                },
                Segment {
                    id: "brand".into(),
                    text: "{developer} timeshare".into(),
                },
            ],
            vec![TimingEntry {
                from: "name".into(),
                to: "brand".into(),
                gap_ms: 90.0,
                crossfade_ms: 15.0,
            }],
            VoiceConfig::default(),
        )
        .unwrap()
    }

    fn cache_over(synth: Arc<dyn Synthesizer>) -> Arc<StemCache> {
        Arc::new(StemCache::new(Arc::new(MemoryStemStore::new()), synth))
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(35));
        assert_eq!(policy.backoff(4), Duration::from_millis(35));
    }

    #[test]
    fn test_cartesian_order() {
        let sets = cartesian(&[
            ("name", vec!["John".into(), "Sarah".into()]),
            ("developer", vec!["Hilton".into(), "Marriott".into()]),
        ]);
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0]["name"], "John");
        assert_eq!(sets[0]["developer"], "Hilton");
        assert_eq!(sets[1]["name"], "John");
        assert_eq!(sets[1]["developer"], "Marriott");
        assert_eq!(sets[3]["name"], "Sarah");
    }

    #[tokio::test]
    async fn test_rotational_batch_reuses_shared_stems() {
        let synth = Arc::new(ToneSynthesizer::new());
        let cache = cache_over(synth.clone());
        let template = rotational_template();

        let sets = cartesian(&[
            ("name", vec!["John".into(), "Sarah".into()]),
            ("developer", vec!["Hilton".into(), "Marriott".into()]),
        ]);

        let report = run_batch(
            cache,
            &template,
            sets,
            &BatchOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed(), 0);
        // 4 jobs × 2 stems, but only 2 names + 2 developers are unique
        assert_eq!(synth.calls(), 4);

        // Report order follows input order
        for (i, job) in report.jobs.iter().enumerate() {
            assert_eq!(job.index, i);
            assert_eq!(job.keys.len(), 2);
        }
    }

    /// Fails requests whose text contains a marker, optionally only for
    /// the first N calls.
    struct ScriptedSynthesizer {
        calls: AtomicUsize,
        poison: &'static str,
        error: SynthesisError,
        fail_first: Option<usize>,
    }

    impl ScriptedSynthesizer {
        fn poisoned(poison: &'static str, error: SynthesisError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                poison,
                error,
                fail_first: None,
            }
        }

        fn flaky(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                poison: "",
                error: SynthesisError::RateLimited { retry_after: None },
                fail_first: Some(fail_first),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Synthesizer for ScriptedSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            config: &VoiceConfig,
        ) -> stemline_synth::Result<stemline_audio::Waveform> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(n) = self.fail_first {
                if call < n {
                    return Err(self.error.clone());
                }
            } else if !self.poison.is_empty() && text.contains(self.poison) {
                return Err(self.error.clone());
            }
            Ok(stemline_audio::Waveform::new(
                Format::mono(config.sample_rate),
                vec![0.25; 960],
            ))
        }
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let synth = Arc::new(ScriptedSynthesizer::poisoned(
            "Mordor",
            SynthesisError::InvalidRequest("unpronounceable".into()),
        ));
        let cache = cache_over(synth.clone());
        let template = rotational_template();

        let sets = cartesian(&[
            ("name", vec!["John".into(), "Mordor".into(), "Sarah".into()]),
            ("developer", vec!["Hilton".into()]),
        ]);

        let options = BatchOptions {
            retry: fast_retry(),
            ..BatchOptions::default()
        };
        let report = run_batch(
            cache,
            &template,
            sets,
            &options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
        assert_eq!(failed[0].bindings["name"], "Mordor");
        match &failed[0].status {
            JobStatus::Failed { error, attempts } => {
                assert!(error.contains("unpronounceable"), "{error}");
                // InvalidRequest is not retryable
                assert_eq!(*attempts, 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let synth = Arc::new(ScriptedSynthesizer::flaky(1));
        let cache = cache_over(synth.clone());
        let template = rotational_template();

        let sets = vec![crate::resolve::bindings([
            ("name", "John"),
            ("developer", "Hilton"),
        ])];
        let options = BatchOptions {
            retry: fast_retry(),
            ..BatchOptions::default()
        };

        let report = run_batch(
            cache,
            &template,
            sets,
            &options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 1);
        // First attempt rate-limited, second attempt completed both stems
        assert_eq!(synth.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_ceiling_marks_job_failed() {
        let synth = Arc::new(ScriptedSynthesizer::flaky(usize::MAX));
        let cache = cache_over(synth.clone());
        let template = rotational_template();

        let sets = vec![crate::resolve::bindings([
            ("name", "John"),
            ("developer", "Hilton"),
        ])];
        let options = BatchOptions {
            retry: fast_retry(),
            ..BatchOptions::default()
        };

        let report = run_batch(
            cache,
            &template,
            sets,
            &options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.failed(), 1);
        match &report.jobs[0].status {
            JobStatus::Failed { attempts, .. } => assert_eq!(*attempts, 3),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_template_makes_no_calls() {
        let synth = Arc::new(ToneSynthesizer::new());
        let cache = cache_over(synth.clone());

        // Deserialized directly, bypassing the validating constructor:
        // the timing map names a segment that does not exist.
        let template: Template = serde_json::from_str(
            r#"{
                "segments": [
                    {"id": "a", "text": "one"},
                    {"id": "b", "text": "two"}
                ],
                "timing_map": [
                    {"from": "a", "to": "ghost", "gap_ms": 0, "crossfade_ms": 0}
                ]
            }"#,
        )
        .unwrap();

        let err = run_batch(
            cache,
            &template,
            vec![Bindings::new()],
            &BatchOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TemplateError::Malformed(_)));
        assert_eq!(synth.calls(), 0, "validation failures must precede synthesis");
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_jobs() {
        let synth = Arc::new(ToneSynthesizer::new());
        let cache = cache_over(synth.clone());
        let template = rotational_template();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let sets = cartesian(&[
            ("name", vec!["John".into(), "Sarah".into()]),
            ("developer", vec!["Hilton".into()]),
        ]);
        let report = run_batch(
            cache,
            &template,
            sets,
            &BatchOptions::default(),
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(report.skipped(), 2);
        assert_eq!(synth.calls(), 0);
    }

    #[tokio::test]
    async fn test_merge_mode_produces_diagnostics() {
        let synth = Arc::new(ToneSynthesizer::new());
        let cache = cache_over(synth.clone());

        // Crossfade far longer than the short tone stems forces a clamp.
        let template = Template::new(
            vec![
                Segment {
                    id: "a".into(),
                    text: "x".into(),
                },
                Segment {
                    id: "b".into(),
                    text: "y".into(),
                },
            ],
            vec![TimingEntry {
                from: "a".into(),
                to: "b".into(),
                gap_ms: 0.0,
                crossfade_ms: 10_000.0,
            }],
            VoiceConfig::default(),
        )
        .unwrap();

        let options = BatchOptions {
            merge: true,
            ..BatchOptions::default()
        };
        let report = run_batch(
            cache,
            &template,
            vec![Bindings::new()],
            &options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.jobs[0].diagnostics.len(), 1);
    }
}
