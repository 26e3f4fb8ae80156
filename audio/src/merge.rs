//! Bit-exact stem merging.
//!
//! Concatenates an ordered sequence of waveforms into one buffer, applying
//! a silence gap and an optional crossfade at each transition. The merge is
//! deterministic: identical input samples and timing always produce
//! byte-identical output. To keep that guarantee meaningful the engine
//! never resamples, remixes channels, or normalizes — stems whose formats
//! diverge are rejected instead of converted.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::fade::FadeCurve;
use crate::format::Format;
use crate::waveform::Waveform;

/// Timing directives for one transition between adjacent stems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Silence to insert, in milliseconds.
    pub gap_ms: f64,
    /// Crossfade overlap duration, in milliseconds.
    pub crossfade_ms: f64,
}

impl Transition {
    /// A hard cut: no gap, no crossfade.
    pub const CUT: Transition = Transition {
        gap_ms: 0.0,
        crossfade_ms: 0.0,
    };
}

/// Options controlling a merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Crossfade curve shape.
    pub curve: FadeCurve,
    /// Linear fade applied in place to the final milliseconds of the
    /// output. 0 disables it; the output duration is unchanged either way.
    pub tail_fade_ms: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            curve: FadeCurve::Cosine,
            tail_fade_ms: 0.0,
        }
    }
}

/// Non-fatal timing adjustments reported alongside the merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingDiagnostic {
    /// A crossfade longer than an adjacent stem was shortened to fit.
    Clamped {
        /// Index of the transition (0 = between the first two stems).
        transition: usize,
        /// Crossfade length the timing asked for, in frames.
        requested_frames: usize,
        /// Crossfade length actually applied, in frames.
        applied_frames: usize,
    },
}

/// A merged waveform plus any timing diagnostics raised on the way.
#[derive(Debug, Clone)]
pub struct Merged {
    pub waveform: Waveform,
    pub diagnostics: Vec<TimingDiagnostic>,
}

impl Merged {
    /// Returns the playback duration of the merged waveform.
    pub fn duration(&self) -> Duration {
        self.waveform.duration()
    }
}

/// Error type for merge operations.
#[derive(Debug, Clone, Error)]
pub enum MergeError {
    #[error("no stems to merge")]
    EmptyAssembly,

    #[error("stem {index} is empty")]
    InvalidStem { index: usize },

    #[error("stem {index} format {found} does not match base format {expected}")]
    FormatMismatch {
        index: usize,
        expected: Format,
        found: Format,
    },

    #[error("expected {expected} transitions for the stem sequence, got {found}")]
    TransitionCountMismatch { expected: usize, found: usize },
}

/// Merges stems in order, applying `transitions[i]` between stem `i` and
/// stem `i + 1`.
///
/// Per transition the output layout is: the left side minus its crossfaded
/// tail, the blended overlap, `gap_ms` of silence, then the right stem
/// minus its crossfaded head. Gap and crossfade frame counts are
/// `round(ms × sample_rate / 1000)`. A crossfade that would outrun either
/// adjacent side is clamped and reported via [`TimingDiagnostic::Clamped`]
/// rather than failing the merge.
///
/// A single-stem sequence (with an empty transition list) is returned
/// unchanged.
pub fn merge<W: AsRef<Waveform>>(
    stems: &[W],
    transitions: &[Transition],
    opts: &MergeOptions,
) -> Result<Merged, MergeError> {
    let first = stems.first().ok_or(MergeError::EmptyAssembly)?.as_ref();
    let format = first.format();

    for (index, stem) in stems.iter().enumerate() {
        let stem = stem.as_ref();
        if stem.is_empty() {
            return Err(MergeError::InvalidStem { index });
        }
        if stem.format() != format {
            return Err(MergeError::FormatMismatch {
                index,
                expected: format,
                found: stem.format(),
            });
        }
    }

    let expected = stems.len() - 1;
    if transitions.len() != expected {
        return Err(MergeError::TransitionCountMismatch {
            expected,
            found: transitions.len(),
        });
    }

    let ch = format.channels.max(1) as usize;
    let mut out: Vec<f32> = first.samples().to_vec();
    let mut diagnostics = Vec::new();

    for (i, tr) in transitions.iter().enumerate() {
        let right = stems[i + 1].as_ref();
        let n_gap = format.frames_in_ms(tr.gap_ms);
        let requested = format.frames_in_ms(tr.crossfade_ms);

        let left_frames = out.len() / ch;
        let n_xf = requested.min(left_frames).min(right.frames());
        if n_xf < requested {
            warn!(
                transition = i,
                requested_frames = requested,
                applied_frames = n_xf,
                "crossfade longer than adjacent stem, clamping"
            );
            diagnostics.push(TimingDiagnostic::Clamped {
                transition: i,
                requested_frames: requested,
                applied_frames: n_xf,
            });
        }

        debug!(
            transition = i,
            gap_frames = n_gap,
            crossfade_frames = n_xf,
            "applying transition"
        );

        if n_xf > 0 {
            let (fade_out, fade_in) = opts.curve.pair(n_xf);
            let cross_start = (left_frames - n_xf) * ch;
            let right_samples = right.samples();
            for f in 0..n_xf {
                for c in 0..ch {
                    let idx = cross_start + f * ch + c;
                    out[idx] = out[idx] * fade_out[f] + right_samples[f * ch + c] * fade_in[f];
                }
            }
            out.extend(std::iter::repeat(0.0f32).take(n_gap * ch));
            out.extend_from_slice(&right_samples[n_xf * ch..]);
        } else {
            out.extend(std::iter::repeat(0.0f32).take(n_gap * ch));
            out.extend_from_slice(right.samples());
        }
    }

    if opts.tail_fade_ms > 0.0 {
        apply_tail_fade(&mut out, format, opts.tail_fade_ms);
    }

    Ok(Merged {
        waveform: Waveform::new(format, out),
        diagnostics,
    })
}

/// Fades the final frames linearly toward zero, in place.
fn apply_tail_fade(samples: &mut [f32], format: Format, tail_fade_ms: f64) {
    let ch = format.channels.max(1) as usize;
    let total_frames = samples.len() / ch;
    let n_tail = format.frames_in_ms(tail_fade_ms).max(1).min(total_frames);
    if n_tail < 2 {
        return;
    }

    let denom = (n_tail - 1) as f32;
    let start = (total_frames - n_tail) * ch;
    for k in 0..n_tail {
        let gain = 1.0 - k as f32 / denom;
        for c in 0..ch {
            samples[start + k * ch + c] *= gain;
        }
    }
}
