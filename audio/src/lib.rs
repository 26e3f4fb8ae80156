//! Audio primitives for stem assembly.
//!
//! This crate provides the waveform types and signal processing used to
//! splice pre-rendered speech fragments ("stems") into one message:
//!
//! - `format`: sample rate / channel / encoding descriptors
//! - `waveform`: decoded interleaved `f32` audio buffers
//! - `fade`: crossfade curve tables
//! - `merge`: the deterministic gap/crossfade merge engine
//! - `wav`: WAV encode/decode for provider responses and the stem store
//!
//! # Example
//!
//! ```rust
//! use stemline_audio::{merge, Format, MergeOptions, Transition, Waveform};
//!
//! let hello = Waveform::new(Format::MONO_48K, vec![0.5; 4800]);
//! let world = Waveform::new(Format::MONO_48K, vec![0.5; 4800]);
//!
//! let timing = [Transition { gap_ms: 120.0, crossfade_ms: 20.0 }];
//! let merged = merge(&[hello, world], &timing, &MergeOptions::default()).unwrap();
//! assert!(merged.diagnostics.is_empty());
//! ```

pub mod fade;
pub mod format;
pub mod merge;
pub mod wav;
pub mod waveform;

pub use fade::FadeCurve;
pub use format::{Format, SampleFormat};
pub use merge::{merge, MergeError, MergeOptions, Merged, TimingDiagnostic, Transition};
pub use wav::WavError;
pub use waveform::Waveform;
