//! Fade curves for crossfade blending.

use std::f32::consts::PI;

/// Fade curve shapes used by the merge engine.
///
/// Crossfades use [`FadeCurve::Cosine`]: a raised-cosine window whose
/// fade-in is defined as `1 − fade_out`, so the pair sums to exactly 1.0
/// at every sample and the blend preserves the combined amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeCurve {
    /// Raised cosine: `fade_out(t) = (1 + cos(πt)) / 2`.
    #[default]
    Cosine,
    /// Straight line: `fade_out(t) = 1 − t`.
    Linear,
}

impl FadeCurve {
    /// Builds the fade-out table for a window of `n` samples.
    ///
    /// Endpoints are included: the first entry is 1.0 and, for `n > 1`,
    /// the last entry is 0.0. A single-sample window is all-1.0 (the
    /// left side wins entirely), which keeps one-sample crossfades from
    /// attenuating both inputs at once.
    pub fn fade_out(&self, n: usize) -> Vec<f32> {
        let denom = n.saturating_sub(1).max(1) as f32;
        (0..n)
            .map(|k| {
                let t = k as f32 / denom;
                match self {
                    FadeCurve::Cosine => (1.0 + (PI * t).cos()) / 2.0,
                    FadeCurve::Linear => 1.0 - t,
                }
            })
            .collect()
    }

    /// Builds the matching fade-out/fade-in table pair.
    ///
    /// The fade-in is derived as `1 − fade_out` rather than computed
    /// independently, which guarantees the unity-sum property.
    pub fn pair(&self, n: usize) -> (Vec<f32>, Vec<f32>) {
        let fade_out = self.fade_out(n);
        let fade_in = fade_out.iter().map(|g| 1.0 - g).collect();
        (fade_out, fade_in)
    }
}
