//! Audio mode: a small fixed-length descriptor of loudness and brightness.
//!
//! Layout (78 dims before normalization):
//! - energy envelope resampled to [`ENVELOPE_BINS`] points
//! - mean/std/min/max/q25/q50/q75 of per-window energy
//! - the same statistics of the per-window spectral centroid, as a fraction of Nyquist

use rustfft::{num_complex::Complex, FftPlanner};

use super::{placeholder_preview, ModeInput, ModeOutput};
use crate::error::{RecognitionError, Result};
use crate::sampling::AudioClip;
use crate::vector::{l2_normalize, linear_resample, mean_std, quantile, Embedding};

pub const ENVELOPE_BINS: usize = 64;
/// Longest stretch of audio considered.
pub const MAX_AUDIO_SECONDS: f32 = 60.0;
const WINDOW_SECONDS: f32 = 0.25;
const MIN_WINDOW: usize = 256;
const STATS_LEN: usize = 7;

pub const AUDIO_EMBEDDING_DIM: usize = ENVELOPE_BINS + 2 * STATS_LEN;

pub fn compute(input: &ModeInput<'_>) -> Result<ModeOutput> {
    let clip = input.audio.ok_or_else(|| {
        RecognitionError::ContentUnavailable("audio mode received no audio".into())
    })?;
    let bounded = clip.clone().truncated(MAX_AUDIO_SECONDS);
    let embedding = audio_embedding(&bounded, ENVELOPE_BINS)?;

    let preview = input
        .frames
        .first()
        .cloned()
        .unwrap_or_else(placeholder_preview);

    Ok(ModeOutput {
        embedding,
        preview,
        frame_count: input.frames.len(),
    })
}

/// Compute the normalized audio descriptor for `clip`.
///
/// Silence has no direction and is rejected as degenerate.
pub fn audio_embedding(clip: &AudioClip, envelope_bins: usize) -> Result<Embedding> {
    let x = &clip.samples;
    if x.is_empty() || clip.sample_rate == 0 {
        return Err(RecognitionError::ContentUnavailable("empty audio".into()));
    }
    let sr = clip.sample_rate as f32;

    let win = MIN_WINDOW.max((WINDOW_SECONDS * sr) as usize);
    let hann = hann_window(win);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(win);
    let bin_hz = sr / win as f32;

    let mut energies = Vec::new();
    let mut centroids = Vec::new();
    if x.len() >= win {
        for seg in x.windows(win).step_by(win) {
            energies.push(seg.iter().map(|s| s * s).sum::<f32>() / win as f32);

            let mut buffer: Vec<Complex<f32>> = seg
                .iter()
                .zip(&hann)
                .map(|(s, w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);

            let mut weighted = 0.0f32;
            let mut total = 0.0f32;
            for (k, c) in buffer.iter().take(win / 2 + 1).enumerate() {
                let mag = c.norm();
                weighted += k as f32 * bin_hz * mag;
                total += mag;
            }
            centroids.push(weighted / (total + 1e-12));
        }
    }

    if energies.is_empty() {
        energies.push(x.iter().map(|s| s * s).sum::<f32>() / x.len() as f32);
        centroids.push(0.0);
    }

    let nyquist = (sr / 2.0).max(1.0);
    let centroids: Vec<f32> = centroids
        .into_iter()
        .map(|c| (c / nyquist).clamp(0.0, 1.0))
        .collect();

    let mut feat = linear_resample(&energies, envelope_bins.max(1));
    feat.extend(summary_stats(&energies));
    feat.extend(summary_stats(&centroids));

    l2_normalize(&feat).ok_or(RecognitionError::DegenerateEmbedding("audio"))
}

/// Symmetric Hann window.
fn hann_window(n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

fn summary_stats(values: &[f32]) -> [f32; STATS_LEN] {
    let (mean, std) = mean_std(values);
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    [
        mean,
        std,
        min,
        max,
        quantile(values, 0.25),
        quantile(values, 0.5),
        quantile(values, 0.75),
    ]
}
