//! Motion mode: histograms of absolute pixel differences between consecutive
//! frames, averaged over every pair.

use super::{require_frames, FeatureMode, ModeInput, ModeOutput};
use crate::embedding::histogram::bin_of;
use crate::error::{RecognitionError, Result};
use crate::sampling::Frame;
use crate::vector::{l2_normalize, Embedding};

/// Bins per colour channel.
pub const MOTION_BINS: usize = 16;

pub fn compute(input: &ModeInput<'_>) -> Result<ModeOutput> {
    require_frames(FeatureMode::Motion, input.frames)?;
    let embedding = motion_histogram(input.frames, MOTION_BINS)?;
    Ok(ModeOutput {
        embedding,
        preview: input.frames[0].clone(),
        frame_count: input.frames.len(),
    })
}

/// Mean per-channel difference histogram over consecutive pairs, normalized.
///
/// Each pair's histogram is expressed as pixel fractions so frames of any
/// resolution weigh the same. Both frames of a pair must share dimensions.
pub fn motion_histogram(frames: &[Frame], bins: usize) -> Result<Embedding> {
    if frames.len() < 2 {
        return Err(RecognitionError::InsufficientFrames {
            mode: FeatureMode::Motion.id(),
            needed: 2,
            got: frames.len(),
        });
    }

    let bins = bins.max(1);
    let mut acc = vec![0.0f32; 3 * bins];
    for (i, pair) in frames.windows(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);
        if a.dimensions() != b.dimensions() {
            return Err(RecognitionError::ContentUnavailable(format!(
                "frame {} is {:?} but frame {} is {:?}",
                i,
                a.dimensions(),
                i + 1,
                b.dimensions()
            )));
        }
        let pixels = (a.width() * a.height()) as f32;
        if pixels == 0.0 {
            return Err(RecognitionError::ContentUnavailable("empty frame".into()));
        }

        let mut hist = vec![0u32; 3 * bins];
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            for c in 0..3 {
                let diff = pa[c].abs_diff(pb[c]);
                hist[c * bins + bin_of(diff, bins)] += 1;
            }
        }
        for (slot, count) in acc.iter_mut().zip(hist) {
            *slot += count as f32 / pixels;
        }
    }

    let pairs = (frames.len() - 1) as f32;
    for x in &mut acc {
        *x /= pairs;
    }

    l2_normalize(&acc).ok_or(RecognitionError::DegenerateEmbedding("motion"))
}
