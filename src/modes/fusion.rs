//! Fusion mode: appearance and a coarser motion histogram, concatenated.

use super::appearance::embed_frames;
use super::motion::motion_histogram;
use super::{require_frames, FeatureMode, ModeInput, ModeOutput};
use crate::error::{RecognitionError, Result};
use crate::vector::l2_normalize;

/// Motion bins per channel inside the fused vector.
pub const FUSION_MOTION_BINS: usize = 8;

pub fn compute(input: &ModeInput<'_>) -> Result<ModeOutput> {
    require_frames(FeatureMode::Fusion, input.frames)?;

    let appearance = embed_frames(input.frames, input.extractor)?;
    let motion = motion_histogram(input.frames, FUSION_MOTION_BINS)?;

    // normalized as a whole, not per part
    let mut fused = appearance;
    fused.extend(motion);
    let embedding = l2_normalize(&fused).ok_or(RecognitionError::DegenerateEmbedding("fusion"))?;

    Ok(ModeOutput {
        embedding,
        preview: input.frames[0].clone(),
        frame_count: input.frames.len(),
    })
}
