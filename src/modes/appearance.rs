//! Appearance mode: per-frame backbone embeddings, mean-aggregated.

use super::{require_frames, FeatureMode, ModeInput, ModeOutput};
use crate::embedding::EmbeddingExtractor;
use crate::error::{RecognitionError, Result};
use crate::sampling::Frame;
use crate::vector::{mean_normalized, Embedding};

pub fn compute(input: &ModeInput<'_>) -> Result<ModeOutput> {
    require_frames(FeatureMode::Appearance, input.frames)?;
    let embedding = embed_frames(input.frames, input.extractor)?;
    Ok(ModeOutput {
        embedding,
        preview: input.frames[0].clone(),
        frame_count: input.frames.len(),
    })
}

/// Embed every frame and return the re-normalized mean.
pub(crate) fn embed_frames<'f, I>(frames: I, extractor: &dyn EmbeddingExtractor) -> Result<Embedding>
where
    I: IntoIterator<Item = &'f Frame>,
{
    let per_frame = frames
        .into_iter()
        .map(|frame| extractor.extract(frame))
        .collect::<Result<Vec<_>>>()?;

    let first = per_frame.first().ok_or_else(|| {
        RecognitionError::ContentUnavailable("appearance mode received no frames".into())
    })?;
    if let Some(bad) = per_frame.iter().find(|e| e.len() != first.len()) {
        return Err(RecognitionError::DimensionMismatch {
            expected: first.len(),
            got: bad.len(),
        });
    }

    mean_normalized(&per_frame).ok_or(RecognitionError::DegenerateEmbedding("appearance"))
}
