//! Error type shared by every recognition component.

use std::path::PathBuf;

/// Errors raised by the recognition core.
///
/// A cold start (no trained classes) is not an error: it is reported as an
/// unknown [`PredictResult`](crate::classifier::PredictResult).
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    /// Zero frames, empty audio, or a content file that cannot be read.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// A mode needed more frames than the sampler produced.
    #[error("{mode} mode needs at least {needed} frame(s), got {got}")]
    InsufficientFrames {
        mode: &'static str,
        needed: usize,
        got: usize,
    },

    /// A feature vector had zero norm and cannot be made unit-length.
    #[error("degenerate {0} embedding (zero norm)")]
    DegenerateEmbedding(&'static str),

    /// Two vectors that must share a dimension do not.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unknown feature mode: {0}")]
    UnknownMode(String),

    #[error("unknown backbone: {0}. Supported: histogram")]
    UnknownBackbone(String),

    #[error("unknown dataset item: {0}")]
    UnknownItem(u64),

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to decode audio {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = RecognitionError> = std::result::Result<T, E>;

impl RecognitionError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentUnavailable(_) => "content_unavailable",
            Self::InsufficientFrames { .. } => "insufficient_frames",
            Self::DegenerateEmbedding(_) => "degenerate_embedding",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::UnknownMode(_) => "unknown_mode",
            Self::UnknownBackbone(_) => "unknown_backbone",
            Self::UnknownItem(_) => "unknown_item",
            Self::Image { .. } => "image_decode",
            Self::Audio { .. } => "audio_decode",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
