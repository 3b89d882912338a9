//! Feature modes: the fixed set of strategies that turn sampled frames (and
//! optionally audio) into one unit-norm embedding per content item or segment.
//!
//! | Mode | Input | Embedding |
//! |------|-------|-----------|
//! | **Appearance** | ≥1 frame | mean of per-frame backbone embeddings |
//! | **Motion** | ≥2 frames | mean per-pair pixel-difference histogram |
//! | **Fusion** | ≥2 frames | appearance ‖ reduced motion, normalized jointly |
//! | **Scene** | ≥1 frame | appearance over greedily chosen keyframes |
//! | **Audio** | mono samples | energy envelope + energy/centroid statistics |
//!
//! Modes are a closed enum; [`FeatureMode::compute`] dispatches to the module
//! implementing each one.

pub mod appearance;
pub mod audio;
pub mod fusion;
pub mod motion;
pub mod scene;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingExtractor;
use crate::error::{RecognitionError, Result};
use crate::sampling::{AudioClip, Frame, Segment};
use crate::vector::Embedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    Appearance,
    Motion,
    Fusion,
    Scene,
    Audio,
}

impl FeatureMode {
    pub const ALL: [FeatureMode; 5] = [
        Self::Appearance,
        Self::Motion,
        Self::Fusion,
        Self::Scene,
        Self::Audio,
    ];

    /// Stable id used in cache keys, file names and the dataset.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Appearance => "appearance",
            Self::Motion => "motion",
            Self::Fusion => "fusion",
            Self::Scene => "scene",
            Self::Audio => "audio",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Appearance => "Appearance (frames)",
            Self::Motion => "Motion (frame difference)",
            Self::Fusion => "Appearance + motion",
            Self::Scene => "Scene (keyframes + appearance)",
            Self::Audio => "Audio (energy + spectrum)",
        }
    }

    pub fn uses_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }

    /// Minimum number of sampled frames the mode accepts.
    pub fn min_frames(&self) -> usize {
        match self {
            Self::Appearance | Self::Scene => 1,
            Self::Motion | Self::Fusion => 2,
            Self::Audio => 0,
        }
    }

    pub fn compute(self, input: &ModeInput<'_>) -> Result<ModeOutput> {
        let output = match self {
            Self::Appearance => appearance::compute(input),
            Self::Motion => motion::compute(input),
            Self::Fusion => fusion::compute(input),
            Self::Scene => scene::compute(input),
            Self::Audio => audio::compute(input),
        }?;
        tracing::debug!(
            mode = self.id(),
            dims = output.embedding.len(),
            frames = output.frame_count,
            segment = %input.segment,
            "computed mode embedding"
        );
        Ok(output)
    }
}

impl std::fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for FeatureMode {
    type Err = RecognitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or(RecognitionError::UnknownMode(s))
    }
}

/// Everything a mode may read.
pub struct ModeInput<'a> {
    pub frames: &'a [Frame],
    pub audio: Option<&'a AudioClip>,
    pub extractor: &'a dyn EmbeddingExtractor,
    pub segment: Segment,
}

impl<'a> ModeInput<'a> {
    pub fn frames(frames: &'a [Frame], extractor: &'a dyn EmbeddingExtractor) -> Self {
        Self {
            frames,
            audio: None,
            extractor,
            segment: Segment::WHOLE,
        }
    }

    pub fn with_audio(mut self, audio: &'a AudioClip) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segment = segment;
        self
    }
}

/// Result of one mode computation.
#[derive(Debug, Clone)]
pub struct ModeOutput {
    pub embedding: Embedding,
    /// Frame shown to the user next to the prediction.
    pub preview: Frame,
    /// Frames (or keyframes) that contributed.
    pub frame_count: usize,
}

/// Neutral preview for modes that may run without frames.
pub(crate) fn placeholder_preview() -> Frame {
    Frame::new(10, 10)
}

pub(crate) fn require_frames(mode: FeatureMode, frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(RecognitionError::ContentUnavailable(format!(
            "{mode} mode received no frames"
        )));
    }
    if frames.len() < mode.min_frames() {
        return Err(RecognitionError::InsufficientFrames {
            mode: mode.id(),
            needed: mode.min_frames(),
            got: frames.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_ids_roundtrip() {
        for mode in FeatureMode::ALL {
            assert_eq!(mode.id().parse::<FeatureMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), mode.id());
        }
        assert_eq!(" Motion ".parse::<FeatureMode>().unwrap(), FeatureMode::Motion);
        assert!(matches!(
            "optical_flow".parse::<FeatureMode>(),
            Err(RecognitionError::UnknownMode(_))
        ));
    }

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&FeatureMode::Scene).unwrap();
        assert_eq!(json, "\"scene\"");
    }

    #[test]
    fn require_frames_distinguishes_empty_from_short() {
        let one = vec![Frame::new(2, 2)];
        assert!(matches!(
            require_frames(FeatureMode::Appearance, &[]),
            Err(RecognitionError::ContentUnavailable(_))
        ));
        assert!(require_frames(FeatureMode::Appearance, &one).is_ok());
        assert!(matches!(
            require_frames(FeatureMode::Motion, &one),
            Err(RecognitionError::InsufficientFrames { needed: 2, got: 1, .. })
        ));
    }
}
