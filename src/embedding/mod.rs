//! Still-image embedding backbones.
//!
//! Provides the [`EmbeddingExtractor`] trait and a local colour-histogram
//! backbone. Deep backbones live outside this crate and plug in through the
//! trait; [`create_extractor`] builds the local one from configuration.

pub mod histogram;

use serde::Serialize;

use crate::error::{RecognitionError, Result};
use crate::sampling::Frame;
use crate::vector::Embedding;

/// Describes the backbone behind an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackboneInfo {
    pub name: String,
    pub pretrained: bool,
    pub note: String,
}

/// Trait for embedding one still image into a vector.
///
/// Implementations produce L2-normalized vectors of a fixed dimension.
/// Calls may be slow (network inference); the core treats them as opaque.
pub trait EmbeddingExtractor {
    fn extract(&self, image: &Frame) -> Result<Embedding>;

    fn info(&self) -> BackboneInfo;

    /// Stable backbone id, used in cache keys.
    fn id(&self) -> String {
        self.info().name
    }
}

/// Create an extractor from config.
///
/// Only the histogram backbone ships with the crate.
pub fn create_extractor(
    config: &crate::config::ExtractionConfig,
) -> Result<Box<dyn EmbeddingExtractor>> {
    match config.backbone.trim().to_ascii_lowercase().as_str() {
        "histogram" | "hist" | "fallback_hist" | "simple_histogram" => Ok(Box::new(
            histogram::HistogramExtractor::new(histogram::DEFAULT_BINS, config.image_size),
        )),
        other => Err(RecognitionError::UnknownBackbone(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;

    #[test]
    fn create_histogram_aliases() {
        for name in ["histogram", "fallback_hist", " Simple_Histogram "] {
            let config = ExtractionConfig {
                backbone: name.into(),
                ..ExtractionConfig::default()
            };
            let extractor = create_extractor(&config).unwrap();
            assert_eq!(extractor.id(), "simple_histogram");
        }
    }

    #[test]
    fn unknown_backbone_is_rejected() {
        let config = ExtractionConfig {
            backbone: "resnet50".into(),
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            create_extractor(&config),
            Err(RecognitionError::UnknownBackbone(name)) if name == "resnet50"
        ));
    }
}
