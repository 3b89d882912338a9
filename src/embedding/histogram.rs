//! Colour-histogram backbone.
//!
//! Resizes the frame to a square, builds one intensity histogram per RGB
//! channel, concatenates them and L2-normalizes. No model weights needed.

use image::imageops::FilterType;

use super::{BackboneInfo, EmbeddingExtractor};
use crate::error::{RecognitionError, Result};
use crate::sampling::Frame;
use crate::vector::{l2_normalize, Embedding};

pub const DEFAULT_BINS: usize = 32;

pub struct HistogramExtractor {
    bins: usize,
    image_size: u32,
}

impl HistogramExtractor {
    pub fn new(bins: usize, image_size: u32) -> Self {
        Self {
            bins: bins.max(1),
            image_size: image_size.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        3 * self.bins
    }
}

/// Bin index of an 8-bit value for `bins` equal-width bins over `[0, 255]`.
///
/// 255 lands in the last bin.
pub(crate) fn bin_of(value: u8, bins: usize) -> usize {
    ((value as usize * bins) / 255).min(bins - 1)
}

impl EmbeddingExtractor for HistogramExtractor {
    fn extract(&self, image: &Frame) -> Result<Embedding> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RecognitionError::ContentUnavailable(
                "empty image".to_string(),
            ));
        }

        let resized = image::imageops::resize(
            image,
            self.image_size,
            self.image_size,
            FilterType::Triangle,
        );

        let mut hist = vec![0.0f32; self.dimensions()];
        for pixel in resized.pixels() {
            for c in 0..3 {
                hist[c * self.bins + bin_of(pixel[c], self.bins)] += 1.0;
            }
        }

        l2_normalize(&hist).ok_or(RecognitionError::DegenerateEmbedding("histogram"))
    }

    fn info(&self) -> BackboneInfo {
        BackboneInfo {
            name: "simple_histogram".into(),
            pretrained: false,
            note: "local colour histogram; plug in a deep backbone for better embeddings".into(),
        }
    }
}
