#![allow(dead_code)]

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glimpse::config::GlimpseConfig;
use glimpse::embedding::histogram::{HistogramExtractor, DEFAULT_BINS};
use glimpse::embedding::{BackboneInfo, EmbeddingExtractor};
use glimpse::sampling::{ExtractionParams, Frame};
use glimpse::vector::Embedding;
use image::{Rgb, RgbImage};

pub const DIM: usize = 64;

/// Generate a deterministic 64-dim embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
/// The result will have high cosine similarity to `base`.
pub fn similar_embedding(base: &[f32], salt: usize) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..3 {
        v[(i * 17 + salt * 7) % DIM] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// Config rooted in a temp data dir.
pub fn test_config(data_dir: &Path) -> GlimpseConfig {
    let mut config = GlimpseConfig::default();
    config.general.data_dir = data_dir.to_string_lossy().into_owned();
    config.extraction.image_size = 32;
    config
}

pub fn test_params() -> ExtractionParams {
    ExtractionParams {
        max_frames: 16,
        min_step_s: 0.75,
        resize: 32,
        backbone: "simple_histogram".into(),
        audio_sample_rate: 16_000,
    }
}

pub fn solid_frame(rgb: [u8; 3]) -> Frame {
    RgbImage::from_pixel(48, 32, Rgb(rgb))
}

/// A frame with a horizontal ramp whose phase moves with `t`.
pub fn moving_frame(t: u32) -> Frame {
    RgbImage::from_fn(48, 32, |x, y| {
        let v = ((x + 7 * t) * 5 % 256) as u8;
        Rgb([v, (y * 8 % 256) as u8, 255 - v])
    })
}

/// Write a solid-colour PNG and return its path.
pub fn write_png(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    solid_frame(rgb).save(&path).unwrap();
    path
}

/// Write a 16-bit mono sine tone.
pub fn write_tone(path: &Path, freq: f32, sample_rate: u32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let n = (sample_rate as f32 * seconds) as usize;
    for i in 0..n {
        let s = (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin();
        writer.write_sample((s * 0.5 * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Histogram backbone that counts how often it runs.
pub struct CountingExtractor {
    inner: HistogramExtractor,
    pub calls: Rc<Cell<usize>>,
}

impl CountingExtractor {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                inner: HistogramExtractor::new(DEFAULT_BINS, 32),
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl EmbeddingExtractor for CountingExtractor {
    fn extract(&self, image: &Frame) -> glimpse::Result<Embedding> {
        self.calls.set(self.calls.get() + 1);
        self.inner.extract(image)
    }

    fn info(&self) -> BackboneInfo {
        self.inner.info()
    }
}
