//! Frame and audio sources.
//!
//! The traits are the seams to external decoders. Two small local
//! implementations are provided: a directory of still images treated as a clip,
//! and WAV files read with `hound`.

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::{segment_frame_indices, Segment, VideoInfo};
use crate::error::{RecognitionError, Result};
use crate::vector::linear_resample;

/// One decoded RGB frame.
pub type Frame = RgbImage;

/// Produces the ordered, already-sampled frames of a content item.
pub trait FrameSource {
    fn frames(&self, content: &Path, segment: Segment) -> Result<Vec<Frame>>;
}

/// Mono PCM samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_s(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }

    /// Drop everything after `max_seconds`.
    pub fn truncated(mut self, max_seconds: f32) -> Self {
        let cap = (max_seconds.max(0.0) * self.sample_rate as f32) as usize;
        self.samples.truncate(cap);
        self
    }

    /// Linearly resample to `rate`. A zero rate, or the current one, is a no-op.
    pub fn resampled(self, rate: u32) -> Self {
        if rate == 0 || rate == self.sample_rate || self.sample_rate == 0 || self.samples.is_empty() {
            return self;
        }
        let len = (self.samples.len() as u64 * rate as u64 / self.sample_rate as u64).max(1);
        Self {
            samples: linear_resample(&self.samples, len as usize),
            sample_rate: rate,
        }
    }
}

/// Produces mono audio for a content item, bounded in duration.
pub trait AudioSource {
    fn audio(&self, content: &Path, segment: Segment) -> Result<AudioClip>;
}

/// Treats a directory of still images (sorted by file name) as a clip at a
/// fixed frame rate. A single image file yields one frame.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    pub fps: f32,
    pub max_frames: usize,
    pub min_step_s: f32,
}

impl ImageSequenceSource {
    pub fn new(fps: f32, max_frames: usize, min_step_s: f32) -> Self {
        Self {
            fps,
            max_frames,
            min_step_s,
        }
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn frames(&self, content: &Path, segment: Segment) -> Result<Vec<Frame>> {
        if content.is_file() {
            return Ok(vec![open_rgb(content)?]);
        }
        if !content.is_dir() {
            return Err(RecognitionError::ContentUnavailable(format!(
                "{} does not exist",
                content.display()
            )));
        }

        let files = Self::list_images(content)?;
        let info = VideoInfo::new(self.fps, files.len());
        let idxs = segment_frame_indices(&info, segment, self.max_frames, self.min_step_s);
        if idxs.is_empty() {
            return Err(RecognitionError::ContentUnavailable(format!(
                "no image frames in {}",
                content.display()
            )));
        }

        tracing::debug!(dir = %content.display(), frames = idxs.len(), total = files.len(), "sampled image sequence");
        idxs.into_iter().map(|i| open_rgb(&files[i])).collect()
    }
}

/// Decode an image file into RGB8.
pub fn open_rgb(path: &Path) -> Result<Frame> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| RecognitionError::Image {
            path: path.to_path_buf(),
            source,
        })
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

/// Reads WAV files, mixing every channel down to mono.
#[derive(Debug, Clone)]
pub struct WavAudioSource {
    pub max_seconds: f32,
}

impl WavAudioSource {
    pub fn new(max_seconds: f32) -> Self {
        Self { max_seconds }
    }
}

impl AudioSource for WavAudioSource {
    fn audio(&self, content: &Path, segment: Segment) -> Result<AudioClip> {
        let audio_err = |source: hound::Error| RecognitionError::Audio {
            path: content.to_path_buf(),
            source,
        };

        let mut reader = hound::WavReader::open(content).map_err(audio_err)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let sample_rate = spec.sample_rate;
        let total_frames = reader.duration() as u64;

        let ms_to_frame = |ms: i64| (ms.max(0) as u64 * sample_rate as u64 / 1000).min(total_frames);
        let (start, mut end) = match segment.duration_ms() {
            Some(_) => (ms_to_frame(segment.start_ms), ms_to_frame(segment.end_ms)),
            None => (0, total_frames),
        };
        let cap = (self.max_seconds.max(0.0) as f64 * sample_rate as f64) as u64;
        end = end.min(start + cap);
        let n_frames = end.saturating_sub(start) as usize;

        reader.seek(start as u32)?;
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .take(n_frames * channels)
                .collect::<std::result::Result<_, _>>()
                .map_err(audio_err)?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .take(n_frames * channels)
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(audio_err)?
            }
        };

        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| (frame.iter().sum::<f32>() / frame.len() as f32).clamp(-1.0, 1.0))
            .collect();

        if samples.is_empty() {
            return Err(RecognitionError::ContentUnavailable(format!(
                "no audio samples in {} ({segment})",
                content.display()
            )));
        }

        Ok(AudioClip {
            samples,
            sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let v = if c == 0 { (i % 100) as i16 * 100 } else { 0 };
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_source_mixes_to_mono_and_applies_segment() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, 1000, 2, 3000);

        let source = WavAudioSource::new(60.0);
        let whole = source.audio(&path, Segment::WHOLE).unwrap();
        assert_eq!(whole.sample_rate, 1000);
        assert_eq!(whole.samples.len(), 3000);
        assert!(whole.samples.iter().all(|s| (-1.0..=1.0).contains(s)));

        let seg = source.audio(&path, Segment::new(1000, 1500)).unwrap();
        assert_eq!(seg.samples.len(), 500);
    }

    #[test]
    fn wav_source_caps_duration() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("long.wav");
        write_wav(&path, 1000, 1, 5000);

        let clip = WavAudioSource::new(2.0).audio(&path, Segment::WHOLE).unwrap();
        assert_eq!(clip.samples.len(), 2000);
        assert!((clip.duration_s() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn resampling_keeps_duration() {
        let clip = AudioClip {
            samples: (0..8000).map(|i| (i as f32 / 8000.0) * 2.0 - 1.0).collect(),
            sample_rate: 8000,
        };
        let up = clip.clone().resampled(16_000);
        assert_eq!(up.sample_rate, 16_000);
        assert_eq!(up.samples.len(), 16_000);
        assert!((up.duration_s() - clip.duration_s()).abs() < 1e-6);
        assert_eq!(up.samples.first(), clip.samples.first());
        assert_eq!(up.samples.last(), clip.samples.last());

        assert_eq!(clip.clone().resampled(8000), clip);
        assert_eq!(clip.clone().resampled(0), clip);
    }

    #[test]
    fn wav_source_segment_past_end_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("short.wav");
        write_wav(&path, 1000, 1, 500);

        let err = WavAudioSource::new(60.0)
            .audio(&path, Segment::new(2000, 3000))
            .unwrap_err();
        assert!(matches!(err, RecognitionError::ContentUnavailable(_)));
    }

    #[test]
    fn image_sequence_samples_directory() {
        let tmp = TempDir::new().unwrap();
        for i in 0..6u8 {
            let img = RgbImage::from_pixel(4, 4, image::Rgb([i * 40, 0, 0]));
            img.save(tmp.path().join(format!("frame_{i:02}.png"))).unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let source = ImageSequenceSource::new(1.0, 3, 2.0);
        let frames = source.frames(tmp.path(), Segment::WHOLE).unwrap();
        assert_eq!(frames.len(), 3);
        // step of two frames: 0, 2, 4
        assert_eq!(frames[1].get_pixel(0, 0)[0], 80);

        let single = source
            .frames(&tmp.path().join("frame_05.png"), Segment::WHOLE)
            .unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = ImageSequenceSource::new(1.0, 4, 1.0)
            .frames(tmp.path(), Segment::WHOLE)
            .unwrap_err();
        assert!(matches!(err, RecognitionError::ContentUnavailable(_)));
    }

    #[test]
    fn truncated_clip() {
        let clip = AudioClip {
            samples: vec![0.1; 100],
            sample_rate: 10,
        };
        assert_eq!(clip.truncated(3.0).samples.len(), 30);
    }
}
