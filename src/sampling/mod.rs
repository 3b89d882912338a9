//! Segments, extraction parameters and frame sampling.
//!
//! Decoding is the job of a [`FrameSource`] or [`AudioSource`]; this module only
//! decides *which* frames a source should hand to a feature mode.

pub mod sources;

use serde::{Deserialize, Serialize};

pub use sources::{
    AudioClip, AudioSource, Frame, FrameSource, ImageSequenceSource, WavAudioSource,
};

/// A time range inside a content item, in milliseconds.
///
/// `-1/-1` is the sentinel for "the whole file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Segment {
    pub const WHOLE: Segment = Segment {
        start_ms: -1,
        end_ms: -1,
    };

    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// True when the segment denotes a bounded, non-empty range.
    pub fn is_bounded(&self) -> bool {
        self.start_ms >= 0 && self.end_ms > self.start_ms
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.is_bounded().then(|| self.end_ms - self.start_ms)
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::WHOLE
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_bounded() {
            write!(f, "{}ms-{}ms", self.start_ms, self.end_ms)
        } else {
            f.write_str("whole")
        }
    }
}

/// Parameters that influence what an extraction produces. All of them are part
/// of the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub max_frames: usize,
    pub min_step_s: f32,
    pub resize: u32,
    pub backbone: String,
    /// Rate audio is resampled to before the audio mode runs.
    pub audio_sample_rate: u32,
}

/// Basic timing facts about a clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub fps: f32,
    pub frame_count: usize,
    pub duration_s: f32,
}

impl VideoInfo {
    pub fn new(fps: f32, frame_count: usize) -> Self {
        let duration_s = if fps > 1e-6 {
            frame_count as f32 / fps
        } else {
            0.0
        };
        Self {
            fps,
            frame_count,
            duration_s,
        }
    }
}

/// Pick frame indices for a clip.
///
/// Takes one frame every `max(1, min_step_s * fps)` frames until `max_frames`
/// are collected. Short clips that yield fewer frames are topped up with
/// evenly spaced indices over the whole range; the result is sorted,
/// deduplicated and truncated to `max_frames`.
pub fn sample_frame_indices(info: &VideoInfo, max_frames: usize, min_step_s: f32) -> Vec<usize> {
    if info.frame_count == 0 {
        return Vec::new();
    }

    let max_frames = max_frames.max(1);
    let step = if info.fps > 1e-6 {
        (min_step_s * info.fps).max(1.0) as usize
    } else {
        1
    };

    let mut idxs: Vec<usize> = (0..info.frame_count)
        .step_by(step)
        .take(max_frames)
        .collect();

    if idxs.len() < max_frames {
        let last = info.frame_count - 1;
        let targets = (0..max_frames).map(|i| {
            if max_frames == 1 {
                0
            } else {
                (last as f64 * i as f64 / (max_frames - 1) as f64) as usize
            }
        });
        idxs.extend(targets);
        idxs.sort_unstable();
        idxs.dedup();
        idxs.truncate(max_frames);
    }

    idxs
}

/// Pick frame indices restricted to `segment`.
///
/// The segment is mapped to a frame range and clamped to the clip. An empty
/// range (or the whole-file sentinel) samples the entire clip instead.
pub fn segment_frame_indices(
    info: &VideoInfo,
    segment: Segment,
    max_frames: usize,
    min_step_s: f32,
) -> Vec<usize> {
    if segment.is_bounded() && info.fps > 1e-6 && info.frame_count > 0 {
        let to_frame = |ms: i64| {
            ((ms as f64 / 1000.0 * info.fps as f64) as usize).min(info.frame_count)
        };
        let start = to_frame(segment.start_ms);
        let end = to_frame(segment.end_ms);
        if end > start {
            let local = VideoInfo::new(info.fps, end - start);
            return sample_frame_indices(&local, max_frames, min_step_s)
                .into_iter()
                .map(|i| start + i)
                .collect();
        }
    }

    sample_frame_indices(info, max_frames, min_step_s)
}
