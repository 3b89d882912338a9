//! Scene mode: keep only frames where the picture changes, then run
//! appearance over those keyframes.

use super::appearance::embed_frames;
use super::{require_frames, FeatureMode, ModeInput, ModeOutput};
use crate::error::Result;
use crate::sampling::Frame;

pub const MAX_KEYFRAMES: usize = 8;
/// Mean absolute difference (0..255) that counts as a scene change.
pub const SCENE_DIFF_THRESHOLD: f32 = 18.0;
/// Target edge length of the coarse grid used for comparisons.
const COARSE_EDGE: u32 = 64;

pub fn compute(input: &ModeInput<'_>) -> Result<ModeOutput> {
    require_frames(FeatureMode::Scene, input.frames)?;

    let keyframes = select_keyframes(input.frames, MAX_KEYFRAMES, SCENE_DIFF_THRESHOLD);
    let embedding = embed_frames(keyframes.iter().copied(), input.extractor)?;

    Ok(ModeOutput {
        embedding,
        preview: keyframes[0].clone(),
        frame_count: keyframes.len(),
    })
}

/// Greedy keyframe selection over already-sampled frames.
///
/// The first frame is always kept. A later frame is kept once its coarse mean
/// absolute difference from the last kept frame reaches `diff_threshold`,
/// until `max_keyframes` are selected. When only one frame was kept and more
/// are available, the last frame is added so at least two remain.
pub fn select_keyframes(frames: &[Frame], max_keyframes: usize, diff_threshold: f32) -> Vec<&Frame> {
    let Some(first) = frames.first() else {
        return Vec::new();
    };
    let max_keyframes = max_keyframes.max(1);

    let mut selected = vec![first];
    let mut last = coarse(first);

    for frame in &frames[1..] {
        if selected.len() >= max_keyframes {
            break;
        }
        let current = coarse(frame);
        if mean_abs_diff(&last, &current) >= diff_threshold {
            selected.push(frame);
            last = current;
        }
    }

    if selected.len() == 1 && frames.len() >= 2 && max_keyframes >= 2 {
        selected.push(&frames[frames.len() - 1]);
    }

    selected
}

/// Nearest-neighbour subsample to roughly 64px per side, flattened.
fn coarse(frame: &Frame) -> Vec<u8> {
    let step_x = (frame.width() / COARSE_EDGE).max(1);
    let step_y = (frame.height() / COARSE_EDGE).max(1);
    let mut out = Vec::new();
    for y in (0..frame.height()).step_by(step_y as usize) {
        for x in (0..frame.width()).step_by(step_x as usize) {
            out.extend_from_slice(&frame.get_pixel(x, y).0);
        }
    }
    out
}

/// Frames of different shapes always count as a change.
fn mean_abs_diff(a: &[u8], b: &[u8]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::MAX;
    }
    let total: u64 = a.iter().zip(b).map(|(x, y)| x.abs_diff(*y) as u64).sum();
    total as f32 / a.len() as f32
}
