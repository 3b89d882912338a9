pub mod classify;
pub mod cluster;
pub mod doctor;
pub mod embed;
pub mod modes;
pub mod train;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use glimpse::config::GlimpseConfig;
use glimpse::engine::{Embedded, Recognizer};
use glimpse::modes::FeatureMode;
use glimpse::sampling::{ImageSequenceSource, Segment, WavAudioSource};
use glimpse::RecognitionError;

/// Local decoders used by every command: image files / directories for
/// frames, WAV files for audio.
pub struct LocalSources {
    pub frames: ImageSequenceSource,
    pub audio: WavAudioSource,
}

impl LocalSources {
    pub fn from_config(config: &GlimpseConfig) -> Self {
        Self {
            frames: ImageSequenceSource::new(
                config.extraction.sequence_fps,
                config.extraction.max_frames,
                config.extraction.min_step_s,
            ),
            audio: WavAudioSource::new(config.extraction.audio_max_seconds),
        }
    }

    pub fn embed(
        &self,
        recognizer: &Recognizer,
        content: &Path,
        mode: FeatureMode,
        segment: Segment,
    ) -> glimpse::Result<Embedded> {
        recognizer.embed(content, mode, segment, &self.frames, Some(&self.audio))
    }
}

/// Build a recognizer and load every mode's persisted classifier.
pub fn open_recognizer(config: &GlimpseConfig) -> Result<Recognizer> {
    let mut recognizer =
        Recognizer::new(config.clone()).context("failed to initialize recognizer")?;
    recognizer
        .load_state()
        .context("failed to load classifier state")?;
    Ok(recognizer)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print `{"ok": false, "error": {...}}` to stdout.
pub fn print_error_json(err: &anyhow::Error) {
    let kind = err
        .downcast_ref::<RecognitionError>()
        .map(RecognitionError::kind)
        .unwrap_or("error");
    let body = serde_json::json!({
        "ok": false,
        "error": {
            "kind": kind,
            "message": format!("{err:#}"),
        }
    });
    println!("{body}");
}
