use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::modes::FeatureMode;
use crate::sampling::{ExtractionParams, Segment};
use crate::thresholds::Thresholds;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GlimpseConfig {
    pub general: GeneralConfig,
    pub extraction: ExtractionConfig,
    pub recognition: RecognitionConfig,
    pub training: TrainingConfig,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    pub backbone: String,
    pub image_size: u32,
    pub max_frames: usize,
    pub min_step_s: f32,
    /// Frame rate assumed for a directory of still images.
    pub sequence_fps: f32,
    pub audio_sample_rate: u32,
    pub audio_max_seconds: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecognitionConfig {
    pub min_top1_confidence: f32,
    pub min_top1_similarity: f32,
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    pub replay_per_class: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClusteringConfig {
    pub similarity_threshold: f32,
    /// Weight kept by the old centroid on each EMA update (`1 - w` goes to the new member).
    pub ema_old_weight: f32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            data_dir: default_glimpse_dir().to_string_lossy().into_owned(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backbone: "histogram".into(),
            image_size: 224,
            max_frames: 16,
            min_step_s: 0.75,
            sequence_fps: 1.0,
            audio_sample_rate: 16_000,
            audio_max_seconds: 60.0,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            min_top1_confidence: 0.55,
            min_top1_similarity: 0.33,
            top_k: 5,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            replay_per_class: 30,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.55,
            ema_old_weight: 0.8,
        }
    }
}

/// Returns `~/.glimpse/`
pub fn default_glimpse_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".glimpse")
}

/// Returns the default config file path: `~/.glimpse/config.toml`
pub fn default_config_path() -> PathBuf {
    default_glimpse_dir().join("config.toml")
}

impl GlimpseConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GlimpseConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (GLIMPSE_DATA_DIR, GLIMPSE_LOG_LEVEL, GLIMPSE_BACKBONE).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GLIMPSE_DATA_DIR") {
            self.general.data_dir = val;
        }
        if let Ok(val) = std::env::var("GLIMPSE_LOG_LEVEL") {
            self.general.log_level = val;
        }
        if let Ok(val) = std::env::var("GLIMPSE_BACKBONE") {
            self.extraction.backbone = val;
        }
    }

    /// Resolve the data directory, expanding `~` if needed.
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    pub fn embeddings_cache_dir(&self) -> PathBuf {
        self.data_dir().join("embeddings_cache")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir().join("model")
    }

    /// Persisted classifier state for one feature mode.
    pub fn centroids_path(&self, mode: FeatureMode) -> PathBuf {
        self.model_dir().join(format!("centroids_{}.json", mode.id()))
    }

    pub fn thresholds_path(&self) -> PathBuf {
        self.data_dir().join("thresholds.json")
    }

    pub fn default_thresholds(&self) -> Thresholds {
        Thresholds {
            min_top1_confidence: self.recognition.min_top1_confidence,
            min_top1_similarity: self.recognition.min_top1_similarity,
        }
    }

    /// Extraction parameters that feed the cache key.
    pub fn extraction_params(&self) -> ExtractionParams {
        ExtractionParams {
            max_frames: self.extraction.max_frames,
            min_step_s: self.extraction.min_step_s,
            resize: self.extraction.image_size,
            backbone: self.extraction.backbone.clone(),
            audio_sample_rate: self.extraction.audio_sample_rate,
        }
    }

    /// Build a segment from optional start/end seconds, as given on the command line.
    pub fn segment_from_seconds(start: Option<f64>, end: Option<f64>) -> Result<Segment> {
        match (start, end) {
            (None, None) => Ok(Segment::WHOLE),
            (Some(start), Some(end)) => {
                anyhow::ensure!(end > start, "invalid segment: end must be after start");
                Ok(Segment::new(
                    (start * 1000.0) as i64,
                    (end * 1000.0) as i64,
                ))
            }
            _ => anyhow::bail!("a segment needs both --start and --end (seconds)"),
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GlimpseConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.extraction.backbone, "histogram");
        assert_eq!(config.extraction.max_frames, 16);
        assert_eq!(config.training.replay_per_class, 30);
        assert!((config.recognition.min_top1_confidence - 0.55).abs() < 1e-6);
        assert!((config.recognition.min_top1_similarity - 0.33).abs() < 1e-6);
        assert!(config.general.data_dir.ends_with(".glimpse"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[general]
log_level = "debug"
data_dir = "/tmp/glimpse-test"

[training]
replay_per_class = 10

[clustering]
ema_old_weight = 0.9
"#;
        let config: GlimpseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/glimpse-test"));
        assert_eq!(config.training.replay_per_class, 10);
        assert!((config.clustering.ema_old_weight - 0.9).abs() < 1e-6);
        // defaults still apply for unset fields
        assert!((config.clustering.similarity_threshold - 0.55).abs() < 1e-6);
        assert_eq!(config.recognition.top_k, 5);
    }

    #[test]
    fn layout_is_rooted_at_data_dir() {
        let mut config = GlimpseConfig::default();
        config.general.data_dir = "/data/g".into();
        assert_eq!(
            config.centroids_path(FeatureMode::Motion),
            PathBuf::from("/data/g/model/centroids_motion.json")
        );
        assert_eq!(config.thresholds_path(), PathBuf::from("/data/g/thresholds.json"));
        assert_eq!(
            config.embeddings_cache_dir(),
            PathBuf::from("/data/g/embeddings_cache")
        );
    }

    #[test]
    fn segment_from_seconds_validates() {
        assert_eq!(
            GlimpseConfig::segment_from_seconds(None, None).unwrap(),
            Segment::WHOLE
        );
        let seg = GlimpseConfig::segment_from_seconds(Some(1.5), Some(3.0)).unwrap();
        assert_eq!((seg.start_ms, seg.end_ms), (1500, 3000));
        assert!(GlimpseConfig::segment_from_seconds(Some(3.0), Some(1.0)).is_err());
        assert!(GlimpseConfig::segment_from_seconds(Some(1.0), None).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GlimpseConfig::default();
        std::env::set_var("GLIMPSE_DATA_DIR", "/tmp/override");
        std::env::set_var("GLIMPSE_LOG_LEVEL", "trace");
        std::env::set_var("GLIMPSE_BACKBONE", "fallback_hist");

        config.apply_env_overrides();

        assert_eq!(config.general.data_dir, "/tmp/override");
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.extraction.backbone, "fallback_hist");

        // Clean up
        std::env::remove_var("GLIMPSE_DATA_DIR");
        std::env::remove_var("GLIMPSE_LOG_LEVEL");
        std::env::remove_var("GLIMPSE_BACKBONE");
    }
}
