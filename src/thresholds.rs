//! Open-world acceptance thresholds, persisted next to the model.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_top1_confidence: f32,
    pub min_top1_similarity: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_top1_confidence: 0.55,
            min_top1_similarity: 0.33,
        }
    }
}

#[derive(Deserialize)]
struct PartialThresholds {
    min_top1_confidence: Option<f32>,
    min_top1_similarity: Option<f32>,
}

impl Thresholds {
    /// Load thresholds from `path`.
    ///
    /// A missing file is created with `defaults`. Fields absent from the file
    /// take their value from `defaults`. A file that exists but cannot be
    /// parsed is left untouched, logged as a warning, and `defaults` are used.
    pub fn load_or_init(path: &Path, defaults: Thresholds) -> Result<Thresholds> {
        if !path.exists() {
            info!(path = %path.display(), "no thresholds file, writing defaults");
            defaults.save(path)?;
            return Ok(defaults);
        }

        let bytes = std::fs::read(path)?;
        match serde_json::from_slice::<PartialThresholds>(&bytes) {
            Ok(partial) => Ok(Thresholds {
                min_top1_confidence: partial
                    .min_top1_confidence
                    .unwrap_or(defaults.min_top1_confidence),
                min_top1_similarity: partial
                    .min_top1_similarity
                    .unwrap_or(defaults.min_top1_similarity),
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt thresholds file, using defaults");
                Ok(defaults)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("thresholds.json");
        let t = Thresholds::load_or_init(&path, Thresholds::default()).unwrap();
        assert_eq!(t, Thresholds::default());
        assert!(path.exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json.get("min_top1_confidence").is_some());
        assert!(json.get("min_top1_similarity").is_some());
    }

    #[test]
    fn partial_file_fills_from_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, r#"{"min_top1_confidence": 0.7}"#).unwrap();
        let t = Thresholds::load_or_init(&path, Thresholds::default()).unwrap();
        assert!((t.min_top1_confidence - 0.7).abs() < 1e-6);
        assert!((t.min_top1_similarity - 0.33).abs() < 1e-6);
    }

    #[test]
    fn corrupt_file_yields_defaults_and_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, "{not json").unwrap();
        let t = Thresholds::load_or_init(&path, Thresholds::default()).unwrap();
        assert_eq!(t, Thresholds::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn binary_garbage_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, [0xffu8, 0xfe, 0x00, 0x12]).unwrap();
        let t = Thresholds::load_or_init(&path, Thresholds::default()).unwrap();
        assert_eq!(t, Thresholds::default());
    }
}
