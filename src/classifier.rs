//! Prototype (centroid) classifier with an explicit reject option.
//!
//! Each known label is represented by the re-normalized mean of a sample of
//! its embeddings. A query is scored by cosine similarity against every
//! centroid; confidences come from a softmax over the similarities scaled by
//! [`SOFTMAX_TEMPERATURE`].
//!
//! [`PrototypeClassifier::predict_open_world`] accepts the top-1 label only
//! when it clears *both* a confidence and a similarity threshold. Confidence
//! shrinks as more classes compete for the softmax mass; similarity does not
//! depend on the class count. Requiring both keeps either one from letting an
//! unrelated input through.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RecognitionError, Result};
use crate::thresholds::Thresholds;
use crate::vector::{dot, l2_normalize, mean_normalized, softmax, Embedding};

/// Scale applied to cosine similarities before the softmax.
pub const SOFTMAX_TEMPERATURE: f32 = 12.0;

pub const CLASSIFIER_STATE_VERSION: u32 = 1;

/// One ranked candidate label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Softmax probability in `[0, 1]`.
    pub confidence: f32,
    /// Raw cosine similarity in `[-1, 1]`.
    pub similarity: f32,
}

/// Why a prediction was accepted or rejected. Serialized as a short
/// machine-readable string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Ok,
    NoClassesYet,
    LowConfidence,
    LowSimilarity,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoClassesYet => "no_classes_yet",
            Self::LowConfidence => "low_confidence",
            Self::LowSimilarity => "low_similarity",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResult {
    pub known: bool,
    pub topk: Vec<Prediction>,
    pub reason: Reason,
}

impl PredictResult {
    pub fn top1(&self) -> Option<&Prediction> {
        self.topk.first()
    }

    /// The accepted label, if the result is known.
    pub fn label(&self) -> Option<&str> {
        if self.known {
            self.top1().map(|p| p.label.as_str())
        } else {
            None
        }
    }
}

/// Persisted form: `{"labels": [...], "centroids": {label: [floats]}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierState {
    #[serde(default = "default_state_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub centroids: BTreeMap<String, Vec<f32>>,
}

fn default_state_version() -> u32 {
    CLASSIFIER_STATE_VERSION
}

/// Outcome of loading persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LoadStatus {
    Loaded { classes: usize },
    /// No file: a cold start.
    Missing,
    /// A file exists but could not be parsed; the classifier was left empty.
    Corrupt,
}

#[derive(Debug, Clone, Default)]
pub struct PrototypeClassifier {
    centroids: BTreeMap<String, Embedding>,
}

impl PrototypeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known labels, sorted.
    pub fn labels(&self) -> Vec<String> {
        self.centroids.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn centroid(&self, label: &str) -> Option<&[f32]> {
        self.centroids.get(label).map(Vec::as_slice)
    }

    /// Dimension of the stored centroids, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.centroids.values().next().map(Vec::len)
    }

    /// Replace the whole table. Labels with an empty sample are dropped.
    ///
    /// Fails without modifying the table if a sample mixes dimensions.
    pub fn update_centroids<L, V>(&mut self, samples: L) -> Result<()>
    where
        L: IntoIterator<Item = (String, Vec<V>)>,
        V: AsRef<[f32]>,
    {
        let mut table = BTreeMap::new();
        let mut dims: Option<usize> = None;
        for (label, embeddings) in samples {
            for e in &embeddings {
                let len = e.as_ref().len();
                match dims {
                    None => dims = Some(len),
                    Some(expected) if expected != len => {
                        return Err(RecognitionError::DimensionMismatch { expected, got: len });
                    }
                    Some(_) => {}
                }
            }
            match mean_normalized(&embeddings) {
                Some(centroid) => {
                    table.insert(label, centroid);
                }
                None if embeddings.is_empty() => {}
                None => warn!(label = %label, "class mean has zero norm, dropping class"),
            }
        }
        self.centroids = table;
        Ok(())
    }

    /// Rank every known label for `embedding`, highest confidence first.
    ///
    /// Empty when no classes exist. Ties keep label order.
    pub fn predict_topk(&self, embedding: &[f32], k: usize) -> Result<Vec<Prediction>> {
        if self.centroids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimensions() {
            if expected != embedding.len() {
                return Err(RecognitionError::DimensionMismatch {
                    expected,
                    got: embedding.len(),
                });
            }
        }

        let sims: Vec<f32> = self.centroids.values().map(|c| dot(c, embedding)).collect();
        let logits: Vec<f32> = sims.iter().map(|s| s * SOFTMAX_TEMPERATURE).collect();
        let probs = softmax(&logits);

        let mut ranked: Vec<Prediction> = self
            .centroids
            .keys()
            .zip(sims.iter().zip(probs.iter()))
            .map(|(label, (&similarity, &confidence))| Prediction {
                label: label.clone(),
                confidence,
                similarity,
            })
            .collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Top-k prediction with a reject option.
    pub fn predict_open_world(
        &self,
        embedding: &[f32],
        thresholds: &Thresholds,
        k: usize,
    ) -> Result<PredictResult> {
        let topk = self.predict_topk(embedding, k.max(1))?;
        let reason = match topk.first() {
            None => Reason::NoClassesYet,
            Some(top1) if top1.confidence < thresholds.min_top1_confidence => {
                Reason::LowConfidence
            }
            Some(top1) if top1.similarity < thresholds.min_top1_similarity => {
                Reason::LowSimilarity
            }
            Some(_) => Reason::Ok,
        };
        Ok(PredictResult {
            known: reason == Reason::Ok,
            topk,
            reason,
        })
    }

    pub fn state(&self) -> ClassifierState {
        ClassifierState {
            schema_version: CLASSIFIER_STATE_VERSION,
            labels: self.labels(),
            centroids: self.centroids.clone(),
        }
    }

    /// Replace the table with a persisted state, renormalizing every vector.
    ///
    /// Empty vectors are skipped. Fails without touching the table when the
    /// centroids disagree on dimension or one of them has no direction
    /// (zero or non-finite).
    pub fn restore(&mut self, state: ClassifierState) -> Result<()> {
        let mut table = BTreeMap::new();
        let mut dims: Option<usize> = None;
        for (label, v) in state.centroids {
            if v.is_empty() {
                continue;
            }
            match dims {
                None => dims = Some(v.len()),
                Some(expected) if expected != v.len() => {
                    return Err(RecognitionError::DimensionMismatch {
                        expected,
                        got: v.len(),
                    });
                }
                Some(_) => {}
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(RecognitionError::DegenerateEmbedding("classifier state"));
            }
            let centroid =
                l2_normalize(&v).ok_or(RecognitionError::DegenerateEmbedding("classifier state"))?;
            table.insert(label, centroid);
        }
        self.centroids = table;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state())?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load persisted state. A missing or corrupt file leaves the classifier
    /// empty; only corruption is logged as a warning.
    pub fn load(&mut self, path: &Path) -> Result<LoadStatus> {
        if !path.exists() {
            self.centroids.clear();
            return Ok(LoadStatus::Missing);
        }

        let bytes = std::fs::read(path)?;
        let restored = serde_json::from_slice::<ClassifierState>(&bytes)
            .map_err(RecognitionError::from)
            .and_then(|state| {
                if state.schema_version > CLASSIFIER_STATE_VERSION {
                    warn!(
                        path = %path.display(),
                        version = state.schema_version,
                        "classifier state is newer than this build, loading anyway"
                    );
                }
                self.restore(state)
            });

        match restored {
            Ok(()) => {
                info!(path = %path.display(), classes = self.len(), "classifier state loaded");
                Ok(LoadStatus::Loaded {
                    classes: self.len(),
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt classifier state, starting empty");
                self.centroids.clear();
                Ok(LoadStatus::Corrupt)
            }
        }
    }
}
