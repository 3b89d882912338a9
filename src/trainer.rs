//! Rebuilds a classifier from labeled embeddings with a bounded replay sample.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::CacheKey;
use crate::classifier::{LoadStatus, PrototypeClassifier};
use crate::dataset::LabeledRow;
use crate::error::Result;
use crate::vector::Embedding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainReport {
    /// Labeled rows considered.
    pub n_labeled: usize,
    /// Classes in the rebuilt table.
    pub n_classes: usize,
    /// Embeddings that went into centroids.
    pub n_used: usize,
    /// Rows whose embedding could not be loaded.
    pub n_skipped: usize,
}

pub struct Trainer {
    state_path: PathBuf,
    replay_cap: usize,
    rng: StdRng,
}

impl Trainer {
    /// `replay_cap` is the most embeddings used per class (at least 1).
    pub fn new(state_path: impl Into<PathBuf>, replay_cap: usize) -> Self {
        Self::with_rng(state_path, replay_cap, StdRng::from_entropy())
    }

    /// Deterministic sampling, for tests and reproducible runs.
    pub fn with_seed(state_path: impl Into<PathBuf>, replay_cap: usize, seed: u64) -> Self {
        Self::with_rng(state_path, replay_cap, StdRng::seed_from_u64(seed))
    }

    fn with_rng(state_path: impl Into<PathBuf>, replay_cap: usize, rng: StdRng) -> Self {
        Self {
            state_path: state_path.into(),
            replay_cap: replay_cap.max(1),
            rng,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn replay_cap(&self) -> usize {
        self.replay_cap
    }

    /// Replace `classifier`'s table with centroids built from `rows`, then
    /// persist it.
    ///
    /// Each class's keys are visited in random order and loaded until the class
    /// has `replay_cap` embeddings, so the loader is called at most
    /// `replay_cap` times per class when every load succeeds. Keys the loader
    /// cannot resolve (e.g. an evicted cache file) are skipped.
    pub fn train_from_labeled<F>(
        &mut self,
        classifier: &mut PrototypeClassifier,
        rows: &[LabeledRow],
        mut loader: F,
    ) -> Result<TrainReport>
    where
        F: FnMut(&CacheKey) -> Option<Embedding>,
    {
        let mut by_label: BTreeMap<&str, Vec<&CacheKey>> = BTreeMap::new();
        for row in rows {
            by_label.entry(row.label.as_str()).or_default().push(&row.key);
        }

        let mut samples: Vec<(String, Vec<Embedding>)> = Vec::with_capacity(by_label.len());
        let mut n_used = 0;
        let mut n_skipped = 0;

        for (label, mut keys) in by_label {
            if keys.len() > self.replay_cap {
                keys.shuffle(&mut self.rng);
            }
            let mut sample = Vec::with_capacity(keys.len().min(self.replay_cap));
            for key in keys {
                if sample.len() >= self.replay_cap {
                    break;
                }
                match loader(key) {
                    Some(embedding) => sample.push(embedding),
                    None => {
                        warn!(label, key = %key, "embedding unavailable, skipping");
                        n_skipped += 1;
                    }
                }
            }
            n_used += sample.len();
            samples.push((label.to_string(), sample));
        }

        classifier.update_centroids(samples)?;
        classifier.save(&self.state_path)?;

        let report = TrainReport {
            n_labeled: rows.len(),
            n_classes: classifier.len(),
            n_used,
            n_skipped,
        };
        info!(
            path = %self.state_path.display(),
            labeled = report.n_labeled,
            classes = report.n_classes,
            used = report.n_used,
            skipped = report.n_skipped,
            "training pass complete"
        );
        Ok(report)
    }

    /// Load previously persisted state. A missing file is a cold start, not an error.
    pub fn try_load(&self, classifier: &mut PrototypeClassifier) -> Result<LoadStatus> {
        classifier.load(&self.state_path)
    }
}
