//! Online clustering of embeddings the classifier rejected.
//!
//! Single pass, greedy nearest centroid: an embedding joins the most similar
//! cluster when the similarity reaches the threshold, otherwise it seeds a new
//! one. Joining moves the centroid with an exponential moving average,
//! `normalize(w·old + (1 - w)·new)`, so it drifts toward recent members.
//!
//! Cluster ids come from a hash of the seeding embedding, so the same first
//! member produces the same id in every session. Clusters live in memory only;
//! labeling a cluster is done by the dataset store
//! ([`DatasetStore::promote_cluster`](crate::dataset::DatasetStore::promote_cluster)).

use serde::Serialize;
use tracing::debug;

use crate::error::{RecognitionError, Result};
use crate::vector::{dot, l2_normalize, to_le_bytes, Embedding};

const CLUSTER_ID_PREFIX: &str = "cluster_";
const CLUSTER_ID_HEX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: String,
    #[serde(skip)]
    pub centroid: Embedding,
    pub members: usize,
    pub name: Option<String>,
}

/// Where one embedding ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub cluster_id: String,
    /// Similarity to the chosen centroid before the update (1.0 for a new cluster).
    pub similarity: f32,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct UnknownClusterer {
    threshold: f32,
    ema_old_weight: f32,
    clusters: Vec<Cluster>,
}

impl UnknownClusterer {
    /// `ema_old_weight` is clamped to `[0, 1]`.
    pub fn new(threshold: f32, ema_old_weight: f32) -> Self {
        Self {
            threshold,
            ema_old_weight: ema_old_weight.clamp(0.0, 1.0),
            clusters: Vec::new(),
        }
    }

    pub fn from_config(config: &crate::config::ClusteringConfig) -> Self {
        Self::new(config.similarity_threshold, config.ema_old_weight)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn ema_old_weight(&self) -> f32 {
        self.ema_old_weight
    }

    /// Clusters in creation order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Assign one embedding, creating a cluster or updating the nearest one.
    pub fn assign(&mut self, embedding: &[f32]) -> Result<ClusterAssignment> {
        let embedding =
            l2_normalize(embedding).ok_or(RecognitionError::DegenerateEmbedding("unknown"))?;

        if let Some(first) = self.clusters.first() {
            if first.centroid.len() != embedding.len() {
                return Err(RecognitionError::DimensionMismatch {
                    expected: first.centroid.len(),
                    got: embedding.len(),
                });
            }
        }

        let best = self
            .clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (i, dot(&c.centroid, &embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((idx, similarity)) if similarity >= self.threshold => {
                let w = self.ema_old_weight;
                let cluster = &mut self.clusters[idx];
                let blended: Vec<f32> = cluster
                    .centroid
                    .iter()
                    .zip(&embedding)
                    .map(|(old, new)| w * old + (1.0 - w) * new)
                    .collect();
                // Opposite vectors can cancel; keep the old centroid then.
                if let Some(updated) = l2_normalize(&blended) {
                    cluster.centroid = updated;
                }
                cluster.members += 1;
                debug!(cluster = %cluster.id, similarity, members = cluster.members, "joined cluster");
                Ok(ClusterAssignment {
                    cluster_id: cluster.id.clone(),
                    similarity,
                    created: false,
                })
            }
            _ => {
                let id = self.unique_id(&embedding);
                debug!(cluster = %id, "seeded new cluster");
                self.clusters.push(Cluster {
                    id: id.clone(),
                    centroid: embedding,
                    members: 1,
                    name: None,
                });
                Ok(ClusterAssignment {
                    cluster_id: id,
                    similarity: 1.0,
                    created: true,
                })
            }
        }
    }

    /// Attach a display name. Returns false when the id is unknown.
    pub fn name_cluster(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.clusters.iter_mut().find(|c| c.id == id) {
            Some(cluster) => {
                cluster.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// Drop a cluster, e.g. after it was promoted to a label.
    pub fn forget(&mut self, id: &str) -> Option<Cluster> {
        let idx = self.clusters.iter().position(|c| c.id == id)?;
        Some(self.clusters.remove(idx))
    }

    fn unique_id(&self, seed: &[f32]) -> String {
        let base = cluster_id_for(seed);
        if self.get(&base).is_none() {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.get(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// `cluster_` followed by the first 10 hex chars of the BLAKE3 hash of the
/// embedding's little-endian bytes.
pub fn cluster_id_for(embedding: &[f32]) -> String {
    let hex = blake3::hash(&to_le_bytes(embedding)).to_hex();
    format!("{CLUSTER_ID_PREFIX}{}", &hex[..CLUSTER_ID_HEX_LEN])
}
