//! CLI `cluster` command: classify a batch, group the unknowns, and
//! optionally label whole clusters.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use glimpse::config::GlimpseConfig;
use glimpse::dataset::{DatasetStore, MemoryDataset};
use glimpse::modes::FeatureMode;
use glimpse::sampling::Segment;

use super::train::ManifestEntry;
use super::{open_recognizer, print_json, LocalSources};

#[derive(Serialize)]
struct KnownItem {
    path: PathBuf,
    label: String,
    confidence: f32,
    similarity: f32,
}

#[derive(Serialize)]
struct ClusterSummary {
    id: String,
    members: Vec<PathBuf>,
}

#[derive(Serialize)]
struct PromotedCluster {
    id: String,
    label: String,
    relabeled: usize,
}

#[derive(Serialize)]
struct ClusterOutput {
    ok: bool,
    mode: FeatureMode,
    known: Vec<KnownItem>,
    clusters: Vec<ClusterSummary>,
    promoted: Vec<PromotedCluster>,
    /// Items labeled through `--promote`, in manifest form.
    labeled: Vec<ManifestEntry>,
    failed: usize,
}

/// Parse `cluster_id=label`.
pub fn parse_promotion(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, label)) if !id.trim().is_empty() && !label.trim().is_empty() => {
            Ok((id.trim().to_string(), label.trim().to_string()))
        }
        _ => Err(format!("expected CLUSTER_ID=LABEL, got '{s}'")),
    }
}

pub fn cluster(
    config: &GlimpseConfig,
    paths: &[PathBuf],
    mode: FeatureMode,
    promotions: &[(String, String)],
) -> Result<()> {
    let mut recognizer = open_recognizer(config)?;
    let sources = LocalSources::from_config(config);
    let mut dataset = MemoryDataset::new();

    let mut known = Vec::new();
    let mut failed = 0;
    for path in paths {
        let embedded = match sources.embed(&recognizer, path, mode, Segment::WHOLE) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping item");
                failed += 1;
                continue;
            }
        };
        let result = recognizer.classify(mode, &embedded.embedding)?;
        if let (true, Some(top1)) = (result.known, result.top1()) {
            known.push(KnownItem {
                path: path.clone(),
                label: top1.label.clone(),
                confidence: top1.confidence,
                similarity: top1.similarity,
            });
            continue;
        }

        let id = dataset.add_item(path, mode, Segment::WHOLE, embedded.key);
        let assignment = recognizer
            .route_unknown(mode, &embedded.embedding)
            .with_context(|| format!("failed to cluster {}", path.display()))?;
        dataset.assign_cluster(id, &assignment.cluster_id)?;
    }

    let mut promoted = Vec::new();
    for (cluster_id, label) in promotions {
        let promotion = recognizer.name_cluster(mode, cluster_id, label, &mut dataset)?;
        match promotion.cluster {
            Some(cluster) if promotion.relabeled > 0 => promoted.push(PromotedCluster {
                id: cluster.id,
                label: cluster.name.unwrap_or_else(|| label.clone()),
                relabeled: promotion.relabeled,
            }),
            _ => warn!(cluster = %cluster_id, "no items in cluster, nothing promoted"),
        }
    }

    let mut members: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut labeled = Vec::new();
    for item in dataset.items() {
        if let Some(cluster_id) = item.state.cluster_id() {
            members
                .entry(cluster_id.to_string())
                .or_default()
                .push(item.content.clone());
        } else if let Some(label) = item.state.label() {
            labeled.push(ManifestEntry {
                path: item.content.clone(),
                label: label.to_string(),
                start_ms: None,
                end_ms: None,
            });
        }
    }

    // Keep the clusterer's creation order.
    let clusters = recognizer
        .runtime(mode)
        .clusterer
        .clusters()
        .iter()
        .filter_map(|c| {
            members.remove(&c.id).map(|paths| ClusterSummary {
                id: c.id.clone(),
                members: paths,
            })
        })
        .collect();

    print_json(&ClusterOutput {
        ok: true,
        mode,
        known,
        clusters,
        promoted,
        labeled,
        failed,
    })
}
