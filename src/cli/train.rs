//! CLI `train` command: embed a labeled manifest and rebuild one mode's classifier.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::warn;

use glimpse::config::GlimpseConfig;
use glimpse::dataset::{DatasetStore, MemoryDataset};
use glimpse::modes::FeatureMode;
use glimpse::sampling::Segment;
use glimpse::trainer::TrainReport;

use super::{open_recognizer, print_json, LocalSources};

/// One manifest row. Relative paths resolve against the manifest's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
}

impl ManifestEntry {
    pub fn segment(&self) -> Segment {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) => Segment::new(start, end),
            _ => Segment::WHOLE,
        }
    }
}

#[derive(Serialize)]
struct TrainOutput {
    ok: bool,
    mode: FeatureMode,
    entries: usize,
    failed: usize,
    #[serde(flatten)]
    report: TrainReport,
    state_path: PathBuf,
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let mut entries: Vec<ManifestEntry> =
        serde_json::from_str(&text).context("failed to parse manifest JSON")?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for entry in &mut entries {
        if entry.path.is_relative() {
            entry.path = base.join(&entry.path);
        }
    }
    Ok(entries)
}

/// Embed every manifest entry, label it, and train `mode` from the result.
pub fn train(config: &GlimpseConfig, manifest: &Path, mode: FeatureMode) -> Result<()> {
    let entries = load_manifest(manifest)?;
    let mut recognizer = open_recognizer(config)?;
    let sources = LocalSources::from_config(config);
    let mut dataset = MemoryDataset::new();

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut failed = 0;
    for entry in &entries {
        pb.set_message(entry.label.clone());
        let segment = entry.segment();
        match sources.embed(&recognizer, &entry.path, mode, segment) {
            Ok(embedded) => {
                let id = dataset.add_item(&entry.path, mode, segment, embedded.key);
                dataset.set_label(id, &entry.label)?;
            }
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "skipping manifest entry");
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let report = recognizer
        .train(mode, &dataset)
        .context("training pass failed")?;

    print_json(&TrainOutput {
        ok: true,
        mode,
        entries: entries.len(),
        failed,
        report,
        state_path: config.centroids_path(mode),
    })
}
