use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use glimpse::classifier::{Prediction, Reason};
use glimpse::config::GlimpseConfig;
use glimpse::modes::FeatureMode;
use glimpse::sampling::Segment;

use super::{open_recognizer, print_json, LocalSources};

#[derive(Serialize)]
struct ClassifyOutput {
    ok: bool,
    mode: FeatureMode,
    known: bool,
    label: Option<String>,
    reason: Reason,
    topk: Vec<Prediction>,
    key: String,
}

/// Embed one item and print the open-world prediction as JSON.
pub fn classify(
    config: &GlimpseConfig,
    path: &Path,
    mode: FeatureMode,
    segment: Segment,
) -> Result<()> {
    let recognizer = open_recognizer(config)?;
    let sources = LocalSources::from_config(config);

    let embedded = sources
        .embed(&recognizer, path, mode, segment)
        .with_context(|| format!("failed to embed {}", path.display()))?;
    let result = recognizer.classify(mode, &embedded.embedding)?;

    print_json(&ClassifyOutput {
        ok: true,
        mode,
        known: result.known,
        label: result.label().map(str::to_string),
        reason: result.reason,
        topk: result.topk,
        key: embedded.key.to_string(),
    })
}
