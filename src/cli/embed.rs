use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use glimpse::config::GlimpseConfig;
use glimpse::modes::FeatureMode;
use glimpse::sampling::Segment;

use super::{open_recognizer, print_json, LocalSources};

#[derive(Serialize)]
struct EmbedOutput<'a> {
    ok: bool,
    path: &'a Path,
    mode: FeatureMode,
    segment: Segment,
    key: String,
    dims: usize,
    from_cache: bool,
    cache_file: String,
}

/// Compute (or fetch from cache) the embedding of one item and print its key.
pub fn embed(config: &GlimpseConfig, path: &Path, mode: FeatureMode, segment: Segment) -> Result<()> {
    let recognizer = open_recognizer(config)?;
    let sources = LocalSources::from_config(config);

    let embedded = sources
        .embed(&recognizer, path, mode, segment)
        .with_context(|| format!("failed to embed {}", path.display()))?;

    print_json(&EmbedOutput {
        ok: true,
        path,
        mode,
        segment,
        key: embedded.key.to_string(),
        dims: embedded.embedding.len(),
        from_cache: embedded.from_cache,
        cache_file: recognizer
            .cache()
            .entry_path(mode, &embedded.key)
            .display()
            .to_string(),
    })
}
