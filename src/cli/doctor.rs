//! CLI `doctor` command: inspect the data directory and print a health report.

use anyhow::{Context, Result};

use glimpse::classifier::LoadStatus;
use glimpse::config::GlimpseConfig;
use glimpse::engine::Recognizer;

pub fn doctor(config: &GlimpseConfig) -> Result<()> {
    let data_dir = config.data_dir();
    let mut recognizer =
        Recognizer::new(config.clone()).context("failed to initialize recognizer")?;
    let statuses = recognizer
        .load_state()
        .context("failed to load classifier state")?;
    let info = recognizer.extractor().info();
    let thresholds = recognizer.thresholds();

    println!("Glimpse Health Report");
    println!("=====================");
    println!();
    println!("Data directory:    {}", data_dir.display());
    println!("Embedding cache:   {}", config.embeddings_cache_dir().display());
    println!("  Entries:         {}", recognizer.cache().entry_count());
    println!("Model directory:   {}", config.model_dir().display());
    println!();
    println!("Backbone:");
    println!("  Configured:      {}", config.extraction.backbone);
    println!("  Resolved:        {}", info.name);
    println!("  Pretrained:      {}", if info.pretrained { "yes" } else { "no" });
    if !info.note.is_empty() {
        println!("  Note:            {}", info.note);
    }
    println!();
    println!("Thresholds ({}):", config.thresholds_path().display());
    println!("  min confidence:  {:.3}", thresholds.min_top1_confidence);
    println!("  min similarity:  {:.3}", thresholds.min_top1_similarity);
    println!();
    println!("Classes per mode:");
    for (mode, status) in &statuses {
        let (classes, note) = match status {
            LoadStatus::Loaded { classes } => (*classes, "ok"),
            LoadStatus::Missing => (0, "no state (cold start)"),
            LoadStatus::Corrupt => (0, "CORRUPT, ignored"),
        };
        println!("  {:<12} {:>4}   {}", mode.id(), classes, note);
    }

    Ok(())
}
