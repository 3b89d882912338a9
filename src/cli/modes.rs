use anyhow::Result;

use glimpse::modes::FeatureMode;

/// List the feature modes.
pub fn modes() -> Result<()> {
    println!("{:<12} {:<8} {}", "ID", "FRAMES", "DESCRIPTION");
    for mode in FeatureMode::ALL {
        let frames = if mode.uses_audio() {
            "audio".to_string()
        } else {
            format!(">= {}", mode.min_frames())
        };
        println!("{:<12} {:<8} {}", mode.id(), frames, mode.display_name());
    }
    Ok(())
}
