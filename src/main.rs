mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use glimpse::config::GlimpseConfig;
use glimpse::modes::FeatureMode;

#[derive(Parser)]
#[command(
    name = "glimpse",
    version,
    about = "Teach a local assistant to recognize images, clips and sounds, one example at a time"
)]
struct Cli {
    /// Config file (defaults to ~/.glimpse/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Target {
    /// Image file, directory of frames, or WAV file (audio mode)
    path: PathBuf,
    /// Feature mode: appearance, motion, fusion, scene, audio
    #[arg(long, short, default_value = "appearance")]
    mode: FeatureMode,
    /// Segment start in seconds
    #[arg(long, requires = "end")]
    start: Option<f64>,
    /// Segment end in seconds
    #[arg(long, requires = "start")]
    end: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// List the feature modes
    Modes,
    /// Compute (or reuse) the cached embedding of one item
    Embed(Target),
    /// Classify one item; prints JSON and exits with 2 on failure
    Classify(Target),
    /// Embed a labeled JSON manifest and rebuild one mode's classifier
    Train {
        /// JSON array of {path, label, start_ms?, end_ms?}
        manifest: PathBuf,
        #[arg(long, short, default_value = "appearance")]
        mode: FeatureMode,
    },
    /// Classify a batch and group the unknowns into clusters
    Cluster {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, short, default_value = "appearance")]
        mode: FeatureMode,
        /// Label every member of a cluster: CLUSTER_ID=LABEL (repeatable)
        #[arg(long, value_parser = cli::cluster::parse_promotion)]
        promote: Vec<(String, String)>,
    },
    /// Check directories, backbone, thresholds and trained classes
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let config = match cli.config.as_ref() {
        Some(path) => GlimpseConfig::load_from(path),
        None => GlimpseConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    // Log to stderr so stdout carries only command output.
    let filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Classify(target) => {
            if let Err(e) = run_classify(&config, &target) {
                cli::print_error_json(&e);
                std::process::exit(2);
            }
        }
        command => {
            if let Err(e) = run(&config, command) {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

fn run_classify(config: &GlimpseConfig, target: &Target) -> Result<()> {
    let segment = GlimpseConfig::segment_from_seconds(target.start, target.end)?;
    cli::classify::classify(config, &target.path, target.mode, segment)
}

fn run(config: &GlimpseConfig, command: Command) -> Result<()> {
    match command {
        Command::Modes => cli::modes::modes(),
        Command::Embed(target) => {
            let segment = GlimpseConfig::segment_from_seconds(target.start, target.end)?;
            cli::embed::embed(config, &target.path, target.mode, segment)
        }
        Command::Classify(target) => run_classify(config, &target),
        Command::Train { manifest, mode } => cli::train::train(config, &manifest, mode),
        Command::Cluster {
            paths,
            mode,
            promote,
        } => cli::cluster::cluster(config, &paths, mode, &promote),
        Command::Doctor => cli::doctor::doctor(config),
    }
}
