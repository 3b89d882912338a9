//! Open-world incremental recognition for images, video segments and audio.
//!
//! Glimpse lets a user teach a local assistant new visual and audio concepts
//! one example at a time, without retraining a network and without forcing
//! every input into a known bucket. Inputs the classifier is not sure about are
//! reported as *unknown* and can be grouped by the online clusterer so a whole
//! group is labeled at once.
//!
//! # Pipeline
//!
//! 1. A [`sampling::FrameSource`] / [`sampling::AudioSource`] decodes content.
//! 2. A [`modes::FeatureMode`] turns frames (or audio) into one unit-norm embedding.
//! 3. The [`cache::EmbeddingCache`] stores it under a content-addressed key.
//! 4. The [`classifier::PrototypeClassifier`] accepts the top-1 label only if it
//!    clears both a confidence and a similarity threshold.
//! 5. Rejected embeddings go to the [`cluster::UnknownClusterer`].
//! 6. The [`trainer::Trainer`] rebuilds centroids from labeled rows with a
//!    bounded replay sample per class.
//!
//! | State | Meaning |
//! |-------|---------|
//! | **Unlabeled** | added, not yet acted on |
//! | **Known** | top-1 cleared both thresholds (re-evaluated every training pass) |
//! | **Clustered** | rejected and grouped with similar unknowns |
//! | **Labeled** | labeled by the user, directly or through its cluster |
//!
//! # Modules
//!
//! - [`cache`]: content-addressed embedding cache
//! - [`classifier`]: prototype classifier with a two-threshold reject
//! - [`cluster`]: online clustering of unknowns
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`dataset`]: dataset store trait and an in-memory implementation
//! - [`embedding`]: still-image backbones
//! - [`engine`]: per-mode runtime tying the pieces together
//! - [`modes`]: the five feature modes
//! - [`sampling`]: segments, frame sampling, frame and audio sources
//! - [`thresholds`]: persisted acceptance thresholds
//! - [`trainer`]: replay-capped centroid rebuilds
//! - [`vector`]: shared numeric helpers

pub mod cache;
pub mod classifier;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod modes;
pub mod sampling;
pub mod thresholds;
pub mod trainer;
pub mod vector;

pub use error::{RecognitionError, Result};
