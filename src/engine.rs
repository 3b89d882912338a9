//! Per-mode recognition runtime.
//!
//! A [`Recognizer`] owns everything shared across modes (config, cache,
//! extractor, thresholds) and one [`ModeRuntime`] per [`FeatureMode`]. Each
//! runtime has its own classifier, trainer and clusterer, so training one mode
//! never touches another mode's centroids.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cache::{CacheKey, EmbeddingCache};
use crate::classifier::{LoadStatus, PredictResult, PrototypeClassifier};
use crate::cluster::{Cluster, ClusterAssignment, UnknownClusterer};
use crate::config::GlimpseConfig;
use crate::dataset::DatasetStore;
use crate::embedding::{create_extractor, EmbeddingExtractor};
use crate::error::{RecognitionError, Result};
use crate::modes::{FeatureMode, ModeInput};
use crate::sampling::{AudioSource, ExtractionParams, FrameSource, Segment};
use crate::thresholds::Thresholds;
use crate::trainer::{TrainReport, Trainer};
use crate::vector::Embedding;

pub struct ModeRuntime {
    pub classifier: PrototypeClassifier,
    pub trainer: Trainer,
    pub clusterer: UnknownClusterer,
}

impl ModeRuntime {
    fn new(config: &GlimpseConfig, mode: FeatureMode) -> Self {
        Self {
            classifier: PrototypeClassifier::new(),
            trainer: Trainer::new(
                config.centroids_path(mode),
                config.training.replay_per_class,
            ),
            clusterer: UnknownClusterer::from_config(&config.clustering),
        }
    }
}

/// An embedding together with the key it is cached under.
#[derive(Debug, Clone, Serialize)]
pub struct Embedded {
    pub mode: FeatureMode,
    pub key: CacheKey,
    #[serde(skip)]
    pub embedding: Embedding,
    pub from_cache: bool,
}

/// Result of labeling a cluster.
#[derive(Debug, Clone, Serialize)]
pub struct Promotion {
    /// The retired cluster carrying its new name; `None` if the clusterer
    /// did not know the id.
    pub cluster: Option<Cluster>,
    /// Items relabeled in the store.
    pub relabeled: usize,
}

pub struct Recognizer {
    config: GlimpseConfig,
    cache: EmbeddingCache,
    extractor: Box<dyn EmbeddingExtractor>,
    params: ExtractionParams,
    thresholds: Thresholds,
    runtimes: BTreeMap<FeatureMode, ModeRuntime>,
}

impl Recognizer {
    /// Build a recognizer with the configured backbone. Reads (or creates)
    /// the thresholds file; classifier state is loaded by [`Self::load_state`].
    pub fn new(config: GlimpseConfig) -> Result<Self> {
        let extractor = create_extractor(&config.extraction)?;
        Self::with_extractor(config, extractor)
    }

    pub fn with_extractor(
        config: GlimpseConfig,
        extractor: Box<dyn EmbeddingExtractor>,
    ) -> Result<Self> {
        let thresholds =
            Thresholds::load_or_init(&config.thresholds_path(), config.default_thresholds())?;
        let mut params = config.extraction_params();
        // Aliases of one backbone must share cache entries.
        params.backbone = extractor.id();

        let runtimes = FeatureMode::ALL
            .into_iter()
            .map(|mode| (mode, ModeRuntime::new(&config, mode)))
            .collect();

        Ok(Self {
            cache: EmbeddingCache::new(config.embeddings_cache_dir()),
            config,
            extractor,
            params,
            thresholds,
            runtimes,
        })
    }

    pub fn config(&self) -> &GlimpseConfig {
        &self.config
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn extractor(&self) -> &dyn EmbeddingExtractor {
        self.extractor.as_ref()
    }

    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) -> Result<()> {
        thresholds.save(&self.config.thresholds_path())?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn runtime(&self, mode: FeatureMode) -> &ModeRuntime {
        &self.runtimes[&mode]
    }

    pub fn runtime_mut(&mut self, mode: FeatureMode) -> &mut ModeRuntime {
        self.runtimes
            .entry(mode)
            .or_insert_with(|| ModeRuntime::new(&self.config, mode))
    }

    /// Load persisted classifier state for every mode.
    pub fn load_state(&mut self) -> Result<BTreeMap<FeatureMode, LoadStatus>> {
        let mut statuses = BTreeMap::new();
        for (mode, rt) in &mut self.runtimes {
            let status = rt.trainer.try_load(&mut rt.classifier)?;
            statuses.insert(*mode, status);
        }
        info!(?statuses, "classifier state loaded");
        Ok(statuses)
    }

    /// Embed one content item (or segment) in `mode`, reusing the cache.
    ///
    /// Audio mode reads only `audio`; the other modes read only `frames`.
    pub fn embed(
        &self,
        content: &Path,
        mode: FeatureMode,
        segment: Segment,
        frames: &dyn FrameSource,
        audio: Option<&dyn AudioSource>,
    ) -> Result<Embedded> {
        let mut from_cache = true;
        let compute = || -> Result<Embedding> {
            from_cache = false;
            let output = if mode.uses_audio() {
                let source = audio.ok_or_else(|| {
                    RecognitionError::ContentUnavailable("audio mode needs an audio source".into())
                })?;
                let clip = source
                    .audio(content, segment)?
                    .truncated(self.config.extraction.audio_max_seconds)
                    .resampled(self.params.audio_sample_rate);
                let input = ModeInput::frames(&[], self.extractor.as_ref())
                    .with_audio(&clip)
                    .with_segment(segment);
                mode.compute(&input)?
            } else {
                let decoded = frames.frames(content, segment)?;
                let input =
                    ModeInput::frames(&decoded, self.extractor.as_ref()).with_segment(segment);
                mode.compute(&input)?
            };
            Ok(output.embedding)
        };
        let (key, embedding) =
            self.cache
                .get_or_compute(content, mode, segment, &self.params, compute)?;

        Ok(Embedded {
            mode,
            key,
            embedding,
            from_cache,
        })
    }

    /// Open-world prediction with the current thresholds and configured top-k.
    pub fn classify(&self, mode: FeatureMode, embedding: &[f32]) -> Result<PredictResult> {
        self.runtime(mode).classifier.predict_open_world(
            embedding,
            &self.thresholds,
            self.config.recognition.top_k,
        )
    }

    /// Send a rejected embedding to the mode's clusterer.
    pub fn route_unknown(
        &mut self,
        mode: FeatureMode,
        embedding: &[f32],
    ) -> Result<ClusterAssignment> {
        self.runtime_mut(mode).clusterer.assign(embedding)
    }

    /// Rebuild the mode's classifier from every labeled row in `store`.
    pub fn train(&mut self, mode: FeatureMode, store: &dyn DatasetStore) -> Result<TrainReport> {
        let rows = store.labeled_rows(mode)?;
        let cache = &self.cache;
        let rt = self
            .runtimes
            .entry(mode)
            .or_insert_with(|| ModeRuntime::new(&self.config, mode));
        rt.trainer
            .train_from_labeled(&mut rt.classifier, &rows, |key| cache.load(mode, key))
    }

    /// Label every member of a cluster through `store`, then retire the
    /// cluster from the clusterer and hand it back under its new name.
    pub fn name_cluster(
        &mut self,
        mode: FeatureMode,
        cluster_id: &str,
        label: &str,
        store: &mut dyn DatasetStore,
    ) -> Result<Promotion> {
        let relabeled = store.promote_cluster(cluster_id, label)?;
        let clusterer = &mut self.runtime_mut(mode).clusterer;
        clusterer.name_cluster(cluster_id, label);
        Ok(Promotion {
            cluster: clusterer.forget(cluster_id),
            relabeled,
        })
    }
}
