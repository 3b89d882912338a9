//! Content-addressed embedding cache.
//!
//! An embedding is computed once per (content, mode, segment, extraction
//! parameters) and stored as a raw little-endian `f32` file named
//! `<mode>_<key>.f32`. The key is the BLAKE3 hash of a versioned, structured
//! description of everything that can change the result, so editing the file,
//! choosing another segment or changing a parameter all produce a new key.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RecognitionError, Result};
use crate::modes::FeatureMode;
use crate::sampling::{ExtractionParams, Segment};
use crate::vector::{from_le_bytes, to_le_bytes, Embedding};

/// Bump when the key material changes shape.
pub const CACHE_KEY_VERSION: u32 = 1;

const ENTRY_EXTENSION: &str = "f32";

/// Identity of a content file at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFingerprint {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_ns: u128,
}

impl ContentFingerprint {
    /// Resolve `path` to an absolute path and read its size and modification time.
    pub fn of(path: &Path) -> Result<Self> {
        let resolved = fs::canonicalize(path).map_err(|e| {
            RecognitionError::ContentUnavailable(format!("{}: {e}", path.display()))
        })?;
        let meta = fs::metadata(&resolved)?;
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(Self {
            path: resolved,
            size: meta.len(),
            mtime_ns,
        })
    }
}

// The path is hashed separately as raw OS bytes; JSON cannot carry non-UTF-8 paths.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    version: u32,
    size: u64,
    mtime_ns: u128,
    mode: &'static str,
    start_ms: i64,
    end_ms: i64,
    max_frames: usize,
    min_step_s: f32,
    resize: u32,
    backbone: &'a str,
    audio_sample_rate: u32,
}

/// Deterministic cache key (64 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a content file on disk.
    pub fn for_content(
        path: &Path,
        mode: FeatureMode,
        segment: Segment,
        params: &ExtractionParams,
    ) -> Result<Self> {
        let fingerprint = ContentFingerprint::of(path)?;
        Self::from_fingerprint(&fingerprint, mode, segment, params)
    }

    pub fn from_fingerprint(
        fingerprint: &ContentFingerprint,
        mode: FeatureMode,
        segment: Segment,
        params: &ExtractionParams,
    ) -> Result<Self> {
        let material = KeyMaterial {
            version: CACHE_KEY_VERSION,
            size: fingerprint.size,
            mtime_ns: fingerprint.mtime_ns,
            mode: mode.id(),
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            max_frames: params.max_frames,
            min_step_s: params.min_step_s,
            resize: params.resize,
            backbone: &params.backbone,
            audio_sample_rate: params.audio_sample_rate,
        };
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let canonical = serde_json::to_vec(&material)?;
        let path = fingerprint.path.as_os_str().as_encoded_bytes();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&(canonical.len() as u64).to_le_bytes());
        hasher.update(&canonical);
        hasher.update(&(path.len() as u64).to_le_bytes());
        hasher.update(path);
        Ok(Self(hasher.finalize().to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CacheKey {
    type Err = RecognitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(RecognitionError::ContentUnavailable(format!(
                "malformed cache key: {s}"
            )))
        }
    }
}

/// Directory-backed store of computed embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for (mode, key).
    pub fn entry_path(&self, mode: FeatureMode, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{ENTRY_EXTENSION}", mode.id(), key.as_str()))
    }

    /// Return the cached embedding for `content`, or compute and persist it.
    ///
    /// On a hit `compute` is never called. On a miss it is called exactly once;
    /// its error is returned unchanged and nothing is written.
    pub fn get_or_compute<F, E>(
        &self,
        content: &Path,
        mode: FeatureMode,
        segment: Segment,
        params: &ExtractionParams,
        compute: F,
    ) -> Result<(CacheKey, Embedding), E>
    where
        F: FnOnce() -> Result<Embedding, E>,
        E: From<RecognitionError>,
    {
        let key = CacheKey::for_content(content, mode, segment, params)?;

        if let Some(embedding) = self.load(mode, &key) {
            debug!(mode = %mode, key = %key, "embedding cache hit");
            return Ok((key, embedding));
        }

        debug!(mode = %mode, key = %key, content = %content.display(), "embedding cache miss");
        let embedding = compute()?;
        if embedding.is_empty() {
            return Err(RecognitionError::DegenerateEmbedding(mode.id()).into());
        }
        self.store(mode, &key, &embedding)?;
        Ok((key, embedding))
    }

    /// Load a stored embedding. Missing or unreadable entries yield `None`;
    /// unreadable ones are logged.
    pub fn load(&self, mode: FeatureMode, key: &CacheKey) -> Option<Embedding> {
        let path = self.entry_path(mode, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cached embedding");
                return None;
            }
        };
        match from_le_bytes(&bytes) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                warn!(path = %path.display(), len = bytes.len(), "corrupt cached embedding, ignoring");
                None
            }
        }
    }

    /// Persist an embedding atomically (temp file + rename).
    pub fn store(&self, mode: FeatureMode, key: &CacheKey, embedding: &[f32]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(mode, key);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, to_le_bytes(embedding))?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Remove an entry. Returns whether a file was deleted.
    pub fn evict(&self, mode: FeatureMode, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.entry_path(mode, key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of stored entries (all modes).
    pub fn entry_count(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str()) == Some(ENTRY_EXTENSION)
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}
