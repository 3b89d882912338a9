mod helpers;

use std::cell::Cell;

use glimpse::cache::{CacheKey, EmbeddingCache};
use glimpse::modes::FeatureMode;
use glimpse::sampling::Segment;
use glimpse::RecognitionError;
use helpers::{test_embedding, test_params};
use tempfile::TempDir;

fn setup() -> (TempDir, EmbeddingCache, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let cache = EmbeddingCache::new(tmp.path().join("embeddings_cache"));
    let content = tmp.path().join("clip.bin");
    std::fs::write(&content, b"frame data").unwrap();
    (tmp, cache, content)
}

#[test]
fn repeated_calls_compute_once_and_return_identical_bits() {
    let (_tmp, cache, content) = setup();
    let calls = Cell::new(0);
    let compute = || {
        calls.set(calls.get() + 1);
        Ok::<_, RecognitionError>(vec![0.6, 0.8, 0.0])
    };

    let (k1, e1) = cache
        .get_or_compute(&content, FeatureMode::Appearance, Segment::WHOLE, &test_params(), compute)
        .unwrap();
    for _ in 0..3 {
        let (k, e) = cache
            .get_or_compute(&content, FeatureMode::Appearance, Segment::WHOLE, &test_params(), compute)
            .unwrap();
        assert_eq!(k, k1);
        let bits: Vec<u32> = e.iter().map(|x| x.to_bits()).collect();
        let first: Vec<u32> = e1.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits, first);
    }
    assert_eq!(calls.get(), 1);
    assert_eq!(cache.entry_count(), 1);
}

#[test]
fn key_is_stable_for_unchanged_content() {
    let (_tmp, _cache, content) = setup();
    let a = CacheKey::for_content(&content, FeatureMode::Motion, Segment::new(0, 1500), &test_params()).unwrap();
    let b = CacheKey::for_content(&content, FeatureMode::Motion, Segment::new(0, 1500), &test_params()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn editing_the_file_forces_recomputation() {
    let (_tmp, cache, content) = setup();
    let calls = Cell::new(0);
    let compute = || {
        calls.set(calls.get() + 1);
        Ok::<_, RecognitionError>(test_embedding(calls.get() as u8))
    };

    let (k1, _) = cache
        .get_or_compute(&content, FeatureMode::Appearance, Segment::WHOLE, &test_params(), compute)
        .unwrap();
    std::fs::write(&content, b"different, longer frame data").unwrap();
    let (k2, _) = cache
        .get_or_compute(&content, FeatureMode::Appearance, Segment::WHOLE, &test_params(), compute)
        .unwrap();

    assert_ne!(k1, k2);
    assert_eq!(calls.get(), 2);
}

#[test]
fn segments_and_modes_are_cached_separately() {
    let (_tmp, cache, content) = setup();
    let calls = Cell::new(0);
    let compute = || {
        calls.set(calls.get() + 1);
        Ok::<_, RecognitionError>(test_embedding(0))
    };

    for (mode, segment) in [
        (FeatureMode::Appearance, Segment::WHOLE),
        (FeatureMode::Appearance, Segment::new(0, 1000)),
        (FeatureMode::Scene, Segment::WHOLE),
    ] {
        cache
            .get_or_compute(&content, mode, segment, &test_params(), compute)
            .unwrap();
    }
    assert_eq!(calls.get(), 3);
    assert_eq!(cache.entry_count(), 3);
}

#[test]
fn compute_failure_propagates_and_writes_nothing() {
    let (_tmp, cache, content) = setup();
    let err = cache
        .get_or_compute(&content, FeatureMode::Motion, Segment::WHOLE, &test_params(), || {
            Err(RecognitionError::InsufficientFrames {
                mode: "motion",
                needed: 2,
                got: 1,
            })
        })
        .unwrap_err();
    assert!(matches!(err, RecognitionError::InsufficientFrames { got: 1, .. }));
    assert_eq!(cache.entry_count(), 0);

    // the next call computes again
    let calls = Cell::new(0);
    cache
        .get_or_compute(&content, FeatureMode::Motion, Segment::WHOLE, &test_params(), || {
            calls.set(calls.get() + 1);
            Ok::<_, RecognitionError>(test_embedding(1))
        })
        .unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn missing_content_is_unavailable() {
    let (tmp, cache, _content) = setup();
    let err = cache
        .get_or_compute(
            &tmp.path().join("nope.mp4"),
            FeatureMode::Appearance,
            Segment::WHOLE,
            &test_params(),
            || Ok::<_, RecognitionError>(test_embedding(0)),
        )
        .unwrap_err();
    assert!(matches!(err, RecognitionError::ContentUnavailable(_)));
}

#[test]
fn corrupt_entry_is_recomputed() {
    let (_tmp, cache, content) = setup();
    let (key, _) = cache
        .get_or_compute(&content, FeatureMode::Audio, Segment::WHOLE, &test_params(), || {
            Ok::<_, RecognitionError>(test_embedding(2))
        })
        .unwrap();

    // 5 bytes is not a whole number of f32s
    std::fs::write(cache.entry_path(FeatureMode::Audio, &key), [1u8, 2, 3, 4, 5]).unwrap();
    assert!(cache.load(FeatureMode::Audio, &key).is_none());

    let calls = Cell::new(0);
    let (_, e) = cache
        .get_or_compute(&content, FeatureMode::Audio, Segment::WHOLE, &test_params(), || {
            calls.set(calls.get() + 1);
            Ok::<_, RecognitionError>(test_embedding(2))
        })
        .unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(e, test_embedding(2));
}

#[test]
fn evicted_entries_are_gone() {
    let (_tmp, cache, content) = setup();
    let (key, _) = cache
        .get_or_compute(&content, FeatureMode::Appearance, Segment::WHOLE, &test_params(), || {
            Ok::<_, RecognitionError>(test_embedding(3))
        })
        .unwrap();
    assert!(cache.evict(FeatureMode::Appearance, &key).unwrap());
    assert!(!cache.evict(FeatureMode::Appearance, &key).unwrap());
    assert!(cache.load(FeatureMode::Appearance, &key).is_none());
}

#[test]
fn entry_file_is_named_by_mode_and_key() {
    let (_tmp, cache, content) = setup();
    let (key, _) = cache
        .get_or_compute(&content, FeatureMode::Scene, Segment::WHOLE, &test_params(), || {
            Ok::<_, RecognitionError>(test_embedding(4))
        })
        .unwrap();
    let path = cache.entry_path(FeatureMode::Scene, &key);
    assert!(path.exists());
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("scene_{key}.f32")
    );
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 64 * 4);
}

#[cfg(unix)]
#[test]
fn non_utf8_file_names_do_not_share_entries() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (tmp, cache, _content) = setup();
    let apple = tmp.path().join(OsStr::from_bytes(b"\xffapple.png"));
    let banana = tmp.path().join(OsStr::from_bytes(b"\xffbanana.png"));
    std::fs::write(&apple, b"red").unwrap();
    std::fs::write(&banana, b"yellow!").unwrap();

    let calls = Cell::new(0);
    let (ka, ea) = cache
        .get_or_compute(&apple, FeatureMode::Appearance, Segment::WHOLE, &test_params(), || {
            calls.set(calls.get() + 1);
            Ok::<_, RecognitionError>(test_embedding(1))
        })
        .unwrap();
    let (kb, eb) = cache
        .get_or_compute(&banana, FeatureMode::Appearance, Segment::WHOLE, &test_params(), || {
            calls.set(calls.get() + 1);
            Ok::<_, RecognitionError>(test_embedding(2))
        })
        .unwrap();

    assert_eq!(calls.get(), 2);
    assert_ne!(ka, kb);
    assert_ne!(ea, eb);
}
