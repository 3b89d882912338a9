//! The dataset store: which content items exist, and what each one is.
//!
//! The recognition core only *reads* labeled rows from a [`DatasetStore`];
//! label and cluster mutations happen in response to user actions. An item is
//! in exactly one [`ItemState`], so a label and a cluster id can never coexist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cache::CacheKey;
use crate::error::{RecognitionError, Result};
use crate::modes::FeatureMode;
use crate::sampling::Segment;

pub type ItemId = u64;

/// One training example: a label and the cache key of its embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRow {
    pub label: String,
    pub key: CacheKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum ItemState {
    Unlabeled,
    Clustered(String),
    Labeled(String),
}

impl ItemState {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Labeled(label) => Some(label),
            _ => None,
        }
    }

    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Self::Clustered(id) => Some(id),
            _ => None,
        }
    }
}

/// Storage collaborator for labels and clusters.
pub trait DatasetStore {
    /// Every (label, cache key) pair recorded for `mode`.
    fn labeled_rows(&self, mode: FeatureMode) -> Result<Vec<LabeledRow>>;

    /// Label an item, clearing any cluster it belonged to.
    fn set_label(&mut self, item: ItemId, label: &str) -> Result<()>;

    /// Put an unlabeled item into a cluster. Returns false (and changes
    /// nothing) when the item is already labeled.
    fn assign_cluster(&mut self, item: ItemId, cluster_id: &str) -> Result<bool>;

    /// Label every member of a cluster and clear their cluster id.
    /// Returns the number of items relabeled.
    fn promote_cluster(&mut self, cluster_id: &str, label: &str) -> Result<usize>;
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetItem {
    pub id: ItemId,
    pub content: PathBuf,
    pub mode: FeatureMode,
    pub segment: Segment,
    pub key: CacheKey,
    pub state: ItemState,
    pub added_at: DateTime<Utc>,
}

/// In-process [`DatasetStore`].
#[derive(Debug, Default)]
pub struct MemoryDataset {
    items: BTreeMap<ItemId, DatasetItem>,
    next_id: ItemId,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an item. Adding the same (content, mode, segment) again refreshes
    /// its cache key and returns the existing id.
    pub fn add_item(
        &mut self,
        content: &Path,
        mode: FeatureMode,
        segment: Segment,
        key: CacheKey,
    ) -> ItemId {
        if let Some(existing) = self
            .items
            .values_mut()
            .find(|i| i.content == content && i.mode == mode && i.segment == segment)
        {
            existing.key = key;
            return existing.id;
        }

        self.next_id += 1;
        let id = self.next_id;
        self.items.insert(
            id,
            DatasetItem {
                id,
                content: content.to_path_buf(),
                mode,
                segment,
                key,
                state: ItemState::Unlabeled,
                added_at: Utc::now(),
            },
        );
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&DatasetItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &DatasetItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cluster_members(&self, cluster_id: &str) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|i| i.state.cluster_id() == Some(cluster_id))
            .map(|i| i.id)
            .collect()
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut DatasetItem> {
        self.items
            .get_mut(&id)
            .ok_or(RecognitionError::UnknownItem(id))
    }
}

impl DatasetStore for MemoryDataset {
    fn labeled_rows(&self, mode: FeatureMode) -> Result<Vec<LabeledRow>> {
        Ok(self
            .items
            .values()
            .filter(|i| i.mode == mode)
            .filter_map(|i| {
                i.state.label().map(|label| LabeledRow {
                    label: label.to_string(),
                    key: i.key.clone(),
                })
            })
            .collect())
    }

    fn set_label(&mut self, item: ItemId, label: &str) -> Result<()> {
        self.item_mut(item)?.state = ItemState::Labeled(label.to_string());
        Ok(())
    }

    fn assign_cluster(&mut self, item: ItemId, cluster_id: &str) -> Result<bool> {
        let item = self.item_mut(item)?;
        if matches!(item.state, ItemState::Labeled(_)) {
            return Ok(false);
        }
        item.state = ItemState::Clustered(cluster_id.to_string());
        Ok(true)
    }

    fn promote_cluster(&mut self, cluster_id: &str, label: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.items.values_mut() {
            if item.state.cluster_id() == Some(cluster_id) {
                item.state = ItemState::Labeled(label.to_string());
                count += 1;
            }
        }
        info!(cluster = cluster_id, label, count, "promoted cluster to label");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> CacheKey {
        format!("{:064x}", n).parse().unwrap()
    }

    fn dataset_with(n: u8) -> (MemoryDataset, Vec<ItemId>) {
        let mut ds = MemoryDataset::new();
        let ids = (0..n)
            .map(|i| {
                ds.add_item(
                    Path::new(&format!("/clips/{i}.mp4")),
                    FeatureMode::Appearance,
                    Segment::WHOLE,
                    key(i),
                )
            })
            .collect();
        (ds, ids)
    }

    #[test]
    fn re_adding_an_item_keeps_its_id() {
        let (mut ds, ids) = dataset_with(1);
        let again = ds.add_item(
            Path::new("/clips/0.mp4"),
            FeatureMode::Appearance,
            Segment::WHOLE,
            key(9),
        );
        assert_eq!(again, ids[0]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(again).unwrap().key, key(9));

        // other mode, same file: a separate item
        let other = ds.add_item(
            Path::new("/clips/0.mp4"),
            FeatureMode::Motion,
            Segment::WHOLE,
            key(9),
        );
        assert_ne!(other, ids[0]);
    }

    #[test]
    fn labeled_rows_filter_by_mode_and_state() {
        let (mut ds, ids) = dataset_with(3);
        ds.set_label(ids[0], "cat").unwrap();
        ds.assign_cluster(ids[1], "cluster_abc").unwrap();

        let rows = ds.labeled_rows(FeatureMode::Appearance).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "cat");
        assert!(ds.labeled_rows(FeatureMode::Audio).unwrap().is_empty());
    }

    #[test]
    fn labeled_items_cannot_be_clustered() {
        let (mut ds, ids) = dataset_with(1);
        ds.set_label(ids[0], "cat").unwrap();
        assert!(!ds.assign_cluster(ids[0], "cluster_abc").unwrap());
        assert_eq!(ds.get(ids[0]).unwrap().state, ItemState::Labeled("cat".into()));
    }

    #[test]
    fn promotion_relabels_members_and_clears_cluster() {
        let (mut ds, ids) = dataset_with(3);
        ds.assign_cluster(ids[0], "cluster_a").unwrap();
        ds.assign_cluster(ids[1], "cluster_a").unwrap();
        ds.assign_cluster(ids[2], "cluster_b").unwrap();

        assert_eq!(ds.promote_cluster("cluster_a", "dog").unwrap(), 2);
        assert!(ds.cluster_members("cluster_a").is_empty());
        assert_eq!(ds.cluster_members("cluster_b"), vec![ids[2]]);
        for id in &ids[..2] {
            let state = &ds.get(*id).unwrap().state;
            assert_eq!(state.label(), Some("dog"));
            assert_eq!(state.cluster_id(), None);
        }
    }

    #[test]
    fn unknown_item_is_an_error() {
        let mut ds = MemoryDataset::new();
        assert!(matches!(
            ds.set_label(42, "x"),
            Err(RecognitionError::UnknownItem(42))
        ));
    }
}
