//! Content store trait and the in-memory JSON adapter.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use stagehand_core::{StageError, StageResult};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::ALL_COLLECTIONS;

pub type Document = serde_json::Map<String, serde_json::Value>;

/// Document filter understood by every adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    /// Case-insensitive equality on a string field.
    EqIgnoreCase { field: String, value: String },
}

impl Filter {
    pub fn eq_ignore_case(field: &str, value: &str) -> Self {
        Filter::EqIgnoreCase {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::EqIgnoreCase { field, value } => doc
                .get(field)
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.trim().to_lowercase() == value.trim().to_lowercase()),
        }
    }
}

/// Read access to the named collections.
///
/// Implementations handle their own synchronization.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn lookup(&self, collection: &str, filter: &Filter, limit: usize)
        -> StageResult<Vec<Document>>;

    /// Up to `count` random values of a string field.
    async fn sample_random(&self, collection: &str, field: &str, count: usize)
        -> StageResult<Vec<String>>;

    /// Distinct string values of `field` containing `term`
    /// (case-insensitive), sorted, at most `limit`.
    async fn distinct(&self, collection: &str, field: &str, term: &str, limit: usize)
        -> StageResult<Vec<String>>;
}

/// Capability-checked handle: callers branch on the tag instead of
/// null-checking the store.
#[derive(Clone)]
pub enum StoreHandle {
    Connected(Arc<dyn ContentStore>),
    Disconnected { reason: String },
}

impl StoreHandle {
    pub fn get(&self) -> StageResult<&Arc<dyn ContentStore>> {
        match self {
            StoreHandle::Connected(store) => Ok(store),
            StoreHandle::Disconnected { reason } => {
                Err(StageError::StoreUnavailable(reason.clone()))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, StoreHandle::Connected(_))
    }

    pub fn status(&self) -> &str {
        match self {
            StoreHandle::Connected(_) => "connected",
            StoreHandle::Disconnected { .. } => "disconnected",
        }
    }

    /// Open the JSON store in `data_dir`, or a disconnected handle.
    pub fn open_json_dir(data_dir: &Path) -> Self {
        match JsonDocumentStore::load_dir(data_dir) {
            Ok(store) => StoreHandle::Connected(Arc::new(store)),
            Err(e) => {
                warn!(path = %data_dir.display(), error = %e, "content store unavailable");
                StoreHandle::Disconnected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Collections loaded from `<dir>/<Collection>.json` into memory.
#[derive(Debug, Default)]
pub struct JsonDocumentStore {
    collections: HashMap<String, Vec<Document>>,
}

impl JsonDocumentStore {
    pub fn from_collections(collections: HashMap<String, Vec<Document>>) -> Self {
        Self { collections }
    }

    /// Load every known collection file present in `dir`.
    ///
    /// A missing directory is an error; a missing collection file is an
    /// empty collection.
    pub fn load_dir(dir: &Path) -> StageResult<Self> {
        if !dir.is_dir() {
            return Err(StageError::StoreUnavailable(format!(
                "data directory {} not found",
                dir.display()
            )));
        }

        let mut collections = HashMap::new();
        for name in ALL_COLLECTIONS {
            let path = dir.join(format!("{name}.json"));
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            let docs: Vec<Document> = serde_json::from_str(&text).map_err(|e| {
                StageError::Store(format!("{}: {e}", path.display()))
            })?;
            collections.insert(name.to_string(), docs);
        }

        info!(
            path = %dir.display(),
            collections = collections.len(),
            documents = collections.values().map(Vec::len).sum::<usize>(),
            "content store loaded"
        );
        Ok(Self { collections })
    }

    fn docs(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl ContentStore for JsonDocumentStore {
    async fn lookup(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StageResult<Vec<Document>> {
        Ok(self
            .docs(collection)
            .iter()
            .filter(|d| filter.matches(d))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn sample_random(
        &self,
        collection: &str,
        field: &str,
        count: usize,
    ) -> StageResult<Vec<String>> {
        let values: Vec<&str> = self
            .docs(collection)
            .iter()
            .filter_map(|d| d.get(field).and_then(|v| v.as_str()))
            .filter(|s| !s.trim().is_empty())
            .collect();
        let mut rng = rand::thread_rng();
        Ok(values
            .choose_multiple(&mut rng, count)
            .map(|s| s.to_string())
            .collect())
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        term: &str,
        limit: usize,
    ) -> StageResult<Vec<String>> {
        let needle = term.trim().to_lowercase();
        let found: BTreeSet<String> = self
            .docs(collection)
            .iter()
            .filter_map(|d| d.get(field).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.to_lowercase().contains(&needle))
            .map(str::to_string)
            .collect();
        Ok(found.into_iter().take(limit).collect())
    }
}
