use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::{
    application::services::RecordSource,
    domain::{Dataset, DatasetSource, DatasetSummary, DomainError},
    infrastructure::http_client::{build_agent, DEFAULT_FETCH_TIMEOUT},
};

use super::loader::load_dataset;

/// In-memory owner of the active Q&A table.
///
/// The table itself is an immutable `Arc<Dataset>`; a reload builds a new
/// snapshot and swaps the pointer, so searches already running keep ranking
/// against the snapshot they started with. A failed reload leaves the
/// current snapshot in place.
pub struct DatasetStore {
    origin: DatasetSource,
    agent: ureq::Agent,
    current: RwLock<Arc<Dataset>>,
}

impl DatasetStore {
    /// Load the table from `origin` and keep it as the active snapshot.
    pub fn open(origin: DatasetSource, fetch_timeout: Duration) -> Result<Self, DomainError> {
        let agent = build_agent(fetch_timeout);
        let dataset = load_dataset(&origin, &agent)?;

        Ok(Self {
            origin,
            agent,
            current: RwLock::new(Arc::new(dataset)),
        })
    }

    /// Wrap an already built dataset. Reloading re-reads its origin, if it has one.
    pub fn in_memory(dataset: Dataset) -> Self {
        Self {
            origin: dataset.source().clone(),
            agent: build_agent(DEFAULT_FETCH_TIMEOUT),
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    /// A store with no records, used when no dataset is configured.
    pub fn empty() -> Self {
        Self::in_memory(Dataset::empty(DatasetSource::Inline))
    }

    pub fn origin(&self) -> &DatasetSource {
        &self.origin
    }

    /// Swap in a new snapshot, returning the previous one.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, Arc::new(dataset))
    }
}

impl RecordSource for DatasetStore {
    fn snapshot(&self) -> Arc<Dataset> {
        Arc::clone(&self.current.read())
    }

    fn reload(&self) -> Result<DatasetSummary, DomainError> {
        let dataset = load_dataset(&self.origin, &self.agent)?;
        let summary = dataset.summary();
        let previous = self.replace(dataset);

        info!(
            target: "tanya::dataset",
            source = %self.origin,
            previous_records = previous.len(),
            records = summary.records,
            "dataset reloaded"
        );

        Ok(summary)
    }

    fn ping(&self) -> Result<(), DomainError> {
        match &self.origin {
            DatasetSource::File(path) if !path.is_file() => Err(DomainError::dataset(format!(
                "dataset file {} is no longer readable",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;
    use std::fs;
    use tempfile::tempdir;

    fn write_table(path: &std::path::Path, answers: &[&str]) {
        let rows: Vec<serde_json::Value> = answers
            .iter()
            .map(|answer| {
                serde_json::json!({
                    "question": "What is your refund policy?",
                    "answer": answer,
                    "embedding": [1.0, 0.0],
                })
            })
            .collect();
        fs::write(path, serde_json::to_vec(&rows).unwrap()).unwrap();
    }

    #[test]
    fn reload_swaps_snapshot_but_keeps_old_handles_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfp.json");
        write_table(&path, &["30 days"]);

        let store = DatasetStore::open(DatasetSource::File(path.clone()), DEFAULT_FETCH_TIMEOUT)
            .unwrap();
        let before = store.snapshot();
        assert_eq!(before.len(), 1);

        write_table(&path, &["30 days", "Full refund within 30 days"]);
        let summary = store.reload().unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.questions, 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn failed_reload_keeps_current_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfp.json");
        write_table(&path, &["30 days"]);

        let store = DatasetStore::open(DatasetSource::File(path.clone()), DEFAULT_FETCH_TIMEOUT)
            .unwrap();
        fs::write(&path, "not json").unwrap();

        assert!(store.reload().is_err());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn inline_store_cannot_reload() {
        let dataset = Dataset::new(
            vec![Record::new("q", "a", vec![1.0])],
            DatasetSource::Inline,
        )
        .unwrap();
        let store = DatasetStore::in_memory(dataset);

        assert!(matches!(
            store.reload().unwrap_err(),
            DomainError::Validation(_)
        ));
        assert_eq!(store.snapshot().len(), 1);
        assert!(store.ping().is_ok());
    }

    #[test]
    fn ping_fails_when_file_disappears() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rfp.json");
        write_table(&path, &["30 days"]);

        let store =
            DatasetStore::open(DatasetSource::File(path.clone()), DEFAULT_FETCH_TIMEOUT).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(store.ping().is_err());
    }

    #[test]
    fn empty_store_has_no_records() {
        let store = DatasetStore::empty();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.origin(), &DatasetSource::Inline);
    }
}
