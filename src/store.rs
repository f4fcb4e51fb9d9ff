//! The dataset-store seam.
//!
//! The engine never owns persistence: an external collaborator supplies
//! input records and absorbs output records through the [`DatasetStore`]
//! trait. [`MemoryStore`] is the reference implementation used by tests
//! and by embedders that keep datasets in process memory.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::table::Record;

/// Opaque identifier of a stored dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub u64);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage collaborator contract.
///
/// `replace_records` must be all-or-nothing: a failure partway through
/// may not leave the dataset holding a mix of old and new rows.
pub trait DatasetStore {
    /// Load every record of a dataset, in stored order.
    fn load_records(&self, id: DatasetId) -> Result<Vec<Record>, StoreError>;

    /// Display name of a dataset.
    fn dataset_name(&self, id: DatasetId) -> Result<String, StoreError>;

    /// Data-source label of a dataset, when it has one.
    fn data_source(&self, id: DatasetId) -> Result<Option<String>, StoreError>;

    /// Create an empty dataset and return its id. A `None` data source
    /// lets the store pick its own default.
    fn create_dataset(&mut self, name: &str, data_source: Option<&str>)
    -> Result<DatasetId, StoreError>;

    /// Remove a dataset and its records. The executor uses this to roll
    /// back a dataset it created when the commit that should have filled
    /// it fails, so a failed first run leaves no orphan behind.
    fn delete_dataset(&mut self, id: DatasetId) -> Result<(), StoreError>;

    /// Atomically replace all records of a dataset, returning the count
    /// written.
    fn replace_records(&mut self, id: DatasetId, records: Vec<Record>)
    -> Result<usize, StoreError>;
}

#[derive(Debug, Clone)]
struct DatasetEntry {
    name: String,
    data_source: Option<String>,
    records: Vec<Record>,
}

/// In-memory [`DatasetStore`]. Replacement is a single vector swap, so
/// the atomicity contract holds trivially.
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: HashMap<u64, DatasetEntry>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a dataset with records (test/embedding convenience).
    pub fn insert_dataset(
        &mut self,
        name: &str,
        data_source: Option<&str>,
        records: Vec<Record>,
    ) -> DatasetId {
        self.next_id += 1;
        let id = self.next_id;
        self.datasets.insert(
            id,
            DatasetEntry {
                name: name.to_string(),
                data_source: data_source.map(str::to_string),
                records,
            },
        );
        DatasetId(id)
    }

    /// Number of datasets held.
    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }

    fn entry(&self, id: DatasetId) -> Result<&DatasetEntry, StoreError> {
        self.datasets.get(&id.0).ok_or(StoreError::DatasetNotFound(id))
    }
}

impl DatasetStore for MemoryStore {
    fn load_records(&self, id: DatasetId) -> Result<Vec<Record>, StoreError> {
        Ok(self.entry(id)?.records.clone())
    }

    fn dataset_name(&self, id: DatasetId) -> Result<String, StoreError> {
        Ok(self.entry(id)?.name.clone())
    }

    fn data_source(&self, id: DatasetId) -> Result<Option<String>, StoreError> {
        Ok(self.entry(id)?.data_source.clone())
    }

    fn create_dataset(
        &mut self,
        name: &str,
        data_source: Option<&str>,
    ) -> Result<DatasetId, StoreError> {
        // default source for datasets materialized by a pipeline run
        let source = data_source.unwrap_or("pipeline");
        Ok(self.insert_dataset(name, Some(source), Vec::new()))
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<(), StoreError> {
        self.datasets
            .remove(&id.0)
            .map(|_| ())
            .ok_or(StoreError::DatasetNotFound(id))
    }

    fn replace_records(
        &mut self,
        id: DatasetId,
        records: Vec<Record>,
    ) -> Result<usize, StoreError> {
        let entry = self
            .datasets
            .get_mut(&id.0)
            .ok_or(StoreError::DatasetNotFound(id))?;
        let count = records.len();
        entry.records = records;
        Ok(count)
    }
}
