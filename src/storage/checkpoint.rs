use std::fs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::schema::schema::TableSchema;
use crate::storage::layout::StorageLayout;

/// Table metadata persisted next to the data: the schema it was created with
/// and the number of documents known at the last sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema: TableSchema,
    pub doc_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(schema: TableSchema, doc_count: u32) -> Self {
        Checkpoint {
            schema,
            doc_count,
            timestamp: Utc::now(),
        }
    }

    /// Load checkpoint from disk
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let checkpoint = bincode::deserialize(&data)?;
        Ok(Some(checkpoint))
    }

    /// Save checkpoint to disk
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let data = bincode::serialize(self)?;
        let path = storage.checkpoint_path();
        let tmp = path.with_extension("meta.tmp");
        fs::write(&tmp, data)?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}
