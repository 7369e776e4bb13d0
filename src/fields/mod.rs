pub mod record;
pub mod persist;
pub mod directory;
pub mod flusher;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use crate::column::ColumnOptions;
use crate::core::error::Result;
use crate::core::types::{DataType, Field, FieldValue};

pub use directory::{SparseDirectory, MAX_DYNAMIC_FIELDS};
pub use flusher::FlushTask;
pub use persist::FieldMeta;

/// Docid -> dynamic fields index with its periodic flush task.
///
/// Closing (or dropping) stops and joins the flush task, then flushes one
/// last time.
pub struct DocidFieldsIndex {
    directory: Arc<SparseDirectory>,
    flusher: Mutex<Option<FlushTask>>,
}

impl DocidFieldsIndex {
    pub fn open(
        columns_dir: &Path,
        index_path: &Path,
        options: ColumnOptions,
        initial_capacity: u32,
        flush_interval: Duration,
        strict: bool,
    ) -> Result<Self> {
        let directory = Arc::new(SparseDirectory::open(
            columns_dir,
            index_path,
            options,
            initial_capacity,
            strict,
        )?);
        let flusher = FlushTask::spawn(directory.clone(), flush_interval)?;

        Ok(DocidFieldsIndex {
            directory,
            flusher: Mutex::new(Some(flusher)),
        })
    }

    pub fn add_field(&self, name: &str, data_type: DataType, indexed: bool) -> Result<u8> {
        self.directory.add_field(name, data_type, indexed)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.directory.contains_field(name)
    }

    pub fn field_meta(&self, name: &str) -> Option<FieldMeta> {
        self.directory.field_meta(name)
    }

    pub fn field_name(&self, field_id: u8) -> Option<String> {
        self.directory.field_name(field_id)
    }

    pub fn fields(&self) -> Vec<FieldMeta> {
        self.directory.fields()
    }

    pub fn validate(&self, docid: u32, fields: &[Field]) -> Result<()> {
        self.directory.validate(docid, fields)
    }

    pub fn put(&self, docid: u32, fields: &[Field]) -> Result<()> {
        self.directory.put(docid, fields)
    }

    pub fn get(&self, docid: u32, name: &str) -> Result<FieldValue> {
        self.directory.get(docid, name)
    }

    pub fn get_fields(&self, docid: u32, names: &[&str]) -> Result<Vec<Field>> {
        self.directory.get_fields(docid, names)
    }

    pub fn get_all(&self, docid: u32) -> Result<Vec<Field>> {
        self.directory.get_all(docid)
    }

    pub fn truncate(&self, doc_count: u32) {
        self.directory.truncate(doc_count)
    }

    pub fn record_pairs(&self, docid: u32) -> Vec<(u8, u32)> {
        self.directory.record_pairs(docid)
    }

    pub fn capacity(&self) -> u32 {
        self.directory.capacity()
    }

    pub fn size(&self) -> u32 {
        self.directory.size()
    }

    pub fn flushed_size(&self) -> u32 {
        self.directory.flushed_size()
    }

    pub fn memory_bytes(&self) -> usize {
        self.directory.memory_bytes()
    }

    /// Flush now, independent of the periodic task
    pub fn flush(&self) -> Result<bool> {
        self.directory.flush()
    }

    pub fn close(&self) -> Result<()> {
        if let Some(task) = self.flusher.lock().take() {
            task.stop();
        }
        self.directory.flush()?;
        Ok(())
    }
}

impl Drop for DocidFieldsIndex {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "final flush of docid fields index failed");
        }
    }
}
