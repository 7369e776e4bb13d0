use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use rayon::prelude::*;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::TableStats;
use crate::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, WordCount};
use crate::index::inverted::InvertedIndex;
use crate::schema::schema::{FieldDefinition, TableSchema};
use crate::storage::checkpoint::Checkpoint;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::table::{BatchResult, DeletedDocs, DocLiveness, Table};

/// One table directory: rows, dynamic fields, deletions and the keyword
/// retrieval index, held under an exclusive file lock.
pub struct Database {
    config: Config,

    storage: Arc<StorageLayout>,

    table: Table,
    retrieval: RwLock<InvertedIndex>,   // memory only
    deleted: RwLock<DeletedDocs>,

    closed: AtomicBool,
    _lock: FileLock,
}

impl Database {
    /// Open the table at `config.storage_path`, creating it from `schema`
    /// if the directory holds no table yet
    pub fn open_with_schema(schema: TableSchema, config: Config) -> Result<Self> {
        let storage = StorageLayout::new(config.storage_path.clone())?;
        let lock = FileLock::acquire(&storage)?;

        match Checkpoint::load(&storage)? {
            Some(checkpoint) => {
                if checkpoint.schema.name != schema.name {
                    tracing::warn!(
                        stored = %checkpoint.schema.name,
                        requested = %schema.name,
                        "table exists with another name, keeping the stored schema"
                    );
                }
                Self::start(storage, lock, config, checkpoint)
            }
            None => {
                tracing::info!(table = %schema.name, path = ?storage.base_dir, "creating table");
                Self::start(storage, lock, config, Checkpoint::new(schema, 0))
            }
        }
    }

    /// Open an existing table
    pub fn open(config: Config) -> Result<Self> {
        let storage = StorageLayout::new(config.storage_path.clone())?;
        let lock = FileLock::acquire(&storage)?;

        let checkpoint = Checkpoint::load(&storage)?.ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidState,
                format!("no table at {:?}", storage.base_dir),
            )
        })?;
        Self::start(storage, lock, config, checkpoint)
    }

    fn start(storage: StorageLayout, lock: FileLock, config: Config, checkpoint: Checkpoint) -> Result<Self> {
        let table = Table::open(&storage, checkpoint.schema, &config)?;

        let mut deleted = DeletedDocs::load(&storage.deleted_docs_path())?;
        let kept = table.load(checkpoint.doc_count, &deleted)?;
        deleted.retain_below(kept);

        Checkpoint::new(table.schema().clone(), kept).save(&storage)?;

        tracing::info!(
            table = %table.name(),
            docs = kept,
            deleted = deleted.len(),
            last_checkpoint = %checkpoint.timestamp,
            "database ready"
        );

        Ok(Database {
            config,
            storage: Arc::new(storage),
            table,
            retrieval: RwLock::new(InvertedIndex::new()),
            deleted: RwLock::new(deleted),
            closed: AtomicBool::new(false),
            _lock: lock,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Register a dynamic field
    pub fn add_field(&self, name: &str, data_type: DataType, indexed: bool) -> Result<u8> {
        self.table.add_field(name, data_type, indexed)
    }

    pub fn field_type(&self, name: &str) -> Option<DataType> {
        self.table.field_type(name)
    }

    pub fn all_fields(&self) -> Vec<FieldDefinition> {
        self.table.all_fields()
    }

    pub fn add_doc(&self, doc: Document) -> Result<DocId> {
        let mut result = self.table.batch_add(slice::from_ref(&doc));
        result.results.pop().unwrap_or_else(|| {
            Err(Error::new(ErrorKind::InvalidState, "empty batch result".to_string()))
        })
    }

    pub fn add_docs(&self, docs: &[Document]) -> BatchResult {
        self.table.batch_add(docs)
    }

    fn live_docid(&self, doc: &DocRef) -> Result<DocId> {
        let docid = match doc {
            DocRef::Key(key) => self.table.docid_of(key).ok_or_else(|| {
                Error::new(ErrorKind::DocNotFound, format!("key {} not found", key))
            })?,
            DocRef::Id(docid) => *docid,
        };
        if docid.value() >= self.table.doc_count() || self.deleted.read().is_deleted(docid.value()) {
            return Err(Error::new(ErrorKind::DocNotFound, format!("docid {} not found", docid)));
        }
        Ok(docid)
    }

    /// Feed the words of a document to the retrieval index. Documents must
    /// be indexed in docid order per word.
    pub fn add_texts(&self, doc: &DocRef, words: &[WordCount]) -> Result<DocId> {
        let docid = self.live_docid(doc)?;
        self.retrieval.write().index(docid, words)?;
        Ok(docid)
    }

    pub fn update_doc(&self, doc: &DocRef, fields: &[Field]) -> Result<()> {
        let docid = self.live_docid(doc)?;
        self.table.update(docid, fields)
    }

    /// Delete by key. Rows stay on disk; the docid is marked deleted.
    pub fn delete_docs(&self, keys: &[DocKey]) -> Vec<Result<DocId>> {
        let results: Vec<Result<DocId>> = keys.iter().map(|key| self.table.delete(key)).collect();

        let mut deleted = self.deleted.write();
        for docid in results.iter().flatten() {
            deleted.mark(docid.value());
        }
        results
    }

    pub fn get_doc(&self, doc: &DocRef, fields: &[&str]) -> Result<Document> {
        let docid = self.live_docid(doc)?;
        self.table.get_doc(&DocRef::Id(docid), fields)
    }

    pub fn get_docs(&self, docs: &[DocRef], fields: &[&str]) -> Vec<Result<Document>> {
        docs.par_iter().map(|doc| self.get_doc(doc, fields)).collect()
    }

    /// Live docids containing every word, ascending
    pub fn query(&self, words: &[&str]) -> Result<Vec<DocId>> {
        let hits = self.retrieval.read().query(words)?;
        let deleted = self.deleted.read();
        Ok(hits.into_iter().filter(|d| !deleted.is_deleted(d.value())).collect())
    }

    /// Persist rows, dynamic fields, deletions and the checkpoint
    pub fn sync(&self) -> Result<()> {
        self.table.sync()?;
        self.deleted.read().save(&self.storage.deleted_docs_path())?;
        Checkpoint::new(self.table.schema().clone(), self.table.doc_count()).save(&self.storage)?;
        tracing::debug!(table = %self.table.name(), docs = self.table.doc_count(), "synced");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.sync()?;
        self.table.close()?;
        tracing::info!(table = %self.table.name(), "closed");
        Ok(())
    }

    /// Row and string cache budgets in MiB
    pub fn cache_size(&self) -> (usize, usize) {
        self.table.cache_size()
    }

    pub fn alter_cache_size(&self, cache_size_mb: usize, string_cache_size_mb: usize) {
        self.table.alter_cache_size(cache_size_mb, string_cache_size_mb)
    }

    pub fn memory_bytes(&self) -> usize {
        self.table.memory_bytes()
    }

    pub fn stats(&self) -> TableStats {
        let fields = self.table.fields_index();
        let retrieval = self.retrieval.read();
        TableStats {
            name: self.table.name().to_string(),
            doc_count: self.table.doc_count(),
            live_keys: self.table.key_count(),
            deleted_docs: self.deleted.read().len(),
            fixed_fields: self.table.layout().len(),
            dynamic_fields: fields.fields().len(),
            row_width: self.table.layout().width(),
            directory_capacity: fields.capacity(),
            directory_size: fields.size(),
            flushed_size: fields.flushed_size(),
            term_count: retrieval.term_count(),
            indexed_docs: retrieval.doc_count(),
            memory_bytes: self.table.memory_bytes(),
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close database");
        }
    }
}
