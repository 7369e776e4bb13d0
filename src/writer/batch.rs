use crate::core::database::Database;
use crate::core::error::Result;
use crate::core::types::{DocId, Document};
use crate::table::BatchResult;

/// Batch writer for bulk ingest
pub struct BatchWriter<'a> {
    pub database: &'a Database,
    pub buffer: Vec<Document>,
    pub batch_size: usize,
    results: Vec<Result<DocId>>,
}

impl<'a> BatchWriter<'a> {
    pub fn new(database: &'a Database, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BatchWriter {
            database,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            results: Vec::new(),
        }
    }

    pub fn add(&mut self, doc: Document) {
        self.buffer.push(doc);

        if self.buffer.len() >= self.batch_size {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = self.database.add_docs(&self.buffer);
        if batch.failure_count() > 0 {
            tracing::warn!(
                failed = batch.failure_count(),
                submitted = self.buffer.len(),
                "batch had rejected documents"
            );
        }
        self.results.extend(batch.results);
        self.buffer.clear();
    }

    /// Submit what is left and return one result per document, in the
    /// order they were added
    pub fn finish(mut self) -> BatchResult {
        self.flush();
        BatchResult {
            results: self.results,
        }
    }
}
