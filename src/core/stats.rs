use serde::{Serialize, Deserialize};

/// Table statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    pub name: String,

    // Documents
    pub doc_count: u32,
    pub live_keys: usize,
    pub deleted_docs: u64,

    // Schema
    pub fixed_fields: usize,
    pub dynamic_fields: usize,
    pub row_width: usize,

    // Docid fields index
    pub directory_capacity: u32,
    pub directory_size: u32,
    pub flushed_size: u32,

    // Retrieval
    pub term_count: usize,
    pub indexed_docs: usize,

    // Memory
    pub memory_bytes: usize,
}
