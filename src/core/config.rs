use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,

    // Segmented value store
    pub segment_capacity: u32,                  // Rows per segment file
    pub string_block_size: u32,                 // Bytes per string arena block
    pub cache_size_mb: usize,                   // Row cache budget for the main table
    pub string_cache_size_mb: usize,            // String block cache budget for the main table
    pub column_cache_size_mb: usize,            // Per-column cache budget for dynamic fields

    // Docid -> sparse fields index
    pub block_docs_num: u32,                    // Initial directory capacity
    pub flush_interval: Duration,               // Background flush period

    // Row table
    pub max_string_len: usize,                  // Longer strings are truncated
    pub max_indexed_string_len: usize,          // Limit for strings of indexed fields
    pub strict_fields: bool,                    // Unknown fields fail the call instead of being dropped

    // Batch ingest
    pub parallel_batch_threshold: usize,        // Batches at least this large map keys in parallel
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),

            segment_capacity: 400_000,
            string_block_size: 64 * 1024 * 1024,        // 64MB
            cache_size_mb: 512,
            string_cache_size_mb: 512,
            column_cache_size_mb: 64,

            block_docs_num: 10_000,
            flush_interval: Duration::from_secs(1),

            max_string_len: 65_535,
            max_indexed_string_len: 255,
            strict_fields: false,

            parallel_batch_threshold: 100,
            workers: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: path.into(),
            ..Config::default()
        }
    }
}
