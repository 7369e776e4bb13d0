use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::Result;

/// Directory structure of one table
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub table_dir: PathBuf,     // Fixed-schema rows and their string arena
    pub columns_dir: PathBuf,   // One sub-directory per dynamic field column
    pub meta_dir: PathBuf,      // Checkpoint, sparse index and deleted bitmap
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let table_dir = base_dir.join("table");
        let columns_dir = base_dir.join("col_table");
        let meta_dir = base_dir.join("meta");

        fs::create_dir_all(&table_dir)?;
        fs::create_dir_all(&columns_dir)?;
        fs::create_dir_all(&meta_dir)?;

        Ok(StorageLayout {
            base_dir,
            table_dir,
            columns_dir,
            meta_dir,
        })
    }

    pub fn column_dir(&self, field_name: &str) -> PathBuf {
        self.columns_dir.join(field_name)
    }

    pub fn fields_index_path(&self) -> PathBuf {
        self.meta_dir.join("docid_fields.idx")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.meta_dir.join("table.meta")
    }

    pub fn deleted_docs_path(&self) -> PathBuf {
        self.meta_dir.join("deleted.bitmap")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }
}

/// Segment file of store `name`
pub fn segment_path(dir: &Path, name: &str, segment_no: u32) -> PathBuf {
    dir.join(format!("{}_{:06}.seg", name, segment_no))
}

/// String arena block file of store `name`
pub fn string_block_path(dir: &Path, name: &str, block_id: u32) -> PathBuf {
    dir.join("strings").join(format!("{}_{:06}.str", name, block_id))
}
