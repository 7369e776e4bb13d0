use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::Path;
use roaring::RoaringBitmap;
use crate::core::error::{Error, ErrorKind, Result};

/// Deletion state consulted when rebuilding keys and answering queries
pub trait DocLiveness: Send + Sync {
    fn is_deleted(&self, docid: u32) -> bool;
}

/// Every docid is live
pub struct AllLive;

impl DocLiveness for AllLive {
    fn is_deleted(&self, _docid: u32) -> bool {
        false
    }
}

/// Deleted docids kept in a roaring bitmap
#[derive(Debug, Default, Clone)]
pub struct DeletedDocs {
    bitmap: RoaringBitmap,
}

impl DeletedDocs {
    pub fn new() -> Self {
        DeletedDocs { bitmap: RoaringBitmap::new() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let bitmap = RoaringBitmap::deserialize_from(BufReader::new(file)).map_err(|e| {
            Error::new(ErrorKind::Corruption, format!("deleted docs bitmap: {}", e))
        })?;
        Ok(DeletedDocs { bitmap })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            self.bitmap.serialize_into(&mut w)?;
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns false if the docid was already marked
    pub fn mark(&mut self, docid: u32) -> bool {
        self.bitmap.insert(docid)
    }

    pub fn len(&self) -> u64 {
        self.bitmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    /// Forget deletions at or beyond `doc_count`
    pub fn retain_below(&mut self, doc_count: u32) {
        self.bitmap.remove_range(doc_count..);
    }
}

impl DocLiveness for DeletedDocs {
    fn is_deleted(&self, docid: u32) -> bool {
        self.bitmap.contains(docid)
    }
}
