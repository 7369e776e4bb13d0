use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Segment file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,     // Format version
    pub row_width: u32,   // Bytes per row
    pub capacity: u32,    // Rows per segment
}

impl SegmentHeader {
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 12; // Fixed header size

    pub fn new(row_width: u32, capacity: u32) -> Self {
        SegmentHeader {
            version: Self::VERSION,
            row_width,
            capacity,
        }
    }
}

/// One capacity-bounded file of fixed-width rows
pub struct Segment {
    pub segment_no: u32,
    pub path: PathBuf,
    pub header: SegmentHeader,
    file: Mutex<File>,
    rows: Mutex<u32>,
}

impl Segment {
    pub fn create(path: &Path, segment_no: u32, header: SegmentHeader) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        let data = bincode::serialize(&header)?;
        file.write_all(&data)?;

        Ok(Segment {
            segment_no,
            path: path.to_path_buf(),
            header,
            file: Mutex::new(file),
            rows: Mutex::new(0),
        })
    }

    pub fn open(path: &Path, segment_no: u32, expected: SegmentHeader) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header_buf = vec![0u8; SegmentHeader::SIZE];
        file.read_exact(&mut header_buf)?;
        let header: SegmentHeader = bincode::deserialize(&header_buf)?;

        if header.version != SegmentHeader::VERSION {
            return Err(Error::new(
                ErrorKind::Corruption,
                format!("Incompatible segment version {} in {:?}", header.version, path),
            ));
        }
        if header.row_width != expected.row_width || header.capacity != expected.capacity {
            return Err(Error::new(
                ErrorKind::Corruption,
                format!(
                    "Segment {:?} has width {} / capacity {}, expected {} / {}",
                    path, header.row_width, header.capacity, expected.row_width, expected.capacity
                ),
            ));
        }

        // A torn trailing row is dropped
        let data_len = file.metadata()?.len().saturating_sub(SegmentHeader::SIZE as u64);
        let rows = (data_len / header.row_width as u64).min(header.capacity as u64) as u32;
        file.set_len(SegmentHeader::SIZE as u64 + rows as u64 * header.row_width as u64)?;

        Ok(Segment {
            segment_no,
            path: path.to_path_buf(),
            header,
            file: Mutex::new(file),
            rows: Mutex::new(rows),
        })
    }

    pub fn rows(&self) -> u32 {
        *self.rows.lock()
    }

    pub fn is_full(&self) -> bool {
        self.rows() >= self.header.capacity
    }

    fn offset(&self, pos: u32) -> u64 {
        SegmentHeader::SIZE as u64 + pos as u64 * self.header.row_width as u64
    }

    /// Append one row, returning its position inside the segment
    pub fn append(&self, row: &[u8]) -> Result<u32> {
        let mut rows = self.rows.lock();
        if *rows >= self.header.capacity {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("Segment {} is full", self.segment_no),
            ));
        }

        let offset = self.offset(*rows);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(row)?;

        let pos = *rows;
        *rows += 1;
        Ok(pos)
    }

    pub fn read(&self, pos: u32) -> Result<Vec<u8>> {
        let mut row = vec![0u8; self.header.row_width as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(pos)))?;
        file.read_exact(&mut row)?;
        Ok(row)
    }

    /// Whole data region, used to fill the segment cache
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let rows = self.rows();
        let mut data = vec![0u8; rows as usize * self.header.row_width as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(SegmentHeader::SIZE as u64))?;
        file.read_exact(&mut data)?;
        Ok(data)
    }

    pub fn write(&self, pos: u32, row: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset(pos)))?;
        file.write_all(row)?;
        Ok(())
    }

    pub fn truncate(&self, rows: u32) -> Result<()> {
        let mut current = self.rows.lock();
        let file = self.file.lock();
        file.set_len(self.offset(rows))?;
        *current = rows;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}
