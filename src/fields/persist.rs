use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind as IoErrorKind, Read, Write};
use std::path::Path;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DataType;

/// capacity + flushed_size + field_count
const HEADER_LEN: u64 = 9;

/// Catalog entry of a dynamic field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: String,
    pub field_id: u8,
    pub data_type: DataType,
    pub indexed: bool,
}

/// Everything the directory-index file holds. Absent records are stored
/// with length zero.
#[derive(Debug, Default)]
pub struct IndexImage {
    pub capacity: u32,
    pub fields: Vec<FieldMeta>,
    pub records: Vec<Option<Box<[u8]>>>,
}

impl IndexImage {
    pub fn flushed_size(&self) -> u32 {
        self.records.len() as u32
    }
}

/// Write `image` to a temporary sibling of `path`, then rename it into place
pub fn dump(path: &Path, image: &IndexImage) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut w = BufWriter::new(File::create(&tmp)?);

        w.write_u32::<LittleEndian>(image.capacity)?;
        w.write_u32::<LittleEndian>(image.flushed_size())?;
        w.write_u8(image.fields.len() as u8)?;
        for meta in &image.fields {
            w.write_u8(meta.name.len() as u8)?;
            w.write_all(meta.name.as_bytes())?;
            w.write_u8(meta.field_id)?;
            w.write_u8(meta.data_type.code())?;
            w.write_u8(meta.indexed as u8)?;
        }

        for record in &image.records {
            let len = record.as_ref().map_or(0, |r| r.len());
            w.write_u32::<LittleEndian>(len as u32)?;
        }
        for record in image.records.iter().flatten() {
            w.write_all(record)?;
        }

        w.flush()?;
        w.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn truncated(what: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| {
        if e.kind() == IoErrorKind::UnexpectedEof {
            Error::new(ErrorKind::Corruption, format!("directory index truncated in {}", what))
        } else {
            Error::from(e)
        }
    }
}

/// Read a directory-index file. `Ok(None)` when no file exists yet.
pub fn load(path: &Path) -> Result<Option<IndexImage>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file_len = file.metadata()?.len();
    let mut r = BufReader::new(file);

    let capacity = r.read_u32::<LittleEndian>().map_err(truncated("header"))?;
    let flushed_size = r.read_u32::<LittleEndian>().map_err(truncated("header"))?;
    let field_count = r.read_u8().map_err(truncated("header"))?;
    let mut consumed = HEADER_LEN;

    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let name_len = r.read_u8().map_err(truncated("catalog"))?;
        consumed += 4 + name_len as u64;
        let mut name = vec![0u8; name_len as usize];
        r.read_exact(&mut name).map_err(truncated("catalog"))?;
        let field_id = r.read_u8().map_err(truncated("catalog"))?;
        let code = r.read_u8().map_err(truncated("catalog"))?;
        let indexed = r.read_u8().map_err(truncated("catalog"))? != 0;

        let name = String::from_utf8(name).map_err(|_| {
            Error::new(ErrorKind::Corruption, format!("field {} has a non UTF-8 name", field_id))
        })?;
        let data_type = DataType::from_code(code).ok_or_else(|| {
            Error::new(ErrorKind::Corruption, format!("field {} has unknown type code {}", name, code))
        })?;
        fields.push(FieldMeta { name, field_id, data_type, indexed });
    }

    // sizes come from disk, check them against the file before allocating
    let remaining = file_len.saturating_sub(consumed);
    let lengths_len = flushed_size as u64 * 4;
    if lengths_len > remaining {
        return Err(Error::new(
            ErrorKind::Corruption,
            format!("directory index claims {} records but holds {} bytes after the catalog", flushed_size, remaining),
        ));
    }

    let mut lengths = Vec::with_capacity(flushed_size as usize);
    for _ in 0..flushed_size {
        lengths.push(r.read_u32::<LittleEndian>().map_err(truncated("record lengths"))?);
    }

    let record_bytes: u64 = lengths.iter().map(|&len| len as u64).sum();
    if record_bytes > remaining - lengths_len {
        return Err(Error::new(
            ErrorKind::Corruption,
            format!(
                "directory index records need {} bytes, file has {}",
                record_bytes,
                remaining - lengths_len
            ),
        ));
    }

    let mut records = Vec::with_capacity(flushed_size as usize);
    for len in lengths {
        if len == 0 {
            records.push(None);
            continue;
        }
        let mut buf = vec![0u8; len as usize];
        r.read_exact(&mut buf).map_err(truncated("records"))?;
        records.push(Some(buf.into_boxed_slice()));
    }

    Ok(Some(IndexImage { capacity, fields, records }))
}
