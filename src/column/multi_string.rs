use std::path::Path;
use crate::column::ColumnOptions;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::string_arena::StrPosition;
use crate::storage::value_store::{SegmentedStore, StoreOptions};

pub const MAX_STRINGS: usize = u8::MAX as usize;
pub const MAX_STRING_BYTES: usize = u8::MAX as usize;

/// Frame a list of strings as `[count][len_0]..[len_k-1][bytes_0]..[bytes_k-1]`
pub fn encode(values: &[String]) -> Result<Vec<u8>> {
    if values.len() > MAX_STRINGS {
        return Err(Error::new(
            ErrorKind::TooManyStrings,
            format!("{} strings in one value, at most {} supported", values.len(), MAX_STRINGS),
        ));
    }
    if let Some(long) = values.iter().find(|s| s.len() > MAX_STRING_BYTES) {
        return Err(Error::new(
            ErrorKind::StringTooLong,
            format!("string of {} bytes, at most {} supported", long.len(), MAX_STRING_BYTES),
        ));
    }

    let total: usize = values.iter().map(|s| s.len()).sum();
    let mut buf = Vec::with_capacity(1 + values.len() + total);
    buf.push(values.len() as u8);
    buf.extend(values.iter().map(|s| s.len() as u8));
    for s in values {
        buf.extend_from_slice(s.as_bytes());
    }
    Ok(buf)
}

pub fn decode(buf: &[u8]) -> Result<Vec<String>> {
    let corrupt = |what: &str| Error::new(ErrorKind::Corruption, format!("multi-string blob: {}", what));

    let (&count, rest) = buf.split_first().ok_or_else(|| corrupt("empty"))?;
    let count = count as usize;
    if rest.len() < count {
        return Err(corrupt("length table truncated"));
    }
    let (lens, mut body) = rest.split_at(count);

    let mut values = Vec::with_capacity(count);
    for &len in lens {
        let len = len as usize;
        if body.len() < len {
            return Err(corrupt("string bytes truncated"));
        }
        let (bytes, tail) = body.split_at(len);
        let s = std::str::from_utf8(bytes).map_err(|_| corrupt("invalid UTF-8"))?;
        values.push(s.to_string());
        body = tail;
    }
    Ok(values)
}

/// Multi-string column: one framed blob per value, stored through the same
/// position-triple indirection as `StringColumn`
pub struct MultiStringColumn {
    store: SegmentedStore,
}

impl MultiStringColumn {
    pub fn open(dir: &Path, name: &str, options: &ColumnOptions) -> Result<Self> {
        let store = SegmentedStore::open(
            dir,
            name,
            StoreOptions {
                segment_capacity: options.segment_capacity,
                row_width: StrPosition::SIZE,
                string_block_size: options.string_block_size,
            },
            options.cache_size_mb,
            options.cache_size_mb,
        )?;
        Ok(MultiStringColumn { store })
    }

    pub fn put(&self, values: &[String]) -> Result<u32> {
        let blob = encode(values)?;
        let (block_id, in_block_pos) = self.store.add_string(&blob)?;
        let position = StrPosition {
            block_id,
            in_block_pos,
            len: blob.len() as u32,
        };

        let mut row = [0u8; StrPosition::SIZE];
        position.encode(&mut row);
        self.store.add(&row)
    }

    pub fn get(&self, value_id: u32) -> Result<Vec<String>> {
        let row = self.store.get(value_id)?;
        let position = StrPosition::decode(&row);
        let blob = self.store.get_string(value_id, position)?;
        decode(&blob)
    }

    pub fn current_max_id(&self) -> u32 {
        self.store.size()
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}
