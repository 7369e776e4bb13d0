use std::path::Path;
use crate::column::ColumnOptions;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::string_arena::StrPosition;
use crate::storage::value_store::{SegmentedStore, StoreOptions};

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
pub fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-string column. Each value id maps to a position triple pointing
/// into the store's string arena.
pub struct StringColumn {
    store: SegmentedStore,
    max_len: usize,
}

impl StringColumn {
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

        Ok(StringColumn {
            store,
            max_len: options.max_string_len,
        })
    }

    pub fn put(&self, value: &str) -> Result<u32> {
        let stored = truncate_to_boundary(value, self.max_len);
        if stored.len() < value.len() {
            tracing::warn!(
                column = self.store.name(),
                len = value.len(),
                max = self.max_len,
                "string longer than the column maximum, truncated"
            );
        }

        let (block_id, in_block_pos) = self.store.add_string(stored.as_bytes())?;
        let position = StrPosition {
            block_id,
            in_block_pos,
            len: stored.len() as u32,
        };

        let mut row = [0u8; StrPosition::SIZE];
        position.encode(&mut row);
        self.store.add(&row)
    }

    pub fn get(&self, value_id: u32) -> Result<String> {
        let row = self.store.get(value_id)?;
        let position = StrPosition::decode(&row);
        let bytes = self.store.get_string(value_id, position)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::new(
                ErrorKind::Corruption,
                format!("value {} of column {} is not UTF-8: {}", value_id, self.store.name(), e),
            )
        })
    }

    pub fn current_max_id(&self) -> u32 {
        self.store.size()
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}
