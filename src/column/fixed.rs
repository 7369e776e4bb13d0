use std::path::Path;
use crate::column::ColumnOptions;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, FieldValue};
use crate::storage::value_store::{SegmentedStore, StoreOptions};

/// Fixed-width numeric column: raw native-endian values at a fixed stride
pub struct FixedColumn {
    pub data_type: DataType,
    store: SegmentedStore,
}

impl FixedColumn {
    pub fn open(dir: &Path, name: &str, data_type: DataType, options: &ColumnOptions) -> Result<Self> {
        let width = data_type.numeric_width().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("Field {} of type {:?} cannot use a fixed-width column", name, data_type),
            )
        })?;

        let store = SegmentedStore::open(
            dir,
            name,
            StoreOptions {
                segment_capacity: options.segment_capacity,
                row_width: width,
                string_block_size: options.string_block_size,
            },
            options.cache_size_mb,
            0,
        )?;

        Ok(FixedColumn { data_type, store })
    }

    pub fn validate(&self, value: &FieldValue) -> Result<()> {
        if value.data_type() != self.data_type {
            return Err(Error::new(
                ErrorKind::Validation,
                format!(
                    "Column {} stores {:?}, got {:?}",
                    self.store.name(), self.data_type, value.data_type()
                ),
            ));
        }
        Ok(())
    }

    pub fn put(&self, value: &FieldValue) -> Result<u32> {
        self.validate(value)?;
        let bytes = value.numeric_bytes().ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument, "numeric value expected".to_string())
        })?;
        self.store.add(&bytes)
    }

    pub fn get(&self, value_id: u32) -> Result<FieldValue> {
        let raw = self.store.get(value_id)?;
        FieldValue::from_numeric_bytes(self.data_type, &raw)
    }

    pub fn current_max_id(&self) -> u32 {
        self.store.size()
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }
}
