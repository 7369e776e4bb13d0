pub mod fixed;
pub mod string;
pub mod multi_string;

use std::path::Path;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, FieldValue};

pub use fixed::FixedColumn;
pub use multi_string::MultiStringColumn;
pub use string::StringColumn;

/// Storage parameters shared by every column of a table
#[derive(Debug, Clone, Copy)]
pub struct ColumnOptions {
    pub segment_capacity: u32,
    pub string_block_size: u32,
    pub cache_size_mb: usize,
    pub max_string_len: usize,
}

impl ColumnOptions {
    pub fn from_config(config: &Config) -> Self {
        ColumnOptions {
            segment_capacity: config.segment_capacity,
            string_block_size: config.string_block_size,
            cache_size_mb: config.column_cache_size_mb,
            max_string_len: config.max_string_len,
        }
    }
}

/// A dynamic field's value store.
///
/// `Vector` has no storage: it exists so the catalog can record vector
/// fields, but every put is refused.
pub enum FieldColumn {
    Fixed(FixedColumn),
    Str(StringColumn),
    MultiStr(MultiStringColumn),
    Vector,
}

impl FieldColumn {
    /// Open (or create) the column for field `name` inside `dir`
    pub fn open(dir: &Path, name: &str, data_type: DataType, options: &ColumnOptions) -> Result<Self> {
        let column = match data_type {
            DataType::Int | DataType::Long | DataType::Float | DataType::Double => {
                FieldColumn::Fixed(FixedColumn::open(dir, name, data_type, options)?)
            }
            DataType::String => FieldColumn::Str(StringColumn::open(dir, name, options)?),
            DataType::MultiString => FieldColumn::MultiStr(MultiStringColumn::open(dir, name, options)?),
            DataType::Vector => FieldColumn::Vector,
        };
        Ok(column)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldColumn::Fixed(c) => c.data_type,
            FieldColumn::Str(_) => DataType::String,
            FieldColumn::MultiStr(_) => DataType::MultiString,
            FieldColumn::Vector => DataType::Vector,
        }
    }

    /// Check that `value` can be stored here without writing anything
    pub fn validate(&self, value: &FieldValue) -> Result<()> {
        match (self, value) {
            (FieldColumn::Vector, _) => Err(Error::new(
                ErrorKind::InvalidArgument,
                "vector values are not stored by the field index".to_string(),
            )),
            (FieldColumn::Fixed(c), v) => c.validate(v),
            (FieldColumn::Str(_), FieldValue::Str(_)) => Ok(()),
            (FieldColumn::MultiStr(_), FieldValue::MultiStr(values)) => {
                multi_string::encode(values).map(|_| ())
            }
            (column, v) => Err(Error::new(
                ErrorKind::Validation,
                format!("column stores {:?}, got {:?}", column.data_type(), v.data_type()),
            )),
        }
    }

    pub fn put(&self, value: &FieldValue) -> Result<u32> {
        match (self, value) {
            (FieldColumn::Fixed(c), v) => c.put(v),
            (FieldColumn::Str(c), FieldValue::Str(s)) => c.put(s),
            (FieldColumn::MultiStr(c), FieldValue::MultiStr(values)) => c.put(values),
            _ => {
                self.validate(value)?;
                Err(Error::new(
                    ErrorKind::Validation,
                    format!("cannot store {:?} in a {:?} column", value.data_type(), self.data_type()),
                ))
            }
        }
    }

    pub fn get(&self, value_id: u32) -> Result<FieldValue> {
        match self {
            FieldColumn::Fixed(c) => c.get(value_id),
            FieldColumn::Str(c) => c.get(value_id).map(FieldValue::Str),
            FieldColumn::MultiStr(c) => c.get(value_id).map(FieldValue::MultiStr),
            FieldColumn::Vector => Err(Error::new(
                ErrorKind::OutOfRange,
                format!("vector column holds no value {}", value_id),
            )),
        }
    }

    /// Number of values written, which is also the next value id
    pub fn current_max_id(&self) -> u32 {
        match self {
            FieldColumn::Fixed(c) => c.current_max_id(),
            FieldColumn::Str(c) => c.current_max_id(),
            FieldColumn::MultiStr(c) => c.current_max_id(),
            FieldColumn::Vector => 0,
        }
    }

    /// Whether the column keeps files on disk
    pub fn is_stored(&self) -> bool {
        !matches!(self, FieldColumn::Vector)
    }

    pub fn sync(&self) -> Result<()> {
        match self {
            FieldColumn::Fixed(c) => c.sync(),
            FieldColumn::Str(c) => c.sync(),
            FieldColumn::MultiStr(c) => c.sync(),
            FieldColumn::Vector => Ok(()),
        }
    }
}
