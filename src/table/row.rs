use std::collections::HashMap;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DataType;
use crate::schema::schema::FieldDefinition;
use crate::storage::string_arena::StrPosition;

/// Bytes a fixed-schema field takes in a row, `None` if the type is not
/// stored inline
pub fn inline_width(data_type: DataType) -> Option<usize> {
    match data_type {
        DataType::String => Some(StrPosition::SIZE),
        other => other.numeric_width(),
    }
}

#[derive(Debug, Clone)]
pub struct FixedField {
    pub name: String,
    pub data_type: DataType,
    pub indexed: bool,
    pub offset: usize,
    pub width: usize,
}

impl FixedField {
    pub fn slice<'a>(&self, row: &'a [u8]) -> &'a [u8] {
        &row[self.offset..self.offset + self.width]
    }

    pub fn slice_mut<'a>(&self, row: &'a mut [u8]) -> &'a mut [u8] {
        &mut row[self.offset..self.offset + self.width]
    }
}

/// Offsets of the fixed-schema fields inside a row
#[derive(Debug, Clone)]
pub struct RowLayout {
    fields: Vec<FixedField>,
    by_name: HashMap<String, usize>,
    width: usize,
}

impl RowLayout {
    pub fn new(definitions: &[FieldDefinition]) -> Result<Self> {
        let mut fields = Vec::with_capacity(definitions.len());
        let mut by_name = HashMap::with_capacity(definitions.len());
        let mut offset = 0usize;

        for def in definitions {
            let width = inline_width(def.data_type).ok_or_else(|| {
                Error::new(
                    ErrorKind::Schema,
                    format!("field {} of type {:?} cannot be stored in a row", def.name, def.data_type),
                )
            })?;
            if by_name.contains_key(&def.name) {
                return Err(Error::new(
                    ErrorKind::Schema,
                    format!("field {} declared twice", def.name),
                ));
            }

            by_name.insert(def.name.clone(), fields.len());
            fields.push(FixedField {
                name: def.name.clone(),
                data_type: def.data_type,
                indexed: def.indexed,
                offset,
                width,
            });
            offset += width;
        }

        Ok(RowLayout { fields, by_name, width: offset })
    }

    /// Total row width in bytes
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FixedField> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[FixedField] {
        &self.fields
    }

    pub fn empty_row(&self) -> Vec<u8> {
        vec![0u8; self.width]
    }
}
