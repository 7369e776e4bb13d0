use serde::{Serialize, Deserialize};
use crate::core::types::DataType;

pub const DEFAULT_KEY_FIELD: &str = "_id";

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: DataType,
    pub indexed: bool,
}

impl FieldDefinition {
    pub fn new(name: &str, data_type: DataType, indexed: bool) -> Self {
        FieldDefinition {
            name: name.to_string(),
            data_type,
            indexed,
        }
    }
}

/// Table-creation descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub key_field: String,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        TableSchema {
            name: name.to_string(),
            fields: Vec::new(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
        }
    }

    pub fn with_key_field(mut self, name: &str) -> Self {
        self.key_field = name.to_string();
        self
    }

    pub fn add_field(mut self, name: &str, data_type: DataType, indexed: bool) -> Self {
        self.fields.push(FieldDefinition::new(name, data_type, indexed));
        self
    }

    pub fn add_int_field(self, name: &str) -> Self {
        self.add_field(name, DataType::Int, false)
    }

    pub fn add_long_field(self, name: &str) -> Self {
        self.add_field(name, DataType::Long, false)
    }

    pub fn add_float_field(self, name: &str) -> Self {
        self.add_field(name, DataType::Float, false)
    }

    pub fn add_double_field(self, name: &str) -> Self {
        self.add_field(name, DataType::Double, false)
    }

    pub fn add_string_field(self, name: &str, indexed: bool) -> Self {
        self.add_field(name, DataType::String, indexed)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}
