use serde::{Serialize, Deserialize};
use std::fmt;
use crate::core::error::{Error, ErrorKind, Result};

/// Dense, zero-based internal document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Field data types. The discriminants are the on-disk type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int = 0,
    Long = 1,
    Float = 2,
    Double = 3,
    String = 4,
    Vector = 5,
    MultiString = 6,
}

impl DataType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DataType::Int),
            1 => Some(DataType::Long),
            2 => Some(DataType::Float),
            3 => Some(DataType::Double),
            4 => Some(DataType::String),
            5 => Some(DataType::Vector),
            6 => Some(DataType::MultiString),
            _ => None,
        }
    }

    /// Width in bytes of a numeric value, `None` for variable-length types
    pub fn numeric_width(self) -> Option<usize> {
        match self {
            DataType::Int | DataType::Float => Some(4),
            DataType::Long | DataType::Double => Some(8),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_width().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    MultiStr(Vec<String>),
    Vector(Vec<f32>),
}

impl FieldValue {
    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::Int(_) => DataType::Int,
            FieldValue::Long(_) => DataType::Long,
            FieldValue::Float(_) => DataType::Float,
            FieldValue::Double(_) => DataType::Double,
            FieldValue::Str(_) => DataType::String,
            FieldValue::MultiStr(_) => DataType::MultiString,
            FieldValue::Vector(_) => DataType::Vector,
        }
    }

    /// Raw native-endian bytes of a numeric value
    pub fn numeric_bytes(&self) -> Option<Vec<u8>> {
        match self {
            FieldValue::Int(v) => Some(v.to_ne_bytes().to_vec()),
            FieldValue::Long(v) => Some(v.to_ne_bytes().to_vec()),
            FieldValue::Float(v) => Some(v.to_ne_bytes().to_vec()),
            FieldValue::Double(v) => Some(v.to_ne_bytes().to_vec()),
            _ => None,
        }
    }

    /// Reinterpret raw native-endian bytes as a value of `data_type`
    pub fn from_numeric_bytes(data_type: DataType, raw: &[u8]) -> Result<Self> {
        let width = data_type.numeric_width().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("{:?} is not a numeric type", data_type),
            )
        })?;
        if raw.len() < width {
            return Err(Error::new(
                ErrorKind::Corruption,
                format!("expected {} bytes for {:?}, got {}", width, data_type, raw.len()),
            ));
        }

        let value = match data_type {
            DataType::Int => FieldValue::Int(i32::from_ne_bytes(fixed::<4>(raw))),
            DataType::Long => FieldValue::Long(i64::from_ne_bytes(fixed::<8>(raw))),
            DataType::Float => FieldValue::Float(f32::from_ne_bytes(fixed::<4>(raw))),
            _ => FieldValue::Double(f64::from_ne_bytes(fixed::<8>(raw))),
        };
        Ok(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn fixed<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}

/// Six fractional digits, the same rendering as C's `std::to_string`
fn fixed_six(v: f64) -> String {
    if v.is_nan() {
        if v.is_sign_negative() { "-nan".to_string() } else { "nan".to_string() }
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{:.6}", v)
    }
}

/// Canonical textual form of a value
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
            FieldValue::Float(v) => f.write_str(&fixed_six(*v as f64)),
            FieldValue::Double(v) => f.write_str(&fixed_six(*v)),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::MultiStr(values) => f.write_str(&values.join(",")),
            FieldValue::Vector(values) => {
                let parts: Vec<String> = values.iter().map(|v| fixed_six(*v as f64)).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: &str, value: FieldValue) -> Self {
        Field {
            name: name.to_string(),
            value,
        }
    }

    pub fn int(name: &str, v: i32) -> Self {
        Self::new(name, FieldValue::Int(v))
    }

    pub fn long(name: &str, v: i64) -> Self {
        Self::new(name, FieldValue::Long(v))
    }

    pub fn float(name: &str, v: f32) -> Self {
        Self::new(name, FieldValue::Float(v))
    }

    pub fn double(name: &str, v: f64) -> Self {
        Self::new(name, FieldValue::Double(v))
    }

    pub fn string(name: &str, v: &str) -> Self {
        Self::new(name, FieldValue::Str(v.to_string()))
    }

    pub fn multi_string(name: &str, values: &[&str]) -> Self {
        Self::new(
            name,
            FieldValue::MultiStr(values.iter().map(|s| s.to_string()).collect()),
        )
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}

/// External document key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKey {
    Str(String),
    Long(i64),
}

impl DocKey {
    pub fn is_empty(&self) -> bool {
        matches!(self, DocKey::Str(s) if s.is_empty())
    }
}

impl From<&str> for DocKey {
    fn from(key: &str) -> Self {
        DocKey::Str(key.to_string())
    }
}

impl From<String> for DocKey {
    fn from(key: String) -> Self {
        DocKey::Str(key)
    }
}

impl From<i64> for DocKey {
    fn from(key: i64) -> Self {
        DocKey::Long(key)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DocKey::Str(s) => f.write_str(s),
            DocKey::Long(v) => write!(f, "{}", v),
        }
    }
}

/// Document reference for lookups
#[derive(Debug, Clone, PartialEq)]
pub enum DocRef {
    Key(DocKey),
    Id(DocId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: DocKey,
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new(key: impl Into<DocKey>) -> Self {
        Document {
            key: key.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// Occurrences of one word in a document, fed to the retrieval index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: u32,
}

impl WordCount {
    pub fn new(word: &str, count: u32) -> Self {
        WordCount {
            word: word.to_string(),
            count,
        }
    }
}
