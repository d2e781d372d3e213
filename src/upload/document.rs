use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Typed value stored in a remote document
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
    GeoPoint { latitude: f64, longitude: f64 },
    Array(Vec<Field>),
    Map(BTreeMap<String, Field>),
}

pub type Document = BTreeMap<String, Field>;

impl Field {
    pub fn floats(values: Vec<f64>) -> Field {
        Field::Array(values.into_iter().map(Field::Float).collect())
    }

    pub fn bools(values: Vec<bool>) -> Field {
        Field::Array(values.into_iter().map(Field::Bool).collect())
    }

    pub fn timestamps(values: Vec<NaiveDateTime>) -> Field {
        Field::Array(values.into_iter().map(Field::Timestamp).collect())
    }

    pub fn as_array(&self) -> Option<&[Field]> {
        match self {
            Field::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Str(value.to_string())
    }
}

impl From<u32> for Field {
    fn from(value: u32) -> Self {
        Field::Int(value as i64)
    }
}
