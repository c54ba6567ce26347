use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field holding the primary id of every Salesforce record.
pub const ID_FIELD: &str = "Id";

/// A record as returned by the Salesforce REST API, nested relations included.
pub type Record = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowError {
    #[error("record has no '{0}' field")]
    MissingKey(String),

    #[error("record field '{field}' must be a string, found {found}")]
    InvalidKey { field: String, found: &'static str },

    #[error("record field '{0}' is empty")]
    EmptyKey(String),
}

/// One staging row for CDF RAW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: String,
    pub columns: Record,
}

impl Row {
    pub fn new(key: impl Into<String>, columns: Record) -> Result<Self, RowError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RowError::EmptyKey("key".to_string()));
        }
        Ok(Row { key, columns })
    }

    /// Builds a row keyed by the record's `Id`, keeping the whole record as columns.
    pub fn from_record(record: Record) -> Result<Self, RowError> {
        let key = match record.get(ID_FIELD) {
            None | Some(Value::Null) => return Err(RowError::MissingKey(ID_FIELD.to_string())),
            Some(Value::String(id)) if id.is_empty() => {
                return Err(RowError::EmptyKey(ID_FIELD.to_string()));
            }
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(RowError::InvalidKey {
                    field: ID_FIELD.to_string(),
                    found: json_type_name(other),
                });
            }
        };

        Ok(Row {
            key,
            columns: record,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
