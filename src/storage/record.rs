//! Record mapping shared by both backends
//!
//! A record type is mapped through serde (field rename or field name) and
//! describes its stored field names once, through an enum implementing
//! [`RecordField`]. Filters, updates and index specs are typed by that enum,
//! so a misspelled field name is a compile error rather than a runtime miss.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::{LinkShortenerError, Result};

/// Name of the primary identifier field, for every table and both backends.
pub const ID_FIELD: &str = "_id";

/// Decoded, backend-neutral form of a record.
pub type Document = serde_json::Map<String, Value>;

/// Field descriptor of a record type: maps a variant to its stored name.
pub trait RecordField: Copy + std::fmt::Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;
}

/// Untyped field names, used by the adapters once a typed query is erased.
impl RecordField for &'static str {
    fn name(self) -> &'static str {
        self
    }
}

/// A storable record. Its identifier is always serialized as [`ID_FIELD`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Field: RecordField;
}

/// Serialize a record into its document form.
pub fn to_document<R: Record>(record: &R) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(LinkShortenerError::encoding(format!(
            "record must serialize to an object, got {}",
            json_type_name(&other)
        ))),
    }
}

pub fn from_document<R: Record>(doc: Document) -> Result<R> {
    serde_json::from_value(Value::Object(doc)).map_err(Into::into)
}

/// The `_id` of a document as a string; missing, null and empty all read as `""`.
pub fn document_id(doc: &Document) -> String {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
