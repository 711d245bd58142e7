//! Storage backends
//!
//! Both implementations share id assignment and update validation so the
//! contract behaves the same on either side.

pub mod embedded;
pub mod networked;

use chrono::Utc;
use serde_json::Value;

use crate::errors::{LinkShortenerError, Result};
use crate::storage::codec;
use crate::storage::counter::MonotonicCounter;
use crate::storage::query::Update;
use crate::storage::record::{Document, ID_FIELD, document_id};

/// Check the insert preconditions, write the final id into `doc` and return it.
pub(crate) fn assign_id(
    doc: &mut Document,
    key: &str,
    auto_key: bool,
    counter: &MonotonicCounter,
) -> Result<String> {
    let current = document_id(doc);

    let id = if auto_key {
        if !current.is_empty() {
            return Err(LinkShortenerError::validation(format!(
                "auto_key insert requires an empty _id, got '{}'",
                current
            )));
        }
        codec::auto_id(key, Utc::now(), counter.next())
    } else {
        if key.is_empty() {
            return Err(LinkShortenerError::validation(
                "key cannot be empty when auto_key is false",
            ));
        }
        if !current.is_empty() && current != key {
            return Err(LinkShortenerError::validation(format!(
                "_id '{}' does not match key '{}'",
                current, key
            )));
        }
        key.to_string()
    };

    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    Ok(id)
}

/// Rejections that do not depend on the stored record.
pub(crate) fn validate_update(update: &Update) -> Result<()> {
    if update.is_empty() {
        return Err(LinkShortenerError::validation("update contains no fields"));
    }
    if update.assignments().iter().any(|a| a.field() == ID_FIELD) {
        return Err(LinkShortenerError::validation("_id cannot be updated"));
    }
    Ok(())
}

pub(crate) fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(LinkShortenerError::validation("id cannot be empty"));
    }
    Ok(())
}
