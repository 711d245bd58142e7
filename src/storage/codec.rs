//! Composite key codec for the embedded backend
//!
//! Key layouts (all UTF-8, compared byte-wise by the engine):
//! - direct record: `{table}:{key}`
//! - auto-keyed record: `{table}:{parent}:{YYYYMMDDhhmmss}:{counter:016x}`
//!   (`{parent}:` is omitted when no parent key is given)
//!
//! The timestamp and counter are fixed width so that byte order equals
//! time-then-counter order under prefix iteration.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::{LinkShortenerError, Result};

pub const SEPARATOR: char = ':';

/// 秒级时间戳格式（固定 14 位）
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const TIMESTAMP_WIDTH: usize = 14;
const COUNTER_WIDTH: usize = 16;

/// Table names form the key namespace, so they may not be empty or contain the separator.
pub fn validate_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(LinkShortenerError::validation("table name cannot be empty"));
    }
    if table.contains(SEPARATOR) {
        return Err(LinkShortenerError::validation(format!(
            "table name '{}' cannot contain '{}'",
            table, SEPARATOR
        )));
    }
    Ok(())
}

/// Build `{table}:{key}`.
pub fn record_key(table: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.len() + 1 + key.len());
    out.extend_from_slice(table.as_bytes());
    out.push(SEPARATOR as u8);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Prefix used for ordered scans. Identical to [`record_key`]: a scan for
/// `abc` also visits `abc1`; use [`group_key`] to restrict it to children.
pub fn scan_prefix(table: &str, key: &str) -> Vec<u8> {
    record_key(table, key)
}

/// `{parent}:` — the scan key selecting exactly the auto-keyed children of `parent`.
pub fn group_key(parent: &str) -> String {
    let mut s = String::with_capacity(parent.len() + 1);
    s.push_str(parent);
    s.push(SEPARATOR);
    s
}

/// Generate the logical id of an auto-keyed record.
pub fn auto_id(parent: &str, at: DateTime<Utc>, seq: u64) -> String {
    let ts = at.format(TIMESTAMP_FORMAT);
    if parent.is_empty() {
        format!("{}{}{:016x}", ts, SEPARATOR, seq)
    } else {
        format!("{}{}{}{}{:016x}", parent, SEPARATOR, ts, SEPARATOR, seq)
    }
}

/// Decoded parts of an auto-generated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoKeyParts {
    pub parent: Option<String>,
    pub timestamp: NaiveDateTime,
    pub counter: u64,
}

/// Parse an id produced by [`auto_id`]. Returns `None` for caller-supplied keys.
pub fn parse_auto_id(id: &str) -> Option<AutoKeyParts> {
    let mut parts = id.rsplitn(3, SEPARATOR);
    let counter_hex = parts.next()?;
    let ts = parts.next()?;
    let parent = parts.next().map(str::to_string);

    if counter_hex.len() != COUNTER_WIDTH || ts.len() != TIMESTAMP_WIDTH {
        return None;
    }
    let counter = u64::from_str_radix(counter_hex, 16).ok()?;
    let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;

    Some(AutoKeyParts {
        parent,
        timestamp,
        counter,
    })
}
