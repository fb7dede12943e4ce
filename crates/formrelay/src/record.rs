//! Core record types for formrelay.
//!
//! A [`Record`] is one decoded form submission. Submissions arrive as raw
//! `application/x-www-form-urlencoded` bytes relayed from the HTTP front end
//! and are decoded here before being written to the store.

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Format of the keys in the record store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One decoded form submission: field name to a single value.
///
/// Fields keep the order in which they first appeared in the submission.
/// When a field is repeated only its first value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a relayed datagram payload.
    ///
    /// The payload must be UTF-8. The whole payload is percent-decoded first
    /// (with `+` as space) and the result is then parsed as a query string,
    /// so an encoded `%26` also separates fields. Segments without `=` and
    /// fields with an empty value are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decode`] if the payload is not valid UTF-8.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)?;
        Ok(Self::parse_query(&unquote_plus(text)))
    }

    /// Parse query-string syntax into a record.
    #[must_use]
    pub fn parse_query(query: &str) -> Self {
        let mut record = Self::new();
        for segment in query.split('&') {
            let Some((name, value)) = segment.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            record.insert_first(unquote_plus(name), unquote_plus(value));
        }
        record
    }

    /// Insert a field unless it is already present.
    ///
    /// Returns `true` if the value was stored.
    pub fn insert_first(&mut self, name: String, value: String) -> bool {
        if self.fields.contains_key(&name) {
            return false;
        }
        self.fields.insert(name, value);
        true
    }

    /// Get the value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Number of fields in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in submission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert_first(name.into(), value.into());
        }
        record
    }
}

/// Format a receipt time as a store key.
#[must_use]
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// The store key for a record received now.
#[must_use]
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

/// Percent-decode with `+` as space. Invalid UTF-8 after decoding is
/// replaced rather than rejected.
fn unquote_plus(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
