//! Turning extracted text lines into records.
//!
//! OCR gives us a flat list of lines like `Patient Name: Jane Doe`. Records
//! have no explicit separators, so we start a new record whenever we see the
//! record-start marker, and treat every other `key: value` line as a field of
//! the current record.

use std::collections::BTreeMap;

use schemars::JsonSchema;

use crate::{config::LayoutMarkers, prelude::*};

/// Field names and values parsed from one record, before validation.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, String>,
}

impl RawRecord {
    /// Set a field, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Does this record have no fields?
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names, in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Splits a sequence of lines into [`RawRecord`]s.
#[derive(Clone, Copy, Debug)]
pub struct RecordSegmenter<'a> {
    markers: &'a LayoutMarkers,
}

impl<'a> RecordSegmenter<'a> {
    /// Create a segmenter for a document layout.
    pub fn new(markers: &'a LayoutMarkers) -> Self {
        Self { markers }
    }

    /// Split `line` into a trimmed key and value at the first delimiter.
    pub fn split_field<'l>(&self, line: &'l str) -> Option<(&'l str, &'l str)> {
        line.split_once(self.markers.delimiter)
            .map(|(key, value)| (key.trim(), value.trim()))
    }

    /// Partition `lines` into records.
    ///
    /// Lines without a delimiter are ignored, unless they start a new record.
    /// Empty records are never returned.
    pub fn segment<S: AsRef<str>>(&self, lines: &[S]) -> Vec<RawRecord> {
        let mut records = Vec::new();
        let mut current = RawRecord::default();
        for line in lines {
            let line = line.as_ref();
            if self.markers.starts_record(line) && !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            if let Some((key, value)) = self.split_field(line) {
                current.insert(key, value);
            }
        }
        if !current.is_empty() {
            records.push(current);
        }
        debug!(count = records.len(), "Segmented records");
        records
    }
}

/// A record with a valid identifier, ready to store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedRecord {
    /// The record's identifier.
    id: String,

    /// All fields to store, with the identifier under the primary key.
    item: BTreeMap<String, String>,
}

impl ParsedRecord {
    /// Validate `raw`, moving `id_field` to `primary_key`.
    ///
    /// Returns `None` if the identifier is missing or blank. Fields with empty
    /// names are dropped, since stores generally refuse them.
    pub fn from_raw(raw: &RawRecord, id_field: &str, primary_key: &str) -> Option<Self> {
        let id = raw.get(id_field).filter(|id| !id.trim().is_empty())?;
        let mut item = BTreeMap::new();
        for (key, value) in &raw.fields {
            if key == id_field {
                continue;
            }
            if key.is_empty() {
                warn!("Dropping field with an empty name");
                continue;
            }
            item.insert(key.clone(), value.clone());
        }
        item.insert(primary_key.to_owned(), id.to_owned());
        Some(Self {
            id: id.to_owned(),
            item,
        })
    }

    /// The record's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The item to store.
    pub fn item(&self) -> &BTreeMap<String, String> {
        &self.item
    }
}
