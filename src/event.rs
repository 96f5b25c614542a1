//! Object store notifications and our response to them.

use schemars::JsonSchema;

use crate::{ocr::ObjectLocation, prelude::*, store::PersistSummary};

/// An S3 "object created" notification. We only model the fields we use.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct S3Event {
    /// One entry per new object.
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

/// A single notification record.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

/// The S3 part of a notification record.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

/// The bucket that changed.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct S3Bucket {
    pub name: String,
}

/// The object that was created.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct S3Object {
    /// The object key, URL-encoded, with spaces encoded as `+`.
    pub key: String,
}

impl S3Event {
    /// The objects this event refers to, with keys decoded.
    pub fn locations(&self) -> Result<Vec<ObjectLocation>> {
        self.records
            .iter()
            .map(|record| {
                Ok(ObjectLocation {
                    bucket: record.s3.bucket.name.clone(),
                    key: decode_key(&record.s3.object.key)?,
                })
            })
            .collect()
    }
}

/// Decode an object key from an S3 notification.
fn decode_key(key: &str) -> Result<String> {
    let key = key.replace('+', " ");
    let decoded = urlencoding::decode(&key)
        .with_context(|| format!("object key is not valid UTF-8: {key:?}"))?;
    Ok(decoded.into_owned())
}

/// Result of handling an event.
#[derive(Debug, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    /// HTTP-style status code. Failures are reported as errors instead.
    pub status_code: u16,

    /// Human-readable summary.
    pub message: String,

    /// Records parsed from the documents.
    pub records_parsed: usize,

    /// Records inserted and skipped.
    #[serde(flatten)]
    pub summary: PersistSummary,
}

impl HandlerResponse {
    /// Build a success response.
    pub fn success(
        table_name: &str,
        sources: &[String],
        records_parsed: usize,
        summary: PersistSummary,
    ) -> Self {
        Self {
            status_code: 200,
            message: format!(
                "{} records inserted into {} from {}",
                summary.inserted,
                table_name,
                sources.join(", ")
            ),
            records_parsed,
            summary,
        }
    }
}
