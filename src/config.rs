//! Pipeline configuration.
//!
//! Everything here has a sensible default, so an empty config file (or no
//! config file at all) reproduces the standard patient record layout and the
//! `PatientRecords` table.

use std::time::Duration;

use schemars::JsonSchema;

use crate::{io::read_json_or_toml, prelude::*};

/// Top-level configuration, built once at startup and passed to each
/// component that needs it.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Strings that give structure to the extracted text.
    pub markers: LayoutMarkers,

    /// Where parsed records are stored.
    pub store: StoreConfig,

    /// How we wait for asynchronous OCR jobs.
    pub polling: PollConfig,

    /// AWS settings not covered by the standard environment.
    pub aws: AwsConfig,
}

impl PipelineConfig {
    /// Load configuration from a JSON or TOML file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        read_json_or_toml(path)
            .await
            .with_context(|| format!("could not load configuration from {path:?}"))
    }
}

/// The semantic role a marker plays in a document layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerRole {
    /// A line starting with this marker opens a new record.
    RecordStart,
    /// A line starting with this marker is the last line of a record.
    RecordEnd,
    /// The field that uniquely identifies a record.
    Identifier,
}

/// Marker strings for a document layout.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutMarkers {
    /// Line prefix which starts a new record.
    pub record_start: String,

    /// Line prefix (after trimming) which ends a record. Only used to format
    /// text output.
    pub record_end: String,

    /// Field name holding the record's identifier.
    pub identifier: String,

    /// Separator between a field name and its value.
    pub delimiter: char,
}

impl LayoutMarkers {
    /// The marker string for a role.
    pub fn marker(&self, role: MarkerRole) -> &str {
        match role {
            MarkerRole::RecordStart => &self.record_start,
            MarkerRole::RecordEnd => &self.record_end,
            MarkerRole::Identifier => &self.identifier,
        }
    }

    /// Does `line` open a new record?
    pub fn starts_record(&self, line: &str) -> bool {
        line.starts_with(self.marker(MarkerRole::RecordStart))
    }

    /// Does `line` close a record? Leading and trailing whitespace is ignored.
    pub fn ends_record(&self, line: &str) -> bool {
        line.trim().starts_with(self.marker(MarkerRole::RecordEnd))
    }
}

impl Default for LayoutMarkers {
    fn default() -> Self {
        Self {
            record_start: "Patient Name".to_owned(),
            record_end: "Next Visit:".to_owned(),
            identifier: "Patient ID".to_owned(),
            delimiter: ':',
        }
    }
}

/// Record store settings.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// The DynamoDB table to write to.
    pub table_name: String,

    /// The table's partition key. The identifier field is renamed to this.
    pub primary_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "PatientRecords".to_owned(),
            primary_key: "PatientID".to_owned(),
        }
    }
}

/// Polling settings for asynchronous OCR jobs.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Seconds between job status checks.
    pub interval_secs: u64,

    /// Give up on a job after this many seconds. `null` waits forever.
    pub timeout_secs: Option<u64>,
}

impl PollConfig {
    /// Time between status checks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Maximum time to wait for a job, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            timeout_secs: Some(30 * 60),
        }
    }
}

/// AWS settings.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    /// Override the region from the standard AWS environment.
    pub region: Option<String>,
}
