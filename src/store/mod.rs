//! Persisting parsed records.

use std::sync::Arc;

use schemars::JsonSchema;

use crate::{
    config::{LayoutMarkers, MarkerRole, StoreConfig},
    prelude::*,
    records::{ParsedRecord, RawRecord},
};

pub mod dynamodb;

/// Interface to a key-value record store.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Write a single item to `table`, replacing any item with the same key.
    async fn put_item(&self, table: &str, record: &ParsedRecord) -> Result<()>;
}

/// What happened when we persisted a batch of records.
#[derive(Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSummary {
    /// Records written to the store.
    pub inserted: usize,
    /// Records skipped because they had no identifier.
    pub skipped: usize,
}

impl std::ops::AddAssign for PersistSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
    }
}

/// Validates records and writes them to a [`RecordStore`].
#[derive(Clone)]
pub struct RecordStoreWriter {
    store: Arc<dyn RecordStore>,
    table_name: String,
    primary_key: String,
    id_field: String,
}

impl RecordStoreWriter {
    /// Create a writer for the configured table.
    pub fn new(
        store: Arc<dyn RecordStore>,
        store_config: &StoreConfig,
        markers: &LayoutMarkers,
    ) -> Self {
        Self {
            store,
            table_name: store_config.table_name.clone(),
            primary_key: store_config.primary_key.clone(),
            id_field: markers.marker(MarkerRole::Identifier).to_owned(),
        }
    }

    /// The table we write to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Write every record that has an identifier.
    ///
    /// Records are written one at a time. If a write fails, we stop and
    /// return the error; records already written stay written.
    #[instrument(level = "debug", skip_all, fields(table = %self.table_name))]
    pub async fn persist(&self, records: &[RawRecord]) -> Result<PersistSummary> {
        let mut summary = PersistSummary::default();
        for (idx, raw) in records.iter().enumerate() {
            let Some(record) = ParsedRecord::from_raw(raw, &self.id_field, &self.primary_key)
            else {
                let fields = raw.field_names().collect::<Vec<_>>();
                warn!(record = idx, ?fields, "Skipped record without {:?}", self.id_field);
                summary.skipped += 1;
                continue;
            };
            trace!(record = idx, id = record.id(), item = ?record.item(), "Storing record");
            self.store
                .put_item(&self.table_name, &record)
                .await
                .with_context(|| {
                    format!("could not store record {idx} in {:?}", self.table_name)
                })?;
            summary.inserted += 1;
        }
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Persisted records"
        );
        Ok(summary)
    }
}
