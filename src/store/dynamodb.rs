//! Record storage using AWS DynamoDB.

use std::collections::HashMap;

use aws_sdk_dynamodb::{Client, error::DisplayErrorContext, types::AttributeValue};

use crate::{errors::PipelineError, prelude::*, records::ParsedRecord};

use super::RecordStore;

/// Service name used in errors.
const SERVICE: &str = "DynamoDB";

/// Record store backed by a DynamoDB table.
#[derive(Clone, Debug)]
pub struct DynamoDbRecordStore {
    client: Client,
}

impl DynamoDbRecordStore {
    /// Create a new store from an AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// Convert a record to DynamoDB attributes. Every value is a string.
fn to_attributes(record: &ParsedRecord) -> HashMap<String, AttributeValue> {
    record
        .item()
        .iter()
        .map(|(key, value)| (key.clone(), AttributeValue::S(value.clone())))
        .collect()
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    #[instrument(level = "debug", skip_all, fields(table = %table))]
    async fn put_item(&self, table: &str, record: &ParsedRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attributes(record)))
            .send()
            .await
            .map_err(|e| PipelineError::service(SERVICE, DisplayErrorContext(e)))?;
        Ok(())
    }
}
