//! OCR using AWS Textract.

use aws_sdk_textract::{
    Client,
    error::DisplayErrorContext,
    primitives::Blob,
    types::{Block, Document, DocumentLocation, JobStatus, S3Object},
};

use crate::{errors::PipelineError, prelude::*};

use super::{DocumentSource, JobState, JobStatusReport, ObjectLocation, OcrService, TextBlock};

/// Service name used in errors.
const SERVICE: &str = "Textract";

/// OCR service wrapping the AWS Textract text detection APIs.
#[derive(Clone, Debug)]
pub struct TextractOcrService {
    /// AWS Textract client.
    client: Client,
}

impl TextractOcrService {
    /// Create a new Textract service from an AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// Build a Textract [`S3Object`].
fn s3_object(location: &ObjectLocation) -> S3Object {
    S3Object::builder()
        .bucket(&location.bucket)
        .name(&location.key)
        .build()
}

/// Convert Textract blocks to our own type.
fn text_blocks(blocks: &[Block]) -> Vec<TextBlock> {
    blocks
        .iter()
        .filter_map(|block| {
            let block_type = block.block_type()?;
            Some(TextBlock {
                block_type: block_type.as_str().to_owned(),
                text: block.text().map(str::to_owned),
            })
        })
        .collect()
}

/// Map a Textract job status to a [`JobState`].
fn job_state(status: Option<&JobStatus>) -> JobState {
    match status {
        Some(JobStatus::Succeeded) => JobState::Succeeded,
        Some(JobStatus::PartialSuccess) => JobState::PartialSuccess,
        Some(JobStatus::Failed) => JobState::Failed,
        Some(JobStatus::InProgress) => JobState::InProgress,
        other => {
            // Keep polling. The poller's timeout bounds how long we wait.
            warn!(status = ?other, "Unrecognized Textract job status");
            JobState::InProgress
        }
    }
}

#[async_trait]
impl OcrService for TextractOcrService {
    #[instrument(level = "debug", skip_all)]
    async fn detect_sync(&self, source: &DocumentSource) -> Result<Vec<TextBlock>> {
        let document = match source {
            DocumentSource::Bytes(bytes) => {
                Document::builder().bytes(Blob::new(bytes.clone())).build()
            }
            DocumentSource::Object(location) => {
                Document::builder().s3_object(s3_object(location)).build()
            }
        };
        let response = self
            .client
            .detect_document_text()
            .document(document)
            .send()
            .await
            .map_err(|e| PipelineError::service(SERVICE, DisplayErrorContext(e)))?;
        trace!("Document response: {response:#?}");
        Ok(text_blocks(response.blocks()))
    }

    #[instrument(level = "debug", skip_all, fields(location = %location))]
    async fn start_detection(&self, location: &ObjectLocation) -> Result<String> {
        let document_location = DocumentLocation::builder()
            .s3_object(s3_object(location))
            .build();
        let response = self
            .client
            .start_document_text_detection()
            .document_location(document_location)
            .send()
            .await
            .map_err(|e| PipelineError::service(SERVICE, DisplayErrorContext(e)))?;
        let job_id = response
            .job_id()
            .ok_or(PipelineError::MissingJobId { service: SERVICE })?;
        Ok(job_id.to_owned())
    }

    #[instrument(level = "trace", skip_all, fields(job_id = %job_id))]
    async fn job_status(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<JobStatusReport> {
        let response = self
            .client
            .get_document_text_detection()
            .job_id(job_id)
            .set_next_token(next_token.map(str::to_owned))
            .send()
            .await
            .map_err(|e| PipelineError::service(SERVICE, DisplayErrorContext(e)))?;
        Ok(JobStatusReport {
            state: job_state(response.job_status()),
            status_message: response.status_message().map(str::to_owned),
            blocks: text_blocks(response.blocks()),
            next_token: response.next_token().map(str::to_owned),
        })
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_textract::types::BlockType;

    use super::*;

    #[test]
    fn blocks_keep_type_and_text() {
        let blocks = vec![
            Block::builder().block_type(BlockType::Page).build(),
            Block::builder()
                .block_type(BlockType::Line)
                .text("Patient ID: 123")
                .build(),
            Block::builder().text("no type").build(),
        ];
        let converted = text_blocks(&blocks);
        assert_eq!(
            converted,
            vec![
                TextBlock {
                    block_type: "PAGE".to_owned(),
                    text: None,
                },
                TextBlock::line("Patient ID: 123"),
            ]
        );
    }

    #[test]
    fn job_statuses_map_to_states() {
        assert_eq!(job_state(Some(&JobStatus::Succeeded)), JobState::Succeeded);
        assert_eq!(job_state(Some(&JobStatus::Failed)), JobState::Failed);
        assert_eq!(
            job_state(Some(&JobStatus::PartialSuccess)),
            JobState::PartialSuccess
        );
        assert_eq!(job_state(Some(&JobStatus::InProgress)), JobState::InProgress);
        assert_eq!(job_state(None), JobState::InProgress);
    }
}
