//! OCR client adapter.
//!
//! OCR services offer two ways to read a document. Synchronous detection is a
//! single call that returns text blocks immediately. Asynchronous detection
//! starts a job, which we poll until it finishes (see [`poller`]). Either way,
//! callers get back the same [`TextLines`].

use std::sync::Arc;

use clap::ValueEnum;

use crate::prelude::*;

use self::poller::JobPoller;

pub mod poller;
pub mod textract;

/// The block type holding one line of text.
pub const LINE_BLOCK_TYPE: &str = "LINE";

/// Where a document lives in an object store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    /// The bucket name.
    pub bucket: String,
    /// The object key.
    pub key: String,
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// A document to OCR.
#[derive(Clone, Debug)]
pub enum DocumentSource {
    /// Raw document bytes, already loaded.
    Bytes(Vec<u8>),
    /// A document in an object store.
    Object(ObjectLocation),
}

/// How to ask the OCR service for text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DetectionMode {
    /// One blocking call. Only supports single-page documents.
    #[default]
    Sync,
    /// Start a job and poll until it finishes. Requires an object store
    /// reference.
    Async,
}

/// A typed text block returned by the OCR service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextBlock {
    /// The block type, such as `PAGE`, `LINE` or `WORD`.
    pub block_type: String,
    /// The block's text, if it has any.
    pub text: Option<String>,
}

impl TextBlock {
    /// Create a `LINE` block.
    #[cfg(test)]
    pub fn line(text: &str) -> Self {
        Self {
            block_type: LINE_BLOCK_TYPE.to_owned(),
            text: Some(text.to_owned()),
        }
    }
}

/// Status of an asynchronous OCR job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    InProgress,
    Succeeded,
    /// Some pages could not be read, but we have results for the rest.
    PartialSuccess,
    Failed,
}

/// One response to a job status query.
#[derive(Clone, Debug)]
pub struct JobStatusReport {
    /// The job's current state.
    pub state: JobState,
    /// Explanation from the service, usually only present on failure.
    pub status_message: Option<String>,
    /// Blocks in this page of results. Empty until the job is terminal.
    pub blocks: Vec<TextBlock>,
    /// Token for fetching the next page of results.
    pub next_token: Option<String>,
}

/// Interface to a remote OCR service.
#[async_trait]
pub trait OcrService: Send + Sync + 'static {
    /// Detect text in a single call.
    async fn detect_sync(&self, source: &DocumentSource) -> Result<Vec<TextBlock>>;

    /// Start an asynchronous text detection job, returning its ID.
    async fn start_detection(&self, location: &ObjectLocation) -> Result<String>;

    /// Check on an asynchronous job. Once the job is terminal, `next_token`
    /// selects which page of results to return.
    async fn job_status(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<JobStatusReport>;
}

/// Text lines extracted from a document, in the service's reading order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextLines(Vec<String>);

impl TextLines {
    /// Keep the text of `LINE` blocks, preserving order.
    pub fn from_blocks(blocks: impl IntoIterator<Item = TextBlock>) -> Self {
        Self(
            blocks
                .into_iter()
                .filter(|block| block.block_type == LINE_BLOCK_TYPE)
                .filter_map(|block| block.text)
                .collect(),
        )
    }

    /// The lines, in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Did we find any text at all?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extracts [`TextLines`] from documents using an [`OcrService`].
#[derive(Clone)]
pub struct OcrClient {
    service: Arc<dyn OcrService>,
    poller: JobPoller,
}

impl OcrClient {
    /// Create a new client.
    pub fn new(service: Arc<dyn OcrService>, poller: JobPoller) -> Self {
        Self { service, poller }
    }

    /// Extract text lines from a document.
    #[instrument(level = "debug", skip_all, fields(mode = ?mode))]
    pub async fn extract_lines(
        &self,
        source: &DocumentSource,
        mode: DetectionMode,
    ) -> Result<TextLines> {
        let blocks = match mode {
            DetectionMode::Sync => self.service.detect_sync(source).await?,
            DetectionMode::Async => {
                let DocumentSource::Object(location) = source else {
                    bail!("asynchronous detection needs a document in an object store");
                };
                let job_id = self.service.start_detection(location).await?;
                info!(%job_id, %location, "Started OCR job");
                self.poller
                    .await_completion(self.service.as_ref(), &job_id)
                    .await?
            }
        };
        let lines = TextLines::from_blocks(blocks);
        info!(count = lines.len(), "Extracted lines");
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        errors::{PipelineError, pipeline_error},
        test_util::{FakeOcrService, in_progress, succeeded},
    };

    fn client(service: Arc<FakeOcrService>) -> OcrClient {
        OcrClient::new(service, JobPoller::new(Duration::ZERO, None))
    }

    fn location() -> DocumentSource {
        DocumentSource::Object(ObjectLocation {
            bucket: "scans".to_owned(),
            key: "records.pdf".to_owned(),
        })
    }

    #[test]
    fn only_line_blocks_are_kept_in_order() {
        let blocks = vec![
            TextBlock {
                block_type: "PAGE".to_owned(),
                text: None,
            },
            TextBlock::line("Patient Name: Jane Doe"),
            TextBlock {
                block_type: "WORD".to_owned(),
                text: Some("Patient".to_owned()),
            },
            TextBlock::line("Patient ID: 123"),
        ];
        let lines = TextLines::from_blocks(blocks);
        assert_eq!(
            lines.as_slice(),
            ["Patient Name: Jane Doe", "Patient ID: 123"]
        );
    }

    #[tokio::test]
    async fn sync_mode_makes_one_call() -> Result<()> {
        let service = Arc::new(FakeOcrService::with_sync_blocks(vec![
            TextBlock::line("b"),
            TextBlock::line("a"),
        ]));
        let lines = client(service.clone())
            .extract_lines(&DocumentSource::Bytes(b"%PDF".to_vec()), DetectionMode::Sync)
            .await?;
        assert_eq!(lines.as_slice(), ["b", "a"]);
        assert_eq!(service.sync_calls(), 1);
        assert_eq!(service.status_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn async_mode_polls_until_done() -> Result<()> {
        let service = Arc::new(FakeOcrService::with_job(vec![
            in_progress(),
            in_progress(),
            succeeded(vec![TextBlock::line("Patient ID: 9")], None),
        ]));
        let lines = client(service.clone())
            .extract_lines(&location(), DetectionMode::Async)
            .await?;
        assert_eq!(lines.as_slice(), ["Patient ID: 9"]);
        assert_eq!(service.status_calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn async_mode_rejects_raw_bytes() {
        let service = Arc::new(FakeOcrService::with_job(vec![]));
        let result = client(service.clone())
            .extract_lines(&DocumentSource::Bytes(vec![1, 2, 3]), DetectionMode::Async)
            .await;
        assert!(result.is_err());
        assert_eq!(service.start_calls(), 0);
    }

    #[tokio::test]
    async fn rejected_submission_is_a_service_error() {
        let service = Arc::new(FakeOcrService::rejecting_submissions());
        let err = client(service)
            .extract_lines(&location(), DetectionMode::Async)
            .await
            .unwrap_err();
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::Service { .. })
        ));
    }
}
