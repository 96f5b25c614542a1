//! In-memory stand-ins for remote services, for unit tests.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

use crate::{
    errors::PipelineError,
    ocr::{DocumentSource, JobState, JobStatusReport, ObjectLocation, OcrService, TextBlock},
    prelude::*,
    records::ParsedRecord,
    store::RecordStore,
};

/// A job status report for a running job.
pub fn in_progress() -> JobStatusReport {
    JobStatusReport {
        state: JobState::InProgress,
        status_message: None,
        blocks: vec![],
        next_token: None,
    }
}

/// A job status report for a finished job.
pub fn succeeded(blocks: Vec<TextBlock>, next_token: Option<&str>) -> JobStatusReport {
    JobStatusReport {
        state: JobState::Succeeded,
        status_message: None,
        blocks,
        next_token: next_token.map(str::to_owned),
    }
}

/// A job status report for a failed job.
pub fn failed(message: &str) -> JobStatusReport {
    JobStatusReport {
        state: JobState::Failed,
        status_message: Some(message.to_owned()),
        blocks: vec![],
        next_token: None,
    }
}

/// Call counters and scripted responses for [`FakeOcrService`].
#[derive(Default)]
struct FakeOcrState {
    sync_calls: usize,
    start_calls: usize,
    page_tokens: Vec<Option<String>>,
    reports: VecDeque<JobStatusReport>,
    documents: VecDeque<Vec<TextBlock>>,
}

/// A scripted [`OcrService`].
#[derive(Default)]
pub struct FakeOcrService {
    sync_blocks: Vec<TextBlock>,
    reject_submissions: bool,
    state: Mutex<FakeOcrState>,
}

impl FakeOcrService {
    /// Synchronous detection returns `blocks`.
    pub fn with_sync_blocks(blocks: Vec<TextBlock>) -> Self {
        Self {
            sync_blocks: blocks,
            ..Self::default()
        }
    }

    /// Each synchronous detection returns the next of `documents`.
    pub fn with_sync_documents(documents: Vec<Vec<TextBlock>>) -> Self {
        let service = Self::default();
        service.lock().documents = documents.into();
        service
    }

    /// Job status queries return `reports`, in order.
    pub fn with_job(reports: Vec<JobStatusReport>) -> Self {
        let service = Self::default();
        service.lock().reports = reports.into();
        service
    }

    /// Every job submission fails.
    pub fn rejecting_submissions() -> Self {
        Self {
            reject_submissions: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeOcrState> {
        self.state.lock().expect("lock poisoned")
    }

    pub fn sync_calls(&self) -> usize {
        self.lock().sync_calls
    }

    pub fn start_calls(&self) -> usize {
        self.lock().start_calls
    }

    pub fn status_calls(&self) -> usize {
        self.lock().page_tokens.len()
    }

    /// The `next_token` passed to each status query.
    pub fn page_tokens(&self) -> Vec<Option<String>> {
        self.lock().page_tokens.clone()
    }
}

#[async_trait]
impl OcrService for FakeOcrService {
    async fn detect_sync(&self, _source: &DocumentSource) -> Result<Vec<TextBlock>> {
        let mut state = self.lock();
        state.sync_calls += 1;
        Ok(state
            .documents
            .pop_front()
            .unwrap_or_else(|| self.sync_blocks.clone()))
    }

    async fn start_detection(&self, location: &ObjectLocation) -> Result<String> {
        self.lock().start_calls += 1;
        if self.reject_submissions {
            return Err(PipelineError::service(
                "FakeOcr",
                format!("invalid S3 object: {location}"),
            )
            .into());
        }
        Ok("fake-job".to_owned())
    }

    async fn job_status(
        &self,
        _job_id: &str,
        next_token: Option<&str>,
    ) -> Result<JobStatusReport> {
        let mut state = self.lock();
        state.page_tokens.push(next_token.map(str::to_owned));
        state
            .reports
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted job reports"))
    }
}

/// A [`RecordStore`] that keeps items in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    /// Fail writes of the record with this ID.
    fail_on_id: Option<String>,
    items: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl MemoryRecordStore {
    /// A store that rejects the record with ID `id`.
    pub fn failing_on(id: &str) -> Self {
        Self {
            fail_on_id: Some(id.to_owned()),
            ..Self::default()
        }
    }

    /// Everything written so far, as `(table, item)` pairs.
    pub fn items(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.items.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put_item(&self, table: &str, record: &ParsedRecord) -> Result<()> {
        if self.fail_on_id.as_deref() == Some(record.id()) {
            return Err(PipelineError::service("MemoryStore", "throttled").into());
        }
        self.items
            .lock()
            .expect("lock poisoned")
            .push((table.to_owned(), record.item().clone()));
        Ok(())
    }
}
