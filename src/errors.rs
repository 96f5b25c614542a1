//! Errors that callers may want to tell apart.
//!
//! Most code in this crate returns [`anyhow::Result`]. When a failure belongs
//! to one of the categories below, we wrap a [`PipelineError`] so that the
//! command boundary (and our tests) can recover it with
//! [`anyhow::Error::downcast_ref`].

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::prelude::*;

/// Hard failures while processing a document.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input document does not exist locally.
    #[error("source document not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// A remote service rejected our request.
    #[error("{service} call failed: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    /// The OCR service accepted a job but did not tell us its ID.
    #[error("{service} did not return a job ID")]
    MissingJobId { service: &'static str },

    /// An asynchronous OCR job finished with a failure status.
    #[error("OCR job {job_id} failed: {}", .message.as_deref().unwrap_or("no reason given"))]
    JobFailed {
        job_id: String,
        message: Option<String>,
    },

    /// We gave up waiting for an asynchronous OCR job.
    #[error("OCR job {job_id} still running after {waited:?}")]
    JobTimedOut { job_id: String, waited: Duration },

    /// Waiting for an asynchronous OCR job was cancelled.
    #[error("stopped waiting for OCR job {job_id}")]
    JobCancelled { job_id: String },
}

impl PipelineError {
    /// Build a [`PipelineError::Service`] from any displayable SDK error.
    pub fn service(service: &'static str, err: impl fmt::Display) -> Self {
        Self::Service {
            service,
            message: err.to_string(),
        }
    }
}

/// Find the [`PipelineError`] inside an [`anyhow::Error`], if any.
pub fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
}
