//! Waiting for asynchronous OCR jobs.
//!
//! The protocol is simple: ask for the job's status, and if it's still running,
//! sleep for a fixed interval and ask again. A job that never finishes would
//! keep us here forever, so we also support an overall timeout and a
//! [`CancelSignal`] that the caller can trigger (for example, on Ctrl-C).

use std::time::Duration;

use tokio::{sync::watch, time::Instant};

use crate::{errors::PipelineError, prelude::*};

use super::{JobState, OcrService, TextBlock};

/// Create a linked [`CancelHandle`] and [`CancelSignal`].
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// The sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Ask everyone holding a [`CancelSignal`] to stop.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// The receiving half of a cancellation signal. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested. If the [`CancelHandle`] is
    /// dropped without cancelling, this never returns.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Polls an asynchronous OCR job until it reaches a terminal state.
#[derive(Clone, Debug)]
pub struct JobPoller {
    /// Time between status checks.
    interval: Duration,

    /// Give up after this long, if set.
    timeout: Option<Duration>,

    /// Stop early when this fires, if set.
    cancel: Option<CancelSignal>,
}

impl JobPoller {
    /// Create a poller.
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval,
            timeout,
            cancel: None,
        }
    }

    /// Stop waiting when `cancel` fires.
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Wait for `job_id` to finish and return all of its result blocks.
    #[instrument(level = "debug", skip_all, fields(job_id = %job_id))]
    pub async fn await_completion(
        &self,
        service: &dyn OcrService,
        job_id: &str,
    ) -> Result<Vec<TextBlock>> {
        let started = Instant::now();
        let mut cancel = self.cancel.clone();
        let mut polls: u64 = 0;
        loop {
            if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                return Err(PipelineError::JobCancelled {
                    job_id: job_id.to_owned(),
                }
                .into());
            }

            let report = service.job_status(job_id, None).await?;
            polls += 1;
            match report.state {
                JobState::Failed => {
                    error!(polls, reason = ?report.status_message, "OCR job failed");
                    return Err(PipelineError::JobFailed {
                        job_id: job_id.to_owned(),
                        message: report.status_message,
                    }
                    .into());
                }
                JobState::Succeeded | JobState::PartialSuccess => {
                    if report.state == JobState::PartialSuccess {
                        warn!(
                            reason = ?report.status_message,
                            "OCR job only partly succeeded; some pages may be missing",
                        );
                    }
                    info!(polls, "OCR job completed");
                    let mut blocks = report.blocks;
                    let mut next_token = report.next_token;
                    while let Some(token) = next_token {
                        let page = service.job_status(job_id, Some(&token)).await?;
                        debug!(count = page.blocks.len(), "Fetched another page of results");
                        blocks.extend(page.blocks);
                        next_token = page.next_token;
                    }
                    return Ok(blocks);
                }
                JobState::InProgress => {
                    debug!(polls, "OCR job still in progress");
                }
            }

            let waited = started.elapsed();
            let mut pause = self.interval;
            if let Some(timeout) = self.timeout {
                if waited >= timeout {
                    return Err(PipelineError::JobTimedOut {
                        job_id: job_id.to_owned(),
                        waited,
                    }
                    .into());
                }
                // Check one last time at the deadline rather than sleeping past it.
                pause = pause.min(timeout - waited);
            }

            let sleep = tokio::time::sleep(pause);
            match cancel.as_mut() {
                Some(cancel) => {
                    tokio::select! {
                        _ = sleep => {}
                        _ = cancel.cancelled() => {
                            return Err(PipelineError::JobCancelled {
                                job_id: job_id.to_owned(),
                            }
                            .into());
                        }
                    }
                }
                None => sleep.await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::pipeline_error,
        test_util::{FakeOcrService, failed, in_progress, succeeded},
    };

    fn poller() -> JobPoller {
        JobPoller::new(Duration::ZERO, None)
    }

    #[tokio::test]
    async fn returns_blocks_once_succeeded() -> Result<()> {
        let service = FakeOcrService::with_job(vec![
            in_progress(),
            succeeded(vec![TextBlock::line("done")], None),
        ]);
        let blocks = poller().await_completion(&service, "job-1").await?;
        assert_eq!(blocks, vec![TextBlock::line("done")]);
        assert_eq!(service.status_calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_job_is_terminal() {
        let service = FakeOcrService::with_job(vec![
            in_progress(),
            failed("unsupported document"),
            succeeded(vec![TextBlock::line("never seen")], None),
        ]);
        let err = poller()
            .await_completion(&service, "job-2")
            .await
            .unwrap_err();
        match pipeline_error(&err) {
            Some(PipelineError::JobFailed { job_id, message }) => {
                assert_eq!(job_id, "job-2");
                assert_eq!(message.as_deref(), Some("unsupported document"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(service.status_calls(), 2);
    }

    #[tokio::test]
    async fn follows_result_pages_in_order() -> Result<()> {
        let service = FakeOcrService::with_job(vec![
            succeeded(vec![TextBlock::line("one")], Some("p2")),
            succeeded(vec![TextBlock::line("two")], Some("p3")),
            succeeded(vec![TextBlock::line("three")], None),
        ]);
        let blocks = poller().await_completion(&service, "job-3").await?;
        let text = blocks
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>();
        assert_eq!(text, ["one", "two", "three"]);
        assert_eq!(service.page_tokens(), [None, Some("p2".to_owned()), Some("p3".to_owned())]);
        Ok(())
    }

    #[tokio::test]
    async fn partial_success_returns_what_we_have() -> Result<()> {
        let mut report = succeeded(vec![TextBlock::line("page 1")], None);
        report.state = JobState::PartialSuccess;
        let service = FakeOcrService::with_job(vec![report]);
        let blocks = poller().await_completion(&service, "job-4").await?;
        assert_eq!(blocks.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_after_timeout() {
        let service = FakeOcrService::with_job(vec![in_progress(); 5]);
        let err = JobPoller::new(Duration::ZERO, Some(Duration::ZERO))
            .await_completion(&service, "job-5")
            .await
            .unwrap_err();
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::JobTimedOut { .. })
        ));
        assert_eq!(service.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn last_poll_happens_at_the_deadline() {
        let service = FakeOcrService::with_job(vec![in_progress(); 5]);
        let started = Instant::now();
        let err = JobPoller::new(Duration::from_secs(3), Some(Duration::from_secs(4)))
            .await_completion(&service, "job-5b")
            .await
            .unwrap_err();
        match pipeline_error(&err) {
            Some(PipelineError::JobTimedOut { waited, .. }) => {
                assert!(*waited >= Duration::from_secs(4));
                assert!(*waited < Duration::from_secs(5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        // Polls at 0s, 3s and 4s.
        assert_eq!(service.status_calls(), 3);
    }

    #[tokio::test]
    async fn cancelled_before_first_poll() {
        let service = FakeOcrService::with_job(vec![in_progress()]);
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let err = poller()
            .with_cancel_signal(signal)
            .await_completion(&service, "job-6")
            .await
            .unwrap_err();
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::JobCancelled { .. })
        ));
        assert_eq!(service.status_calls(), 0);
    }

    #[tokio::test]
    async fn cancel_interrupts_sleep() {
        let service = FakeOcrService::with_job(vec![in_progress(); 3]);
        let (handle, signal) = cancel_pair();
        let poller = JobPoller::new(Duration::from_secs(3600), None).with_cancel_signal(signal);
        let waiting = poller.await_completion(&service, "job-7");
        let canceller = async {
            tokio::task::yield_now().await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(waiting, canceller);
        let err = result.unwrap_err();
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::JobCancelled { .. })
        ));
        assert_eq!(service.status_calls(), 1);
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() -> Result<()> {
        let service = FakeOcrService::with_job(vec![
            in_progress(),
            succeeded(vec![TextBlock::line("ok")], None),
        ]);
        let (handle, signal) = cancel_pair();
        drop(handle);
        let blocks = poller()
            .with_cancel_signal(signal)
            .await_completion(&service, "job-8")
            .await?;
        assert_eq!(blocks.len(), 1);
        Ok(())
    }
}
