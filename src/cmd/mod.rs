//! Command-line entry points.

use std::{sync::Arc, time::Duration};

use clap::Args;

use crate::{
    config::PipelineConfig,
    ocr::{
        DetectionMode, ObjectLocation, OcrClient,
        poller::{CancelSignal, JobPoller, cancel_pair},
        textract::TextractOcrService,
    },
    prelude::*,
};

pub mod extract;
pub mod ingest;
pub mod parse;
pub mod schema;

/// Options for loading a [`PipelineConfig`], shared by several subcommands.
#[derive(Debug, Clone, Args)]
pub struct ConfigOpts {
    /// A JSON or TOML file with pipeline settings.
    #[clap(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// The DynamoDB table to store records in.
    #[clap(long = "table", env = "RECORDS_TABLE")]
    table_name: Option<String>,

    /// The AWS region to use.
    #[clap(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Seconds between OCR job status checks.
    #[clap(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Seconds to wait for an OCR job before giving up. 0 waits forever.
    #[clap(long, value_name = "SECS")]
    job_timeout: Option<u64>,
}

impl ConfigOpts {
    /// Load our config file, if any, and apply command-line overrides.
    pub async fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config_path {
            Some(path) => PipelineConfig::from_path(path).await?,
            None => PipelineConfig::default(),
        };
        if let Some(table_name) = &self.table_name {
            config.store.table_name = table_name.clone();
        }
        if let Some(region) = &self.region {
            config.aws.region = Some(region.clone());
        }
        if let Some(interval) = self.poll_interval {
            config.polling.interval_secs = interval;
        }
        match self.job_timeout {
            Some(0) => config.polling.timeout_secs = None,
            Some(timeout) => config.polling.timeout_secs = Some(timeout),
            None => {}
        }
        debug!(?config, "Loaded configuration");
        Ok(config)
    }
}

/// Options naming a document in S3.
#[derive(Debug, Clone, Args)]
pub struct ObjectOpts {
    /// The S3 bucket holding the document.
    #[clap(long, requires = "key")]
    bucket: Option<String>,

    /// The S3 key of the document.
    #[clap(long, requires = "bucket")]
    key: Option<String>,
}

impl ObjectOpts {
    /// The document location, if one was given.
    pub fn location(&self) -> Option<ObjectLocation> {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) => Some(ObjectLocation {
                bucket: bucket.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}

/// Cancel OCR job polling when the user presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancelSignal {
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for OCR");
            handle.cancel();
        }
    });
    signal
}

/// Build a Textract-backed [`OcrClient`].
pub fn textract_client(
    sdk_config: &aws_config::SdkConfig,
    config: &PipelineConfig,
    mode: DetectionMode,
) -> OcrClient {
    let service = Arc::new(TextractOcrService::new(sdk_config));
    let mut poller = JobPoller::new(
        config.polling.interval().max(Duration::from_millis(100)),
        config.polling.timeout(),
    );
    // Only asynchronous jobs can be interrupted; otherwise let Ctrl-C exit.
    if mode == DetectionMode::Async {
        poller = poller.with_cancel_signal(cancel_on_ctrl_c());
    }
    OcrClient::new(service, poller)
}
