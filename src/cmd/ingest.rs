//! The `ingest` subcommand.
//!
//! This is the event-driven path: an S3 notification (or an explicit bucket
//! and key) names new documents, which we OCR, parse and store in DynamoDB.

use std::sync::Arc;

use clap::Args;

use crate::{
    aws::load_aws_config,
    event::S3Event,
    io::{read_path_or_stdin, write_json_pretty},
    ocr::DetectionMode,
    pipeline::Pipeline,
    prelude::*,
    store::{RecordStoreWriter, dynamodb::DynamoDbRecordStore},
};

use super::{ConfigOpts, ObjectOpts, textract_client};

/// Ingest command line arguments.
#[derive(Debug, Args)]
pub struct IngestOpts {
    /// An S3 event notification in JSON format. Use `-` for standard input.
    #[clap(
        long,
        value_name = "PATH",
        conflicts_with = "bucket",
        required_unless_present = "bucket"
    )]
    pub event: Option<PathBuf>,

    #[clap(flatten)]
    pub object: ObjectOpts,

    /// How to call the OCR service.
    #[clap(long, value_enum, default_value_t = DetectionMode::Sync)]
    pub mode: DetectionMode,

    /// Where to write the JSON response. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigOpts,
}

/// The `ingest` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ingest(opts: &IngestOpts) -> Result<()> {
    let config = opts.config.load().await?;

    let locations = match (&opts.event, opts.object.location()) {
        (Some(path), _) => {
            let data = read_path_or_stdin(Some(path)).await?;
            let event: S3Event = serde_json::from_str(&data)
                .with_context(|| format!("could not parse S3 event from {path:?}"))?;
            debug!(?event, "Received event");
            event.locations()?
        }
        (None, Some(location)) => vec![location],
        (None, None) => bail!("pass either --event or --bucket and --key"),
    };

    let sdk_config = load_aws_config(&config.aws).await?;
    let ocr = textract_client(&sdk_config, &config, opts.mode);
    let pipeline = Pipeline::new(ocr, config.markers.clone(), opts.mode);
    let writer = RecordStoreWriter::new(
        Arc::new(DynamoDbRecordStore::new(&sdk_config)),
        &config.store,
        &config.markers,
    );

    let response = pipeline.handle_event(&writer, &locations).await?;
    info!("{}", response.message);
    write_json_pretty(opts.output_path.as_deref(), &response).await
}
