//! The `parse` subcommand.

use clap::Args;

use crate::{
    config::{MarkerRole, PipelineConfig},
    io::{read_path_or_stdin, write_jsonl},
    prelude::*,
    records::{ParsedRecord, RawRecord, RecordSegmenter},
};

use super::ConfigOpts;

/// Parse command line arguments.
#[derive(Debug, Args)]
pub struct ParseOpts {
    /// Extracted text, one line per row. Defaults to standard input.
    #[clap(value_name = "INPUT")]
    pub input_path: Option<PathBuf>,

    /// Where to write records as JSON Lines. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigOpts,
}

/// The `parse` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_parse(opts: &ParseOpts) -> Result<()> {
    let config = opts.config.load().await?;
    let text = read_path_or_stdin(opts.input_path.as_deref()).await?;
    let lines = text.lines().collect::<Vec<_>>();

    let records = RecordSegmenter::new(&config.markers).segment(&lines);
    let unstorable = count_unstorable(&records, &config);
    if unstorable > 0 {
        warn!(
            "{unstorable} of {} records have no usable {:?} and would not be stored",
            records.len(),
            config.markers.marker(MarkerRole::Identifier),
        );
    }
    info!(count = records.len(), "Parsed records");
    write_jsonl(opts.output_path.as_deref(), &records).await
}

/// How many of `records` the store writer would skip.
fn count_unstorable(records: &[RawRecord], config: &PipelineConfig) -> usize {
    let id_field = config.markers.marker(MarkerRole::Identifier);
    records
        .iter()
        .filter(|record| {
            ParsedRecord::from_raw(record, id_field, &config.store.primary_key).is_none()
        })
        .count()
}
