use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod aws;
mod cmd;
mod config;
mod errors;
mod event;
mod io;
mod ocr;
mod pipeline;
mod prelude;
mod records;
mod store;
#[cfg(test)]
mod test_util;
mod text_output;
mod ui;

/// OCR scanned patient records and store them as structured records.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - RECORDS_TABLE (optional): The DynamoDB table to store records in.
  - RUST_LOG (optional): Logging filter, such as `debug`.

  Standard AWS environment variables and credential files
  are used for Textract and DynamoDB.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// OCR PDFs and write their text to files, one line per row.
    Extract(cmd::extract::ExtractOpts),
    /// OCR documents in S3, parse them into records, and store them in
    /// DynamoDB.
    Ingest(cmd::ingest::IngestOpts),
    /// Parse already-extracted text into records, printed as JSON Lines.
    Parse(cmd::parse::ParseOpts),
    /// Print schemas for input and output formats.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Extract(_) => false,
            Cmd::Ingest(opts) => opts.output_path.is_none(),
            Cmd::Parse(opts) => opts.output_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the spinners if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    // Run the appropriate subcommand.
    let result = match &opts.subcmd {
        Cmd::Extract(extract_opts) => cmd::extract::cmd_extract(ui, extract_opts).await,
        Cmd::Ingest(ingest_opts) => cmd::ingest::cmd_ingest(ingest_opts).await,
        Cmd::Parse(parse_opts) => cmd::parse::cmd_parse(parse_opts).await,
        Cmd::Schema(schema_opts) => cmd::schema::cmd_schema(schema_opts).await,
    };
    if let Err(err) = &result
        && let Some(pipeline_err) = errors::pipeline_error(err)
    {
        error!(error = %pipeline_err, "Processing failed");
    }
    result
}
