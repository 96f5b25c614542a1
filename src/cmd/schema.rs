//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;

use crate::{
    config::PipelineConfig,
    event::{HandlerResponse, S3Event},
    io::write_json_pretty,
    prelude::*,
    records::RawRecord,
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// S3 event notification accepted by `ingest`.
    S3Event,
    /// Response printed by `ingest`.
    HandlerResponse,
    /// Record printed by `parse`.
    RawRecord,
    /// Configuration file.
    PipelineConfig,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::S3Event => schema_for!(S3Event),
        SchemaType::HandlerResponse => schema_for!(HandlerResponse),
        SchemaType::RawRecord => schema_for!(RawRecord),
        SchemaType::PipelineConfig => schema_for!(PipelineConfig),
    };
    write_json_pretty(schema_opts.output_path.as_deref(), &schema)
        .await
        .context("failed to write schema")
}
