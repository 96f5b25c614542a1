//! The `extract` subcommand.

use clap::Args;

use crate::{
    aws::load_aws_config,
    ocr::{DetectionMode, DocumentSource},
    pipeline::{Pipeline, find_documents, load_document, text_output_path},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

use super::{ConfigOpts, ObjectOpts, textract_client};

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// A PDF file, or a directory of PDF files.
    #[clap(
        value_name = "INPUT",
        conflicts_with = "bucket",
        required_unless_present = "bucket"
    )]
    pub input: Option<PathBuf>,

    #[clap(flatten)]
    pub object: ObjectOpts,

    /// How to call the OCR service. `async` needs `--bucket` and `--key`.
    #[clap(long, value_enum, default_value_t = DetectionMode::Sync)]
    pub mode: DetectionMode,

    /// Where to write extracted text.
    #[clap(short = 'o', long, default_value = "output-texts")]
    pub output_dir: PathBuf,

    #[clap(flatten)]
    pub config: ConfigOpts,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let config = opts.config.load().await?;

    // Check our inputs before we talk to AWS.
    let documents = match &opts.input {
        Some(_) if opts.mode == DetectionMode::Async => {
            bail!("--mode async reads documents from S3; pass --bucket and --key")
        }
        Some(input) => find_documents(input).await?,
        None => vec![],
    };
    let location = opts.object.location();
    if documents.is_empty() && location.is_none() {
        warn!("No PDF files found");
        return Ok(());
    }

    let sdk_config = load_aws_config(&config.aws).await?;
    let ocr = textract_client(&sdk_config, &config, opts.mode);
    let pipeline = Pipeline::new(ocr, config.markers.clone(), opts.mode);

    let spinner_config = ProgressConfig {
        emoji: "📄",
        msg: "Extracting text",
        done_msg: "Extracted text",
    };
    for path in &documents {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let output_path = text_output_path(&opts.output_dir, &name);
        let spinner = ui.new_spinner(&spinner_config);
        let source = load_document(path).await?;
        let count = pipeline
            .extract_to_file(&source, &output_path)
            .await
            .with_context(|| format!("could not extract text from {path:?}"))?;
        spinner.finish();
        if count > 0 {
            info!("Processed {path:?}, output saved to {output_path:?}");
        }
    }
    if let Some(location) = location {
        let output_path = text_output_path(&opts.output_dir, &location.key);
        let spinner = ui.new_spinner(&spinner_config);
        let count = pipeline
            .extract_to_file(&DocumentSource::Object(location.clone()), &output_path)
            .await
            .with_context(|| format!("could not extract text from {location}"))?;
        spinner.finish();
        if count > 0 {
            info!("Processed {location}, output saved to {output_path:?}");
        }
    }
    Ok(())
}
