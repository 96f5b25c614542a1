//! End-to-end document processing.
//!
//! A document goes through OCR, and then either to a text file for people to
//! read, or through the record segmenter into the record store. Documents are
//! processed one at a time, start to finish.

use tokio::fs;

use crate::{
    config::LayoutMarkers,
    errors::PipelineError,
    event::HandlerResponse,
    ocr::{DetectionMode, DocumentSource, ObjectLocation, OcrClient},
    prelude::*,
    records::RecordSegmenter,
    store::{PersistSummary, RecordStoreWriter},
    text_output::write_lines,
};

/// Find the documents to process. A directory yields its PDF files, sorted by
/// name; anything else is taken as a single document.
pub async fn find_documents(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(PipelineError::SourceNotFound(input.to_owned()).into());
    }
    if !input.is_dir() {
        return Ok(vec![input.to_owned()]);
    }
    let mut entries = fs::read_dir(input)
        .await
        .with_context(|| format!("Failed to list directory: {:?}", input))?;
    let mut documents = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list directory: {:?}", input))?
    {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

/// Load a local document into memory.
pub async fn load_document(path: &Path) -> Result<DocumentSource> {
    if !path.is_file() {
        return Err(PipelineError::SourceNotFound(path.to_owned()).into());
    }
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read document: {:?}", path))?;
    Ok(DocumentSource::Bytes(bytes))
}

/// The text file we write for a document: `<output_dir>/<stem>.txt`.
pub fn text_output_path(output_dir: &Path, document_name: &str) -> PathBuf {
    let stem = Path::new(document_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted_text".to_owned());
    output_dir.join(format!("{stem}.txt"))
}

/// Runs documents through OCR and on to their destination.
pub struct Pipeline {
    ocr: OcrClient,
    markers: LayoutMarkers,
    mode: DetectionMode,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(ocr: OcrClient, markers: LayoutMarkers, mode: DetectionMode) -> Self {
        Self { ocr, markers, mode }
    }

    /// OCR a document and write its lines to `output_path`.
    ///
    /// Returns the number of lines written. If OCR finds no text, nothing is
    /// written.
    #[instrument(level = "debug", skip_all, fields(output = %output_path.display()))]
    pub async fn extract_to_file(
        &self,
        source: &DocumentSource,
        output_path: &Path,
    ) -> Result<usize> {
        let lines = self.ocr.extract_lines(source, self.mode).await?;
        if lines.is_empty() {
            warn!("No text detected in document");
            return Ok(0);
        }
        write_lines(output_path, lines.as_slice(), &self.markers).await?;
        info!(count = lines.len(), "Extracted text written");
        Ok(lines.len())
    }

    /// OCR a document in an object store, parse it into records and store
    /// them.
    ///
    /// Returns the number of records parsed and what happened to them.
    #[instrument(level = "debug", skip_all, fields(bucket = %location.bucket, key = %location.key))]
    pub async fn ingest(
        &self,
        writer: &RecordStoreWriter,
        location: &ObjectLocation,
    ) -> Result<(usize, PersistSummary)> {
        info!("Processing document");
        let source = DocumentSource::Object(location.clone());
        let lines = self.ocr.extract_lines(&source, self.mode).await?;
        let records = RecordSegmenter::new(&self.markers).segment(lines.as_slice());
        info!(count = records.len(), "Parsed records");
        let summary = writer.persist(&records).await?;
        Ok((records.len(), summary))
    }

    /// Ingest every object in an event, in order, and summarize.
    pub async fn handle_event(
        &self,
        writer: &RecordStoreWriter,
        locations: &[ObjectLocation],
    ) -> Result<HandlerResponse> {
        if locations.is_empty() {
            bail!("event does not refer to any objects");
        }
        let mut records_parsed = 0;
        let mut summary = PersistSummary::default();
        for location in locations {
            let (parsed, persisted) = self
                .ingest(writer, location)
                .await
                .with_context(|| format!("could not ingest {location}"))?;
            records_parsed += parsed;
            summary += persisted;
        }
        let sources = locations
            .iter()
            .map(|location| location.key.clone())
            .collect::<Vec<_>>();
        Ok(HandlerResponse::success(
            writer.table_name(),
            &sources,
            records_parsed,
            summary,
        ))
    }
}
