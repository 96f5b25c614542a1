//! I/O utilities.
//!
//! Reading config files and line-oriented text, and writing JSON to a file or
//! standard output. Files are small (one document's worth of text), so we read
//! them whole rather than streaming.

use tokio::{
    fs::{self, File},
    io::{AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _, BufWriter},
};

use crate::{errors::PipelineError, prelude::*};

/// Does this path look like it holds JSON?
fn is_json_like(path: &Path) -> bool {
    let ext = path.extension().unwrap_or_default();
    ext == "json" || ext == "jsonl"
}

/// Read TOML or JSON from a file, choosing the format by extension.
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))?;
    if is_json_like(path) {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Read a whole file, or standard input if `path` is `None` or `-`.
pub async fn read_path_or_stdin(path: Option<&Path>) -> Result<String> {
    let mut data = String::new();
    match path {
        Some(path) if path != Path::new("-") => {
            if !path.exists() {
                return Err(PipelineError::SourceNotFound(path.to_owned()).into());
            }
            let mut file = File::open(path)
                .await
                .with_context(|| format!("Failed to open file at path: {:?}", path))?;
            file.read_to_string(&mut data)
                .await
                .with_context(|| format!("Failed to read file at path: {:?}", path))?;
        }
        _ => {
            tokio::io::stdin()
                .read_to_string(&mut data)
                .await
                .context("Failed to read standard input")?;
        }
    }
    Ok(data)
}

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write values as JSON Lines to either standard output or a file.
pub async fn write_jsonl<T>(path: Option<&Path>, values: &[T]) -> Result<()>
where
    T: Serialize + std::fmt::Debug,
{
    let mut writer = BufWriter::new(create_writer(path).await?);
    for value in values {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize JSON from: {:?}", value))?;
        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write JSON to output")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Write a single value as pretty-printed JSON to either standard output or a
/// file.
pub async fn write_json_pretty<T>(path: Option<&Path>, value: &T) -> Result<()>
where
    T: Serialize,
{
    let mut writer = create_writer(path).await?;
    let mut json =
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    json.push('\n');
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write JSON to output")?;
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}
