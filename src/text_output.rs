//! Writing extracted lines to a text file for people to read.

use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt as _, BufWriter},
};

use crate::{config::LayoutMarkers, prelude::*};

/// Render lines one per row, with a blank row after each record's last line.
pub fn render_lines<S: AsRef<str>>(lines: &[S], markers: &LayoutMarkers) -> String {
    let mut output = String::new();
    for line in lines {
        let line = line.as_ref();
        output.push_str(line);
        output.push('\n');
        if markers.ends_record(line) {
            output.push('\n');
        }
    }
    output
}

/// Write lines to `path`, creating its parent directory if needed.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_lines<S: AsRef<str>>(
    path: &Path,
    lines: &[S],
    markers: &LayoutMarkers,
) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let file = File::create(path)
        .await
        .with_context(|| format!("Failed to create file at path: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(render_lines(lines, markers).as_bytes())
        .await
        .with_context(|| format!("Failed to write to {:?}", path))?;
    writer
        .flush()
        .await
        .with_context(|| format!("Failed to flush {:?}", path))?;
    Ok(())
}
