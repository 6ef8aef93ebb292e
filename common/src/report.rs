use std::{
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use eyre::{Context, Result};

use crate::{
    dataset::Dataset,
    plot::{ChartOutputs, ImageFormat},
    util::relative_path,
};

/// A dataset that rendered, with the files produced for it.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub dataset: Dataset,
    pub outputs: ChartOutputs,
}

pub type Manifest = Vec<ManifestEntry>;

/// Picks the chart to embed: the preferred format if it was written, else
/// the first available one.
fn embedded_chart<'a>(outputs: &'a ChartOutputs, preferred: ImageFormat) -> Option<&'a PathBuf> {
    outputs
        .get(preferred.extension())
        .or_else(|| outputs.values().next())
}

/// Writes a Markdown page listing every rendered dataset. Returns the path
/// written, or `None` when the manifest is empty.
pub fn write_markdown_index(
    manifest: &[ManifestEntry],
    output_dir: &Path,
    index_path: &Path,
    preferred_format: ImageFormat,
    generated_at: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    if manifest.is_empty() {
        return Ok(None);
    }

    let index_path = if index_path.is_absolute() {
        index_path.to_path_buf()
    } else {
        output_dir.join(index_path)
    };
    let index_dir = index_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    if !index_dir.as_os_str().is_empty() {
        create_dir_all(&index_dir)
            .with_context(|| format!("Create directory {}", index_dir.display()))?;
    }

    let mut lines = vec![
        "# Benchmark charts".to_owned(),
        String::new(),
        format!(
            "Generated on {}Z.",
            generated_at.format("%Y-%m-%dT%H:%M:%S%.6f")
        ),
        String::new(),
    ];
    for ManifestEntry { dataset, outputs } in manifest {
        lines.push(format!("## {}", dataset.title));
        lines.push(String::new());
        if let Some(chart) = embedded_chart(outputs, preferred_format) {
            let rel = relative_path(chart, &index_dir)?;
            lines.push(format!("![{}]({rel})", dataset.title));
            lines.push(String::new());
        }
        if !dataset.metadata.is_empty() {
            lines.push("| Key | Value |".to_owned());
            lines.push("| --- | ----- |".to_owned());
            for (key, value) in &dataset.metadata {
                lines.push(format!("| {key} | {value} |"));
            }
            lines.push(String::new());
        }
    }

    write(&index_path, lines.join("\n"))
        .with_context(|| format!("Write {}", index_path.display()))?;
    println!("[plot-bench] wrote {}", index_path.display());
    Ok(Some(index_path))
}
