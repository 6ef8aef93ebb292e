use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::plot::{ImageFormat, Plot};

pub const DEFAULT_DATA_DIR: &str = "docs/benchmarks/data";
pub const DEFAULT_OUTPUT_DIR: &str = "docs/benchmarks/charts";
pub const DEFAULT_DPI: u32 = 144;

/// Optional YAML configuration. Every field can also be given on the command
/// line, which takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: Option<Vec<PathBuf>>,
    pub output: Option<PathBuf>,
    pub formats: Option<Vec<ImageFormat>>,
    pub dpi: Option<u32>,
    pub index: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub datasets: Option<Vec<String>>,
    pub plots: Option<Vec<Box<dyn Plot>>>,
}

/// Fully resolved settings for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub paths: Vec<PathBuf>,
    pub output: PathBuf,
    pub formats: Vec<ImageFormat>,
    pub dpi: u32,
    /// Markdown summary, relative to `output` unless absolute
    pub index: Option<PathBuf>,
    pub recursive: bool,
    /// Restrict the run to these CSV stems
    pub datasets: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(DEFAULT_DATA_DIR)],
            output: PathBuf::from(DEFAULT_OUTPUT_DIR),
            formats: vec![ImageFormat::Png],
            dpi: DEFAULT_DPI,
            index: None,
            recursive: true,
            datasets: Vec::new(),
        }
    }
}

impl Settings {
    /// Format used for the image embedded in the summary document.
    pub fn preferred_format(&self) -> ImageFormat {
        self.formats.first().copied().unwrap_or(ImageFormat::Png)
    }
}
