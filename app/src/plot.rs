use std::path::PathBuf;

use chrono::Utc;
use common::{
    config::Settings,
    dataset::{Dataset, load_dataset},
    discover::{discover_csv_files, filter_datasets},
    plot::{ChartOutputs, Plot, PlotType},
    report::{Manifest, ManifestEntry, write_markdown_index},
};
use eyre::Result;
use itertools::Itertools;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Discovery found no CSV files
    NoInputs,
    /// Files were found but none produced a chart
    NothingRendered,
    Rendered {
        manifest: Manifest,
        /// Files written by cross-dataset plots
        combined: ChartOutputs,
        index: Option<PathBuf>,
    },
}

fn render_dataset(
    dataset: &Dataset,
    plots: &[Box<dyn Plot>],
    settings: &Settings,
) -> Result<ChartOutputs> {
    let mut outputs = ChartOutputs::new();
    for plot in plots {
        debug!("Running {} on {}", plot.name(), dataset.source_path.display());
        outputs.extend(plot.plot(&PlotType::Individual, &[dataset], settings)?);
    }
    Ok(outputs)
}

fn render_combined(
    datasets: &[&Dataset],
    plots: &[Box<dyn Plot>],
    settings: &Settings,
) -> ChartOutputs {
    let mut outputs = ChartOutputs::new();
    for plot in plots {
        match plot.plot(&PlotType::Total, datasets, settings) {
            Ok(written) => outputs.extend(written),
            Err(err) => warn!("Failed to render {} charts: {err}", plot.name()),
        }
    }
    outputs
}

/// Discovers, loads and renders every dataset, then writes the optional
/// Markdown index. Per-file failures are logged and skipped.
pub fn run(settings: &Settings, plots: &[Box<dyn Plot>]) -> Result<RunOutcome> {
    let files = filter_datasets(
        discover_csv_files(&settings.paths, settings.recursive),
        &settings.datasets,
    );
    if files.is_empty() {
        warn!("No CSV files discovered. Nothing to do.");
        return Ok(RunOutcome::NoInputs);
    }

    let mut manifest = Manifest::new();
    for csv_path in &files {
        let dataset = match load_dataset(csv_path) {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!("Skipping {}: {err}", csv_path.display());
                continue;
            }
        };
        match render_dataset(&dataset, plots, settings) {
            Ok(outputs) if outputs.is_empty() => {
                debug!("No charts produced for {}", csv_path.display());
            }
            Ok(outputs) => manifest.push(ManifestEntry { dataset, outputs }),
            Err(err) => warn!("Failed to render {}: {err}", csv_path.display()),
        }
    }

    let datasets = manifest.iter().map(|entry| &entry.dataset).collect_vec();
    let combined = if datasets.is_empty() {
        ChartOutputs::new()
    } else {
        render_combined(&datasets, plots, settings)
    };

    if manifest.is_empty() {
        warn!("No charts were generated.");
        return Ok(RunOutcome::NothingRendered);
    }
    info!(
        "Rendered {} of {} datasets into {}",
        manifest.len(),
        files.len(),
        settings.output.display()
    );

    let index = match &settings.index {
        Some(index) => write_markdown_index(
            &manifest,
            &settings.output,
            index,
            settings.preferred_format(),
            Utc::now(),
        )?,
        None => None,
    };

    Ok(RunOutcome::Rendered {
        manifest,
        combined,
        index,
    })
}
