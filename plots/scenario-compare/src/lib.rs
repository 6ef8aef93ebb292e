use common::{
    config::Settings,
    dataset::Dataset,
    plot::{
        ChartOutputs, Figure, LineSpec, Panel, Plot, PlotType, Scale, save_figure_formats,
        series_color,
    },
};
use eyre::Result;
use itertools::Itertools;
use plotters::{
    coord::Shift,
    prelude::{DrawingArea, DrawingBackend},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_TITLE_PREFIX: &str = "Benchmark comparison";
const X_DESC: &str = "Concurrent requests";
const P50: &str = "latency_p50";
const P99: &str = "latency_p99";

/// Overlays every dataset on a shared pair of charts, `throughput.<ext>` and
/// `latency.<ext>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioCompare {
    pub title_prefix: String,
}

impl Default for ScenarioCompare {
    fn default() -> Self {
        Self {
            title_prefix: DEFAULT_TITLE_PREFIX.to_owned(),
        }
    }
}

#[typetag::serde]
impl Plot for ScenarioCompare {
    fn name(&self) -> &'static str {
        "scenario-compare"
    }

    fn plot(
        &self,
        plot_type: &PlotType,
        datasets: &[&Dataset],
        settings: &Settings,
    ) -> Result<ChartOutputs> {
        if *plot_type != PlotType::Total {
            return Ok(ChartOutputs::new());
        }
        let datasets = datasets
            .iter()
            .copied()
            .filter(|dataset| !dataset.concurrency.is_empty())
            .collect_vec();
        if datasets.is_empty() {
            warn!("No datasets to compare");
            return Ok(ChartOutputs::new());
        }
        debug!("Comparing {} datasets", datasets.len());

        let throughput = ComparisonFigure {
            title: format!("{} – throughput", self.title_prefix),
            y_desc: "Requests / second",
            lines: throughput_lines(&datasets),
        };
        let latency = ComparisonFigure {
            title: format!("{} – latency", self.title_prefix),
            y_desc: "Latency (ms)",
            lines: latency_lines(&datasets),
        };

        let mut outputs = ChartOutputs::new();
        for (stem, figure) in [("throughput", &throughput), ("latency", &latency)] {
            if figure.lines.is_empty() {
                debug!("Nothing to draw for {stem}");
                continue;
            }
            if let Some(dataset) = datasets.iter().find(|dataset| dataset.slug() == stem) {
                warn!(
                    "Not writing {stem} comparison chart: it would overwrite the chart of {}",
                    dataset.source_path.display()
                );
                continue;
            }
            figure.panel().ranges()?;
            for (ext, path) in save_figure_formats(figure, stem, settings)? {
                outputs.insert(format!("{stem}.{ext}"), path);
            }
        }
        Ok(outputs)
    }
}

fn throughput_lines<'a>(datasets: &[&'a Dataset]) -> Vec<LineSpec<'a>> {
    datasets
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, dataset)| LineSpec {
            label: dataset.title.clone(),
            x: &dataset.concurrency,
            y: &dataset.rps,
            color: series_color(idx),
            dashed: false,
        })
        .collect()
}

fn latency_lines<'a>(datasets: &[&'a Dataset]) -> Vec<LineSpec<'a>> {
    datasets
        .iter()
        .copied()
        .enumerate()
        .flat_map(|(idx, dataset)| {
            [(P50, "p50", false), (P99, "p99", true)]
                .into_iter()
                .filter_map(move |(column, label, dashed)| {
                    dataset.latency(column).map(|values| LineSpec {
                        label: format!("{} {label}", dataset.title),
                        x: &dataset.concurrency,
                        y: values,
                        color: series_color(idx),
                        dashed,
                    })
                })
        })
        .collect()
}

struct ComparisonFigure<'a> {
    title: String,
    y_desc: &'static str,
    lines: Vec<LineSpec<'a>>,
}

impl ComparisonFigure<'_> {
    fn panel(&self) -> Panel<'_> {
        Panel {
            title: &self.title,
            x_desc: X_DESC,
            y_desc: self.y_desc,
            lines: self.lines.clone(),
            legend: true,
        }
    }
}

impl Figure for ComparisonFigure<'_> {
    fn size_inches(&self) -> (f64, f64) {
        (7.5, 4.5)
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, scale: Scale) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        self.panel().draw(root, scale)
    }
}
