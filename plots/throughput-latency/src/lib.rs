use common::{
    config::Settings,
    dataset::Dataset,
    plot::{
        ChartOutputs, FONT_FAMILY, Figure, LineSpec, Panel, Plot, PlotType, RenderError, Scale,
        caption_height, draw_caption, save_figure_formats, series_color,
    },
    util::{humanize_key, wrap_text},
};
use eyre::Result;
use plotters::{
    coord::Shift,
    prelude::{DrawingArea, DrawingBackend, IntoFont, RGBColor},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Metadata keys summarised beneath each figure, in display order.
pub const DEFAULT_CAPTION_FIELDS: &[&str] = &[
    "commit",
    "php_version",
    "openswoole_version",
    "wrk_version",
    "os",
    "hardware",
    "notes",
];
const CAPTION_SEPARATOR: &str = " • ";
const CAPTION_WIDTH: usize = 100;
const THROUGHPUT_COLOR: RGBColor = RGBColor(0x0b, 0x6e, 0xfd);
const X_DESC: &str = "Concurrent clients";

/// Two panel figure per dataset: throughput on the left, latency percentiles
/// on the right. Datasets without latency columns get the throughput panel
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputLatency {
    pub caption_fields: Vec<String>,
}

impl Default for ThroughputLatency {
    fn default() -> Self {
        Self {
            caption_fields: DEFAULT_CAPTION_FIELDS
                .iter()
                .map(|field| (*field).to_owned())
                .collect(),
        }
    }
}

#[typetag::serde]
impl Plot for ThroughputLatency {
    fn name(&self) -> &'static str {
        "throughput-latency"
    }

    fn plot(
        &self,
        plot_type: &PlotType,
        datasets: &[&Dataset],
        settings: &Settings,
    ) -> Result<ChartOutputs> {
        if *plot_type == PlotType::Total {
            return Ok(ChartOutputs::new());
        }

        let mut outputs = ChartOutputs::new();
        for dataset in datasets {
            outputs.extend(self.render(dataset, settings)?);
        }
        Ok(outputs)
    }
}

impl ThroughputLatency {
    /// `"Commit: abc123 • Os: linux"` built from the configured metadata
    /// keys, or `None` when none of them are set.
    pub fn caption(&self, dataset: &Dataset) -> Option<String> {
        let bits: Vec<String> = self
            .caption_fields
            .iter()
            .filter_map(|key| {
                dataset
                    .metadata
                    .get(key)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("{}: {value}", humanize_key(key)))
            })
            .collect();
        if bits.is_empty() {
            None
        } else {
            Some(bits.join(CAPTION_SEPARATOR))
        }
    }

    pub fn render(&self, dataset: &Dataset, settings: &Settings) -> Result<ChartOutputs> {
        if dataset.concurrency.is_empty() {
            return Err(RenderError::NoConcurrency(dataset.source_path.clone()).into());
        }
        let caption = self
            .caption(dataset)
            .map(|caption| wrap_text(&caption, CAPTION_WIDTH))
            .unwrap_or_default();
        debug!(
            "Rendering {} with {} latency series",
            dataset.source_path.display(),
            dataset.latencies.len()
        );

        let figure = DatasetFigure { dataset, caption };
        figure.throughput_panel().ranges()?;
        if !dataset.latencies.is_empty() {
            figure.latency_panel().ranges()?;
        }
        save_figure_formats(&figure, &dataset.slug(), settings)
    }
}

struct DatasetFigure<'a> {
    dataset: &'a Dataset,
    caption: Vec<String>,
}

impl DatasetFigure<'_> {
    fn throughput_panel(&self) -> Panel<'_> {
        Panel {
            title: "Throughput",
            x_desc: X_DESC,
            y_desc: "Requests / second",
            lines: vec![LineSpec {
                label: "rps".to_owned(),
                x: &self.dataset.concurrency,
                y: &self.dataset.rps,
                color: THROUGHPUT_COLOR,
                dashed: false,
            }],
            legend: false,
        }
    }

    fn latency_panel(&self) -> Panel<'_> {
        Panel {
            title: "Latency",
            x_desc: X_DESC,
            y_desc: "Milliseconds",
            lines: self
                .dataset
                .latency_series()
                .enumerate()
                .map(|(idx, (label, values))| LineSpec {
                    label: label.to_owned(),
                    x: &self.dataset.concurrency,
                    y: values,
                    color: series_color(idx),
                    dashed: false,
                })
                .collect(),
            legend: true,
        }
    }
}

impl Figure for DatasetFigure<'_> {
    fn size_inches(&self) -> (f64, f64) {
        if self.dataset.latencies.is_empty() {
            (6.0, 5.0)
        } else {
            (12.0, 5.0)
        }
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, scale: Scale) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let body = root.titled(&self.dataset.title, (FONT_FAMILY, scale.pt(14.0)).into_font())?;

        let (width, height) = body.dim_in_pixel();
        let caption_px = caption_height(self.caption.len(), scale);
        let (panels, caption) = body.split_vertically(height.saturating_sub(caption_px));
        if !self.caption.is_empty() {
            draw_caption(&caption, &self.caption, scale)?;
        }

        if self.dataset.latencies.is_empty() {
            self.throughput_panel().draw(&panels, scale)?;
        } else {
            let (left, right) = panels.split_horizontally(width / 2);
            self.throughput_panel().draw(&left, scale)?;
            self.latency_panel().draw(&right, scale)?;
        }
        Ok(())
    }
}
