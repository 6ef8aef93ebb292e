use core::fmt::Debug;
use std::{
    collections::BTreeMap,
    fmt,
    fs::create_dir_all,
    ops::Range,
    path::{Path, PathBuf},
    str::FromStr,
};

use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result};
use itertools::Itertools;
use plotters::{
    coord::Shift,
    prelude::{
        BLACK, BitMapBackend, ChartBuilder, Circle, Color, DashedLineSeries, DrawingArea,
        DrawingBackend, IntoDrawingArea, IntoFont, LineSeries, PathElement, RGBColor, SVGBackend,
        SeriesLabelPosition, TRANSPARENT, WHITE,
    },
    style::text_anchor::{HPos, Pos, VPos},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{config::Settings, dataset::Dataset};

/// Image extension -> path written for that format.
pub type ChartOutputs = BTreeMap<String, PathBuf>;

pub const FONT_FAMILY: &str = "sans-serif";

/// matplotlib's default colour cycle
pub const SERIES_COLORS: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

pub fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

#[derive(Debug, Default, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum PlotType {
    /// One chart set per dataset
    #[default]
    Individual,
    /// One chart set across every loaded dataset
    Total,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Dataset {0} has no concurrency values")]
    NoConcurrency(PathBuf),
    #[error("{0} values span too wide a range to plot")]
    AxisOverflow(&'static str),
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unsupported image format '{0}' (expected one of png, svg, jpg, bmp)")]
    Unsupported(String),
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageFormat {
    Png,
    Svg,
    Jpg,
    Bmp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Bmp => "bmp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "bmp" => Ok(ImageFormat::Bmp),
            _ => Err(FormatError::Unsupported(s.to_owned())),
        }
    }
}

impl TryFrom<String> for ImageFormat {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageFormat> for String {
    fn from(value: ImageFormat) -> Self {
        value.extension().to_owned()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[typetag::serde(tag = "type")]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &'static str;
    /// Renders charts and returns the files written, keyed by extension. Plots
    /// writing more than one chart per format prefix the key with the chart
    /// name, e.g. `latency.svg`.
    ///
    /// Arguments:
    /// * `plot_type` - [`PlotType::Individual`] passes a single dataset, [`PlotType::Total`] every
    ///   dataset that rendered successfully
    /// * `datasets` - The datasets to draw
    /// * `settings` - Output directory, formats and resolution
    ///
    /// Plots that have nothing to draw for `plot_type` return an empty map.
    fn plot(
        &self,
        plot_type: &PlotType,
        datasets: &[&Dataset],
        settings: &Settings,
    ) -> Result<ChartOutputs>;
}
clone_trait_object!(Plot);

/// Converts typographic sizes to pixels for a given resolution.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub dpi: u32,
}

impl Scale {
    /// Points (1/72 inch) to pixels
    pub fn pt(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }

    /// Points to whole pixels, at least one
    pub fn px(&self, points: f64) -> u32 {
        self.pt(points).round().max(1.0) as u32
    }

    /// Inches to pixels
    pub fn inches(&self, inches: f64) -> u32 {
        (inches * self.dpi as f64).round().max(1.0) as u32
    }
}

/// One line on a [`Panel`]. `x` and `y` have equal length.
#[derive(Debug, Clone)]
pub struct LineSpec<'a> {
    pub label: String,
    pub x: &'a [i64],
    pub y: &'a [f64],
    pub color: RGBColor,
    pub dashed: bool,
}

/// A single set of axes with concurrency on x.
#[derive(Debug, Clone)]
pub struct Panel<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub lines: Vec<LineSpec<'a>>,
    pub legend: bool,
}

fn x_range(lines: &[LineSpec<'_>]) -> Result<Range<i64>, RenderError> {
    let (min, max) = lines
        .iter()
        .flat_map(|line| line.x.iter().copied())
        .minmax()
        .into_option()
        .unwrap_or((0, 1));
    let overflow = || RenderError::AxisOverflow("x");
    let pad = (max.checked_sub(min).ok_or_else(overflow)? / 20).max(1);
    Ok(min.checked_sub(pad).ok_or_else(overflow)?..max.checked_add(pad).ok_or_else(overflow)?)
}

fn y_range(lines: &[LineSpec<'_>]) -> Result<Range<f64>, RenderError> {
    let values = lines
        .iter()
        .flat_map(|line| line.y.iter().copied())
        .filter(|v| v.is_finite());
    let (min, max) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = max - min;
    if span <= 0.0 {
        return Ok(min..(min + 1.0));
    }
    let top = max + span * 0.1;
    if !span.is_finite() || !top.is_finite() {
        return Err(RenderError::AxisOverflow("y"));
    }
    Ok(min..top)
}

impl Panel<'_> {
    /// Padded x and y axis ranges. Fails when the data cannot be laid out on
    /// an axis, e.g. when padding would overflow `i64`.
    pub fn ranges(&self) -> Result<(Range<i64>, Range<f64>), RenderError> {
        Ok((x_range(&self.lines)?, y_range(&self.lines)?))
    }

    pub fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>, scale: Scale) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        let (x_range, y_range) = self.ranges()?;
        let mut chart = ChartBuilder::on(area)
            .caption(self.title, (FONT_FAMILY, scale.pt(11.0)))
            .margin(scale.px(8.0))
            .x_label_area_size(scale.px(30.0))
            .y_label_area_size(scale.px(48.0))
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(self.x_desc)
            .y_desc(self.y_desc)
            .label_style((FONT_FAMILY, scale.pt(8.0)))
            .axis_desc_style((FONT_FAMILY, scale.pt(9.0)))
            .bold_line_style(BLACK.mix(0.12))
            .light_line_style(TRANSPARENT)
            .draw()?;

        let stroke = scale.px(1.5);
        let marker = scale.px(3.0);
        let legend_len = scale.pt(16.0) as i32;
        for line in &self.lines {
            let points = line.x.iter().copied().zip(line.y.iter().copied());
            let style = line.color.stroke_width(stroke);
            let anno = if line.dashed {
                chart.draw_series(points.clone().map(|p| Circle::new(p, marker, line.color.filled())))?;
                chart.draw_series(DashedLineSeries::new(
                    points,
                    scale.px(5.0),
                    scale.px(3.0),
                    style,
                ))?
            } else {
                chart.draw_series(LineSeries::new(points, style).point_size(marker))?
            };
            if self.legend {
                let color = line.color;
                anno.label(line.label.clone()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + legend_len, y)], color.stroke_width(stroke))
                });
            }
        }

        if self.legend && !self.lines.is_empty() {
            chart
                .configure_series_labels()
                .label_font((FONT_FAMILY, scale.pt(8.0)))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK.mix(0.3))
                .position(SeriesLabelPosition::UpperLeft)
                .draw()?;
        }
        Ok(())
    }
}

/// Draws centred lines of small text from the top of `area`.
pub fn draw_caption<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    lines: &[String],
    scale: Scale,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let style = (FONT_FAMILY, scale.pt(CAPTION_POINTS))
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let center = area.dim_in_pixel().0 as i32 / 2;
    let line_height = caption_line_height(scale);
    for (idx, line) in lines.iter().enumerate() {
        area.draw_text(line, &style, (center, (line_height * idx as f64).round() as i32))?;
    }
    Ok(())
}

const CAPTION_POINTS: f64 = 8.0;

fn caption_line_height(scale: Scale) -> f64 {
    scale.pt(CAPTION_POINTS) * 1.4
}

/// Pixel height needed below the panels for `lines` of caption text.
pub fn caption_height(lines: usize, scale: Scale) -> u32 {
    if lines == 0 {
        return 0;
    }
    (caption_line_height(scale) * lines as f64 + scale.pt(6.0)).round() as u32
}

/// A figure that can be drawn onto any plotters backend.
pub trait Figure {
    /// Width and height in inches
    fn size_inches(&self) -> (f64, f64);

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, scale: Scale) -> Result<()>
    where
        DB::ErrorType: 'static;
}

fn draw_on<DB: DrawingBackend, F: Figure>(
    figure: &F,
    root: DrawingArea<DB, Shift>,
    scale: Scale,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    figure.draw(&root, scale)?;
    root.present()?;
    Ok(())
}

/// Draws `figure` into a single file, picking the backend from `format`.
pub fn save_figure<F: Figure>(figure: &F, format: ImageFormat, path: &Path, dpi: u32) -> Result<()> {
    let scale = Scale { dpi };
    let (width, height) = figure.size_inches();
    let size = (scale.inches(width), scale.inches(height));
    debug!("Drawing {} at {}x{}", path.display(), size.0, size.1);

    let drawn = match format {
        ImageFormat::Svg => draw_on(figure, SVGBackend::new(path, size).into_drawing_area(), scale),
        ImageFormat::Png | ImageFormat::Jpg | ImageFormat::Bmp => {
            draw_on(figure, BitMapBackend::new(path, size).into_drawing_area(), scale)
        }
    };
    drawn.with_context(|| format!("Draw {}", path.display()))
}

/// Writes `<stem>.<ext>` into the output directory for every requested format,
/// announcing each file on stdout.
pub fn save_figure_formats<F: Figure>(
    figure: &F,
    stem: &str,
    settings: &Settings,
) -> Result<ChartOutputs> {
    create_dir_all(&settings.output)
        .with_context(|| format!("Create output directory {}", settings.output.display()))?;

    let mut outputs = ChartOutputs::new();
    for format in &settings.formats {
        let path = settings
            .output
            .join(format!("{stem}.{}", format.extension()));
        save_figure(figure, *format, &path, settings.dpi)?;
        println!("[plot-bench] wrote {}", path.display());
        outputs.insert(format.extension().to_owned(), path);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use plotters::prelude::*;
    use tempfile::tempdir;

    use super::*;

    struct Square;

    impl Figure for Square {
        fn size_inches(&self) -> (f64, f64) {
            (1.0, 1.0)
        }

        fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>, _: Scale) -> Result<()>
        where
            DB::ErrorType: 'static,
        {
            root.draw(&Rectangle::new([(2, 2), (10, 10)], BLUE.filled()))?;
            Ok(())
        }
    }

    #[test]
    fn parses_formats() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!(".svg".parse::<ImageFormat>().unwrap(), ImageFormat::Svg);
        assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpg);
        assert_eq!(ImageFormat::Jpg.to_string(), "jpg");
        assert!(matches!(
            "pdf".parse::<ImageFormat>(),
            Err(FormatError::Unsupported(f)) if f == "pdf"
        ));
    }

    #[test]
    fn scale_converts_units() {
        let scale = Scale { dpi: 144 };
        assert_eq!(scale.pt(12.0), 24.0);
        assert_eq!(scale.inches(12.0), 1728);
        assert_eq!(Scale { dpi: 1 }.px(0.1), 1);
    }

    fn panel<'a>(x: &'a [i64], y: &'a [f64]) -> Panel<'a> {
        Panel {
            title: "Throughput",
            x_desc: "Concurrent clients",
            y_desc: "Requests / second",
            lines: vec![LineSpec {
                label: "rps".to_owned(),
                x,
                y,
                color: series_color(0),
                dashed: false,
            }],
            legend: false,
        }
    }

    #[test]
    fn ranges_pad_both_axes() {
        let (x, y) = panel(&[0, 100], &[50.0, 200.0]).ranges().unwrap();
        assert_eq!(x, -5..105);
        assert_eq!(y, 0.0..220.0);

        let (x, y) = panel(&[7], &[0.0]).ranges().unwrap();
        assert_eq!(x, 6..8);
        assert_eq!(y, 0.0..1.0);
    }

    #[test]
    fn extreme_concurrency_is_a_render_error() {
        assert!(matches!(
            panel(&[i64::MAX], &[5.0]).ranges(),
            Err(RenderError::AxisOverflow("x"))
        ));
        assert!(matches!(
            panel(&[i64::MIN, i64::MAX], &[5.0, 6.0]).ranges(),
            Err(RenderError::AxisOverflow("x"))
        ));
    }

    #[test]
    fn unbounded_y_span_is_a_render_error() {
        assert!(matches!(
            panel(&[1, 2], &[-1.7e308, 1.7e308]).ranges(),
            Err(RenderError::AxisOverflow("y"))
        ));
        assert!(matches!(
            panel(&[1, 2], &[0.0, 1.7e308]).ranges(),
            Err(RenderError::AxisOverflow("y"))
        ));
    }

    #[test]
    fn writes_every_format() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            output: dir.path().join("charts"),
            formats: vec![ImageFormat::Png, ImageFormat::Svg],
            dpi: 32,
            ..Settings::default()
        };

        let outputs = save_figure_formats(&Square, "square", &settings).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["png"], settings.output.join("square.png"));
        assert_eq!(outputs["svg"], settings.output.join("square.svg"));
        assert!(outputs.values().all(|path| path.is_file()));
    }
}
