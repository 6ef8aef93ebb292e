use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use common::{
    config::{Config, DEFAULT_DATA_DIR, DEFAULT_DPI, DEFAULT_OUTPUT_DIR, Settings},
    plot::{ImageFormat, Plot},
};
use eyre::{Context, Result};
use itertools::Itertools;
use scenario_compare::ScenarioCompare;
use throughput_latency::ThroughputLatency;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod plot;

use plot::RunOutcome;

/// Library crates whose logs follow the same level as the binary
const MODULES: &[&str] = &["common", "throughput_latency", "scenario_compare"];

/// Render throughput/latency charts from benchmark CSV files.
#[derive(Parser, Debug)]
#[command(name = "plot-bench", version)]
struct Cli {
    /// CSV files or directories to scan
    #[arg(value_name = "PATHS")]
    paths: Vec<PathBuf>,
    /// Directory that receives the generated charts [default: docs/benchmarks/charts]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Image formats to write (png, svg, jpg, bmp) [default: png]
    #[arg(short, long, value_name = "FMT", num_args = 1..)]
    formats: Vec<ImageFormat>,
    /// Resolution of the generated images [default: 144]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    dpi: Option<u32>,
    /// Markdown summary to write, relative to --output unless absolute
    #[arg(long, value_name = "PATH")]
    index: Option<PathBuf>,
    /// Only scan the top level of each directory
    #[arg(long, default_value_t = false)]
    no_recursive: bool,
    /// Restrict the run to these CSV file stems
    #[arg(long, value_name = "NAME", num_args = 1..)]
    datasets: Vec<String>,
    /// Also render charts comparing every dataset
    #[arg(long, default_value_t = false)]
    compare: bool,
    /// Title prefix for the comparison charts [default: Benchmark comparison]
    #[arg(long)]
    title_prefix: Option<String>,
    /// YAML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Additional tracing filter directives
    #[arg(short, long)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Merges command line arguments over the config file over defaults.
    fn settings(&self, config: &Config) -> Settings {
        let formats = if !self.formats.is_empty() {
            self.formats.clone()
        } else {
            config
                .formats
                .clone()
                .filter(|formats| !formats.is_empty())
                .unwrap_or_else(|| vec![ImageFormat::Png])
        };
        let paths = if !self.paths.is_empty() {
            self.paths.clone()
        } else {
            config
                .paths
                .clone()
                .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_DATA_DIR)])
        };

        Settings {
            paths,
            output: self
                .output
                .clone()
                .or_else(|| config.output.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            formats: formats.into_iter().unique().collect(),
            dpi: self.dpi.or(config.dpi).unwrap_or(DEFAULT_DPI),
            index: self.index.clone().or_else(|| config.index.clone()),
            recursive: !self.no_recursive && config.recursive.unwrap_or(true),
            datasets: if self.datasets.is_empty() {
                config.datasets.clone().unwrap_or_default()
            } else {
                self.datasets.clone()
            },
        }
    }

    /// Plots from the config file, or the per-dataset chart alone. `--compare`
    /// adds the comparison charts and `--title-prefix` overrides their title.
    fn plots(&self, config: &Config) -> Vec<Box<dyn Plot>> {
        let mut plots = config
            .plots
            .clone()
            .unwrap_or_else(|| vec![Box::new(ThroughputLatency::default()) as Box<dyn Plot>]);

        let compare = ScenarioCompare::default();
        let configured = plots.iter().any(|plot| plot.name() == compare.name());
        match &self.title_prefix {
            Some(title_prefix) if configured || self.compare => {
                plots.retain(|plot| plot.name() != compare.name());
                plots.push(Box::new(ScenarioCompare {
                    title_prefix: title_prefix.clone(),
                }));
            }
            _ if self.compare && !configured => plots.push(Box::new(compare)),
            _ => {}
        }
        plots
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents =
        read_to_string(path).with_context(|| format!("Read config {}", path.display()))?;
    let config: Config = serde_yml::from_str(&contents)
        .with_context(|| format!("Parse config {}", path.display()))?;
    eyre::ensure!(
        config.dpi != Some(0),
        "Invalid config {}: dpi must be at least 1",
        path.display()
    );
    Ok(config)
}

fn init_tracing(args: &Cli) -> Result<Option<WorkerGuard>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let mut env_filter = EnvFilter::new(format!("plot_bench={log_level}"));

    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    let (file_layer, guard) = match &args.log_file {
        Some(log_file) => {
            let dir = log_file
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = log_file
                .file_name()
                .ok_or_else(|| eyre::eyre!("Invalid log file {}", log_file.display()))?;
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(layer().with_ansi(false).with_writer(non_blocking)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(file_layer)
        .init();
    Ok(guard)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let _guard = init_tracing(&args)?;

    let config = load_config(args.config.as_deref())?;
    let settings = args.settings(&config);
    let plots = args.plots(&config);
    debug!(
        "Settings: {settings:?}, plots: {:?}",
        plots.iter().map(|plot| plot.name()).collect_vec()
    );

    match plot::run(&settings, &plots) {
        Ok(RunOutcome::Rendered {
            manifest,
            combined,
            index,
        }) => {
            info!(
                "Charted {} datasets, {} comparison charts",
                manifest.len(),
                combined.len()
            );
            if let Some(index) = index {
                info!("Index at {}", index.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(RunOutcome::NoInputs | RunOutcome::NothingRendered) => Ok(ExitCode::FAILURE),
        Err(err) => {
            error!("{err:#?}");
            Err(err)
        }
    }
}
