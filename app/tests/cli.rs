use std::{
    fs::{create_dir_all, read_dir, read_to_string, write},
    path::Path,
    process::{Command, Output},
};

use pretty_assertions::assert_eq;
use tempfile::{TempDir, tempdir};

const WARM_CACHE: &str = "scenario,concurrency,rps,latency_p50,latency_p99\n\
    warm-cache,50,4000,8,35\n\
    warm-cache,5,400,4,15\n\
    warm-cache,10,1000,5,20\n";

fn plot_bench(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_plot-bench"))
        .current_dir(cwd)
        .args(args)
        .args(["--dpi", "48"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(path, contents).unwrap();
    }
    dir
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn renders_default_data_directory() {
    let dir = workspace(&[("docs/benchmarks/data/warm-cache.csv", WARM_CACHE)]);

    let output = plot_bench(dir.path(), &[]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        listing(&dir.path().join("docs/benchmarks/charts")),
        vec!["warm-cache.png"]
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[plot-bench] wrote"));
    assert!(stdout.contains("warm-cache.png"));
}

#[test]
fn header_only_file_fails() {
    let dir = workspace(&[("data/empty.csv", "concurrency,rps,latency_p50\n")]);

    let output = plot_bench(dir.path(), &["data", "-o", "charts"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No charts were generated."));
    assert!(!dir.path().join("charts").exists());
}

#[test]
fn missing_inputs_fail() {
    let dir = workspace(&[]);

    let output = plot_bench(dir.path(), &["nowhere"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        String::from_utf8_lossy(&output.stderr)
            .contains("No CSV files discovered. Nothing to do.")
    );
}

#[test]
fn rerun_overwrites_outputs() {
    let dir = workspace(&[("data/warm-cache.csv", WARM_CACHE)]);
    let args = ["data", "-o", "charts", "-f", "png", "svg"];

    assert!(plot_bench(dir.path(), &args).status.success());
    let first = read_to_string(dir.path().join("charts/warm-cache.svg")).unwrap();
    assert!(plot_bench(dir.path(), &args).status.success());

    assert_eq!(
        listing(&dir.path().join("charts")),
        vec!["warm-cache.png", "warm-cache.svg"]
    );
    assert_eq!(
        read_to_string(dir.path().join("charts/warm-cache.svg")).unwrap(),
        first
    );
}

#[test]
fn writes_index_with_sidecar_metadata() {
    let dir = workspace(&[
        ("data/warm-cache.csv", WARM_CACHE),
        (
            "data/warm-cache.meta.json",
            r#"{"title": "Warm Cache Run", "commit": "abc123", "workers": 4}"#,
        ),
        ("data/broken.csv", "concurrency,rps\nmany,5\n"),
    ]);

    let output = plot_bench(
        dir.path(),
        &["data", "-o", "charts", "-f", "svg", "--index", "index.md"],
    );
    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Skipping"));

    let svg = read_to_string(dir.path().join("charts/warm-cache.svg")).unwrap();
    assert!(svg.contains("Warm Cache Run"));
    assert!(svg.contains("Commit: abc123"));

    let index = read_to_string(dir.path().join("charts/index.md")).unwrap();
    assert!(index.starts_with("# Benchmark charts\n\nGenerated on "));
    assert!(index.contains("## Warm Cache Run\n\n![Warm Cache Run](warm-cache.svg)"));
    assert!(index.contains("| commit | abc123 |"));
    assert!(index.contains("| workers | 4 |"));
    assert!(!index.contains("broken"));
}

#[test]
fn config_file_and_compare_flag() {
    let dir = workspace(&[
        ("runs/warm-cache.csv", WARM_CACHE),
        ("runs/nested/cold-cache.csv", "concurrency,rps,latency_p50\n1,10,2\n"),
        (
            "plot-bench.yaml",
            "paths: [runs]\noutput: out\nformats: [svg]\nrecursive: false\n",
        ),
    ]);

    let output = plot_bench(
        dir.path(),
        &["-c", "plot-bench.yaml", "--compare", "--title-prefix", "Nightly"],
    );
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        listing(&dir.path().join("out")),
        vec!["latency.svg", "throughput.svg", "warm-cache.svg"]
    );
    let throughput = read_to_string(dir.path().join("out/throughput.svg")).unwrap();
    assert!(throughput.contains("Nightly – throughput"));
}

#[test]
fn rejects_unsupported_format() {
    let dir = workspace(&[("data/warm-cache.csv", WARM_CACHE)]);

    let output = plot_bench(dir.path(), &["data", "-f", "pdf"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("pdf"));
}

#[test]
fn unplottable_file_is_skipped() {
    let dir = workspace(&[
        ("data/big.csv", "concurrency,rps\n9223372036854775807,5\n"),
        ("data/ok.csv", "concurrency,rps\n1,10\n2,18\n"),
    ]);

    let output = plot_bench(dir.path(), &["data", "-o", "charts"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(listing(&dir.path().join("charts")), vec!["ok.png"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to render"));
}

#[test]
fn rejects_zero_dpi() {
    let dir = workspace(&[
        ("data/ok.csv", "concurrency,rps\n1,10\n"),
        ("zero.yaml", "dpi: 0\n"),
    ]);

    let output = Command::new(env!("CARGO_BIN_EXE_plot-bench"))
        .current_dir(dir.path())
        .args(["data", "--dpi", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let output = Command::new(env!("CARGO_BIN_EXE_plot-bench"))
        .current_dir(dir.path())
        .args(["data", "-c", "zero.yaml"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("docs/benchmarks/charts").exists());
}
