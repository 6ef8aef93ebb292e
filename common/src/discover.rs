use std::{
    collections::HashSet,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::dataset::file_stem;

pub const DATA_EXTENSION: &str = "csv";

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DATA_EXTENSION))
}

fn scan_dir(dir: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> {
    let walker = WalkDir::new(dir).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };
    walker
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error while scanning {}: {err}", dir.display());
                None
            }
        })
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_csv(path) && path.is_file())
}

/// Expands files and directories into a sorted, de-duplicated list of CSV
/// files. Paths that are neither are skipped with a warning.
pub fn discover_csv_files(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut csv_files = Vec::new();
    for path in paths {
        if path.is_dir() {
            csv_files.extend(scan_dir(path, recursive));
        } else if is_csv(path) && path.is_file() {
            csv_files.push(path.clone());
        } else {
            warn!("Skipping {} (not a CSV file or directory)", path.display());
        }
    }

    let mut seen = HashSet::new();
    let mut unique_files: Vec<PathBuf> = csv_files
        .into_iter()
        .filter(|path| {
            let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
            seen.insert(resolved)
        })
        .collect();
    unique_files.sort();
    debug!("Discovered {} CSV files", unique_files.len());
    unique_files
}

/// Keeps only files whose stem is listed in `names`. Names may be given with
/// or without the `.csv` extension. An empty list keeps everything.
pub fn filter_datasets(files: Vec<PathBuf>, names: &[String]) -> Vec<PathBuf> {
    if names.is_empty() {
        return files;
    }
    let selected: HashSet<String> = names
        .iter()
        .map(|name| file_stem(Path::new(name)))
        .collect();
    files
        .into_iter()
        .filter(|path| selected.contains(&file_stem(path)))
        .collect()
}
