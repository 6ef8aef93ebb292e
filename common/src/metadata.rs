use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Flattened sidecar metadata, ordered by key.
pub type Metadata = BTreeMap<String, String>;

const SIDECAR_SUFFIXES: &[&str] = &["meta.json", "json"];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Could not read metadata file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Metadata file {path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Sidecar files tried for `csv_path`, in priority order.
pub fn sidecar_candidates(csv_path: &Path) -> Vec<PathBuf> {
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| csv_path.with_extension(suffix))
        .collect()
}

/// Loads the first sidecar next to `csv_path`. No sidecar is not an error and
/// yields an empty map.
pub fn load_metadata(csv_path: &Path) -> Result<Metadata, MetadataError> {
    let Some(path) = sidecar_candidates(csv_path)
        .into_iter()
        .find(|candidate| candidate.is_file())
    else {
        return Ok(Metadata::new());
    };
    debug!("Loading metadata from {}", path.display());

    let data = read_to_string(&path).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source,
    })?;
    let payload: Value =
        serde_json::from_str(&data).map_err(|source| MetadataError::InvalidJson {
            path: path.clone(),
            source,
        })?;
    let Value::Object(map) = payload else {
        return Err(MetadataError::NotAnObject { path });
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, raw)| flatten_value(raw).map(|value| (key, value)))
        .collect())
}

/// Scalars become their plain text, booleans capitalized; arrays and objects
/// are re-serialized.
/// `serde_json` keeps object keys sorted, so the encoding is stable.
fn flatten_value(raw: Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(true) => Some("True".to_owned()),
        Value::Bool(false) => Some("False".to_owned()),
        Value::Number(n) => Some(n.to_string()),
        composite @ (Value::Array(_) | Value::Object(_)) => Some(composite.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_sidecar_is_empty() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        assert!(load_metadata(&csv).unwrap().is_empty());
    }

    #[test]
    fn prefers_meta_json_over_json() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        write(dir.path().join("run.meta.json"), r#"{"title": "Meta"}"#).unwrap();
        write(dir.path().join("run.json"), r#"{"title": "Plain"}"#).unwrap();

        let metadata = load_metadata(&csv).unwrap();
        assert_eq!(metadata.get("title").map(String::as_str), Some("Meta"));
    }

    #[test]
    fn falls_back_to_plain_json() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        write(dir.path().join("run.json"), r#"{"commit": "abc123"}"#).unwrap();

        let metadata = load_metadata(&csv).unwrap();
        assert_eq!(metadata.get("commit").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn flattens_values_deterministically() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        write(
            dir.path().join("run.meta.json"),
            r#"{
                "workers": 8,
                "ratio": 1.5,
                "warm": true,
                "cold": false,
                "skipped": null,
                "tags": ["b", "a"],
                "env": {"z": 1, "a": {"y": 2, "b": 3}}
            }"#,
        )
        .unwrap();

        let metadata = load_metadata(&csv).unwrap();
        let expected: Metadata = [
            ("cold", "False"),
            ("env", r#"{"a":{"b":3,"y":2},"z":1}"#),
            ("ratio", "1.5"),
            ("tags", r#"["b","a"]"#),
            ("warm", "True"),
            ("workers", "8"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        assert_eq!(metadata, expected);
    }

    #[test]
    fn malformed_sidecar_is_an_error() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("run.csv");
        write(dir.path().join("run.meta.json"), "{not json").unwrap();
        assert!(matches!(
            load_metadata(&csv),
            Err(MetadataError::InvalidJson { .. })
        ));

        write(dir.path().join("run.meta.json"), "[1, 2]").unwrap();
        assert!(matches!(
            load_metadata(&csv),
            Err(MetadataError::NotAnObject { .. })
        ));
    }
}
