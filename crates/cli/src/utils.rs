use eyre::{Result, WrapErr};
use serde::{Serialize, de::DeserializeOwned};
use std::{fs, path::Path};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initializes a tracing subscriber for logging, filtered by `RUST_LOG`.
pub fn subscriber() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        debug!("failed to set tracing subscriber: {e}");
    }
}

/// Colors output only when writing to a terminal that supports it.
pub fn enable_paint() {
    yansi::whenever(yansi::Condition::TTY_AND_COLOR);
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Reads and deserializes the JSON file at `path`.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = read_to_string(path)?;
    serde_json::from_str(&contents)
        .wrap_err_with(|| format!("failed to deserialize {}", path.display()))
}

/// Writes `value` as pretty JSON, to `path` if given and to stdout otherwise.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            fs::write(path, json).wrap_err_with(|| format!("failed to write {}", path.display()))
        }
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = BTreeMap::from([("a.sol", 3usize)]);
        write_json(&value, Some(&path)).unwrap();
        let read: BTreeMap<String, usize> = read_json_file(&path).unwrap();
        assert_eq!(read["a.sol"], 3);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = read_json_file::<serde_json::Value>(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"), "{err}");
    }
}
