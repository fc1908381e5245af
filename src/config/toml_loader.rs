//! TOML configuration file reading and writing.
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Parse `content` as TOML; `path` only labels errors.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the content does not match `T`.
pub fn parse_config<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

/// Load and deserialize a TOML config file.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when the file is missing, otherwise an
/// I/O or parse error.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&content, path)
}

/// Serialize `value` as pretty TOML.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if the value cannot be represented.
pub fn to_toml_string<T: Serialize>(value: &T) -> Result<String, ConfigError> {
    toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string()))
}

/// Serialize `value` and write it to `path`, replacing the file atomically.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub fn save_config<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let content = to_toml_string(value)?;
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    std::io::Write::write_all(&mut tmp, content.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        items: BTreeMap<String, String>,
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample, _> = load_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = [unclosed").unwrap();
        let result: Result<Sample, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let value = Sample {
            name: "x".to_string(),
            items: BTreeMap::from([("a".to_string(), "b".to_string())]),
        };
        save_config(&path, &value).unwrap();
        let loaded: Sample = load_config(&path).unwrap();
        assert_eq!(loaded, value);
    }
}
