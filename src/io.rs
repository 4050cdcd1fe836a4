use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Structurally invalid input. The only error family that terminates a run;
/// everything above candidate level degrades to warnings.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: expected a JSON array of candidates")]
    NotAnArray { path: String },

    #[error("{path}: expected a JSON object")]
    NotAnObject { path: String },
}

/// Read and deserialize a whole JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Read a JSON file expected to hold an array, with a shape-specific error.
pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| InputError::Json {
            path: path.display().to_string(),
            source,
        })?;
    if !value.is_array() {
        return Err(InputError::NotAnArray {
            path: path.display().to_string(),
        });
    }
    serde_json::from_value(value).map_err(|source| InputError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Pretty-print a value as JSON, creating parent directories first.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write plain text, creating parent directories first.
pub fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
