use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::file_format::SerdeFormat;
use crate::normalize_string::NormalizeString;

pub type Result<T> = anyhow::Result<T>;

pub fn serialize<T: Serialize>(value: &T, format: SerdeFormat) -> Result<String> {
    let text = match format {
        SerdeFormat::Yaml => serde_yml::to_string(value)?,
        SerdeFormat::Json => serde_json::to_string_pretty(value)?,
    };
    Ok(text.normalize())
}

pub fn deserialize<T: DeserializeOwned>(text: &str, format: SerdeFormat) -> Result<T> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::from_str(text)?),
        SerdeFormat::Json => Ok(serde_json::from_str(text)?),
    }
}

pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = SerdeFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    deserialize(&text, format).with_context(|| format!("Failed to parse '{}'", path.display()))
}

pub fn save_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let format = SerdeFormat::from_path(path)?;
    let text = serialize(value, format)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write '{}'", path.display()))
}
