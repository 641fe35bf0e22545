use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FileExtensionError {
    #[error("Failed to get file extension of '{0}'")]
    MissingFileExtension(String),
    #[error("Unsupported file extension for file: {0}")]
    UnsupportedFileExtension(String),
}

pub type FileFormatResult<T> = Result<T, FileExtensionError>;

pub fn get_file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|os_str| os_str.to_str())
}

/// Text formats accepted for configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerdeFormat {
    Yaml,
    Json,
}

impl SerdeFormat {
    pub fn from_path(path: &Path) -> FileFormatResult<Self> {
        let ext = get_file_extension(path)
            .ok_or_else(|| FileExtensionError::MissingFileExtension(path.display().to_string()))?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(FileExtensionError::UnsupportedFileExtension(
                path.display().to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_picked_from_extension() {
        assert_eq!(
            SerdeFormat::from_path(Path::new("cfg/tracker.YML")).unwrap(),
            SerdeFormat::Yaml
        );
        assert_eq!(
            SerdeFormat::from_path(Path::new("tracker.json")).unwrap(),
            SerdeFormat::Json
        );
    }

    #[test]
    fn unknown_or_missing_extension_is_rejected() {
        assert!(matches!(
            SerdeFormat::from_path(Path::new("tracker.toml")),
            Err(FileExtensionError::UnsupportedFileExtension(_))
        ));
        assert!(matches!(
            SerdeFormat::from_path(Path::new("tracker")),
            Err(FileExtensionError::MissingFileExtension(_))
        ));
    }
}
