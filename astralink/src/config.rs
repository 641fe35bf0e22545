use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::settings::{self, SettingValue, SettingsMap, SETTINGS};

pub const DEFAULT_CONDA_ENV: &str = "trackastra";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting '{name}' ({key})")]
    MissingSetting {
        key: &'static str,
        name: &'static str,
    },

    #[error("Invalid value for setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error(
        "Target channel {channel} is out of range; the source image has {n_channels} channel(s)"
    )]
    TargetChannelOutOfRange { channel: u32, n_channels: u32 },

    #[error("Failed to load configuration from '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to save configuration to '{path}': {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// How the Trackastra command line tool is started.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LauncherKind {
    /// Python of a conda environment.
    #[default]
    Conda,
    /// A python interpreter with trackastra installed.
    Python,
    /// A `trackastra` entry point.
    Executable,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelSource {
    #[default]
    Pretrained,
    Custom,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum PretrainedModel {
    #[default]
    #[serde(rename = "general_2d")]
    #[strum(serialize = "general_2d")]
    General2d,
    #[serde(rename = "ctc")]
    #[strum(serialize = "ctc")]
    Ctc,
}

/// Candidate graph pruning mode.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingMode {
    GreedyNodiv,
    #[default]
    Greedy,
    Ilp,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Device {
    /// Cuda or mps when available, cpu otherwise.
    #[default]
    Automatic,
    Mps,
    Cuda,
    Cpu,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackastraConfig {
    pub launcher: LauncherKind,
    pub conda_root: Option<PathBuf>,
    pub conda_env: String,
    pub python_path: Option<PathBuf>,
    pub executable_path: Option<PathBuf>,

    pub model_source: ModelSource,
    pub pretrained_model: PretrainedModel,
    pub custom_model_path: Option<PathBuf>,
    pub tracking_mode: TrackingMode,
    pub device: Device,

    pub image_folder: Option<PathBuf>,
    pub mask_folder: Option<PathBuf>,
    pub output_edge_table: Option<PathBuf>,

    /// 1-based channel of the source image holding the tracked objects.
    pub target_channel: u32,
    pub temp_root: Option<PathBuf>,

    #[serde(skip)]
    pub n_channels: u32,
}

impl Default for TrackastraConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherKind::default(),
            conda_root: None,
            conda_env: DEFAULT_CONDA_ENV.to_string(),
            python_path: None,
            executable_path: None,
            model_source: ModelSource::default(),
            pretrained_model: PretrainedModel::default(),
            custom_model_path: None,
            tracking_mode: TrackingMode::default(),
            device: Device::default(),
            image_folder: None,
            mask_folder: None,
            output_edge_table: None,
            target_channel: 1,
            temp_root: None,
            n_channels: 1,
        }
    }
}

impl TrackastraConfig {
    pub fn new(n_channels: u32) -> Self {
        Self {
            n_channels,
            ..Default::default()
        }
    }

    /// Validates the active settings only; inactive members of a group are ignored.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.check_settings(true)
    }

    /// Same as [`check`](Self::check) but skips the hidden settings the tracker
    /// fills in itself, so it can run before anything is written to disk.
    pub fn check_user_settings(&self) -> Result<(), ConfigError> {
        self.check_settings(false)
    }

    fn check_settings(&self, include_hidden: bool) -> Result<(), ConfigError> {
        for setting in SETTINGS.iter().filter(|s| (s.active)(self)) {
            if !setting.required || !(include_hidden || setting.visible) {
                continue;
            }
            match (setting.read)(self) {
                Some(value) if !value.is_empty() => {}
                _ => {
                    return Err(ConfigError::MissingSetting {
                        key: setting.key,
                        name: setting.name,
                    })
                }
            }
        }

        if self.target_channel == 0 || self.target_channel > self.n_channels {
            return Err(ConfigError::TargetChannelOutOfRange {
                channel: self.target_channel,
                n_channels: self.n_channels,
            });
        }
        Ok(())
    }

    pub fn to_settings_map(&self) -> SettingsMap {
        SETTINGS
            .iter()
            .filter_map(|setting| Some((setting.key.to_string(), (setting.read)(self)?)))
            .collect()
    }

    /// Builds a configuration from a host settings map; absent keys keep their defaults.
    pub fn from_settings_map(map: &SettingsMap, n_channels: u32) -> Result<Self, ConfigError> {
        let mut config = Self::new(n_channels);
        for (key, value) in map {
            let Some(setting) = settings::find(key) else {
                warn!(key = %key, "Ignoring unknown Trackastra setting");
                continue;
            };
            (setting.write)(&mut config, value).map_err(|message| ConfigError::InvalidSetting {
                key: key.clone(),
                message,
            })?;
        }
        Ok(config)
    }

    pub fn load(path: &Path, n_channels: u32) -> Result<Self, ConfigError> {
        let mut config: Self = common::serde::load_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        config.n_channels = n_channels;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        common::serde::save_file(self, path).map_err(|source| ConfigError::Save {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn set_value(&mut self, key: &str, value: SettingValue) -> Result<(), ConfigError> {
        let setting = settings::find(key).ok_or_else(|| ConfigError::InvalidSetting {
            key: key.to_string(),
            message: "unknown setting".to_string(),
        })?;
        (setting.write)(self, &value).map_err(|message| ConfigError::InvalidSetting {
            key: key.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::*;

    fn ready(n_channels: u32) -> TrackastraConfig {
        let mut config = TrackastraConfig::new(n_channels);
        config.conda_root = Some(PathBuf::from("/opt/conda"));
        config.image_folder = Some(PathBuf::from("/tmp/imgs"));
        config.mask_folder = Some(PathBuf::from("/tmp/masks"));
        config.output_edge_table = Some(PathBuf::from("/tmp/masks/edges.csv"));
        config
    }

    #[test]
    fn defaults_match_the_tool_defaults() {
        let config = TrackastraConfig::new(2);
        assert_eq!(config.pretrained_model.as_ref(), "general_2d");
        assert_eq!(config.tracking_mode.to_string(), "greedy");
        assert_eq!(config.device.to_string(), "automatic");
        assert_eq!(config.conda_env, DEFAULT_CONDA_ENV);
        assert_eq!(config.target_channel, 1);
    }

    #[test]
    fn complete_configuration_passes() {
        ready(1).check().unwrap();
    }

    #[test]
    fn missing_required_setting_is_named() {
        let mut config = ready(1);
        config.output_edge_table = None;

        let err = config.check().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingSetting {
                key: KEY_OUTPUT_EDGE_TABLE_PATH,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Missing required setting 'Output edge table path' (OUTPUT_EDGE_TABLE_PATH)"
        );
    }

    #[test]
    fn user_settings_check_ignores_hidden_paths() {
        let mut config = TrackastraConfig::new(1);
        config.conda_root = Some(PathBuf::from("/opt/conda"));
        config.check_user_settings().unwrap();
        assert!(config.check().is_err());

        config.conda_root = None;
        assert!(matches!(
            config.check_user_settings(),
            Err(ConfigError::MissingSetting {
                key: KEY_CONDA_ROOT,
                ..
            })
        ));
    }

    #[test]
    fn only_the_selected_model_is_checked() {
        let mut config = ready(1);
        assert!(config.custom_model_path.is_none());
        config.check().unwrap();

        config.model_source = ModelSource::Custom;
        assert!(matches!(
            config.check(),
            Err(ConfigError::MissingSetting {
                key: KEY_CUSTOM_MODEL_PATH,
                ..
            })
        ));

        config.custom_model_path = Some(PathBuf::from("/models/mine"));
        config.check().unwrap();
    }

    #[test]
    fn only_the_selected_launcher_is_checked() {
        let mut config = ready(1);
        config.launcher = LauncherKind::Executable;
        assert!(matches!(
            config.check(),
            Err(ConfigError::MissingSetting {
                key: KEY_EXECUTABLE_PATH,
                ..
            })
        ));

        config.executable_path = Some(PathBuf::from("/usr/bin/trackastra"));
        config.conda_root = None;
        config.check().unwrap();
    }

    #[test]
    fn target_channel_must_exist() {
        let mut config = ready(3);
        config.target_channel = 3;
        config.check().unwrap();

        config.target_channel = 4;
        assert!(matches!(
            config.check(),
            Err(ConfigError::TargetChannelOutOfRange {
                channel: 4,
                n_channels: 3
            })
        ));
        config.target_channel = 0;
        assert!(config.check().is_err());
    }

    #[test]
    fn settings_map_round_trip() {
        let mut config = ready(2);
        config.model_source = ModelSource::Custom;
        config.custom_model_path = Some(PathBuf::from("/models/mine"));
        config.tracking_mode = TrackingMode::Ilp;
        config.target_channel = 2;

        let map = config.to_settings_map();
        assert_eq!(map[KEY_TRACKING_MODE], SettingValue::Text("ilp".into()));
        assert_eq!(map[KEY_PRETRAINED_OR_CUSTOM], SettingValue::Text("custom".into()));
        assert!(!map.contains_key(KEY_PYTHON_PATH));

        let restored = TrackastraConfig::from_settings_map(&map, 2).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn settings_map_rejects_bad_values_and_skips_unknown_keys() {
        let mut map = SettingsMap::new();
        map.insert("NOT_A_SETTING".into(), SettingValue::Flag(true));
        map.insert(KEY_DEVICE.into(), SettingValue::Text("cuda".into()));
        let config = TrackastraConfig::from_settings_map(&map, 1).unwrap();
        assert_eq!(config.device, Device::Cuda);

        map.insert(KEY_TRACKING_MODE.into(), SettingValue::Text("fast".into()));
        let err = TrackastraConfig::from_settings_map(&map, 1).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSetting { ref key, .. } if key == KEY_TRACKING_MODE
        ));

        let mut config = TrackastraConfig::new(1);
        assert!(config
            .set_value(KEY_TARGET_CHANNEL, SettingValue::Text("two".into()))
            .is_err());
    }

    #[test]
    fn files_reload_without_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ready(4);
        config.device = Device::Mps;

        for name in ["trackastra.yaml", "trackastra.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let loaded = TrackastraConfig::load(&path, 4).unwrap();
            assert_eq!(loaded, config);
        }

        let text = std::fs::read_to_string(dir.path().join("trackastra.yaml")).unwrap();
        assert!(text.contains("device: mps"));
        assert!(!text.contains("n_channels"));
    }

    #[test]
    fn unsupported_file_extension_fails_to_load() {
        let err = TrackastraConfig::load(Path::new("settings.toml"), 1).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
