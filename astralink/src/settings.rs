//! Declarative table of every Trackastra setting.
//!
//! One [`Setting`] row ties together the persistent key, the user-facing name,
//! the command-line flag and the accessors on [`TrackastraConfig`]. Checking,
//! command building and the key/value settings map all walk the same table, so
//! the order of [`SETTINGS`] is the order flags appear on the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{LauncherKind, ModelSource, TrackastraConfig};

pub const KEY_LAUNCHER: &str = "LAUNCHER";
pub const KEY_CONDA_ROOT: &str = "CONDA_ROOT";
pub const KEY_CONDA_ENV: &str = "CONDA_ENV";
pub const KEY_PYTHON_PATH: &str = "PYTHON_PATH";
pub const KEY_EXECUTABLE_PATH: &str = "EXECUTABLE_PATH";
pub const KEY_PRETRAINED_OR_CUSTOM: &str = "PRETRAINED_OR_CUSTOM";
pub const KEY_PRETRAINED_MODEL: &str = "PRETRAINED_MODEL";
pub const KEY_CUSTOM_MODEL_PATH: &str = "CUSTOM_MODEL_PATH";
pub const KEY_TRACKING_MODE: &str = "TRACKING_MODE";
pub const KEY_DEVICE: &str = "DEVICE";
pub const KEY_INPUT_IMGS_FOLDER: &str = "INPUT_IMGS_FOLDER";
pub const KEY_INPUT_MASKS_FOLDER: &str = "INPUT_MASKS_FOLDER";
pub const KEY_OUTPUT_EDGE_TABLE_PATH: &str = "OUTPUT_EDGE_TABLE_PATH";
pub const KEY_TARGET_CHANNEL: &str = "TARGET_CHANNEL";
pub const KEY_TEMP_ROOT: &str = "TEMP_ROOT";

/// Value of one setting in the host's key/value settings map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    pub fn path(path: &Path) -> Self {
        SettingValue::Text(path.display().to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SettingValue::Text(text) if text.trim().is_empty())
    }
}

pub type SettingsMap = BTreeMap<String, SettingValue>;

pub type ReadFn = fn(&TrackastraConfig) -> Option<SettingValue>;
pub type WriteFn = fn(&mut TrackastraConfig, &SettingValue) -> Result<(), String>;

pub struct Setting {
    pub key: &'static str,
    pub name: &'static str,
    pub flag: Option<&'static str>,
    pub required: bool,
    /// Hidden settings are filled in by the tracker itself but still emitted.
    pub visible: bool,
    /// Only the selected member of a selectable group is active.
    pub active: fn(&TrackastraConfig) -> bool,
    pub read: ReadFn,
    pub write: WriteFn,
    /// Translates a stored value into its command-line token.
    pub to_token: fn(&SettingValue) -> Option<String>,
}

impl std::fmt::Debug for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setting")
            .field("key", &self.key)
            .field("flag", &self.flag)
            .finish_non_exhaustive()
    }
}

fn always(_: &TrackastraConfig) -> bool {
    true
}

fn text_token(value: &SettingValue) -> Option<String> {
    match value {
        SettingValue::Text(text) => Some(text.clone()),
        SettingValue::Int(value) => Some(value.to_string()),
        SettingValue::Flag(_) => None,
    }
}

fn no_token(_: &SettingValue) -> Option<String> {
    None
}

fn text<T: ToString>(value: &T) -> Option<SettingValue> {
    Some(SettingValue::Text(value.to_string()))
}

fn path(value: &Option<PathBuf>) -> Option<SettingValue> {
    value.as_deref().map(SettingValue::path)
}

fn parse_choice<T: FromStr>(value: &SettingValue) -> Result<T, String> {
    let text = value.as_text().ok_or("expected a text value")?;
    text.parse()
        .map_err(|_| format!("'{text}' is not one of the accepted values"))
}

fn parse_path(value: &SettingValue) -> Result<Option<PathBuf>, String> {
    let text = value.as_text().ok_or("expected a path")?;
    Ok((!text.trim().is_empty()).then(|| PathBuf::from(text)))
}

pub static SETTINGS: &[Setting] = &[
    Setting {
        key: KEY_LAUNCHER,
        name: "Launcher",
        flag: None,
        required: true,
        visible: true,
        active: always,
        read: |c| text(&c.launcher),
        write: |c, v| {
            c.launcher = parse_choice(v)?;
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_CONDA_ROOT,
        name: "Conda root folder",
        flag: None,
        required: true,
        visible: true,
        active: |c| c.launcher == LauncherKind::Conda,
        read: |c| path(&c.conda_root),
        write: |c, v| {
            c.conda_root = parse_path(v)?;
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_CONDA_ENV,
        name: "Conda environment",
        flag: None,
        required: true,
        visible: true,
        active: |c| c.launcher == LauncherKind::Conda,
        read: |c| text(&c.conda_env),
        write: |c, v| {
            c.conda_env = v.as_text().ok_or("expected a text value")?.trim().to_string();
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_PYTHON_PATH,
        name: "Python executable",
        flag: None,
        required: true,
        visible: true,
        active: |c| c.launcher == LauncherKind::Python,
        read: |c| path(&c.python_path),
        write: |c, v| {
            c.python_path = parse_path(v)?;
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_EXECUTABLE_PATH,
        name: "Trackastra executable",
        flag: None,
        required: true,
        visible: true,
        active: |c| c.launcher == LauncherKind::Executable,
        read: |c| path(&c.executable_path),
        write: |c, v| {
            c.executable_path = parse_path(v)?;
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_PRETRAINED_OR_CUSTOM,
        name: "Pretrained or custom model",
        flag: None,
        required: true,
        visible: true,
        active: always,
        read: |c| text(&c.model_source),
        write: |c, v| {
            c.model_source = parse_choice(v)?;
            Ok(())
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_PRETRAINED_MODEL,
        name: "Model pretrained",
        flag: Some("--model-pretrained"),
        required: true,
        visible: true,
        active: |c| c.model_source == ModelSource::Pretrained,
        read: |c| text(&c.pretrained_model),
        write: |c, v| {
            c.pretrained_model = parse_choice(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_CUSTOM_MODEL_PATH,
        name: "Path to a custom model",
        flag: Some("--model-custom"),
        required: true,
        visible: true,
        active: |c| c.model_source == ModelSource::Custom,
        read: |c| path(&c.custom_model_path),
        write: |c, v| {
            c.custom_model_path = parse_path(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_TRACKING_MODE,
        name: "Tracking mode",
        flag: Some("--mode"),
        required: true,
        visible: true,
        active: always,
        read: |c| text(&c.tracking_mode),
        write: |c, v| {
            c.tracking_mode = parse_choice(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_DEVICE,
        name: "Use GPU",
        flag: Some("--device"),
        required: true,
        visible: true,
        active: always,
        read: |c| text(&c.device),
        write: |c, v| {
            c.device = parse_choice(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_INPUT_IMGS_FOLDER,
        name: "Input image folder path",
        flag: Some("--imgs"),
        required: true,
        visible: false,
        active: always,
        read: |c| path(&c.image_folder),
        write: |c, v| {
            c.image_folder = parse_path(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_INPUT_MASKS_FOLDER,
        name: "Input mask folder path",
        flag: Some("--masks"),
        required: true,
        visible: false,
        active: always,
        read: |c| path(&c.mask_folder),
        write: |c, v| {
            c.mask_folder = parse_path(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_OUTPUT_EDGE_TABLE_PATH,
        name: "Output edge table path",
        flag: Some("--output-edge-table"),
        required: true,
        visible: false,
        active: always,
        read: |c| path(&c.output_edge_table),
        write: |c, v| {
            c.output_edge_table = parse_path(v)?;
            Ok(())
        },
        to_token: text_token,
    },
    Setting {
        key: KEY_TARGET_CHANNEL,
        name: "Target channel",
        flag: None,
        required: true,
        visible: true,
        active: always,
        read: |c| Some(SettingValue::Int(c.target_channel as i64)),
        write: |c, v| match v {
            SettingValue::Int(channel) => {
                c.target_channel = u32::try_from(*channel)
                    .map_err(|_| format!("{channel} is not a valid channel"))?;
                Ok(())
            }
            _ => Err("expected an integer".to_string()),
        },
        to_token: no_token,
    },
    Setting {
        key: KEY_TEMP_ROOT,
        name: "Temporary folder",
        flag: None,
        required: false,
        visible: true,
        active: always,
        read: |c| path(&c.temp_root),
        write: |c, v| {
            c.temp_root = parse_path(v)?;
            Ok(())
        },
        to_token: no_token,
    },
];

pub fn find(key: &str) -> Option<&'static Setting> {
    SETTINGS.iter().find(|setting| setting.key == key)
}
