//! Turns a checked [`TrackastraConfig`] into the token list handed to the OS.

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, LauncherKind, TrackastraConfig};
use crate::settings::{KEY_CONDA_ROOT, KEY_EXECUTABLE_PATH, KEY_PYTHON_PATH, SETTINGS};

const PYTHON_MODULE: &str = "trackastra.cli";
const WINDOWS_ENTRY_POINT: &str = "trackastra";
const SUBCOMMAND: &str = "track";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

fn required_path<'a>(path: &'a Option<PathBuf>, key: &str) -> Result<&'a Path, ConfigError> {
    path.as_deref().ok_or_else(|| ConfigError::InvalidSetting {
        key: key.to_string(),
        message: "path is not set".to_string(),
    })
}

fn to_token(path: &Path) -> String {
    path.display().to_string()
}

fn conda_python(root: &Path, env: &str, platform: Platform) -> PathBuf {
    let env_dir = if env == "base" {
        root.to_path_buf()
    } else {
        root.join("envs").join(env)
    };
    match platform {
        Platform::Windows => env_dir.join("python.exe"),
        Platform::Unix => env_dir.join("bin").join("python"),
    }
}

fn preamble(config: &TrackastraConfig, platform: Platform) -> Result<Vec<String>, ConfigError> {
    let tokens = match config.launcher {
        LauncherKind::Conda => {
            let root = required_path(&config.conda_root, KEY_CONDA_ROOT)?;
            match platform {
                Platform::Windows => vec![
                    "cmd.exe".to_string(),
                    "/c".to_string(),
                    to_token(&root.join("condabin").join("conda.bat")),
                    "activate".to_string(),
                    config.conda_env.clone(),
                    "&&".to_string(),
                    WINDOWS_ENTRY_POINT.to_string(),
                    SUBCOMMAND.to_string(),
                ],
                Platform::Unix => vec![
                    to_token(&conda_python(root, &config.conda_env, platform)),
                    "-m".to_string(),
                    PYTHON_MODULE.to_string(),
                    SUBCOMMAND.to_string(),
                ],
            }
        }
        LauncherKind::Python => vec![
            to_token(required_path(&config.python_path, KEY_PYTHON_PATH)?),
            "-m".to_string(),
            PYTHON_MODULE.to_string(),
            SUBCOMMAND.to_string(),
        ],
        LauncherKind::Executable => vec![
            to_token(required_path(&config.executable_path, KEY_EXECUTABLE_PATH)?),
            SUBCOMMAND.to_string(),
        ],
    };
    Ok(tokens)
}

/// Checks the configuration, then emits the launcher followed by one
/// `flag value` pair per active setting, in declaration order.
pub fn build_command(
    config: &TrackastraConfig,
    platform: Platform,
) -> Result<Vec<String>, ConfigError> {
    config.check()?;

    let mut tokens = preamble(config, platform)?;
    for setting in SETTINGS.iter().filter(|s| (s.active)(config)) {
        let Some(flag) = setting.flag else {
            continue;
        };
        let Some(token) = (setting.read)(config).and_then(|value| (setting.to_token)(&value)) else {
            continue;
        };
        tokens.push(flag.to_string());
        tokens.push(token);
    }
    Ok(tokens)
}

/// Joins tokens into one printable line, quoting those with spaces.
pub fn render_command(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            if token.is_empty() || token.contains(char::is_whitespace) {
                format!("\"{token}\"")
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Device, ModelSource, TrackingMode};

    fn ready() -> TrackastraConfig {
        let mut config = TrackastraConfig::new(1);
        config.conda_root = Some(PathBuf::from("/opt/conda"));
        config.image_folder = Some(PathBuf::from("/tmp/imgs"));
        config.mask_folder = Some(PathBuf::from("/tmp/masks"));
        config.output_edge_table = Some(PathBuf::from("/tmp/masks/edges.csv"));
        config
    }

    fn strs(tokens: &[String]) -> Vec<&str> {
        tokens.iter().map(String::as_str).collect()
    }

    #[test]
    fn conda_on_unix_runs_the_env_python() {
        let tokens = build_command(&ready(), Platform::Unix).unwrap();
        assert_eq!(
            strs(&tokens),
            [
                "/opt/conda/envs/trackastra/bin/python",
                "-m",
                "trackastra.cli",
                "track",
                "--model-pretrained",
                "general_2d",
                "--mode",
                "greedy",
                "--device",
                "automatic",
                "--imgs",
                "/tmp/imgs",
                "--masks",
                "/tmp/masks",
                "--output-edge-table",
                "/tmp/masks/edges.csv",
            ]
        );
    }

    #[test]
    fn base_env_uses_the_root_python() {
        let mut config = ready();
        config.conda_env = "base".to_string();
        let tokens = build_command(&config, Platform::Unix).unwrap();
        assert_eq!(tokens[0], "/opt/conda/bin/python");
    }

    #[test]
    fn conda_on_windows_activates_then_runs_the_entry_point() {
        let tokens = build_command(&ready(), Platform::Windows).unwrap();
        assert_eq!(strs(&tokens[..2]), ["cmd.exe", "/c"]);
        assert!(tokens[2].ends_with("conda.bat"));
        assert_eq!(
            strs(&tokens[3..8]),
            ["activate", "trackastra", "&&", "trackastra", "track"]
        );
    }

    #[test]
    fn only_the_selected_model_is_emitted() {
        let mut config = ready();
        config.model_source = ModelSource::Custom;
        config.custom_model_path = Some(PathBuf::from("/models/mine"));
        config.tracking_mode = TrackingMode::GreedyNodiv;
        config.device = Device::Cpu;

        let tokens = build_command(&config, Platform::Unix).unwrap();
        let line = render_command(&tokens);
        assert!(line.contains("--model-custom /models/mine"));
        assert!(!line.contains("--model-pretrained"));
        assert!(line.contains("--mode greedy_nodiv"));
        assert!(line.contains("--device cpu"));
    }

    #[test]
    fn executable_and_python_launchers() {
        let mut config = ready();
        config.launcher = LauncherKind::Executable;
        config.executable_path = Some(PathBuf::from("/usr/local/bin/trackastra"));
        let tokens = build_command(&config, Platform::Unix).unwrap();
        assert_eq!(
            strs(&tokens[..3]),
            ["/usr/local/bin/trackastra", "track", "--model-pretrained"]
        );

        config.launcher = LauncherKind::Python;
        config.python_path = Some(PathBuf::from("/usr/bin/python3"));
        let tokens = build_command(&config, Platform::Unix).unwrap();
        assert_eq!(strs(&tokens[..4]), ["/usr/bin/python3", "-m", "trackastra.cli", "track"]);
    }

    #[test]
    fn target_channel_is_never_emitted() {
        let mut config = ready();
        config.n_channels = 3;
        config.target_channel = 2;
        let tokens = build_command(&config, Platform::Unix).unwrap();
        assert!(!tokens.iter().any(|t| t.contains("channel")));
    }

    #[test]
    fn check_runs_before_building() {
        let mut config = ready();
        config.mask_folder = None;
        assert!(matches!(
            build_command(&config, Platform::Unix),
            Err(ConfigError::MissingSetting { .. })
        ));
    }

    #[test]
    fn rendering_quotes_tokens_with_spaces() {
        let tokens = vec!["python".to_string(), "/my data/masks".to_string()];
        assert_eq!(render_command(&tokens), "python \"/my data/masks\"");
    }
}
