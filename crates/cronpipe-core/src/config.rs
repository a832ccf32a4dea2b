use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StageConfig
// ---------------------------------------------------------------------------

/// One external unit of work in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    /// Script or executable, relative to the project root unless absolute.
    pub script: PathBuf,
    /// Program used to run `script`. `None` executes the script directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
}

impl StageConfig {
    pub fn python(script: &str) -> Self {
        Self {
            name: script.to_string(),
            script: PathBuf::from(script),
            interpreter: Some("python3".to_string()),
        }
    }
}

fn default_stages() -> Vec<StageConfig> {
    [
        "exotel_api.py",
        "import_exotel_data.py",
        "get_recording.py",
        "audio_to_text.py",
        "descrption_generation_2.py",
    ]
    .into_iter()
    .map(StageConfig::python)
    .collect()
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_min_interval")]
    pub min_interval_seconds: u64,
    #[serde(default = "default_interval")]
    pub default_interval_seconds: u64,
    #[serde(default = "default_stop_grace")]
    pub stop_grace_seconds: u64,
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

fn default_min_interval() -> u64 {
    10
}

fn default_interval() -> u64 {
    120
}

fn default_stop_grace() -> u64 {
    10
}

fn default_stage_timeout() -> u64 {
    300
}

fn default_log_file() -> PathBuf {
    PathBuf::from("pipeline_execution.log")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            min_interval_seconds: default_min_interval(),
            default_interval_seconds: default_interval(),
            stop_grace_seconds: default_stop_grace(),
            stage_timeout_seconds: default_stage_timeout(),
            log_file: default_log_file(),
            stages: default_stages(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load `.cronpipe/config.yaml`, falling back to defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.log_file)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.stages.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "no stages configured".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("duplicate stage name '{}'", stage.name),
                });
            }
            if !paths::resolve(root, &stage.script).exists() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "stage '{}' script not found: {}",
                        stage.name,
                        stage.script.display()
                    ),
                });
            }
        }

        if self.min_interval_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "min_interval_seconds must be at least 1".to_string(),
            });
        }

        if self.default_interval_seconds < self.min_interval_seconds {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "default_interval_seconds ({}) is below min_interval_seconds ({})",
                    self.default_interval_seconds, self.min_interval_seconds
                ),
            });
        }

        if self.stage_timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "stage_timeout_seconds must be at least 1".to_string(),
            });
        }

        if self.stop_grace_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "stop_grace_seconds is 0; stop will always force-kill".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
