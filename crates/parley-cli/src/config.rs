//! CLI configuration file.
//!
//! `{config_root}/config.yaml`, all fields optional. Credentials come from
//! the environment, never from this file.

use std::path::Path;

use anyhow::{Context, Result};
use parley_session::DeviceProfile;
use serde::{Deserialize, Serialize};

fn default_platform() -> String {
    "native".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Upstream model identifier; falls back to the session default.
    #[serde(default)]
    pub model: Option<String>,
    /// "web" or "native"; controls history sizing.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Approximate available memory in MB for the native history heuristic.
    #[serde(default)]
    pub available_memory_mb: Option<u64>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            model: None,
            platform: default_platform(),
            available_memory_mb: None,
        }
    }
}

impl CliConfig {
    /// Read `config.yaml` under `root`; a missing file yields defaults, a
    /// malformed one is an error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn device_profile(&self) -> DeviceProfile {
        match self.platform.as_str() {
            "web" => DeviceProfile::Web,
            _ => DeviceProfile::Native {
                available_memory_mb: self.available_memory_mb,
            },
        }
    }
}
