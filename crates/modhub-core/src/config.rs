// ABOUTME: Hub configuration loaded from TOML with defaults for every field.
// ABOUTME: Covers listen addresses, modules directory, supervisor and aggregation tuning, and companions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// HTTP API listen address
    pub http_addr: String,
    /// Hub gRPC listen address; also handed to modules as their hub address
    pub grpc_addr: String,
    /// Modules directory. If unset, `modules/` next to the hub executable.
    pub modules_dir: Option<PathBuf>,
    /// Refuse to launch a companion's dev build when a UI launch is requested
    pub require_release: bool,
    pub supervisor: SupervisorConfig,
    pub aggregation: AggregationConfig,
    pub companions: Vec<CompanionModule>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:9000".to_string(),
            grpc_addr: "127.0.0.1:19000".to_string(),
            modules_dir: None,
            require_release: true,
            supervisor: SupervisorConfig::default(),
            aggregation: AggregationConfig::default(),
            companions: Vec::new(),
        }
    }
}

/// Process supervision tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Overall deadline for a started module to accept TCP connections
    pub readiness_timeout_ms: u64,
    pub readiness_poll_ms: u64,
    /// Timeout of a single readiness connect attempt
    pub probe_connect_timeout_ms: u64,
    /// How long a stopping module gets to exit on its own before it is killed
    pub stop_grace_ms: u64,
    pub disconnect_timeout_ms: u64,
    /// Parent environment variables with these prefixes are not passed to modules
    pub strip_env_prefixes: Vec<String>,
    /// Prefix of the variables injected into module environments
    pub env_prefix: String,
    /// Extra variables set on every module, applied last
    pub extra_env: BTreeMap<String, String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: 5000,
            readiness_poll_ms: 200,
            probe_connect_timeout_ms: 300,
            stop_grace_ms: 500,
            disconnect_timeout_ms: 2000,
            strip_env_prefixes: vec!["WAILS".to_string(), "VITE".to_string()],
            env_prefix: "MODHUB".to_string(),
            extra_env: BTreeMap::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn probe_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_connect_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}

/// Summary aggregation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Overall budget for the widget/info RPCs of one module
    pub rpc_timeout_ms: u64,
    /// Budget for the follow-up HTTP payload fetch
    pub http_timeout_ms: u64,
    /// Modules queried at the same time
    pub max_concurrency: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 3000,
            http_timeout_ms: 2000,
            max_concurrency: 8,
        }
    }
}

impl AggregationConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// A module developed in a sibling repository.
///
/// Its executable may be found in the repository's build output when it is not
/// installed into the modules directory, and it may keep its data where the
/// standalone build keeps it so both launch paths share state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionModule {
    pub id: String,
    /// Repository root, relative to the modules directory
    pub repo_dir: PathBuf,
    /// Release build locations inside the repository, searched in order
    #[serde(default = "default_release_dirs")]
    pub release_dirs: Vec<PathBuf>,
    /// Development build locations, searched after release locations
    #[serde(default = "default_dev_dirs")]
    pub dev_dirs: Vec<PathBuf>,
    /// Command shown when no release build exists
    #[serde(default)]
    pub build_hint: Option<String>,
    /// Data directory relative to the platform config dir
    #[serde(default)]
    pub shared_data_dir: Option<PathBuf>,
}

fn default_release_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("."), PathBuf::from("build/bin")]
}

fn default_dev_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("bin")]
}

impl HubConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: HubConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Default config file path (<config_dir>/modhub/hub.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("modhub").join("hub.toml"))
    }

    pub fn companion(&self, id: &str) -> Option<&CompanionModule> {
        self.companions.iter().find(|c| c.id == id)
    }
}

/// Resolve the modules directory.
///
/// An explicit directory is used when it exists. Otherwise `modules/` next to
/// the hub executable wins if it exists, and the explicit path is the last
/// resort (it is created by the caller).
pub fn resolve_modules_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let exe_modules = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("modules")));

    let Some(explicit) = explicit.filter(|p| !p.as_os_str().is_empty()) else {
        return exe_modules
            .context("modules dir is not set and the executable path is unknown");
    };

    let abs = if explicit.is_absolute() {
        explicit.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to determine current directory")?
            .join(explicit)
    };

    if abs.is_dir() {
        return Ok(abs);
    }
    if let Some(exe_modules) = exe_modules.filter(|p| p.is_dir()) {
        return Ok(exe_modules);
    }
    Ok(abs)
}
