use crate::error::HangarError;
use crate::infra::tmux::{ENV_HOME, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global config: ~/.config/hangar/config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Command `hangar start` runs inside the pane, through `$SHELL -c`.
    pub agent_command: String,
    /// Shell used to run `agent_command`; falls back to `$SHELL`, then `/bin/sh`.
    pub shell: Option<String>,
    pub tmux_history_limit: u32,
    pub tmux_mouse: bool,
    pub tmux_status: bool,
    /// Extra tmux config sourced after each session is created.
    pub tmux_config: Option<PathBuf>,
    /// tmux server socket name (`tmux -L`); unset uses the default server.
    pub tmux_socket: Option<String>,
    /// Registry poll interval for the dashboard.
    pub poll_interval_ms: u64,
    pub monitor_interval_ms: u64,
    /// Watch pane output for questions when the agent has no hooks.
    pub prompt_monitor: bool,
    /// Desktop notification when a session starts waiting on the user.
    pub notify_on_prompt: bool,
    /// Seconds before a dashboard error message clears itself.
    pub error_clear_secs: u64,
    /// Ignore hook events whose execution ID does not match the session's.
    pub strict_execution_id: bool,
    /// Export HANGAR_DEBUG=1 into new sessions.
    pub debug_env: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            agent_command: "claude".into(),
            shell: None,
            tmux_history_limit: 50_000,
            tmux_mouse: true,
            tmux_status: false,
            tmux_config: None,
            tmux_socket: None,
            poll_interval_ms: 2000,
            monitor_interval_ms: 2000,
            prompt_monitor: false,
            notify_on_prompt: true,
            error_clear_secs: 5,
            strict_execution_id: false,
            debug_env: false,
        }
    }
}

impl GlobalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(100))
    }

    pub fn error_clear_after(&self) -> Duration {
        Duration::from_secs(self.error_clear_secs)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mouse: self.tmux_mouse,
            history_limit: self.tmux_history_limit,
            status_bar: self.tmux_status,
        }
    }

    pub fn shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

/// Load the global config, or defaults when the file does not exist.
pub fn load_config() -> Result<GlobalConfig, HangarError> {
    load_config_from(&global_config_dir().join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<GlobalConfig, HangarError> {
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| HangarError::Config(format!("Failed to read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| HangarError::Config(format!("Failed to parse {}: {e}", path.display())))
}

pub fn global_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("hangar")
}

/// Where the registry and log live: explicit flag, then `HANGAR_HOME`, then
/// the platform data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            std::env::var_os(ENV_HOME)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("hangar")
        })
}
