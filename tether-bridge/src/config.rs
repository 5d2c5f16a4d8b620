//! Bridge configuration
//!
//! Every tunable of the core is a configuration value: poll cadence,
//! snapshot depth, command timeout, buffer capacity, session cap, and the
//! key sequences the connector sends. Values load from a TOML file at the
//! XDG config path; missing fields fall back to the embedded defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::{KeyMap, PollerConfig};
use tether_utils::{paths, BridgeError, Result};

/// Default configuration as TOML (for reference/documentation)
pub const DEFAULT_CONFIG_TOML: &str = r##"
# tether configuration

# Path to the tmux binary
tmux_program = "tmux"

# Pane polling cadence and snapshot scrollback depth
poll_interval_ms = 250
snapshot_lines = 200

# Per-command timeout for multiplexer commands
command_timeout_secs = 5

# Output chunks retained per session for replay
output_buffer_capacity = 500

# Creation beyond this cap fails; nothing is evicted
max_sessions = 64

# Key sequences (tmux key names)
submit_key = "Enter"
interrupt_key = "Escape"

# Input sent for permission responses
approve_input = "y"
deny_input = "n"

# Session state file; defaults to the XDG state dir when unset
# state_file = "/var/lib/tether/sessions.json"
"##;

/// Configuration for the session bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path to the tmux binary
    pub tmux_program: String,
    /// Interval between snapshot polls, milliseconds
    pub poll_interval_ms: u64,
    /// Scrollback depth of each snapshot, lines
    pub snapshot_lines: u32,
    /// Per-command timeout, seconds
    pub command_timeout_secs: u64,
    /// Output chunks retained per session for replay
    pub output_buffer_capacity: usize,
    /// Maximum number of live sessions
    pub max_sessions: usize,
    /// Named key appended after literal input to submit a line
    pub submit_key: String,
    /// Named key sent to interrupt the agent process
    pub interrupt_key: String,
    /// Input text sent for an approval
    pub approve_input: String,
    /// Input text sent for a denial
    pub deny_input: String,
    /// Session state file override
    pub state_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tmux_program: "tmux".into(),
            poll_interval_ms: 250,
            snapshot_lines: 200,
            command_timeout_secs: 5,
            output_buffer_capacity: 500,
            max_sessions: 64,
            submit_key: "Enter".into(),
            interrupt_key: "Escape".into(),
            approve_input: "y".into(),
            deny_input: "n".into(),
            state_file: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BridgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&text).map_err(|e| BridgeError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Load from the default XDG config path, falling back to defaults when
    /// no file exists
    pub fn load_default() -> Result<Self> {
        let path = paths::config_file();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::ConfigInvalid {
                path: path.to_path_buf(),
                message: "poll_interval_ms must be non-zero".into(),
            });
        }
        if self.output_buffer_capacity == 0 {
            return Err(BridgeError::ConfigInvalid {
                path: path.to_path_buf(),
                message: "output_buffer_capacity must be non-zero".into(),
            });
        }
        if self.max_sessions == 0 {
            return Err(BridgeError::ConfigInvalid {
                path: path.to_path_buf(),
                message: "max_sessions must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Command timeout as a duration
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Effective session state file path
    pub fn persistence_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(paths::state_file)
    }

    pub(crate) fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval(),
            snapshot_lines: self.snapshot_lines,
        }
    }

    pub(crate) fn key_map(&self) -> KeyMap {
        KeyMap {
            submit_key: self.submit_key.clone(),
            interrupt_key: self.interrupt_key.clone(),
        }
    }
}
