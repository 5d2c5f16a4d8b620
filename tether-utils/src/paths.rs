//! Path utilities for tether
//!
//! Handles XDG Base Directory specification compliance for config, state,
//! and runtime directories.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const APP_NAME: &str = "tether";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the runtime directory
///
/// Location: `$XDG_RUNTIME_DIR/tether` or `/tmp/tether-$UID`
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime).join(APP_NAME)
    } else {
        // Fallback to /tmp with UID for security
        // SAFETY: getuid() is always safe to call
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
    }
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/tether` or `~/.config/tether`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".").join("config"))
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/tether/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory (persistent state like session metadata)
///
/// Location: `$XDG_STATE_HOME/tether` or `~/.local/state/tether`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from(".").join("state"))
}

/// Get the session state file path
///
/// Location: `$XDG_STATE_HOME/tether/sessions.json`
pub fn state_file() -> PathBuf {
    state_dir().join("sessions.json")
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/tether/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Get the capture directory (pipe-pane sink files)
///
/// Each attached pane gets a sink file here that receives its raw output
/// stream. The sink is never read back for delivery; the poll loop is the
/// only delivery path.
///
/// Location: `$XDG_STATE_HOME/tether/capture`
pub fn capture_dir() -> PathBuf {
    state_dir().join("capture")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_dir_ends_with_app_name() {
        let dir = runtime_dir();
        let text = dir.to_string_lossy();
        assert!(text.contains(APP_NAME));
    }

    #[test]
    fn test_config_file_under_config_dir() {
        let file = config_file();
        assert!(file.starts_with(config_dir()));
        assert_eq!(file.file_name().unwrap(), "config.toml");
    }

    #[test]
    fn test_state_file_under_state_dir() {
        let file = state_file();
        assert!(file.starts_with(state_dir()));
        assert_eq!(file.file_name().unwrap(), "sessions.json");
    }

    #[test]
    fn test_log_and_capture_dirs_under_state_dir() {
        assert!(log_dir().starts_with(state_dir()));
        assert!(capture_dir().starts_with(state_dir()));
    }

    #[test]
    fn test_ensure_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a").join("b");
        ensure_dir(&target).unwrap();
        assert!(target.is_dir());
        // Second call is a no-op
        ensure_dir(&target).unwrap();
    }
}
