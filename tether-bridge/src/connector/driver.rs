//! Multiplexer command driver
//!
//! The shell boundary of the system: everything the connector needs from
//! the external multiplexer is expressed as the [`PaneDriver`] trait, and
//! [`TmuxDriver`] is its production implementation shelling out to tmux.
//! Every command completes or fails within a bounded timeout; a timed-out
//! command is a failure, never left pending.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use tether_utils::{BridgeError, Result};

/// Commands the connector issues against the external multiplexer
///
/// `target` is the full pane address (`session:pane`); `session` in
/// [`kill_session`](PaneDriver::kill_session) is the bare multiplexer
/// session name.
#[async_trait]
pub trait PaneDriver: Send + Sync {
    /// Redirect the pane's live output stream into the capture sink
    async fn start_capture(&self, target: &str) -> Result<()>;

    /// Stop the capture redirect for the pane
    async fn stop_capture(&self, target: &str) -> Result<()>;

    /// One-shot snapshot of the pane's current content, up to `lines` of
    /// scrollback
    async fn snapshot(&self, target: &str, lines: u32) -> Result<String>;

    /// Type text into the pane verbatim (no key-name interpretation)
    async fn send_literal(&self, target: &str, text: &str) -> Result<()>;

    /// Press a named key (e.g. `Enter`, `Escape`, `C-c`) in the pane
    async fn send_key(&self, target: &str, key: &str) -> Result<()>;

    /// Kill the backing multiplexer session
    async fn kill_session(&self, session: &str) -> Result<()>;
}

/// Production driver for tmux via its CLI
pub struct TmuxDriver {
    /// Path to the tmux binary
    program: String,
    /// Directory for pipe-pane sink files
    capture_dir: PathBuf,
    /// Per-command timeout
    command_timeout: Duration,
}

impl TmuxDriver {
    pub fn new(
        program: impl Into<String>,
        capture_dir: PathBuf,
        command_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            capture_dir,
            command_timeout,
        }
    }

    /// Sink file receiving the pane's piped output stream
    ///
    /// The sink is write-only from this system's point of view; delivery to
    /// clients always goes through snapshot polling so no chunk can arrive
    /// via two paths.
    fn capture_file(&self, target: &str) -> PathBuf {
        let safe: String = target
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.capture_dir.join(format!("{}.out", safe))
    }

    /// Run one tmux command, collecting stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        let seconds = self.command_timeout.as_secs();
        let output = timeout(
            self.command_timeout,
            Command::new(&self.program).args(args).output(),
        )
        .await
        .map_err(|_| BridgeError::CommandTimeout { seconds })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::multiplexer(format!(
                "{} {} failed: {}",
                self.program,
                args.first().unwrap_or(&"?"),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PaneDriver for TmuxDriver {
    async fn start_capture(&self, target: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.capture_dir)
            .await
            .map_err(|e| BridgeError::FileWrite {
                path: self.capture_dir.clone(),
                source: e,
            })?;

        let sink = self.capture_file(target);
        let pipe_cmd = format!("cat >> '{}'", sink.display());
        self.run(&["pipe-pane", "-t", target, "-o", &pipe_cmd])
            .await
            .map(|_| ())
    }

    async fn stop_capture(&self, target: &str) -> Result<()> {
        // pipe-pane with no command tears down the redirect
        self.run(&["pipe-pane", "-t", target]).await.map(|_| ())
    }

    async fn snapshot(&self, target: &str, lines: u32) -> Result<String> {
        let depth = format!("-{}", lines);
        self.run(&["capture-pane", "-p", "-t", target, "-S", &depth])
            .await
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<()> {
        self.run(&["send-keys", "-t", target, "-l", text])
            .await
            .map(|_| ())
    }

    async fn send_key(&self, target: &str, key: &str) -> Result<()> {
        self.run(&["send-keys", "-t", target, key]).await.map(|_| ())
    }

    async fn kill_session(&self, session: &str) -> Result<()> {
        self.run(&["kill-session", "-t", session]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> TmuxDriver {
        TmuxDriver::new(
            "tmux",
            PathBuf::from("/tmp/tether-test-capture"),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_capture_file_sanitizes_target() {
        let d = driver();
        let file = d.capture_file("agents:%1.0");
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, "agents__1_0.out");
        assert!(file.starts_with("/tmp/tether-test-capture"));
    }

    #[test]
    fn test_capture_file_keeps_hyphens() {
        let d = driver();
        let file = d.capture_file("my-agents:0");
        assert_eq!(
            file.file_name().unwrap().to_string_lossy(),
            "my-agents_0.out"
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let d = TmuxDriver::new(
            "tether-no-such-multiplexer",
            PathBuf::from("/tmp/tether-test-capture"),
            Duration::from_secs(1),
        );
        let result = d.send_key("agents:%0", "Enter").await;
        assert!(result.is_err());
    }
}
