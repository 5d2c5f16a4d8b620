//! Test doubles for the multiplexer boundary
//!
//! CI cannot assume a running tmux server, so tests drive the connector and
//! bridge through a scripted [`PaneDriver`] that records every command and
//! replays a queue of snapshot results.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connector::PaneDriver;
use tether_utils::{BridgeError, Result};

enum ScriptedSnapshot {
    Content(String),
    Failure,
}

/// Scripted driver replaying snapshot content and recording commands
///
/// Snapshot calls consume the script front-to-back; once the script runs
/// dry, the most recent content repeats — matching a pane whose screen has
/// stopped changing.
pub(crate) struct ScriptedDriver {
    calls: Mutex<Vec<String>>,
    script: Mutex<VecDeque<ScriptedSnapshot>>,
    current: Mutex<String>,
    fail_start_capture: AtomicBool,
    fail_stop_capture: AtomicBool,
    fail_send: AtomicBool,
    fail_kill: AtomicBool,
}

impl ScriptedDriver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            current: Mutex::new(String::new()),
            fail_start_capture: AtomicBool::new(false),
            fail_stop_capture: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_kill: AtomicBool::new(false),
        })
    }

    /// Queue pane content for the next snapshot call
    pub(crate) fn push_snapshot(&self, content: &str) {
        self.script
            .lock()
            .push_back(ScriptedSnapshot::Content(content.to_string()));
    }

    /// Queue a snapshot command failure
    pub(crate) fn push_snapshot_failure(&self) {
        self.script.lock().push_back(ScriptedSnapshot::Failure);
    }

    pub(crate) fn set_fail_start_capture(&self, fail: bool) {
        self.fail_start_capture.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_stop_capture(&self, fail: bool) {
        self.fail_stop_capture.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    /// Every recorded command, oldest first
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded commands starting with `prefix`
    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PaneDriver for ScriptedDriver {
    async fn start_capture(&self, target: &str) -> Result<()> {
        self.record(format!("start_capture:{}", target));
        if self.fail_start_capture.load(Ordering::SeqCst) {
            return Err(BridgeError::multiplexer("scripted start-capture failure"));
        }
        Ok(())
    }

    async fn stop_capture(&self, target: &str) -> Result<()> {
        self.record(format!("stop_capture:{}", target));
        if self.fail_stop_capture.load(Ordering::SeqCst) {
            return Err(BridgeError::multiplexer("scripted stop-capture failure"));
        }
        Ok(())
    }

    async fn snapshot(&self, target: &str, _lines: u32) -> Result<String> {
        self.record(format!("snapshot:{}", target));
        let next = self.script.lock().pop_front();
        match next {
            Some(ScriptedSnapshot::Content(content)) => {
                *self.current.lock() = content.clone();
                Ok(content)
            }
            Some(ScriptedSnapshot::Failure) => {
                Err(BridgeError::multiplexer("scripted snapshot failure"))
            }
            None => Ok(self.current.lock().clone()),
        }
    }

    async fn send_literal(&self, target: &str, text: &str) -> Result<()> {
        self.record(format!("send_literal:{}:{}", target, text));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BridgeError::multiplexer("scripted send failure"));
        }
        Ok(())
    }

    async fn send_key(&self, target: &str, key: &str) -> Result<()> {
        self.record(format!("send_key:{}:{}", target, key));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BridgeError::multiplexer("scripted send failure"));
        }
        Ok(())
    }

    async fn kill_session(&self, session: &str) -> Result<()> {
        self.record(format!("kill:{}", session));
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(BridgeError::multiplexer("scripted kill failure"));
        }
        Ok(())
    }
}
