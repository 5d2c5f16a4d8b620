//! Pane output polling
//!
//! Each attached session gets its own polling task that snapshots the pane
//! at a fixed interval, diffs the capture against the last-seen content,
//! and emits only the new trailing content to registered listeners. The
//! diff cursor is private to the task, so ticks for different sessions
//! never contend, and no chunk is ever delivered twice.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::driver::PaneDriver;
use super::{emit, Listeners};

/// Default poll interval in milliseconds
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default snapshot scrollback depth in lines
const DEFAULT_SNAPSHOT_LINES: u32 = 200;

/// Configuration for a pane poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between snapshot polls
    pub interval: Duration,
    /// Scrollback depth of each snapshot
    pub snapshot_lines: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            snapshot_lines: DEFAULT_SNAPSHOT_LINES,
        }
    }
}

/// Handle for a running pane poller
///
/// Cancellation is local and synchronous: once `cancel` returns, the timer
/// will fire no further ticks regardless of any in-flight multiplexer
/// command.
#[derive(Debug)]
pub struct PollerHandle {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancel the poller without waiting
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Cancel the poller and wait for the task to finish
    pub async fn stop(self) {
        self.cancel_token.cancel();
        let _ = self.join_handle.await;
    }
}

/// Per-session polling task
pub(crate) struct PanePoller {
    session_id: Uuid,
    target: String,
    driver: Arc<dyn PaneDriver>,
    listeners: Listeners,
    config: PollerConfig,
    /// Last snapshot content seen by this task; the dedup anchor
    last_seen: String,
    cancel_token: CancellationToken,
}

impl PanePoller {
    /// Spawn a poller for one attached pane
    ///
    /// `seed` is the initial pane content captured at attach time; the
    /// first tick diffs against it rather than re-delivering the whole
    /// screen.
    pub(crate) fn spawn(
        session_id: Uuid,
        target: String,
        driver: Arc<dyn PaneDriver>,
        listeners: Listeners,
        config: PollerConfig,
        seed: String,
    ) -> PollerHandle {
        let cancel_token = CancellationToken::new();
        let poller = Self {
            session_id,
            target,
            driver,
            listeners,
            config,
            last_seen: seed,
            cancel_token: cancel_token.clone(),
        };

        let join_handle = tokio::spawn(poller.run());

        PollerHandle {
            cancel_token,
            join_handle,
        }
    }

    async fn run(mut self) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(session = %self.session_id, "poller cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        let current = match self
            .driver
            .snapshot(&self.target, self.config.snapshot_lines)
            .await
        {
            Ok(content) => content,
            Err(err) => {
                // Transient: skip this tick, the next one retries
                trace!(session = %self.session_id, %err, "poll tick skipped");
                return;
            }
        };

        if let Some(fresh) = trailing_diff(&self.last_seen, &current) {
            self.last_seen = current;
            emit(&self.listeners, self.session_id, &fresh);
        }
    }
}

/// New trailing content of `current` relative to `last`
///
/// The capture is a sliding viewport over the pane, so the previous capture
/// usually survives as a prefix (pane grew) or as an internal suffix (pane
/// scrolled). Returns `None` when the capture holds nothing new.
pub(crate) fn trailing_diff(last: &str, current: &str) -> Option<String> {
    if current.is_empty() || current == last {
        return None;
    }
    if last.is_empty() {
        return Some(current.to_string());
    }
    // Viewport shrank or content scrolled entirely into view already seen
    if last.ends_with(current) {
        return None;
    }
    // Longest suffix of `last` that is a prefix of `current`
    for (idx, _) in last.char_indices() {
        let overlap = &last[idx..];
        if let Some(rest) = current.strip_prefix(overlap) {
            if rest.is_empty() {
                return None;
            }
            return Some(rest.to_string());
        }
    }
    // No overlap at all: the viewport moved past everything we had
    Some(current.to_string())
}
