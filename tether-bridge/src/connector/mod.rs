//! Session connector
//!
//! The only component that issues commands to the external multiplexer and
//! the only source of asynchronous output events. Attachment is idempotent,
//! detachment is logically infallible once the local timer is cancelled,
//! and every external command failure is converted to a boolean result at
//! this boundary.

mod driver;
mod poller;

pub use driver::{PaneDriver, TmuxDriver};
pub use poller::{PollerConfig, PollerHandle};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::registry::SharedRegistry;
use poller::PanePoller;
use tether_utils::Result;

/// Callback invoked with `(session_id, new_chunk)` for each discovered
/// output event
pub type OutputListener = Arc<dyn Fn(Uuid, &str) + Send + Sync>;

/// Registered listeners, keyed for removal; ordered so fan-out order is
/// deterministic
pub(crate) type Listeners = Arc<RwLock<BTreeMap<ListenerId, OutputListener>>>;

/// Unique identifier of a registered output listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// Key sequences the connector sends for input and interrupt
#[derive(Debug, Clone)]
pub struct KeyMap {
    /// Named key appended after literal text to submit a line
    pub submit_key: String,
    /// Named key sent to interrupt the agent process
    pub interrupt_key: String,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            submit_key: "Enter".into(),
            interrupt_key: "Escape".into(),
        }
    }
}

/// Invoke every registered listener with one output event
///
/// Listeners are snapshotted under the read lock and called outside it, so
/// a slow listener never blocks registration.
pub(crate) fn emit(listeners: &Listeners, session_id: Uuid, chunk: &str) {
    let callbacks: Vec<OutputListener> = listeners.read().values().cloned().collect();
    for callback in callbacks {
        callback(session_id, chunk);
    }
}

/// Drives the external multiplexer on behalf of registered sessions
pub struct SessionConnector {
    /// Registry handle, used only for pane-address lookup and the capture
    /// flag
    registry: SharedRegistry,
    /// Multiplexer command driver
    driver: Arc<dyn PaneDriver>,
    /// Poll cadence and snapshot depth
    poller_config: PollerConfig,
    /// Input/interrupt key sequences
    keys: KeyMap,
    /// Live poll timers by session id
    pipes: Mutex<HashMap<Uuid, PollerHandle>>,
    /// Registered output listeners
    listeners: Listeners,
    /// Counter for listener ids
    next_listener_id: AtomicU64,
}

impl SessionConnector {
    /// Create a new connector
    pub fn new(
        registry: SharedRegistry,
        driver: Arc<dyn PaneDriver>,
        poller_config: PollerConfig,
        keys: KeyMap,
    ) -> Self {
        Self {
            registry,
            driver,
            poller_config,
            keys,
            pipes: Mutex::new(HashMap::new()),
            listeners: Arc::new(RwLock::new(BTreeMap::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    // ==================== Output Listeners ====================

    /// Register an output listener
    pub fn subscribe(&self, listener: OutputListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().insert(id, listener);
        id
    }

    /// Unregister an output listener; false if the id is unknown
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    // ==================== Capture Lifecycle ====================

    /// Start capture and polling for a session
    ///
    /// Idempotent: a second attach returns success without reissuing any
    /// multiplexer command. On first attach: redirect the pane's output
    /// stream into the capture sink, seed the poll cursor with a one-shot
    /// snapshot (delivered as the first output event), then start the poll
    /// timer. A failed redirect returns false and starts no timer.
    pub async fn attach(&self, id: Uuid) -> bool {
        if self.is_attached(id) {
            debug!(session = %id, "already attached");
            return true;
        }

        let target = match self.lookup_target(id) {
            Some(target) => target,
            None => {
                warn!(session = %id, "attach requested for unknown session");
                return false;
            }
        };

        if let Err(err) = self.driver.start_capture(&target).await {
            warn!(session = %id, %err, "failed to start capture");
            return false;
        }

        // Seed the cursor; a failure here is transient and just means the
        // first tick delivers the whole screen.
        let seed = match self
            .driver
            .snapshot(&target, self.poller_config.snapshot_lines)
            .await
        {
            Ok(content) => content,
            Err(err) => {
                debug!(session = %id, %err, "seed snapshot failed, starting empty");
                String::new()
            }
        };

        if !seed.is_empty() {
            emit(&self.listeners, id, &seed);
        }

        let handle = PanePoller::spawn(
            id,
            target,
            Arc::clone(&self.driver),
            Arc::clone(&self.listeners),
            self.poller_config.clone(),
            seed,
        );

        {
            let mut pipes = self.pipes.lock();
            if pipes.contains_key(&id) {
                // Lost a race with a concurrent attach; keep the winner
                handle.cancel();
                return true;
            }
            pipes.insert(id, handle);
        }
        self.registry.write().set_capture_active(id, true);

        debug!(session = %id, "capture attached");
        true
    }

    /// Stop polling and capture for a session
    ///
    /// The local timer is cancelled first; the remote stop-capture command
    /// is best-effort and its failure (pane already gone) is logged and
    /// swallowed. Returns false only for sessions that were not attached.
    pub async fn detach(&self, id: Uuid) -> bool {
        let handle = self.pipes.lock().remove(&id);
        let Some(handle) = handle else {
            return false;
        };

        handle.cancel();
        self.registry.write().set_capture_active(id, false);

        if let Some(target) = self.lookup_target(id) {
            if let Err(err) = self.driver.stop_capture(&target).await {
                warn!(session = %id, %err, "stop-capture failed during detach");
            }
        }

        debug!(session = %id, "capture detached");
        true
    }

    /// Whether a session has a live poll timer; purely local state
    pub fn is_attached(&self, id: Uuid) -> bool {
        self.pipes.lock().contains_key(&id)
    }

    /// Number of sessions with a live poll timer
    pub fn active_pipe_count(&self) -> usize {
        self.pipes.lock().len()
    }

    /// Detach every attached session
    ///
    /// Every local timer is cancelled before any remote command is issued,
    /// so shutdown never waits on multiplexer acknowledgement to stop
    /// polling.
    pub async fn detach_all(&self) {
        let handles: Vec<(Uuid, PollerHandle)> = self.pipes.lock().drain().collect();
        if handles.is_empty() {
            return;
        }

        for (_, handle) in &handles {
            handle.cancel();
        }

        let targets: Vec<(Uuid, Option<String>)> = {
            let mut registry = self.registry.write();
            handles
                .iter()
                .map(|(id, _)| {
                    registry.set_capture_active(*id, false);
                    (*id, registry.get(*id).map(|s| s.target()))
                })
                .collect()
        };

        let stops = targets
            .into_iter()
            .filter_map(|(id, target)| target.map(|t| (id, t)))
            .map(|(id, target)| {
                let driver = Arc::clone(&self.driver);
                async move {
                    if let Err(err) = driver.stop_capture(&target).await {
                        warn!(session = %id, %err, "stop-capture failed during shutdown");
                    }
                }
            });
        join_all(stops).await;

        debug!("all captures detached");
    }

    // ==================== One-shot Commands ====================

    /// One-shot snapshot of a session's pane, independent of the poll loop
    ///
    /// Returns None on command failure or unknown session. A concurrent
    /// poll tick may race this call; both are reads and dedup is anchored
    /// on the poll loop's own cursor, so the race is benign.
    pub async fn capture_pane(&self, id: Uuid) -> Option<String> {
        let target = self.lookup_target(id)?;
        match self
            .driver
            .snapshot(&target, self.poller_config.snapshot_lines)
            .await
        {
            Ok(content) => Some(content),
            Err(err) => {
                warn!(session = %id, %err, "one-shot capture failed");
                None
            }
        }
    }

    /// Type text into the session's pane and submit it
    ///
    /// Independent of capture state. False for unknown sessions or command
    /// failure.
    pub async fn send_input(&self, id: Uuid, text: &str) -> bool {
        let Some(target) = self.lookup_target(id) else {
            return false;
        };

        let result: Result<()> = async {
            self.driver.send_literal(&target, text).await?;
            self.driver.send_key(&target, &self.keys.submit_key).await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(session = %id, %err, "send input failed");
                false
            }
        }
    }

    /// Send the interrupt key sequence to the session's pane
    pub async fn send_interrupt(&self, id: Uuid) -> bool {
        let Some(target) = self.lookup_target(id) else {
            return false;
        };

        match self.driver.send_key(&target, &self.keys.interrupt_key).await {
            Ok(()) => true,
            Err(err) => {
                warn!(session = %id, %err, "send interrupt failed");
                false
            }
        }
    }

    /// Best-effort kill of the session's backing multiplexer session
    ///
    /// Used during session teardown; failure is observable but never blocks
    /// local cleanup.
    pub async fn kill_target(&self, id: Uuid) -> bool {
        let name = {
            self.registry
                .read()
                .get(id)
                .map(|s| s.multiplexer_session().to_string())
        };
        let Some(name) = name else {
            return false;
        };

        match self.driver.kill_session(&name).await {
            Ok(()) => true,
            Err(err) => {
                warn!(session = %id, %err, "multiplexer kill failed");
                false
            }
        }
    }

    fn lookup_target(&self, id: Uuid) -> Option<String> {
        self.registry.read().get(id).map(|s| s.target())
    }
}
