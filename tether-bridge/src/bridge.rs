//! Session bridge facade
//!
//! The entry point collaborators call. The bridge composes the registry and
//! the connector, owns the wiring that appends every connector output event
//! into the matching registry record, and owns process-wide lifecycle:
//! `init` restores persisted sessions and installs the wiring, `shutdown`
//! cancels every poll timer and persists final state. Both are idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::connector::{ListenerId, OutputListener, PaneDriver, SessionConnector, TmuxDriver};
use crate::persistence::{PersistedSession, SessionStore};
use crate::registry::{SessionRegistry, SessionSpec, SharedRegistry};
use tether_protocol::{SessionSnapshot, SessionStatus};
use tether_utils::{paths, BridgeError, Result};

/// Result of a successful client connection
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConnection {
    /// Snapshot of the session at connection time
    pub session: SessionSnapshot,
    /// Buffered output for replay; None when the client connected fresh
    pub replay: Option<Vec<String>>,
}

/// Facade over the session registry and the multiplexer connector
pub struct SessionBridge {
    config: BridgeConfig,
    registry: SharedRegistry,
    connector: Arc<SessionConnector>,
    store: SessionStore,
    initialized: AtomicBool,
    /// Listener id of the output-to-registry wiring, present while
    /// initialized
    wiring: Mutex<Option<ListenerId>>,
}

impl SessionBridge {
    /// Create a bridge driving tmux
    pub fn new(config: BridgeConfig) -> Self {
        let driver = Arc::new(TmuxDriver::new(
            config.tmux_program.clone(),
            paths::capture_dir(),
            config.command_timeout(),
        ));
        Self::with_driver(config, driver)
    }

    /// Create a bridge with a custom multiplexer driver
    pub fn with_driver(config: BridgeConfig, driver: Arc<dyn PaneDriver>) -> Self {
        let registry: SharedRegistry = Arc::new(RwLock::new(SessionRegistry::new(
            config.max_sessions,
            config.output_buffer_capacity,
        )));
        let connector = Arc::new(SessionConnector::new(
            Arc::clone(&registry),
            driver,
            config.poller_config(),
            config.key_map(),
        ));
        let store = SessionStore::new(config.persistence_path());

        Self {
            config,
            registry,
            connector,
            store,
            initialized: AtomicBool::new(false),
            wiring: Mutex::new(None),
        }
    }

    // ==================== Lifecycle ====================

    /// Initialize the bridge
    ///
    /// Idempotent; a second call is a no-op. Restores persisted session
    /// metadata and wires connector output events into the registry.
    pub fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("bridge already initialized");
            return Ok(());
        }

        match self.store.load() {
            Ok(persisted) => {
                if !persisted.is_empty() {
                    let mut registry = self.registry.write();
                    let count = persisted.len();
                    for record in persisted {
                        registry
                            .add_restored(record.into_session(self.config.output_buffer_capacity));
                    }
                    info!(count, "restored persisted sessions");
                }
            }
            Err(err) => {
                // A broken state file costs history, not availability
                warn!(%err, "failed to load persisted sessions, starting fresh");
            }
        }

        let registry = Arc::clone(&self.registry);
        let listener: OutputListener = Arc::new(move |session_id, chunk| {
            registry.write().append_output(session_id, chunk);
        });
        *self.wiring.lock() = Some(self.connector.subscribe(listener));

        info!("session bridge initialized");
        Ok(())
    }

    /// Whether the bridge is initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Shut the bridge down
    ///
    /// Detaches every session (all poll timers cancelled before return),
    /// persists final state, and returns the bridge to the not-initialized
    /// state. Safe to call multiple times.
    pub async fn shutdown(&self) {
        self.connector.detach_all().await;
        self.persist();
        if let Some(listener) = self.wiring.lock().take() {
            self.connector.unsubscribe(listener);
        }
        if self.initialized.swap(false, Ordering::SeqCst) {
            info!("session bridge shut down");
        }
    }

    // ==================== Session Lifecycle ====================

    /// Create a session and start capturing its pane
    ///
    /// The record is registered first; if capture cannot be started the
    /// session still exists with `capture_active = false` and capture is
    /// retried when a client connects.
    pub async fn create_session(&self, spec: SessionSpec) -> Result<SessionSnapshot> {
        let id = {
            let mut registry = self.registry.write();
            registry.create(spec)?.id()
        };

        if !self.connector.attach(id).await {
            warn!(session = %id, "capture not started at creation");
        }
        self.persist();

        self.registry
            .read()
            .get(id)
            .map(|s| s.snapshot())
            .ok_or_else(|| BridgeError::internal("session removed during creation"))
    }

    /// Kill a session: detach capture, best-effort kill of the backing
    /// multiplexer session, then remove the record
    ///
    /// Returns false if the session did not exist. Remote command failure
    /// never blocks local cleanup.
    pub async fn kill_session(&self, id: Uuid) -> bool {
        if self.registry.read().get(id).is_none() {
            return false;
        }

        let _ = self.connector.detach(id).await;
        if !self.connector.kill_target(id).await {
            warn!(session = %id, "multiplexer kill incomplete, removing record anyway");
        }

        let removed = self.registry.write().remove(id);
        self.persist();
        debug!(session = %id, removed, "session killed");
        removed
    }

    // ==================== Queries ====================

    /// Serializable snapshots of every session, creation order
    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        self.registry.read().list()
    }

    /// Serializable snapshot of one session
    pub fn get_session(&self, id: Uuid) -> Option<SessionSnapshot> {
        self.registry.read().get(id).map(|s| s.snapshot())
    }

    /// Snapshots of every session answering to an agent name
    ///
    /// Message delivery walks this list trying `send_input` on each until
    /// one accepts.
    pub fn find_by_name(&self, name: &str) -> Vec<SessionSnapshot> {
        self.registry
            .read()
            .find_by_name(name)
            .into_iter()
            .map(|s| s.snapshot())
            .collect()
    }

    /// The underlying connector (attachment state, one-shot captures)
    pub fn connector(&self) -> &SessionConnector {
        &self.connector
    }

    // ==================== Client Connections ====================

    /// Connect a client to a session's output stream
    ///
    /// Fails with `SessionNotFound` for unknown ids and `SessionOffline`
    /// for offline sessions. With `replay` the current buffer is returned
    /// and left intact; without it the buffer is cleared so the client's
    /// viewing window starts now. Capture is (re)attached idempotently, so
    /// connecting to a restored session restarts its poll loop.
    pub async fn connect_client(
        &self,
        id: Uuid,
        client: &str,
        replay: bool,
    ) -> Result<ClientConnection> {
        self.check_connectable(id)?;

        let _ = self.connector.attach(id).await;

        // Re-validate under the write lock; the session may have been
        // killed while the attach command was in flight
        let mut registry = self.registry.write();
        let session = registry
            .get(id)
            .ok_or_else(|| BridgeError::SessionNotFound(id.to_string()))?;
        if session.is_offline() {
            return Err(BridgeError::SessionOffline(id.to_string()));
        }

        registry.add_client(id, client);

        let replay_buffer = if replay {
            registry.output_buffer(id)
        } else {
            registry.clear_output(id);
            None
        };

        let snapshot = registry
            .get(id)
            .map(|s| s.snapshot())
            .ok_or_else(|| BridgeError::internal("session removed during connect"))?;

        debug!(session = %id, client, replay, "client connected");
        Ok(ClientConnection {
            session: snapshot,
            replay: replay_buffer,
        })
    }

    /// Disconnect a client from a session
    ///
    /// Never fails: racing a session teardown is expected and harmless.
    pub fn disconnect_client(&self, id: Uuid, client: &str) {
        let removed = self.registry.write().remove_client(id, client);
        if removed {
            debug!(session = %id, client, "client disconnected");
        }
    }

    fn check_connectable(&self, id: Uuid) -> Result<()> {
        let registry = self.registry.read();
        let session = registry
            .get(id)
            .ok_or_else(|| BridgeError::SessionNotFound(id.to_string()))?;
        if session.is_offline() {
            return Err(BridgeError::SessionOffline(id.to_string()));
        }
        Ok(())
    }

    // ==================== Input Routing ====================

    /// Send a line of input to a session's agent process
    ///
    /// False for unknown ids, offline sessions, and command failures.
    pub async fn send_input(&self, id: Uuid, text: &str) -> bool {
        if !self.routable(id) {
            return false;
        }
        if !self.connector.send_input(id, text).await {
            return false;
        }
        self.registry.write().touch(id);
        true
    }

    /// Send the interrupt sequence to a session's agent process
    pub async fn send_interrupt(&self, id: Uuid) -> bool {
        if !self.routable(id) {
            return false;
        }
        if !self.connector.send_interrupt(id).await {
            return false;
        }
        self.registry.write().touch(id);
        true
    }

    /// Answer a pending permission prompt
    ///
    /// Translates the decision into the configured approval or denial input
    /// text; same failure semantics as [`send_input`](Self::send_input).
    pub async fn send_permission_response(&self, id: Uuid, approved: bool) -> bool {
        let text = if approved {
            self.config.approve_input.clone()
        } else {
            self.config.deny_input.clone()
        };
        self.send_input(id, &text).await
    }

    /// Update a session's status label
    pub fn update_session_status(&self, id: Uuid, status: SessionStatus) -> bool {
        let updated = self.registry.write().update_status(id, status);
        if updated {
            self.persist();
        }
        updated
    }

    /// One-shot snapshot of a session's pane
    pub async fn capture_pane(&self, id: Uuid) -> Option<String> {
        self.connector.capture_pane(id).await
    }

    fn routable(&self, id: Uuid) -> bool {
        match self.registry.read().get(id) {
            Some(session) if session.is_offline() => {
                debug!(session = %id, "input rejected: session offline");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // ==================== Output Notifications ====================

    /// Register a listener for live output events
    ///
    /// The sole notification channel used by the gateway layer to push
    /// output to remote viewers.
    pub fn on_output(&self, listener: OutputListener) -> ListenerId {
        self.connector.subscribe(listener)
    }

    /// Unregister an output listener
    pub fn off_output(&self, id: ListenerId) -> bool {
        self.connector.unsubscribe(id)
    }

    // ==================== Persistence ====================

    /// Write current session state, logging rather than failing
    fn persist(&self) {
        let records: Vec<PersistedSession> = {
            let registry = self.registry.read();
            registry
                .sessions()
                .into_iter()
                .map(PersistedSession::from_session)
                .collect()
        };
        if let Err(err) = self.store.save(&records) {
            warn!(%err, "failed to persist session state");
        }
    }
}
