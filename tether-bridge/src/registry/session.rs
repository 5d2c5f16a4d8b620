use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tether_protocol::{SessionSnapshot, SessionStatus};
use uuid::Uuid;

/// Caller-supplied facts needed to register a session
///
/// All fields are opaque strings here; whether the pane is actually
/// reachable is the connector's concern at attach time.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Human-assigned agent name (not required to be unique)
    pub name: String,
    /// Backing multiplexer session name
    pub multiplexer_session: String,
    /// Pane address within the multiplexer session
    pub pane: String,
    /// Project path the agent runs in
    pub project_path: String,
    /// Agent mode label
    pub mode: String,
}

/// One managed agent session
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier, never reused
    id: Uuid,
    /// Agent name; multiple sessions may share one
    name: String,
    /// Backing multiplexer session name
    multiplexer_session: String,
    /// Pane address within the multiplexer session
    pane: String,
    /// Opaque project path
    project_path: String,
    /// Opaque mode label
    mode: String,
    /// Lifecycle status; never inferred from output content
    status: SessionStatus,
    /// Opaque identifiers of clients observing this session
    connected_clients: HashSet<String>,
    /// Bounded output history for replay, oldest first
    output_buffer: VecDeque<String>,
    /// Maximum number of retained output chunks
    buffer_capacity: usize,
    /// True while the connector holds a live poll timer for this pane
    capture_active: bool,
    /// When created
    created_at: DateTime<Utc>,
    /// Last output or explicit input
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Create a new session record
    pub fn new(spec: SessionSpec, buffer_capacity: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            multiplexer_session: spec.multiplexer_session,
            pane: spec.pane,
            project_path: spec.project_path,
            mode: spec.mode,
            status: SessionStatus::Idle,
            connected_clients: HashSet::new(),
            output_buffer: VecDeque::new(),
            buffer_capacity,
            capture_active: false,
            created_at: now,
            last_activity: now,
        }
    }

    /// Restore a session from persisted state
    ///
    /// Used after a restart to recreate the record with its original id and
    /// history. Clients and capture state never survive a restart, so the
    /// restored record starts with no clients and capture inactive.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        spec: SessionSpec,
        status: SessionStatus,
        output: Vec<String>,
        created_at: DateTime<Utc>,
        last_activity: DateTime<Utc>,
        buffer_capacity: usize,
    ) -> Self {
        let mut output_buffer = VecDeque::from(output);
        while output_buffer.len() > buffer_capacity {
            output_buffer.pop_front();
        }
        Self {
            id,
            name: spec.name,
            multiplexer_session: spec.multiplexer_session,
            pane: spec.pane,
            project_path: spec.project_path,
            mode: spec.mode,
            status,
            connected_clients: HashSet::new(),
            output_buffer,
            buffer_capacity,
            capture_active: false,
            created_at,
            last_activity,
        }
    }

    /// Get session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get agent name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get backing multiplexer session name
    pub fn multiplexer_session(&self) -> &str {
        &self.multiplexer_session
    }

    /// Get pane address
    pub fn pane(&self) -> &str {
        &self.pane
    }

    /// Get project path
    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// Get mode label
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Full multiplexer target for this session's pane
    pub fn target(&self) -> String {
        format!("{}:{}", self.multiplexer_session, self.pane)
    }

    /// Get current status
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Set status
    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Whether this session rejects new connections and input
    pub fn is_offline(&self) -> bool {
        self.status.is_offline()
    }

    /// Get the connected client set
    pub fn connected_clients(&self) -> &HashSet<String> {
        &self.connected_clients
    }

    /// Get the number of connected clients
    pub fn client_count(&self) -> usize {
        self.connected_clients.len()
    }

    /// Add a client; idempotent
    pub fn add_client(&mut self, client: impl Into<String>) {
        self.connected_clients.insert(client.into());
    }

    /// Remove a client; removing an absent client is a no-op
    pub fn remove_client(&mut self, client: &str) {
        self.connected_clients.remove(client);
    }

    /// Append an output chunk, evicting the oldest on overflow
    pub fn append_output(&mut self, chunk: impl Into<String>) {
        while self.output_buffer.len() >= self.buffer_capacity {
            self.output_buffer.pop_front();
        }
        self.output_buffer.push_back(chunk.into());
        self.touch();
    }

    /// Get the buffered output chunks, oldest first
    pub fn output_buffer(&self) -> Vec<String> {
        self.output_buffer.iter().cloned().collect()
    }

    /// Number of buffered output chunks
    pub fn buffered_chunks(&self) -> usize {
        self.output_buffer.len()
    }

    /// Discard all buffered output
    pub fn clear_output(&mut self) {
        self.output_buffer.clear();
    }

    /// Whether a capture+poll loop is live for this session
    pub fn capture_active(&self) -> bool {
        self.capture_active
    }

    /// Set the capture flag
    pub fn set_capture_active(&mut self, active: bool) {
        self.capture_active = active;
    }

    /// Get creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get last activity time
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Record activity now (output or explicit input)
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Serializable view of this session
    ///
    /// Clients are sorted so the sequence is deterministic within one call.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut connected_clients: Vec<String> =
            self.connected_clients.iter().cloned().collect();
        connected_clients.sort();

        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            multiplexer_session: self.multiplexer_session.clone(),
            pane: self.pane.clone(),
            project_path: self.project_path.clone(),
            mode: self.mode.clone(),
            status: self.status,
            connected_clients,
            output_buffer: self.output_buffer(),
            capture_active: self.capture_active,
            created_at: self.created_at.to_rfc3339(),
            last_activity: self.last_activity.to_rfc3339(),
        }
    }
}
