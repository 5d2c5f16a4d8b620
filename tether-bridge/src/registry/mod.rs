//! Session registry
//!
//! The single source of truth for session existence and state. The registry
//! is a pure data structure: it performs no I/O, never suspends, and every
//! id-taking operation reports not-found explicitly instead of panicking.

mod session;

pub use session::{Session, SessionSpec};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tether_protocol::{SessionSnapshot, SessionStatus};
use tether_utils::{BridgeError, Result};
use uuid::Uuid;

/// Shared handle to the registry
///
/// The bridge owns the sole instance; the connector receives a clone to
/// look up pane addresses and flip capture flags, nothing else.
pub type SharedRegistry = Arc<RwLock<SessionRegistry>>;

/// In-memory directory of all session records
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, Session>,
    /// Creation cap; creating beyond it fails, never evicts
    max_sessions: usize,
    /// Output buffer capacity applied to every new record
    buffer_capacity: usize,
}

impl SessionRegistry {
    /// Create a new empty registry
    pub fn new(max_sessions: usize, buffer_capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            buffer_capacity,
        }
    }

    /// Create a new session record
    ///
    /// Fails with `SessionLimit` when the configured cap is reached.
    pub fn create(&mut self, spec: SessionSpec) -> Result<&Session> {
        if self.sessions.len() >= self.max_sessions {
            return Err(BridgeError::SessionLimit {
                max: self.max_sessions,
            });
        }

        let session = Session::new(spec, self.buffer_capacity);
        let id = session.id();
        self.sessions.insert(id, session);

        Ok(&self.sessions[&id])
    }

    /// Reinsert a session restored from persisted state
    ///
    /// Used at startup to recreate records with their original ids.
    pub fn add_restored(&mut self, session: Session) {
        self.sessions.insert(session.id(), session);
    }

    /// Get a session by id
    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Get a mutable session by id
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// All sessions whose agent name matches, creation order
    ///
    /// Names are not unique: several sessions (e.g. across restarts) may
    /// answer to the same agent name, and message delivery tries each in
    /// turn.
    pub fn find_by_name(&self, name: &str) -> Vec<&Session> {
        let mut matches: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| s.name() == name)
            .collect();
        matches.sort_by_key(|s| (s.created_at(), s.id()));
        matches
    }

    /// All sessions, creation order
    pub fn sessions(&self) -> Vec<&Session> {
        let mut all: Vec<&Session> = self.sessions.values().collect();
        all.sort_by_key(|s| (s.created_at(), s.id()));
        all
    }

    /// Serializable snapshot of every session, creation order
    pub fn list(&self) -> Vec<SessionSnapshot> {
        self.sessions().into_iter().map(Session::snapshot).collect()
    }

    /// Update a session's status; false if the id is unknown
    pub fn update_status(&mut self, id: Uuid, status: SessionStatus) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.set_status(status);
                true
            }
            None => false,
        }
    }

    /// Append an output chunk to a session's bounded buffer
    ///
    /// Evicts the oldest chunk on overflow and updates last activity.
    /// Returns false if the id is unknown.
    pub fn append_output(&mut self, id: Uuid, chunk: &str) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.append_output(chunk);
                true
            }
            None => false,
        }
    }

    /// Current buffer contents, oldest first
    pub fn output_buffer(&self, id: Uuid) -> Option<Vec<String>> {
        self.sessions.get(&id).map(Session::output_buffer)
    }

    /// Discard a session's buffered output; false if the id is unknown
    pub fn clear_output(&mut self, id: Uuid) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.clear_output();
                true
            }
            None => false,
        }
    }

    /// Add a client to a session; idempotent. False if the id is unknown.
    pub fn add_client(&mut self, id: Uuid, client: &str) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.add_client(client);
                true
            }
            None => false,
        }
    }

    /// Remove a client from a session
    ///
    /// Removing a client that is not present is a no-op success. Returns
    /// false only when the session id is unknown.
    pub fn remove_client(&mut self, id: Uuid, client: &str) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.remove_client(client);
                true
            }
            None => false,
        }
    }

    /// Set a session's capture flag; false if the id is unknown
    pub fn set_capture_active(&mut self, id: Uuid, active: bool) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.set_capture_active(active);
                true
            }
            None => false,
        }
    }

    /// Record explicit input activity; false if the id is unknown
    pub fn touch(&mut self, id: Uuid) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Delete a session record; returns whether anything was deleted
    pub fn remove(&mut self, id: Uuid) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> SessionSpec {
        SessionSpec {
            name: name.into(),
            multiplexer_session: "agents".into(),
            pane: "%0".into(),
            project_path: "/work".into(),
            mode: "default".into(),
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(16, 8)
    }

    #[test]
    fn test_create_session() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        assert_eq!(reg.count(), 1);
        let session = reg.get(id).unwrap();
        assert_eq!(session.name(), "scout");
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_create_enforces_cap() {
        let mut reg = SessionRegistry::new(2, 8);
        reg.create(spec("a")).unwrap();
        reg.create(spec("b")).unwrap();

        let result = reg.create(spec("c"));
        assert!(matches!(result, Err(BridgeError::SessionLimit { max: 2 })));
        assert_eq!(reg.count(), 2);
    }

    #[test]
    fn test_get_unknown_id() {
        let reg = registry();
        assert!(reg.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_find_by_name_returns_all_matches() {
        let mut reg = registry();
        let first = reg.create(spec("scout")).unwrap().id();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = reg.create(spec("scout")).unwrap().id();
        reg.create(spec("other")).unwrap();

        let found = reg.find_by_name("scout");
        assert_eq!(found.len(), 2);
        // Creation order
        assert_eq!(found[0].id(), first);
        assert_eq!(found[1].id(), second);
    }

    #[test]
    fn test_find_by_name_no_match() {
        let reg = registry();
        assert!(reg.find_by_name("nobody").is_empty());
    }

    #[test]
    fn test_list_creation_order() {
        let mut reg = registry();
        reg.create(spec("first")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        reg.create(spec("second")).unwrap();

        let listed = reg.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "first");
        assert_eq!(listed[1].name, "second");
    }

    #[test]
    fn test_update_status() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        assert!(reg.update_status(id, SessionStatus::Working));
        assert_eq!(reg.get(id).unwrap().status(), SessionStatus::Working);

        assert!(!reg.update_status(Uuid::new_v4(), SessionStatus::Idle));
    }

    #[test]
    fn test_any_status_transition_allowed() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        for status in SessionStatus::ALL {
            assert!(reg.update_status(id, status));
            assert_eq!(reg.get(id).unwrap().status(), status);
        }
        // Back out of offline is legal at the registry layer; the bridge is
        // what refuses to route to offline sessions.
        assert!(reg.update_status(id, SessionStatus::Idle));
    }

    #[test]
    fn test_append_output_bounded() {
        let mut reg = SessionRegistry::new(16, 3);
        let id = reg.create(spec("scout")).unwrap().id();

        for chunk in ["1", "2", "3", "4"] {
            assert!(reg.append_output(id, chunk));
        }
        assert_eq!(reg.output_buffer(id).unwrap(), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_append_output_unknown_id() {
        let mut reg = registry();
        assert!(!reg.append_output(Uuid::new_v4(), "lost"));
    }

    #[test]
    fn test_clear_output() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();
        reg.append_output(id, "chunk");

        assert!(reg.clear_output(id));
        assert!(reg.output_buffer(id).unwrap().is_empty());
    }

    #[test]
    fn test_client_membership() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        assert!(reg.add_client(id, "viewer-1"));
        assert!(reg.add_client(id, "viewer-1")); // idempotent
        assert_eq!(reg.get(id).unwrap().client_count(), 1);

        assert!(reg.remove_client(id, "viewer-1"));
        assert!(reg.remove_client(id, "viewer-1")); // absent: no-op success
        assert_eq!(reg.get(id).unwrap().client_count(), 0);

        assert!(!reg.add_client(Uuid::new_v4(), "viewer-1"));
        assert!(!reg.remove_client(Uuid::new_v4(), "viewer-1"));
    }

    #[test]
    fn test_remove_session() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert!(reg.get(id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_set_capture_active() {
        let mut reg = registry();
        let id = reg.create(spec("scout")).unwrap().id();

        assert!(reg.set_capture_active(id, true));
        assert!(reg.get(id).unwrap().capture_active());
        assert!(reg.set_capture_active(id, false));
        assert!(!reg.get(id).unwrap().capture_active());

        assert!(!reg.set_capture_active(Uuid::new_v4(), true));
    }

    #[test]
    fn test_add_restored_keeps_id() {
        let mut reg = registry();
        let session = Session::new(spec("scout"), 8);
        let id = session.id();

        reg.add_restored(session);
        assert_eq!(reg.get(id).unwrap().id(), id);
    }
}
