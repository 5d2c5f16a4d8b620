//! Session metadata persistence
//!
//! Sessions survive a process restart as a versioned JSON state file: read
//! once at bridge init, written opportunistically on lifecycle mutations.
//! Client sets never survive a restart (reconnecting is the client's
//! responsibility), and the capture flag is recorded for shape fidelity but
//! always restored false — no poll timer outlives the process.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::{Session, SessionSpec};
use tether_protocol::SessionStatus;
use tether_utils::{BridgeError, Result};

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// One persisted session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub id: Uuid,
    pub name: String,
    pub multiplexer_session: String,
    pub pane: String,
    pub project_path: String,
    pub mode: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub output_buffer: Vec<String>,
    #[serde(default)]
    pub capture_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl PersistedSession {
    /// Capture a registry record for persistence
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            name: session.name().to_string(),
            multiplexer_session: session.multiplexer_session().to_string(),
            pane: session.pane().to_string(),
            project_path: session.project_path().to_string(),
            mode: session.mode().to_string(),
            status: session.status(),
            output_buffer: session.output_buffer(),
            capture_active: session.capture_active(),
            created_at: session.created_at(),
            last_activity: session.last_activity(),
        }
    }

    /// Rebuild a registry record from this persisted state
    pub fn into_session(self, buffer_capacity: usize) -> Session {
        Session::restore(
            self.id,
            SessionSpec {
                name: self.name,
                multiplexer_session: self.multiplexer_session,
                pane: self.pane,
                project_path: self.project_path,
                mode: self.mode,
            },
            self.status,
            self.output_buffer,
            self.created_at,
            self.last_activity,
            buffer_capacity,
        )
    }
}

/// On-disk state file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    saved_at: DateTime<Utc>,
    sessions: Vec<PersistedSession>,
}

/// Reads and writes the session state file
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// State file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted sessions
    ///
    /// A missing file is an empty fleet, not an error.
    pub fn load(&self) -> Result<Vec<PersistedSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = std::fs::read_to_string(&self.path).map_err(|e| BridgeError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;

        let state: StateFile = serde_json::from_str(&text)
            .map_err(|e| BridgeError::persistence(format!("invalid state file: {}", e)))?;

        if state.version != STATE_VERSION {
            return Err(BridgeError::persistence(format!(
                "unsupported state file version {}",
                state.version
            )));
        }

        Ok(state.sessions)
    }

    /// Write the full session set
    ///
    /// Written to a temp file and renamed so a crash mid-write never leaves
    /// a truncated state file.
    pub fn save(&self, sessions: &[PersistedSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BridgeError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let state = StateFile {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            sessions: sessions.to_vec(),
        };

        let text = serde_json::to_string_pretty(&state)
            .map_err(|e| BridgeError::persistence(format!("serialize failed: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| BridgeError::FileWrite {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| BridgeError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}
