use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of an agent session
///
/// This is a status label, not a strict state machine: any transition between
/// the first three values is legal. `Offline` is terminal with respect to new
/// client connections and input; a new session must be created to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Agent is waiting for work
    #[default]
    Idle,
    /// Agent is actively producing output
    Working,
    /// Agent is waiting on a human decision (e.g. a permission prompt)
    Blocked,
    /// Backing pane is gone or unreachable
    Offline,
}

impl SessionStatus {
    /// All status values, in declaration order
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Idle,
        SessionStatus::Working,
        SessionStatus::Blocked,
        SessionStatus::Offline,
    ];

    /// String form used in snapshots and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Working => "working",
            SessionStatus::Blocked => "blocked",
            SessionStatus::Offline => "offline",
        }
    }

    /// Whether this status rejects new client connections and input
    pub fn is_offline(&self) -> bool {
        matches!(self, SessionStatus::Offline)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0}")]
pub struct InvalidStatus(pub String);

impl FromStr for SessionStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionStatus::Idle),
            "working" => Ok(SessionStatus::Working),
            "blocked" => Ok(SessionStatus::Blocked),
            "offline" => Ok(SessionStatus::Offline),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Serializable view of one agent session
///
/// This is the shape handed to the status/reporting layer and to connecting
/// clients. Timestamps are RFC 3339 text; `connected_clients` is sorted so
/// the sequence is deterministic within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session unique identifier
    pub id: Uuid,
    /// Human-assigned agent name (not unique across sessions)
    pub name: String,
    /// Backing multiplexer session name
    pub multiplexer_session: String,
    /// Pane address within the multiplexer session
    pub pane: String,
    /// Project path the agent was started in (opaque to the core)
    pub project_path: String,
    /// Agent mode label (opaque to the core)
    pub mode: String,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Client identifiers currently observing this session, sorted
    pub connected_clients: Vec<String>,
    /// Buffered output chunks, oldest first
    pub output_buffer: Vec<String>,
    /// Whether a capture+poll loop is live for this session
    pub capture_active: bool,
    /// Creation time, RFC 3339
    pub created_at: String,
    /// Last output or input activity, RFC 3339
    pub last_activity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== SessionStatus Tests ====================

    #[test]
    fn test_status_default_is_idle() {
        assert_eq!(SessionStatus::default(), SessionStatus::Idle);
    }

    #[test]
    fn test_status_display_round_trip() {
        for status in SessionStatus::ALL {
            let text = status.to_string();
            let parsed: SessionStatus = text.parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        let err = "rebooting".parse::<SessionStatus>().unwrap_err();
        assert_eq!(err, InvalidStatus("rebooting".to_string()));
        assert!(err.to_string().contains("rebooting"));
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Blocked).unwrap();
        assert_eq!(json, "\"blocked\"");

        let status: SessionStatus = serde_json::from_str("\"offline\"").unwrap();
        assert_eq!(status, SessionStatus::Offline);
    }

    #[test]
    fn test_status_is_offline() {
        assert!(SessionStatus::Offline.is_offline());
        assert!(!SessionStatus::Idle.is_offline());
        assert!(!SessionStatus::Working.is_offline());
        assert!(!SessionStatus::Blocked.is_offline());
    }

    // ==================== SessionSnapshot Tests ====================

    fn sample_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            id: Uuid::new_v4(),
            name: "scout".into(),
            multiplexer_session: "agents".into(),
            pane: "%3".into(),
            project_path: "/work/repo".into(),
            mode: "autonomous".into(),
            status: SessionStatus::Working,
            connected_clients: vec!["client-a".into(), "client-b".into()],
            output_buffer: vec!["$ cargo test\n".into()],
            capture_active: true,
            created_at: "2026-08-06T10:00:00Z".into(),
            last_activity: "2026-08-06T10:05:00Z".into(),
        }
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let json = serde_json::to_value(sample_snapshot()).unwrap();
        for field in [
            "id",
            "name",
            "multiplexer_session",
            "pane",
            "project_path",
            "mode",
            "status",
            "connected_clients",
            "output_buffer",
            "capture_active",
            "created_at",
            "last_activity",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
    }
}
