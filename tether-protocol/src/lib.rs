//! Shared type definitions for tether
//!
//! The serializable shapes the session bridge exposes to its collaborators:
//! the gateway layer (WebSocket/SSE push), the status/reporting layer, and
//! the message-delivery layer. No wire framing lives here; how these types
//! travel over the network is the gateway's concern.

mod types;

pub use types::{InvalidStatus, SessionSnapshot, SessionStatus};
