//! Session bridge control plane for tmux-hosted coding agents
//!
//! This crate is the core of tether: it maintains the authoritative
//! directory of agent sessions, drives the external terminal multiplexer to
//! capture each session's pane output without duplication or loss, and fans
//! that output out to any number of connected remote clients while routing
//! input, interrupt, and approval commands back to the underlying process.
//!
//! Three components compose the core:
//!
//! - [`registry::SessionRegistry`] — in-memory session directory; owns all
//!   state mutation, performs no I/O.
//! - [`connector::SessionConnector`] — the only component issuing
//!   multiplexer commands and the only source of asynchronous output events.
//! - [`bridge::SessionBridge`] — the facade collaborators call; composes
//!   the other two and owns process-wide lifecycle.
//!
//! Network gateways, protocol servers, and message-delivery layers embed
//! this crate and consume its output events; none of their wire formats
//! live here.

pub mod bridge;
pub mod config;
pub mod connector;
pub mod persistence;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{ClientConnection, SessionBridge};
pub use config::BridgeConfig;
pub use connector::{ListenerId, OutputListener, PaneDriver, SessionConnector, TmuxDriver};
pub use registry::{Session, SessionRegistry, SessionSpec};
