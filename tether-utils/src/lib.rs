//! Common utilities for tether
//!
//! Shared infrastructure used across the tether crates: the unified error
//! type, tracing-based logging setup, and XDG path helpers.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{BridgeError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
