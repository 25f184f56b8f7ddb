//! Lifecycle bridge between an editor host and the mcshader language
//! server.
//!
//! The bridge owns the server process lifecycle (activate, restart,
//! deactivate), translates server-pushed status notifications into a
//! single host status indicator, exposes the `mcshader.restart` and
//! `mcshader.virtualMerge` commands, and serves read-only virtual
//! documents for the flattened shader view under the `mcshader:` scheme.

pub mod commands;
pub mod launch;
pub mod lifecycle;
pub mod status;
pub mod virtual_doc;

#[cfg(test)]
pub(crate) mod testing;

pub use launch::{LaunchOptions, ProcessSessionFactory, SessionFactory};
pub use lifecycle::{ClientLifecycle, LifecycleState, SessionSlot};
pub use status::StatusBridge;
pub use virtual_doc::MergedDocumentProvider;

/// Language identifier the merge command operates on.
pub const LANGUAGE_ID: &str = "glsl";

/// URI scheme reserved for virtual merged documents.
pub const SCHEME: &str = "mcshader";

/// Configuration section forwarded to the server.
pub const CONFIG_SECTION: &str = "mcshader";

/// Namespace prefix for host commands.
pub const COMMAND_PREFIX: &str = "mcshader";

/// Notification method for server status updates.
pub const STATUS_METHOD: &str = "mcshader/status";

/// Request method resolving the include graph into one merged view.
pub const MERGE_METHOD: &str = "virtualMerge";

/// Environment variable selecting the debug-build server binary.
pub const DEBUG_ENV_VAR: &str = "MCSHADER_DEBUG";
