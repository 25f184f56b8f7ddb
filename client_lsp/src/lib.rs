//! JSON-RPC message channel and process supervision for the mcshader
//! language server.
//!
//! [`process`] spawns and supervises the external server binary,
//! [`transport`] frames JSON-RPC messages over its stdio, and [`session`]
//! layers a typed request/notification channel on top. The session is
//! stream-agnostic so tests can drive it over in-process pipes.

pub mod error;
pub mod process;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use process::{ServerCommand, ServerProcess};
pub use session::{LanguageSession, SessionConfig, SessionState};
