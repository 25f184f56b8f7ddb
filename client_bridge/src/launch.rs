//! Server binary resolution and session construction.

use mcshader_lsp::{process, LanguageSession, Result, ServerCommand, SessionConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const SERVER_BINARY: &str = "mcshader-ls.exe";
#[cfg(not(windows))]
const SERVER_BINARY: &str = "mcshader-ls";

/// Everything needed to launch one server session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Installation root of the client extension; the server binary lives
    /// under it.
    pub extension_root: PathBuf,
    /// Configuration section forwarded as initialization options.
    pub initialization_options: Value,
}

/// Resolves the server binary for one of the two deployment layouts:
/// the debug build under `server/target/debug/`, or the packaged release
/// binary directly under `server/`.
pub fn server_binary_path(extension_root: &Path, debug_build: bool) -> PathBuf {
    if debug_build {
        extension_root
            .join("server")
            .join("target")
            .join("debug")
            .join(SERVER_BINARY)
    } else {
        extension_root.join("server").join(SERVER_BINARY)
    }
}

/// Creates language sessions for the lifecycle controller. Tests swap in
/// a factory backed by in-process pipes.
pub trait SessionFactory: Send + Sync {
    fn launch(&self, options: &LaunchOptions) -> Result<LanguageSession>;
}

/// Production factory: spawns the server binary and wires its stdio.
pub struct ProcessSessionFactory;

impl SessionFactory for ProcessSessionFactory {
    fn launch(&self, options: &LaunchOptions) -> Result<LanguageSession> {
        let debug_build = std::env::var_os(crate::DEBUG_ENV_VAR).is_some();
        let binary = server_binary_path(&options.extension_root, debug_build);

        // RUST_BACKTRACE gives usable crash reports in the server log.
        let command = ServerCommand::new(binary).env("RUST_BACKTRACE", "1");
        let (server_process, stdin, stdout) = process::spawn(&command)?;

        let config = SessionConfig::new(crate::SCHEME, "Minecraft Shaders Language Server")
            .initialization_options(options.initialization_options.clone());
        Ok(LanguageSession::new(config, stdin, stdout, Some(server_process)))
    }
}
