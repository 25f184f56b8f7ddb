//! Language server process supervision.
//!
//! Spawns the external server binary with its stdio piped, forwards its
//! stderr to the log, and reports process exit with a single terminal log
//! line. The supervisor never restarts a crashed server on its own;
//! restart is always an explicit lifecycle action.

use crate::error::Result;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;

/// Time the server gets to exit voluntarily after a shutdown request
/// before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How to launch the language server binary.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    /// Path to the server executable.
    pub binary: PathBuf,
    /// Variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl ServerCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            env: Vec::new(),
        }
    }

    /// Adds an environment variable override for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Handle to a supervised server process.
///
/// The child itself is owned by a monitor task; this handle only carries
/// the termination trigger. Dropping the handle also asks the monitor to
/// shut the process down.
pub struct ServerProcess {
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ServerProcess {
    /// Asks the monitor task to terminate the process: a grace period for
    /// voluntary exit, then a kill. Idempotent.
    pub fn terminate(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}

/// Spawns the server process and hands back its stdio pipes.
///
/// The caller's variables are merged over the ambient environment, so
/// diagnostic flags can be forced without clobbering the rest. Failures
/// after this point (crash, closed pipes) surface as channel errors and
/// through the exit log line, never as panics.
pub fn spawn(command: &ServerCommand) -> Result<(ServerProcess, ChildStdin, ChildStdout)> {
    let mut cmd = Command::new(&command.binary);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &command.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;
    log::info!("running with binary at path: {}", command.binary.display());

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("server stdin not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("server stdout not piped"))?;
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_stderr(stderr));
    }

    let (kill_tx, kill_rx) = oneshot::channel();
    tokio::spawn(monitor(child, kill_rx));

    Ok((
        ServerProcess {
            kill_tx: Some(kill_tx),
        },
        stdin,
        stdout,
    ))
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Forwards the server's stderr, line-trimmed, to the log.
async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log::info!(target: "mcshader::server", "{}", line.trim_end());
    }
}

/// Owns the child until it exits, reporting the outcome exactly once.
async fn monitor(mut child: Child, kill_rx: oneshot::Receiver<()>) {
    tokio::select! {
        status = child.wait() => report_exit(status),
        // Fires on terminate() and when the handle is dropped.
        _ = kill_rx => {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(status) => report_exit(status),
                Err(_) => {
                    let _ = child.start_kill();
                    report_exit(child.wait().await);
                }
            }
        }
    }
}

/// The one terminal log line for a server process.
fn report_exit(status: std::io::Result<std::process::ExitStatus>) {
    match status {
        Ok(status) => match status.code() {
            Some(code) => {
                log::warn!(target: "mcshader::server", "language server exited with code {code}")
            }
            None => {
                log::warn!(target: "mcshader::server", "language server terminated by signal")
            }
        },
        Err(e) => log::error!(target: "mcshader::server", "failed to reap language server: {e}"),
    }
}
