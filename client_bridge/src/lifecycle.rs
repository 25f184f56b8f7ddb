//! The client lifecycle state machine.
//!
//! Owns the one [`LanguageSession`], every host registration made during
//! activation, and the restart orchestration. Restart is a strict
//! deactivate-then-activate sequence: the full teardown completes before
//! any part of the new activation begins, so old and new session
//! resources never overlap.

use crate::commands;
use crate::launch::{LaunchOptions, SessionFactory};
use crate::status::{self, StatusBridge};
use crate::virtual_doc::MergedDocumentProvider;
use mcshader_host::{ContentProvider, Host, Subscription};
use mcshader_lsp::{LanguageSession, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Controller states. `Failed` is reachable from `Starting` and `Running`
/// on unrecoverable channel errors; recovery is the restart command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Shared slot holding the current session.
///
/// The controller is the only writer; the virtual document provider and
/// the configuration watcher read whatever session is current at call
/// time, which keeps them valid across restarts.
#[derive(Clone, Default)]
pub struct SessionSlot(Arc<Mutex<Option<Arc<LanguageSession>>>>);

impl SessionSlot {
    /// The session currently installed, if any.
    pub fn current(&self) -> Option<Arc<LanguageSession>> {
        self.0.lock().unwrap().clone()
    }

    pub fn set(&self, session: Arc<LanguageSession>) {
        *self.0.lock().unwrap() = Some(session);
    }

    pub fn take(&self) -> Option<Arc<LanguageSession>> {
        self.0.lock().unwrap().take()
    }
}

/// Owns session start/stop, restart orchestration, and disposal of all
/// registered resources.
pub struct ClientLifecycle {
    host: Arc<dyn Host>,
    factory: Arc<dyn SessionFactory>,
    extension_root: PathBuf,
    state: Mutex<LifecycleState>,
    session: SessionSlot,
    subscriptions: Mutex<Vec<Subscription>>,
    status: Arc<StatusBridge>,
    restart_in_flight: AtomicBool,
}

impl ClientLifecycle {
    pub fn new(
        host: Arc<dyn Host>,
        factory: Arc<dyn SessionFactory>,
        extension_root: PathBuf,
    ) -> Arc<Self> {
        let status = Arc::new(StatusBridge::new(Arc::clone(&host)));
        Arc::new(Self {
            host,
            factory,
            extension_root,
            state: Mutex::new(LifecycleState::Uninitialized),
            session: SessionSlot::default(),
            subscriptions: Mutex::new(Vec::new()),
            status,
            restart_in_flight: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap()
    }

    /// The active session, if the controller is running.
    pub fn session(&self) -> Option<Arc<LanguageSession>> {
        self.session.current()
    }

    /// Number of undisposed registrations. Zero outside an activation.
    pub fn live_subscriptions(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// The status bridge fed by server notifications.
    pub fn status(&self) -> &StatusBridge {
        &self.status
    }

    /// Starts the server session and registers all host hooks.
    ///
    /// On failure the controller lands in `Failed` and the error
    /// propagates; the caller logs and escalates it as an activation
    /// failure. A second activation over a live session is refused.
    pub async fn activate(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                LifecycleState::Uninitialized | LifecycleState::Failed => {
                    *state = LifecycleState::Starting;
                }
                other => {
                    log::warn!("ignoring activate while {other:?}");
                    return Ok(());
                }
            }
        }

        log::info!("starting language server...");
        self.status.show("$(loading~spin)", "Starting...");

        let options = LaunchOptions {
            extension_root: self.extension_root.clone(),
            initialization_options: self.host.configuration(crate::CONFIG_SECTION),
        };
        let session = match self.factory.launch(&options) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                *self.state.lock().unwrap() = LifecycleState::Failed;
                log::error!("failed to launch language server: {e}");
                return Err(e);
            }
        };
        self.session.set(Arc::clone(&session));
        self.register_hooks(&session);

        if let Err(e) = session.start().await {
            *self.state.lock().unwrap() = LifecycleState::Failed;
            log::error!("failed to activate extension: {e}");
            return Err(e);
        }

        *self.state.lock().unwrap() = LifecycleState::Running;
        log::info!("language server started!");
        Ok(())
    }

    /// Registers the two core notification handlers, the commands, the
    /// content provider, and the configuration passthrough. Everything
    /// lands in the subscription list for disposal.
    fn register_hooks(self: &Arc<Self>, session: &Arc<LanguageSession>) {
        let mut new = Vec::new();

        let status = Arc::clone(&self.status);
        new.push(session.on_notification(crate::STATUS_METHOD, move |params| {
            status::on_status_notification(&status, params)
        }));
        new.push(session.on_notification("window/logMessage", status::forward_server_log));

        let provider = Arc::new(MergedDocumentProvider::new(self.session.clone()));
        new.push(self.host.register_content_provider(
            crate::SCHEME,
            Arc::clone(&provider) as Arc<dyn ContentProvider>,
        ));
        new.extend(commands::register(&self.host, self, &provider));

        let config_session = self.session.clone();
        new.push(self.host.on_configuration_change(
            crate::CONFIG_SECTION,
            Box::new(move |settings| {
                let Some(session) = config_session.current() else {
                    return;
                };
                if let Err(e) =
                    session.notify("workspace/didChangeConfiguration", json!({"settings": settings}))
                {
                    log::warn!("failed to forward configuration change: {e}");
                }
            }),
        ));

        self.subscriptions.lock().unwrap().extend(new);
    }

    /// Stops the session and releases every subscription registered during
    /// activation. Idempotent: from `Uninitialized` this is an empty
    /// release loop.
    pub async fn deactivate(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == LifecycleState::Uninitialized {
                debug_assert!(self.subscriptions.lock().unwrap().is_empty());
                return;
            }
            *state = LifecycleState::Stopping;
        }

        if let Some(session) = self.session.take() {
            session.stop().await;
        }

        let drained: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.drain(..).collect()
        };
        for mut subscription in drained {
            subscription.dispose();
        }
        self.status.clear();

        *self.state.lock().unwrap() = LifecycleState::Uninitialized;
        log::info!("language server stopped");
    }

    /// Full deactivate, then activate. A restart already in flight makes
    /// this a logged no-op rather than interleaving teardowns.
    pub async fn restart(self: &Arc<Self>) -> Result<()> {
        if self.restart_in_flight.swap(true, Ordering::SeqCst) {
            log::warn!("restart already in progress");
            return Ok(());
        }

        self.deactivate().await;
        let result = self.activate().await;

        self.restart_in_flight.store(false, Ordering::SeqCst);
        result
    }
}
