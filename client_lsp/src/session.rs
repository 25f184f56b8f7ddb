//! The language server message channel.
//!
//! [`LanguageSession`] wraps the server's byte streams in a typed
//! request/notification channel: requests are correlated by numeric id via
//! oneshot channels, out-of-band notifications fan out to registered
//! handlers in delivery order. The session is generic over its streams so
//! tests can drive it through in-process pipes instead of a real child.

use crate::error::{Error, Result};
use crate::process::ServerProcess;
use crate::transport::{
    parse_message, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, MessageReader,
    MessageWriter,
};
use mcshader_host::Subscription;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

/// Fixed identifiers for one channel: a protocol id and a human-readable
/// display name. Both are used for logging and host-side grouping only.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub id: String,
    pub name: String,
    /// Configuration section forwarded to the server at handshake time.
    pub initialization_options: Value,
}

impl SessionConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            initialization_options: Value::Null,
        }
    }

    pub fn initialization_options(mut self, options: Value) -> Self {
        self.initialization_options = options;
        self
    }
}

/// Channel state as seen by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Stopped,
}

/// Messages queued for the writer task.
enum Outgoing {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;
type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value>>>>>;

/// Notification handlers keyed by method, kept in registration order.
#[derive(Default)]
struct HandlerRegistry {
    inner: Mutex<HashMap<String, Vec<(u64, NotificationHandler)>>>,
}

impl HandlerRegistry {
    fn add(&self, method: &str, id: u64, handler: NotificationHandler) {
        self.inner
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push((id, handler));
    }

    fn remove(&self, method: &str, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(handlers) = inner.get_mut(method) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                inner.remove(method);
            }
        }
    }

    // Handlers are cloned out so dispatch never runs under the lock.
    fn snapshot(&self, method: &str) -> Vec<NotificationHandler> {
        self.inner
            .lock()
            .unwrap()
            .get(method)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

/// A bidirectional JSON-RPC session with one language server process.
pub struct LanguageSession {
    config: SessionConfig,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: PendingMap,
    handlers: Arc<HandlerRegistry>,
    next_request_id: AtomicI64,
    next_handler_id: AtomicU64,
    closed: Arc<AtomicBool>,
    state: Mutex<SessionState>,
    process: Mutex<Option<ServerProcess>>,
}

impl LanguageSession {
    /// Builds a session over the given streams. `process` carries the
    /// supervised child when the streams are real stdio pipes.
    pub fn new(
        config: SessionConfig,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        reader: impl AsyncRead + Send + Unpin + 'static,
        process: Option<ServerProcess>,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let handlers = Arc::new(HandlerRegistry::default());
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(
            MessageWriter::new(writer),
            outgoing_rx,
            Arc::clone(&pending),
        ));
        tokio::spawn(read_loop(
            MessageReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&handlers),
            Arc::clone(&closed),
        ));

        Self {
            config,
            outgoing: outgoing_tx,
            pending,
            handlers,
            next_request_id: AtomicI64::new(1),
            next_handler_id: AtomicU64::new(1),
            closed,
            state: Mutex::new(SessionState::Starting),
            process: Mutex::new(process),
        }
    }

    /// Current channel state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Performs the session handshake. Must complete before requests or
    /// notifications are valid; fails if the channel closes first.
    pub async fn start(&self) -> Result<()> {
        log::info!("starting language server session '{}'", self.config.id);

        let params = lsp_types::InitializeParams {
            process_id: Some(std::process::id()),
            initialization_options: Some(self.config.initialization_options.clone()),
            client_info: Some(lsp_types::ClientInfo {
                name: self.config.name.clone(),
                version: None,
            }),
            ..Default::default()
        };
        let params = serde_json::to_value(params)?;

        if let Err(e) = self.send_request("initialize", params).await {
            *self.state.lock().unwrap() = SessionState::Stopped;
            return Err(Error::Handshake(e.to_string()));
        }
        self.notify("initialized", Value::Object(Default::default()))?;

        *self.state.lock().unwrap() = SessionState::Running;
        log::info!("language server session '{}' running", self.config.id);
        Ok(())
    }

    /// Issues a request and awaits the typed reply.
    ///
    /// Rejects on channel close or when the server returns an error
    /// response. There is no timeout layer: a request the server never
    /// answers suspends its caller until the channel closes.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed);
        }

        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let request = JsonRpcRequest::new(id, method, Some(params));
        if self.outgoing.send(Outgoing::Request(request)).is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(Error::ChannelClosed);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ChannelClosed),
        }
    }

    /// Sends a fire-and-forget notification to the server.
    pub fn notify(&self, method: &str, params: Value) -> Result<()> {
        let notification = JsonRpcNotification::new(method, Some(params));
        self.outgoing
            .send(Outgoing::Notification(notification))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Registers a handler for inbound notifications matching `method`.
    ///
    /// Notifications of the same method are delivered in send order;
    /// ordering across distinct methods is not guaranteed. Disposing the
    /// returned subscription unregisters the handler.
    pub fn on_notification(
        &self,
        method: &str,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.add(method, id, Arc::new(handler));

        let registry = Arc::clone(&self.handlers);
        let method = method.to_string();
        Subscription::new(move || registry.remove(&method, id))
    }

    /// Requests graceful shutdown, then ensures the process is terminated.
    /// Stopping an already-stopped session is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::Stopped {
                log::debug!("session '{}' already stopped", self.config.id);
                return;
            }
            *state = SessionState::Stopped;
        }

        // Farewell without awaiting a reply; the process reaper below
        // grants a grace period before killing.
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .outgoing
            .send(Outgoing::Request(JsonRpcRequest::new(id, "shutdown", None)));
        let _ = self
            .outgoing
            .send(Outgoing::Notification(JsonRpcNotification::new("exit", None)));

        // Let the writer task flush the farewell before the reaper runs.
        tokio::task::yield_now().await;

        if let Some(mut process) = self.process.lock().unwrap().take() {
            process.terminate();
        }
        log::info!("language server session '{}' stopped", self.config.id);
    }
}

/// Drains the outgoing queue into the writer. A failed request write
/// resolves the pending entry so the caller is not left suspended.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: MessageWriter<W>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    pending: PendingMap,
) {
    while let Some(message) = outgoing.recv().await {
        match message {
            Outgoing::Request(request) => {
                let id = request.id;
                if let Err(e) = writer.write(&JsonRpcMessage::Request(request)).await {
                    log::error!("failed to send request: {e}");
                    if let Some(tx) = pending.lock().unwrap().remove(&id) {
                        let _ = tx.send(Err(Error::ChannelClosed));
                    }
                }
            }
            Outgoing::Notification(notification) => {
                if let Err(e) = writer
                    .write(&JsonRpcMessage::Notification(notification))
                    .await
                {
                    log::error!("failed to send notification: {e}");
                }
            }
        }
    }
}

/// Reads server messages until the channel closes, dispatching responses
/// to pending requests and notifications to registered handlers.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: MessageReader<R>,
    pending: PendingMap,
    handlers: Arc<HandlerRegistry>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let value = match reader.read().await {
            Ok(value) => value,
            Err(Error::ChannelClosed) => {
                log::debug!("language server closed the channel");
                break;
            }
            Err(e) => {
                log::error!("error reading from language server: {e}");
                break;
            }
        };

        match parse_message(&value) {
            Some(JsonRpcMessage::Response(response)) => {
                let Some(tx) = pending.lock().unwrap().remove(&response.id) else {
                    log::warn!("received response for unknown request: {}", response.id);
                    continue;
                };
                let result = match response.error {
                    Some(error) => Err(Error::Server {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
            }
            Some(JsonRpcMessage::Notification(notification)) => {
                let params = notification.params.unwrap_or(Value::Null);
                for handler in handlers.snapshot(&notification.method) {
                    handler(params.clone());
                }
            }
            Some(JsonRpcMessage::Request(request)) => {
                // Server-initiated requests (like workspace/configuration)
                log::debug!("server request: {} (id: {})", request.method, request.id);
            }
            None => log::warn!("unrecognized message from server: {value}"),
        }
    }

    closed.store(true, Ordering::SeqCst);
    let mut pending = pending.lock().unwrap();
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(Error::ChannelClosed));
    }
}
