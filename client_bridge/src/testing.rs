//! In-memory fakes for the editor host and the language server, shared by
//! the bridge tests.

use crate::launch::{LaunchOptions, SessionFactory};
use mcshader_host::{
    ActiveDocument, CancelFlag, CommandAction, ContentProvider, Host, HostFuture, StatusItem,
    Subscription, Uri,
};
use mcshader_lsp::transport::{
    parse_message, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, MessageReader,
    MessageWriter,
};
use mcshader_lsp::{Error, LanguageSession, Result, SessionConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

/// Body prefix the fake server prepends to merged content.
pub const MERGED_BODY_PREFIX: &str = "// merged: ";

// ---------------------------------------------------------------------------
// Fake host
// ---------------------------------------------------------------------------

struct FakeStatusItem {
    id: u64,
    text: String,
    registry: Arc<Mutex<HashMap<u64, String>>>,
}

impl StatusItem for FakeStatusItem {
    fn text(&self) -> &str {
        &self.text
    }
}

impl Drop for FakeStatusItem {
    fn drop(&mut self) {
        self.registry.lock().unwrap().remove(&self.id);
    }
}

#[derive(Default)]
struct HostState {
    commands: Mutex<HashMap<String, CommandAction>>,
    max_commands: AtomicUsize,
    providers: Mutex<HashMap<String, Arc<dyn ContentProvider>>>,
    max_providers: AtomicUsize,
    status_items: Arc<Mutex<HashMap<u64, String>>>,
    active: Mutex<Option<ActiveDocument>>,
    opened: Mutex<Vec<Uri>>,
    previews: Mutex<Vec<Uri>>,
    refreshed: Mutex<Vec<Uri>>,
    messages: Mutex<Vec<String>>,
    contents: Mutex<HashMap<String, String>>,
    config: Mutex<Value>,
    config_watchers: Mutex<Vec<(u64, Box<dyn Fn(Value) + Send + Sync>)>>,
    next_id: AtomicU64,
}

/// An in-memory editor host recording every interaction.
#[derive(Clone)]
pub struct FakeHost {
    state: Arc<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        let state = HostState {
            config: Mutex::new(json!({"shaderpacks": []})),
            ..Default::default()
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn command_count(&self) -> usize {
        self.state.commands.lock().unwrap().len()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.state.commands.lock().unwrap().contains_key(name)
    }

    /// A registered command action, cloned out for invocation.
    pub fn command(&self, name: &str) -> Option<CommandAction> {
        self.state.commands.lock().unwrap().get(name).cloned()
    }

    /// High-water mark of simultaneously registered commands.
    pub fn max_concurrent_commands(&self) -> usize {
        self.state.max_commands.load(Ordering::SeqCst)
    }

    pub fn provider_count(&self) -> usize {
        self.state.providers.lock().unwrap().len()
    }

    pub fn max_concurrent_providers(&self) -> usize {
        self.state.max_providers.load(Ordering::SeqCst)
    }

    pub fn status_item_count(&self) -> usize {
        self.state.status_items.lock().unwrap().len()
    }

    pub fn set_active_document(&self, document: ActiveDocument) {
        *self.state.active.lock().unwrap() = Some(document);
    }

    pub fn opened(&self) -> Vec<Uri> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn previews(&self) -> Vec<Uri> {
        self.state.previews.lock().unwrap().clone()
    }

    /// URIs for which a content change event fired.
    pub fn refreshed(&self) -> Vec<Uri> {
        self.state.refreshed.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.state.messages.lock().unwrap().clone()
    }

    /// Content the host fetched for `uri` when it was opened.
    pub fn content_of(&self, uri: &Uri) -> Option<String> {
        self.state.contents.lock().unwrap().get(&uri.to_string()).cloned()
    }

    /// Replaces the configuration and notifies every watcher.
    pub fn emit_configuration_change(&self, value: Value) {
        *self.state.config.lock().unwrap() = value.clone();
        for (_, watcher) in self.state.config_watchers.lock().unwrap().iter() {
            watcher(value.clone());
        }
    }
}

impl Host for FakeHost {
    fn register_command(&self, name: &str, action: CommandAction) -> Subscription {
        let mut commands = self.state.commands.lock().unwrap();
        commands.insert(name.to_string(), action);
        self.state
            .max_commands
            .fetch_max(commands.len(), Ordering::SeqCst);
        drop(commands);

        let state = Arc::clone(&self.state);
        let name = name.to_string();
        Subscription::new(move || {
            state.commands.lock().unwrap().remove(&name);
        })
    }

    fn create_status_item(&self, text: &str) -> Box<dyn StatusItem> {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let registry = Arc::clone(&self.state.status_items);
        registry.lock().unwrap().insert(id, text.to_string());
        Box::new(FakeStatusItem {
            id,
            text: text.to_string(),
            registry,
        })
    }

    fn register_content_provider(
        &self,
        scheme: &str,
        provider: Arc<dyn ContentProvider>,
    ) -> Subscription {
        let state = Arc::clone(&self.state);
        provider.on_did_change(Box::new(move |uri| {
            state.refreshed.lock().unwrap().push(uri.clone());
        }));

        let mut providers = self.state.providers.lock().unwrap();
        providers.insert(scheme.to_string(), provider);
        self.state
            .max_providers
            .fetch_max(providers.len(), Ordering::SeqCst);
        drop(providers);

        let state = Arc::clone(&self.state);
        let scheme = scheme.to_string();
        Subscription::new(move || {
            state.providers.lock().unwrap().remove(&scheme);
        })
    }

    fn active_document(&self) -> Option<ActiveDocument> {
        self.state.active.lock().unwrap().clone()
    }

    fn open_document(&self, uri: &Uri) -> HostFuture {
        let state = Arc::clone(&self.state);
        let uri = uri.clone();
        Box::pin(async move {
            state.opened.lock().unwrap().push(uri.clone());
            let provider = state.providers.lock().unwrap().get(uri.scheme()).cloned();
            if let Some(provider) = provider {
                let content = provider.provide(&uri, &CancelFlag::new()).await;
                state.contents.lock().unwrap().insert(uri.to_string(), content);
            }
        })
    }

    fn show_preview(&self, uri: &Uri) -> HostFuture {
        let state = Arc::clone(&self.state);
        let uri = uri.clone();
        Box::pin(async move {
            state.previews.lock().unwrap().push(uri);
        })
    }

    fn show_information_message(&self, text: &str) {
        self.state.messages.lock().unwrap().push(text.to_string());
    }

    fn configuration(&self, _section: &str) -> Value {
        self.state.config.lock().unwrap().clone()
    }

    fn on_configuration_change(
        &self,
        _section: &str,
        handler: Box<dyn Fn(Value) + Send + Sync>,
    ) -> Subscription {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state
            .config_watchers
            .lock()
            .unwrap()
            .push((id, handler));

        let state = Arc::clone(&self.state);
        Subscription::new(move || {
            state
                .config_watchers
                .lock()
                .unwrap()
                .retain(|(watcher_id, _)| *watcher_id != id);
        })
    }
}

// ---------------------------------------------------------------------------
// Fake server
// ---------------------------------------------------------------------------

type ServerWriter = Arc<tokio::sync::Mutex<MessageWriter<WriteHalf<DuplexStream>>>>;

/// A scripted language server speaking over in-process pipes.
///
/// Answers `initialize` and `virtualMerge`, records everything it sees,
/// and can push notifications at the client. One instance serves any
/// number of sessions in turn, which is what a restart looks like.
pub struct FakeServer {
    reject_merges: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    notifications: Arc<Mutex<Vec<(String, Value)>>>,
    writer: Mutex<Option<ServerWriter>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            reject_merges: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
            notifications: Arc::new(Mutex::new(Vec::new())),
            writer: Mutex::new(None),
        }
    }

    /// Makes every `virtualMerge` request fail with a server error.
    pub fn reject_merges(self) -> Self {
        self.reject_merges.store(true, Ordering::SeqCst);
        self
    }

    /// Every request seen so far, as (method, params) pairs.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    /// Every notification seen so far, as (method, params) pairs.
    pub fn notifications(&self) -> Vec<(String, Value)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Builds a client session wired to this server.
    pub fn start_session(&self) -> LanguageSession {
        self.start_session_with_options(Value::Null)
    }

    pub fn start_session_with_options(&self, options: Value) -> LanguageSession {
        let (client, server) = duplex(64 * 1024);
        let (client_read, client_write) = split(client);
        let (server_read, server_write) = split(server);

        let writer: ServerWriter =
            Arc::new(tokio::sync::Mutex::new(MessageWriter::new(server_write)));
        *self.writer.lock().unwrap() = Some(Arc::clone(&writer));

        tokio::spawn(serve(
            MessageReader::new(server_read),
            writer,
            Arc::clone(&self.requests),
            Arc::clone(&self.notifications),
            Arc::clone(&self.reject_merges),
        ));

        let config = SessionConfig::new("mcshader", "Minecraft Shaders Language Server")
            .initialization_options(options);
        LanguageSession::new(config, client_write, client_read, None)
    }

    /// Pushes a notification at the current session's client.
    pub async fn push_notification(&self, method: &str, params: Value) {
        let writer = self.writer.lock().unwrap().clone();
        if let Some(writer) = writer {
            writer
                .lock()
                .await
                .write(&JsonRpcMessage::Notification(JsonRpcNotification::new(
                    method,
                    Some(params),
                )))
                .await
                .unwrap();
        }
    }

    /// Round-trips a request through the current session. Because both
    /// sides dispatch strictly in order, everything sent earlier has been
    /// processed once this returns.
    pub async fn barrier(&self, lifecycle: &crate::lifecycle::ClientLifecycle) {
        if let Some(session) = lifecycle.session() {
            let _ = session.send_request("barrier", Value::Null).await;
        }
    }
}

async fn serve(
    mut reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: ServerWriter,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    notifications: Arc<Mutex<Vec<(String, Value)>>>,
    reject_merges: Arc<AtomicBool>,
) {
    while let Ok(value) = reader.read().await {
        match parse_message(&value) {
            Some(JsonRpcMessage::Request(request)) => {
                let params = request.params.clone().unwrap_or(Value::Null);
                requests
                    .lock()
                    .unwrap()
                    .push((request.method.clone(), params.clone()));

                let response = match request.method.as_str() {
                    "initialize" => JsonRpcResponse::success(request.id, json!({"capabilities": {}})),
                    "virtualMerge" => {
                        if reject_merges.load(Ordering::SeqCst) {
                            JsonRpcResponse::failure(request.id, -32603, "not a shader file")
                        } else {
                            let path = params[0].as_str().unwrap_or_default();
                            JsonRpcResponse::success(
                                request.id,
                                Value::String(format!("{MERGED_BODY_PREFIX}{path}")),
                            )
                        }
                    }
                    _ => JsonRpcResponse::success(request.id, Value::Null),
                };
                let _ = writer
                    .lock()
                    .await
                    .write(&JsonRpcMessage::Response(response))
                    .await;
            }
            Some(JsonRpcMessage::Notification(notification)) => {
                notifications.lock().unwrap().push((
                    notification.method,
                    notification.params.unwrap_or(Value::Null),
                ));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Fake session factory
// ---------------------------------------------------------------------------

/// Session factory backed by [`FakeServer`] instead of a real process.
pub struct FakeSessionFactory {
    server: FakeServer,
    launches: AtomicUsize,
    fail: AtomicBool,
}

impl FakeSessionFactory {
    pub fn new() -> Self {
        Self {
            server: FakeServer::new(),
            launches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes every launch fail, as a missing server binary would.
    pub fn fail_launches(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn server(&self) -> &FakeServer {
        &self.server
    }
}

impl SessionFactory for FakeSessionFactory {
    fn launch(&self, options: &LaunchOptions) -> Result<LanguageSession> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("launch refused")));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .server
            .start_session_with_options(options.initialization_options.clone()))
    }
}
