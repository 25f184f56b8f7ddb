//! Capability traits onto the editor host.
//!
//! All bridge entry points run as scheduled callbacks on the host's event
//! loop; host calls that need to suspend (opening or showing a document)
//! return boxed futures so the trait stays object-safe.

use crate::subscription::Subscription;
use crate::uri::Uri;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Boxed future returned by suspending host calls.
pub type HostFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Boxed future resolving to virtual document content.
pub type ProvideFuture = Pin<Box<dyn Future<Output = String> + Send>>;

/// An action bound to a host command name.
pub type CommandAction = Arc<dyn Fn() -> HostFuture + Send + Sync>;

/// The document currently focused in the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    /// Path of the document on disk.
    pub path: String,
    /// Host language identifier, e.g. `glsl`.
    pub language_id: String,
}

/// A visible status bar entry. Dropping the item removes it from the UI.
pub trait StatusItem: Send {
    /// The text currently shown.
    fn text(&self) -> &str;
}

/// Cooperative cancellation flag the host may hand to content providers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the operation as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only content source for a synthetic URI scheme.
pub trait ContentProvider: Send + Sync {
    /// Produces the document body for `uri`. Must always resolve; failures
    /// are reported as empty content, never as errors.
    fn provide(&self, uri: &Uri, cancel: &CancelFlag) -> ProvideFuture;

    /// Registers a listener invoked whenever the provider fires a content
    /// change for a URI; the host re-fetches that document in response.
    fn on_did_change(&self, listener: Box<dyn Fn(&Uri) + Send + Sync>);
}

/// Fan-out emitter backing [`ContentProvider::on_did_change`].
#[derive(Default)]
pub struct ChangeEmitter {
    listeners: Mutex<Vec<Box<dyn Fn(&Uri) + Send + Sync>>>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for content change events.
    pub fn subscribe(&self, listener: Box<dyn Fn(&Uri) + Send + Sync>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Notifies every listener that `uri` has new content.
    pub fn fire(&self, uri: &Uri) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(uri);
        }
    }
}

/// The generic host surface the bridge is written against.
///
/// A production implementation adapts a concrete editor; tests use an
/// in-memory fake.
pub trait Host: Send + Sync {
    /// Binds `name` to `action` in the host command registry.
    fn register_command(&self, name: &str, action: CommandAction) -> Subscription;

    /// Creates a visible status bar item showing `text`. The previous item,
    /// if any, must be dropped by the caller first; the host never stacks.
    fn create_status_item(&self, text: &str) -> Box<dyn StatusItem>;

    /// Registers `provider` as the content source for `scheme`.
    fn register_content_provider(
        &self,
        scheme: &str,
        provider: Arc<dyn ContentProvider>,
    ) -> Subscription;

    /// The document currently focused in the editor, if any.
    fn active_document(&self) -> Option<ActiveDocument>;

    /// Loads the document at `uri`, invoking the registered content
    /// provider for synthetic schemes.
    fn open_document(&self, uri: &Uri) -> HostFuture;

    /// Displays an already-opened document side-by-side as a non-pinned
    /// preview tab.
    fn show_preview(&self, uri: &Uri) -> HostFuture;

    /// Shows a transient informational message to the user.
    fn show_information_message(&self, text: &str);

    /// Returns the current value of a named configuration section.
    fn configuration(&self, section: &str) -> Value;

    /// Watches a configuration section; `handler` receives each new value.
    fn on_configuration_change(
        &self,
        section: &str,
        handler: Box<dyn Fn(Value) + Send + Sync>,
    ) -> Subscription;
}
