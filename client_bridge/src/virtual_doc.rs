//! Virtual merged documents.
//!
//! The merge command rewrites `shaders/main.fsh` into
//! `mcshader:shaders/main.flattened.fsh`; when the host fetches content
//! for that URI, the provider strips the marker back out and asks the
//! server for the merged view of the real file.

use crate::lifecycle::SessionSlot;
use mcshader_host::{CancelFlag, ChangeEmitter, ContentProvider, ProvideFuture, Uri};
use serde_json::{json, Value};

/// Marker segment inserted before the final extension of a merged view.
pub const FLATTENED_MARKER: &str = ".flattened";

/// Inserts the marker before the final extension:
/// `shaders/main.fsh` → `shaders/main.flattened.fsh`. Extensionless paths
/// get the marker appended.
pub fn flattened_path(path: &str) -> String {
    match path.rfind('.') {
        Some(dot) => format!("{}{}{}", &path[..dot], FLATTENED_MARKER, &path[dot..]),
        None => format!("{path}{FLATTENED_MARKER}"),
    }
}

/// Recovers the source path from a marked one; exact inverse of
/// [`flattened_path`]. Paths without the marker come back unchanged.
pub fn source_path(path: &str) -> String {
    if let Some(dot) = path.rfind('.') {
        let (stem, ext) = path.split_at(dot);
        if ext == FLATTENED_MARKER {
            return stem.to_string();
        }
        if let Some(base) = stem.strip_suffix(FLATTENED_MARKER) {
            return format!("{base}{ext}");
        }
    }
    path.to_string()
}

/// Read-only content source for the `mcshader:` scheme.
///
/// Each fetch issues a fresh `virtualMerge` request over the current
/// session; nothing is cached. Every failure resolves to empty content so
/// a raw protocol error never reaches the text display.
pub struct MergedDocumentProvider {
    session: SessionSlot,
    changed: ChangeEmitter,
}

impl MergedDocumentProvider {
    pub fn new(session: SessionSlot) -> Self {
        Self {
            session,
            changed: ChangeEmitter::new(),
        }
    }

    /// Signals the host that `uri` has new content, prompting a re-fetch.
    pub fn fire_changed(&self, uri: &Uri) {
        self.changed.fire(uri);
    }
}

impl ContentProvider for MergedDocumentProvider {
    fn provide(&self, uri: &Uri, cancel: &CancelFlag) -> ProvideFuture {
        let session = self.session.current();
        let path = source_path(uri.path());
        let cancel = cancel.clone();

        Box::pin(async move {
            if cancel.is_cancelled() {
                return recover_empty(&path, "cancelled by host");
            }
            let Some(session) = session else {
                return recover_empty(&path, "no active language session");
            };
            log::info!("requesting merged view of {path}");
            match session.send_request(crate::MERGE_METHOD, json!([path])).await {
                Ok(Value::String(content)) => content,
                Ok(other) => recover_empty(&path, &format!("non-string body: {other}")),
                Err(e) => recover_empty(&path, &e.to_string()),
            }
        })
    }

    fn on_did_change(&self, listener: Box<dyn Fn(&Uri) + Send + Sync>) {
        self.changed.subscribe(listener);
    }
}

/// The recovery branch for a failed merge fetch: the virtual document
/// must always render something, even if empty.
fn recover_empty(path: &str, reason: &str) -> String {
    log::info!("merged view of {path} unavailable ({reason}); rendering empty document");
    String::new()
}
