//! Inbound notification handling: status updates and server log
//! forwarding.

use lsp_types::{LogMessageParams, MessageType};
use mcshader_host::Host;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Text inserted between the icon and the message of every indicator.
const STATUS_PREFIX: &str = "[mc-shader]";

/// Payload of an `mcshader/status` notification.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub icon: String,
}

/// Maps server status notifications onto the single visible host
/// indicator.
///
/// Invariant: at most one indicator exists at a time; an update always
/// releases the previous item before creating its replacement.
pub struct StatusBridge {
    host: Arc<dyn Host>,
    current: Mutex<Option<Box<dyn mcshader_host::StatusItem>>>,
}

impl StatusBridge {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            current: Mutex::new(None),
        }
    }

    /// Applies one status update. Unrecognized status values are ignored
    /// so newer servers can add phases without breaking older clients.
    pub fn apply(&self, update: &StatusUpdate) {
        match update.status.as_str() {
            "loading" | "ready" | "failed" => self.show(&update.icon, &update.message),
            "clear" => self.clear(),
            other => log::debug!("ignoring unrecognized status '{other}'"),
        }
    }

    /// Replaces the visible indicator with `icon [mc-shader] message`.
    pub fn show(&self, icon: &str, message: &str) {
        let text = format!("{icon} {STATUS_PREFIX} {message}");
        let mut current = self.current.lock().unwrap();
        // Release before create; the host never stacks indicators.
        *current = None;
        *current = Some(self.host.create_status_item(&text));
    }

    /// Releases the visible indicator without creating a replacement.
    pub fn clear(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// Text of the visible indicator, if one exists.
    pub fn visible_text(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|item| item.text().to_string())
    }
}

/// Notification handler for [`crate::STATUS_METHOD`]. Malformed payloads
/// are dropped, not errors.
pub fn on_status_notification(bridge: &StatusBridge, params: Value) {
    match serde_json::from_value::<StatusUpdate>(params) {
        Ok(update) => bridge.apply(&update),
        Err(e) => log::debug!("malformed status notification: {e}"),
    }
}

/// Notification handler for `window/logMessage`: re-emits server log
/// messages on the client log at the matching level. Unknown levels fall
/// back to the lowest severity.
pub fn forward_server_log(params: Value) {
    let log_params: LogMessageParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => {
            log::debug!("malformed log notification: {e}");
            return;
        }
    };
    match log_params.typ {
        MessageType::ERROR => log::error!(target: "mcshader::server", "{}", log_params.message),
        MessageType::WARNING => log::warn!(target: "mcshader::server", "{}", log_params.message),
        MessageType::INFO => log::info!(target: "mcshader::server", "{}", log_params.message),
        _ => log::debug!(target: "mcshader::server", "{}", log_params.message),
    }
}
