//! Host-invokable commands.

use crate::lifecycle::ClientLifecycle;
use crate::virtual_doc::{flattened_path, MergedDocumentProvider};
use mcshader_host::{CommandAction, Host, Subscription, Uri};
use std::sync::Arc;

/// Registers the command surface under the `mcshader` namespace. The
/// returned subscriptions are owned by the lifecycle controller.
pub fn register(
    host: &Arc<dyn Host>,
    lifecycle: &Arc<ClientLifecycle>,
    provider: &Arc<MergedDocumentProvider>,
) -> Vec<Subscription> {
    vec![
        host.register_command(
            &format!("{}.restart", crate::COMMAND_PREFIX),
            restart_action(host, lifecycle),
        ),
        host.register_command(
            &format!("{}.virtualMerge", crate::COMMAND_PREFIX),
            virtual_merge_action(host, provider),
        ),
    ]
}

/// Restarts the language server. A restart already in flight is not
/// interrupted; the controller serializes via its in-flight guard.
fn restart_action(host: &Arc<dyn Host>, lifecycle: &Arc<ClientLifecycle>) -> CommandAction {
    let host = Arc::clone(host);
    let lifecycle = Arc::clone(lifecycle);
    Arc::new(move || {
        let host = Arc::clone(&host);
        let lifecycle = Arc::clone(&lifecycle);
        Box::pin(async move {
            host.show_information_message("Reloading Minecraft shaders language server...");
            if let Err(e) = lifecycle.restart().await {
                log::error!("failed to restart language server: {e}");
            }
        })
    })
}

/// Opens the flattened view of the active shader document side-by-side.
/// Silent no-op when the active document is not a shader.
fn virtual_merge_action(
    host: &Arc<dyn Host>,
    provider: &Arc<MergedDocumentProvider>,
) -> CommandAction {
    let host = Arc::clone(host);
    let provider = Arc::clone(provider);
    Arc::new(move || {
        let host = Arc::clone(&host);
        let provider = Arc::clone(&provider);
        Box::pin(async move {
            let Some(document) = host.active_document() else {
                return;
            };
            if document.language_id != crate::LANGUAGE_ID {
                return;
            }

            let uri = Uri::new(crate::SCHEME, flattened_path(&document.path));
            host.open_document(&uri).await;
            // The document may have been opened (and cached) before; firing
            // the change event forces a fresh merge.
            provider.fire_changed(&uri);
            host.show_preview(&uri).await;
        })
    })
}
