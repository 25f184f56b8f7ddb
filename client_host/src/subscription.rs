//! Disposable registration handles.

/// A handle for a host or channel registration (command, notification
/// listener, content provider, configuration watcher).
///
/// Disposing runs the release closure exactly once; later calls are no-ops.
/// Dropping an undisposed subscription releases it as well, so a collected
/// `Vec<Subscription>` can be torn down by clearing it.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `release` on disposal.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Releases the underlying registration. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.release.is_none())
            .finish()
    }
}
