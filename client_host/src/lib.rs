//! Host capability contracts for the mcshader client bridge.
//!
//! The editor host (command registry, status bar, document store, virtual
//! content providers, configuration) is an external collaborator. This crate
//! defines the narrow traits the bridge needs from it, plus the small value
//! types shared across the workspace: [`Uri`], [`Subscription`],
//! [`CancelFlag`] and [`ChangeEmitter`].

pub mod host;
pub mod subscription;
pub mod uri;

pub use host::{
    ActiveDocument, CancelFlag, ChangeEmitter, CommandAction, ContentProvider, Host, HostFuture,
    ProvideFuture, StatusItem,
};
pub use subscription::Subscription;
pub use uri::Uri;
