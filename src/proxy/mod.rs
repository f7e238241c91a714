//! Proxy subsystem: outbound identity selection, backend dispatch, and
//! CDN-specific response translation.

pub mod cdn;
pub mod client;
pub mod dispatcher;

pub use cdn::CdnKind;
pub use client::CredentialStore;
pub use dispatcher::dispatch;
