//! Edge request mixer: a multi-tenant routing reverse proxy.
//!
//! Per inbound request the mixer identifies the tenant from the host (or a
//! custom domain's CNAME), loads the tenant's routing config, matches the
//! path against its glob patterns to pick a backend, derives the outbound
//! origin/protocol/path, proxies the request, and post-processes the
//! response (CDN cache-tag translation, robots forcing, fragment inlining,
//! recompression).

pub mod dns;
pub mod error;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod settings;
pub mod tenant;
pub mod transform;

pub use error::{MixerError, MixerResult};
pub use routing::ResolvedConfig;
pub use server::{AppState, MixerServer};
pub use settings::Settings;
pub use tenant::Tenant;
