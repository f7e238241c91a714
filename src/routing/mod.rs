//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (tenant, path, query)
//!     → resolver.rs (fetch + validate tenant config)
//!     → pattern.rs (glob match, longest wins)
//!     → Return: ResolvedConfig {origin, protocol, pathname, …}
//! ```
//!
//! # Design Decisions
//! - Config is fetched fresh per request; nothing is compiled at startup
//! - Deterministic: same table and path always resolve the same backend
//! - Selection never hard-fails; missing backends synthesize a platform
//!   origin

pub mod config;
pub mod pattern;
pub mod resolver;

pub use config::{BackendConfig, Overrides, TenantRouting};
pub use resolver::{resolve, ConfigSource, ResolvedConfig};
