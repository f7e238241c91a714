//! Per-request config resolution: tenant identity → routing table →
//! backend → origin/protocol/pathname.
//!
//! # Responsibilities
//! - Fetch the tenant's raw config from the config source (fresh per
//!   request; a 404 degrades to an empty config)
//! - Select exactly one backend via pattern matching with `default` and
//!   synthesized fallbacks
//! - Normalize embedded origin schemes/paths and derive the outbound path
//! - Merge caller overrides last
//!
//! # Design Decisions
//! - Explicit `path` wins outright and ignores the request path; an
//!   origin-embedded path is adopted as prefix only when neither `path` nor
//!   `pathPrefix` is declared
//! - Backend selection never hard-fails: absent backends synthesize
//!   `<siteKey>.<platform-domain>`

use serde_json::Value;

use crate::error::{MixerError, MixerResult};
use crate::routing::config::{BackendConfig, Overrides, TenantRouting};
use crate::routing::pattern::find_match;
use crate::settings::Settings;
use crate::tenant::Tenant;

/// Where the config source lives.
///
/// Production uses the per-site platform domain; tests point at a fixed
/// mock server base URL.
#[derive(Debug, Clone)]
pub enum ConfigBase {
    /// `https://<siteKey>.<domain>/config.json`
    PlatformDomain(String),
    /// `<base>/config.json` regardless of site key.
    FixedUrl(String),
}

/// Keyed lookup against the tenant config service.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    client: reqwest::Client,
    base: ConfigBase,
    token: Option<String>,
}

impl ConfigSource {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            client,
            base: ConfigBase::PlatformDomain(settings.platform_domain.clone()),
            token: settings.config_token.clone(),
        }
    }

    /// Point the source at a fixed base URL (test seam).
    pub fn with_fixed_url(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: ConfigBase::FixedUrl(base.into()),
            token: None,
        }
    }

    fn url_for(&self, site_key: &str) -> String {
        match &self.base {
            ConfigBase::PlatformDomain(domain) => {
                format!("https://{site_key}.{domain}/config.json")
            }
            ConfigBase::FixedUrl(base) => {
                format!("{}/config.json", base.trim_end_matches('/'))
            }
        }
    }

    /// Fetch the raw config document for a site key.
    ///
    /// `Ok(None)` means the source had no config (404) — not fatal. Other
    /// failures surface with the upstream status.
    pub async fn fetch(&self, site_key: &str) -> MixerResult<Option<Value>> {
        let url = self.url_for(site_key);
        tracing::debug!(site_key = %site_key, url = %url, "fetching config");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(site_key = %site_key, error = %err, "config source unreachable");
                MixerError::config_fetch_failed(502)
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MixerError::config_fetch_failed(response.status().as_u16()));
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|_| MixerError::invalid_config("config is not valid JSON"))?;
        Ok(Some(value))
    }
}

/// The fully resolved routing decision for one request. Immutable once
/// built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub org: String,
    pub site: String,
    pub ref_name: String,
    pub site_key: String,

    /// Winning pattern, if any matched.
    pub pattern: Option<String>,

    /// Selected backend id (`default` when nothing matched).
    pub backend_id: String,

    /// Bare upstream host (no scheme, no path).
    pub origin: String,

    /// Outbound protocol (`https` unless declared otherwise).
    pub protocol: String,

    /// Final outbound path.
    pub pathname: String,

    pub inline_nav: bool,
    pub inline_footer: bool,
}

/// Resolve a request against a validated routing table. Pure; no I/O.
pub fn resolve_routing(
    routing: &TenantRouting,
    settings: &Settings,
    tenant: &Tenant,
    request_path: &str,
) -> ResolvedConfig {
    let site_key = tenant.site_key();

    let candidates = routing
        .patterns
        .iter()
        .map(|(pattern, _)| pattern.as_str())
        .filter(|pattern| *pattern != "default");
    let pattern = find_match(candidates, request_path).map(str::to_string);

    let backend_id = pattern
        .as_deref()
        .and_then(|winner| backend_for(routing, winner))
        .or_else(|| backend_for(routing, "default"))
        .unwrap_or_else(|| "default".to_string());

    let synthesized;
    let backend = match routing.backends.get(&backend_id) {
        Some(backend) => backend,
        None => {
            synthesized = BackendConfig {
                origin: format!("{site_key}.{}", settings.platform_domain),
                ..BackendConfig::default()
            };
            &synthesized
        }
    };

    let (origin, embedded_protocol, embedded_path) = split_origin(&backend.origin);
    let protocol = backend
        .protocol
        .clone()
        .or(embedded_protocol)
        .unwrap_or_else(|| "https".to_string());
    let pathname = derive_pathname(backend, embedded_path.as_deref(), request_path);

    ResolvedConfig {
        org: tenant.org.clone(),
        site: tenant.site.clone(),
        ref_name: tenant.ref_name.clone(),
        site_key,
        pattern,
        backend_id,
        origin,
        protocol,
        pathname,
        inline_nav: backend.inline_nav,
        inline_footer: backend.inline_footer,
    }
}

/// Full resolution: fetch, validate, resolve, merge overrides.
pub async fn resolve(
    source: &ConfigSource,
    settings: &Settings,
    tenant: &Tenant,
    request_path: &str,
    overrides: &Overrides,
) -> MixerResult<ResolvedConfig> {
    let routing = match source.fetch(&tenant.site_key()).await? {
        Some(value) => TenantRouting::from_value(&value)?,
        None => TenantRouting::default(),
    };

    let mut config = resolve_routing(&routing, settings, tenant, request_path);
    apply_overrides(&mut config, overrides);
    Ok(config)
}

/// Merge caller overrides; they always win.
pub fn apply_overrides(config: &mut ResolvedConfig, overrides: &Overrides) {
    if let Some(origin) = &overrides.origin {
        let (host, protocol, _) = split_origin(origin);
        config.origin = host;
        if let Some(protocol) = protocol {
            config.protocol = protocol;
        }
    }
    if let Some(protocol) = &overrides.protocol {
        config.protocol = protocol.clone();
    }
    if let Some(pathname) = &overrides.pathname {
        config.pathname = pathname.clone();
    }
    if let Some(inline_nav) = overrides.inline_nav {
        config.inline_nav = inline_nav;
    }
    if let Some(inline_footer) = overrides.inline_footer {
        config.inline_footer = inline_footer;
    }
}

fn backend_for(routing: &TenantRouting, pattern: &str) -> Option<String> {
    routing
        .patterns
        .iter()
        .find(|(p, _)| p.as_str() == pattern)
        .map(|(_, backend)| backend.clone())
}

/// Split an origin into bare host, embedded protocol, and embedded path.
fn split_origin(origin: &str) -> (String, Option<String>, Option<String>) {
    let (protocol, rest) = if let Some(rest) = origin.strip_prefix("https://") {
        (Some("https".to_string()), rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        (Some("http".to_string()), rest)
    } else {
        (None, origin)
    };

    match rest.split_once('/') {
        Some((host, path)) if !path.is_empty() => {
            (host.to_string(), protocol, Some(path.to_string()))
        }
        Some((host, _)) => (host.to_string(), protocol, None),
        None => (rest.to_string(), protocol, None),
    }
}

/// Derive the outbound path per the canonical precedence: explicit `path`
/// wins outright; otherwise prefix (`pathPrefix`, else origin-embedded) +
/// request path.
fn derive_pathname(
    backend: &BackendConfig,
    embedded_path: Option<&str>,
    request_path: &str,
) -> String {
    if let Some(path) = &backend.path {
        return if path.starts_with('/') {
            path.clone()
        } else {
            format!("/{path}")
        };
    }

    let prefix = backend
        .path_prefix
        .as_deref()
        .or(embedded_path)
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty());

    match prefix {
        Some(prefix) => format!("/{prefix}/{}", request_path.trim_start_matches('/')),
        None => request_path.to_string(),
    }
}
