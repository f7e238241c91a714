//! Custom-domain resolution: CNAME lookup against the platform routing
//! suffix, native first, DNS-over-HTTPS as fallback.
//!
//! # Data Flow
//! ```text
//! custom host
//!     → native stub resolver (hickory, system conf), if available
//!     → DoH GET (RFC 8484) on any native failure
//!     → suffix + identity validation
//!     → Some(cname) | None
//! ```
//!
//! # Design Decisions
//! - Never fails: `None` uniformly means "not a custom domain", covering
//!   lookup errors, absent CNAMEs, and non-matching targets
//! - Only CNAME records against one fixed suffix; this is not a resolver

pub mod wire;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;

use crate::settings::Settings;
use crate::tenant::Tenant;

/// Resolves custom domains to routable platform CNAMEs.
pub struct DomainResolver {
    native: Option<TokioAsyncResolver>,
    http: reqwest::Client,
    doh_endpoint: String,
    cname_suffix: String,
}

impl DomainResolver {
    /// Build with the system stub resolver when available; its absence is
    /// tolerated and leaves the DoH path only.
    pub fn new(http: reqwest::Client, settings: &Settings) -> Self {
        let native = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => Some(resolver),
            Err(err) => {
                tracing::debug!(error = %err, "native resolver unavailable, DoH only");
                None
            }
        };
        Self {
            native,
            http,
            doh_endpoint: settings.doh_endpoint.clone(),
            cname_suffix: settings.cname_suffix.clone(),
        }
    }

    /// DoH-only resolver (no native path); used by tests and runtimes
    /// without system DNS.
    pub fn doh_only(
        http: reqwest::Client,
        doh_endpoint: impl Into<String>,
        cname_suffix: impl Into<String>,
    ) -> Self {
        Self {
            native: None,
            http,
            doh_endpoint: doh_endpoint.into(),
            cname_suffix: cname_suffix.into(),
        }
    }

    /// Resolve a custom domain to its routing CNAME.
    ///
    /// `None` means "not a custom domain": no CNAME, a CNAME outside the
    /// routing suffix, or both lookup paths failing.
    pub async fn resolve_custom_domain(&self, domain: &str) -> Option<String> {
        if let Some(native) = &self.native {
            match self.resolve_native(native, domain).await {
                Some(cname) => {
                    return self.validate(&cname);
                }
                None => {
                    tracing::debug!(domain = %domain, "native CNAME lookup failed, trying DoH");
                }
            }
        }
        let cname = self.resolve_doh(domain).await?;
        self.validate(&cname)
    }

    async fn resolve_native(&self, resolver: &TokioAsyncResolver, domain: &str) -> Option<String> {
        let lookup = resolver.lookup(domain, RecordType::CNAME).await.ok()?;
        lookup.iter().find_map(|rdata| match rdata {
            RData::CNAME(cname) => Some(cname.0.to_utf8().trim_end_matches('.').to_string()),
            _ => None,
        })
    }

    async fn resolve_doh(&self, domain: &str) -> Option<String> {
        let query = wire::encode_query(domain, wire::QTYPE_CNAME);
        let response = self
            .http
            .get(&self.doh_endpoint)
            .query(&[("dns", URL_SAFE_NO_PAD.encode(&query))])
            .header("accept", "application/dns-message")
            .send()
            .await
            .map_err(|err| {
                tracing::debug!(domain = %domain, error = %err, "DoH request failed");
            })
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        let body = response.bytes().await.ok()?;
        Some(wire::first_cname(&body)?.trim_end_matches('.').to_string())
    }

    /// A routable CNAME is `<ref>--<site>--<org>.<cname-suffix>`.
    fn validate(&self, cname: &str) -> Option<String> {
        let label = cname.strip_suffix(&format!(".{}", self.cname_suffix))?;
        if label.contains('.') || Tenant::from_host_label(label).is_err() {
            return None;
        }
        Some(cname.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DomainResolver {
        DomainResolver::doh_only(
            reqwest::Client::new(),
            "https://dns.example/dns-query",
            "domains.orbit.live",
        )
    }

    #[test]
    fn validates_routing_cnames() {
        let r = resolver();
        assert_eq!(
            r.validate("ref--site--org.domains.orbit.live").as_deref(),
            Some("ref--site--org.domains.orbit.live")
        );
        assert_eq!(r.validate("not-matching.example.com"), None);
        assert_eq!(r.validate("ref--site.domains.orbit.live"), None);
        assert_eq!(r.validate("domains.orbit.live"), None);
        // leading label must be a single host label
        assert_eq!(r.validate("a--b--c.extra.domains.orbit.live"), None);
    }
}
