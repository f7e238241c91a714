//! Process-wide configuration, established once at startup.
//!
//! # Responsibilities
//! - Collect the `MIXER_*` environment surface into one immutable struct
//! - Hold the platform routing constants (domains, suffixes, DoH endpoint)
//! - Collect per-siteKey mTLS credential material into a keyed map
//!
//! # Design Decisions
//! - Read once in `main`, shared read-only behind `Arc` — nothing here
//!   mutates after startup
//! - Credentials are a keyed lookup (`certificate_for`), populated from the
//!   `MIXER_CERT_*` prefix at startup; request handling never scans the
//!   environment

use std::collections::HashMap;

use crate::tenant::Tenant;

const ENV_CERT_PREFIX: &str = "MIXER_CERT_";

/// Immutable process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Platform domain: config source host suffix and synthesized fallback
    /// origins (`<siteKey>.<platform_domain>`).
    pub platform_domain: String,

    /// Service domains recognized as platform-owned; requests arriving on
    /// any other host go through custom-domain DNS resolution.
    pub service_domains: Vec<String>,

    /// Suffix a custom domain's CNAME must carry to be routable.
    pub cname_suffix: String,

    /// Public DNS-over-HTTPS endpoint (RFC 8484 GET).
    pub doh_endpoint: String,

    /// The dynamic-data origin whose responses get CDN cache-tag
    /// translation and robots forcing.
    pub dynamic_origin: String,

    /// Origin suffixes of restricted hosting providers that require an
    /// alternate network identity (mTLS).
    pub restricted_origin_suffixes: Vec<String>,

    /// Origin suffixes eligible for fragment inlining.
    pub inline_origin_suffixes: Vec<String>,

    /// Feature flag for fragment inlining.
    pub inline_enabled: bool,

    /// Bearer credential for the config source, if any.
    pub config_token: Option<String>,

    /// Dev-mode identity override; replaces host-derived identity entirely.
    pub dev_identity: Option<Tenant>,

    /// PEM bundles keyed by normalized site key (see [`cert_env_key`]).
    pub certificates: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform_domain: "orbit.live".to_string(),
            service_domains: vec!["orbit.live".to_string(), "orbit-mesh.net".to_string()],
            cname_suffix: "domains.orbit.live".to_string(),
            doh_endpoint: "https://dns.google/dns-query".to_string(),
            dynamic_origin: "pipeline.orbit-data.live".to_string(),
            restricted_origin_suffixes: vec![".storefront.cloud".to_string()],
            inline_origin_suffixes: vec![
                ".orbit.live".to_string(),
                ".orbit.page".to_string(),
                "pipeline.orbit-data.live".to_string(),
            ],
            inline_enabled: true,
            config_token: None,
            dev_identity: None,
            certificates: HashMap::new(),
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(domain) = std::env::var("MIXER_PLATFORM_DOMAIN") {
            if !domain.is_empty() {
                settings.platform_domain = domain;
            }
        }
        if let Ok(flag) = std::env::var("MIXER_INLINE_ENABLED") {
            settings.inline_enabled = !matches!(flag.as_str(), "false" | "0" | "off");
        }
        settings.config_token = std::env::var("MIXER_CONFIG_TOKEN").ok().filter(|t| !t.is_empty());

        if std::env::var("MIXER_DEV").map(|v| v == "true").unwrap_or(false) {
            let ref_name = std::env::var("MIXER_REF").unwrap_or_else(|_| "main".to_string());
            let site = std::env::var("MIXER_SITE").unwrap_or_default();
            let org = std::env::var("MIXER_ORG").unwrap_or_default();
            if !site.is_empty() && !org.is_empty() {
                settings.dev_identity = Some(Tenant::new(ref_name, site, org));
            } else {
                tracing::warn!("MIXER_DEV set but MIXER_SITE/MIXER_ORG missing; ignoring");
            }
        }

        for (key, value) in std::env::vars() {
            if let Some(suffix) = key.strip_prefix(ENV_CERT_PREFIX) {
                settings.certificates.insert(suffix.to_string(), value);
            }
        }

        settings
    }

    /// True if the host is under a recognized platform service domain.
    pub fn is_service_host(&self, host: &str) -> bool {
        let host = host.split(':').next().unwrap_or(host);
        self.service_domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
    }

    /// PEM bundle registered for a site key, if any.
    pub fn certificate_for(&self, site_key: &str) -> Option<&str> {
        self.certificates
            .get(&cert_env_key(site_key))
            .map(String::as_str)
    }
}

/// Normalize a site key into the environment-variable key suffix:
/// uppercased, with `-` mapped to `_` (`main--shop--acme` →
/// `MAIN__SHOP__ACME`).
pub fn cert_env_key(site_key: &str) -> String {
    site_key.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_host_recognition() {
        let settings = Settings::default();
        assert!(settings.is_service_host("main--shop--acme.orbit.live"));
        assert!(settings.is_service_host("app.orbit-mesh.net"));
        assert!(settings.is_service_host("app.orbit-mesh.net:8443"));
        assert!(!settings.is_service_host("www.example.com"));
        // suffix match must respect label boundaries
        assert!(!settings.is_service_host("evilorbit.live"));
    }

    #[test]
    fn certificate_lookup_normalizes_site_key() {
        let mut settings = Settings::default();
        settings
            .certificates
            .insert("MAIN__SHOP__ACME".to_string(), "---pem---".to_string());
        assert_eq!(settings.certificate_for("main--shop--acme"), Some("---pem---"));
        assert_eq!(settings.certificate_for("other--site--org"), None);
    }
}
