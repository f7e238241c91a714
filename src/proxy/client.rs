//! Outbound HTTP clients and network identities.
//!
//! # Responsibilities
//! - Hold the default upstream client and the per-siteKey mTLS clients
//! - Select the right identity for an origin (`client_for`)
//!
//! # Design Decisions
//! - All clients use manual redirect handling; redirects pass through to
//!   the caller unmodified
//! - Clients are built once at startup from the settings' credential map;
//!   a missing credential for a restricted origin is logged, not fatal

use std::collections::HashMap;

use reqwest::redirect::Policy;

use crate::error::{MixerError, MixerResult};
use crate::settings::{cert_env_key, Settings};

/// Keyed store of outbound clients: one default, one per mTLS credential.
pub struct CredentialStore {
    default: reqwest::Client,
    mtls: HashMap<String, reqwest::Client>,
    restricted_suffixes: Vec<String>,
}

impl CredentialStore {
    /// Build all clients from the startup settings.
    pub fn from_settings(settings: &Settings) -> MixerResult<Self> {
        let default = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| MixerError::internal(format!("default client: {err}")))?;

        let mut mtls = HashMap::new();
        for (key, pem) in &settings.certificates {
            let identity = match reqwest::Identity::from_pem(pem.as_bytes()) {
                Ok(identity) => identity,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "unusable mTLS credential, skipping");
                    continue;
                }
            };
            match reqwest::Client::builder()
                .redirect(Policy::none())
                .identity(identity)
                .build()
            {
                Ok(client) => {
                    mtls.insert(key.clone(), client);
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "mTLS client build failed, skipping");
                }
            }
        }

        Ok(Self {
            default,
            mtls,
            restricted_suffixes: settings.restricted_origin_suffixes.clone(),
        })
    }

    /// The shared identity-less client (config source, DoH, fragments).
    pub fn default_client(&self) -> &reqwest::Client {
        &self.default
    }

    /// Select the client for a backend origin. Restricted hosting
    /// providers get the site's mTLS identity; everything else (including
    /// a restricted origin with no registered credential) gets the
    /// default.
    pub fn client_for(&self, origin: &str, site_key: &str) -> &reqwest::Client {
        let origin_host = origin.split(':').next().unwrap_or(origin);
        let restricted = self
            .restricted_suffixes
            .iter()
            .any(|suffix| origin_host.ends_with(suffix.as_str()));
        if !restricted {
            return &self.default;
        }
        match self.mtls.get(&cert_env_key(site_key)) {
            Some(client) => {
                tracing::debug!(origin = %origin, site_key = %site_key, "using mTLS identity");
                client
            }
            None => {
                tracing::warn!(origin = %origin, site_key = %site_key, "missing mTLS identity");
                &self.default
            }
        }
    }
}
