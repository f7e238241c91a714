//! Tenant configuration schema and boundary validation.
//!
//! # Responsibilities
//! - Define the raw per-tenant config shape (`patterns` + `backends`)
//! - Validate the loosely-typed source document into typed structs
//! - Parse caller overrides from query parameters
//!
//! # Design Decisions
//! - Nothing downstream touches raw JSON: validation happens here, once,
//!   and violations are `InvalidConfig`
//! - Pattern declaration order is preserved; it breaks length ties

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{MixerError, MixerResult};

/// One backend: a named upstream origin plus path-resolution rules.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// Upstream origin; may embed a scheme and/or path, normalized at
    /// resolution time.
    pub origin: String,

    /// Complete outbound path; wins outright over the request path.
    pub path: Option<String>,

    /// Prefix prepended to the request path.
    pub path_prefix: Option<String>,

    /// Outbound protocol; `https` when absent.
    pub protocol: Option<String>,

    /// Request nav fragment inlining for this backend's HTML responses.
    pub inline_nav: bool,

    /// Request footer fragment inlining for this backend's HTML responses.
    pub inline_footer: bool,
}

/// Validated per-tenant routing table.
#[derive(Debug, Clone, Default)]
pub struct TenantRouting {
    /// `(pattern, backend id)` pairs in declaration order.
    pub patterns: Vec<(String, String)>,

    /// Backend definitions by id.
    pub backends: HashMap<String, BackendConfig>,
}

impl TenantRouting {
    /// Validate a raw config document.
    ///
    /// `patterns` values must be strings; every `backends` entry must be an
    /// object with a string `origin`. Anything else is `InvalidConfig`.
    pub fn from_value(value: &Value) -> MixerResult<Self> {
        let root = value
            .as_object()
            .ok_or_else(|| MixerError::invalid_config("config is not an object"))?;

        let mut patterns = Vec::new();
        if let Some(raw) = root.get("patterns") {
            let map = raw
                .as_object()
                .ok_or_else(|| MixerError::invalid_config("patterns is not an object"))?;
            for (pattern, backend) in map {
                let backend = backend.as_str().ok_or_else(|| {
                    MixerError::invalid_config(format!("invalid pattern {pattern}"))
                })?;
                patterns.push((pattern.clone(), backend.to_string()));
            }
        }

        let mut backends = HashMap::new();
        if let Some(raw) = root.get("backends") {
            let map = raw
                .as_object()
                .ok_or_else(|| MixerError::invalid_config("backends is not an object"))?;
            for (id, entry) in map {
                if !entry.get("origin").map(Value::is_string).unwrap_or(false) {
                    return Err(MixerError::invalid_config(format!("invalid backend {id}")));
                }
                let backend: BackendConfig = serde_json::from_value(entry.clone())
                    .map_err(|_| MixerError::invalid_config(format!("invalid backend {id}")))?;
                backends.insert(id.clone(), backend);
            }
        }

        Ok(Self { patterns, backends })
    }
}

/// Caller overrides, highest precedence in the resolved config.
///
/// Parsed from the request's query parameters; unknown parameters are
/// ignored so the resolved config stays fully typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub origin: Option<String>,
    pub protocol: Option<String>,
    pub pathname: Option<String>,
    pub inline_nav: Option<bool>,
    pub inline_footer: Option<bool>,
}

impl Overrides {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut overrides = Self::default();
        let Some(query) = query else {
            return overrides;
        };
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "origin" => overrides.origin = Some(value.into_owned()),
                "protocol" => overrides.protocol = Some(value.into_owned()),
                "pathname" => overrides.pathname = Some(value.into_owned()),
                "inlineNav" => overrides.inline_nav = Some(flag(&value)),
                "inlineFooter" => overrides.inline_footer = Some(flag(&value)),
                _ => {}
            }
        }
        overrides
    }
}

fn flag(value: &str) -> bool {
    matches!(value, "true" | "1" | "")
}
