//! Downstream CDN detection and cache-tag translation.
//!
//! # Responsibilities
//! - Sniff which CDN sits in front of the mixer from the inbound request
//! - Re-emit backend cache keys in that CDN's native purge-tag header
//! - Force robots exclusion on dynamic-data responses
//!
//! # Design Decisions
//! - Detection is an explicit ordered rule list over a tagged variant, not
//!   scattered string checks; first rule wins
//! - Only the designated dynamic-data origin gets tag translation at all

use axum::http::{HeaderMap, HeaderValue};

/// The CDN observed in front of this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnKind {
    Fastly,
    Akamai,
    Cloudflare,
    CloudFront,
    Unknown,
}

/// Detect the downstream CDN from the inbound request headers.
///
/// Rules, in priority order:
/// 1. explicit `x-cdn-type` override
/// 2. `via` carrying the Akamai signature
/// 3. `via` containing `varnish`, or `cdn-loop` starting with `Fastly`
/// 4. `cdn-loop` containing `cloudflare`, or `cf-ray` present
/// 5. `via` containing `CloudFront`
/// 6. undetected
pub fn detect(request_headers: &HeaderMap) -> CdnKind {
    let header = |name: &str| {
        request_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    };

    match header("x-cdn-type").to_ascii_lowercase().as_str() {
        "fastly" => return CdnKind::Fastly,
        "akamai" => return CdnKind::Akamai,
        "cloudflare" => return CdnKind::Cloudflare,
        "cloudfront" => return CdnKind::CloudFront,
        _ => {}
    }

    let via = header("via").to_ascii_lowercase();
    let cdn_loop = header("cdn-loop");

    if via.contains("akamaighost") {
        return CdnKind::Akamai;
    }
    if via.contains("varnish") || cdn_loop.starts_with("Fastly") {
        return CdnKind::Fastly;
    }
    if cdn_loop.to_ascii_lowercase().contains("cloudflare") || request_headers.contains_key("cf-ray")
    {
        return CdnKind::Cloudflare;
    }
    if via.contains("cloudfront") {
        return CdnKind::CloudFront;
    }
    CdnKind::Unknown
}

/// Cache keys announced by the backend response (`x-cache-tag`,
/// comma-separated), falling back to the site key.
pub fn backend_cache_keys(response_headers: &HeaderMap, site_key: &str) -> Vec<String> {
    let declared: Vec<String> = response_headers
        .get("x-cache-tag")
        .and_then(|v| v.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if declared.is_empty() {
        vec![site_key.to_string()]
    } else {
        declared
    }
}

/// Emit the cache keys in the detected CDN's native tag header.
pub fn apply_cache_tags(
    kind: CdnKind,
    headers: &mut HeaderMap,
    keys: &[String],
    site_key: &str,
    request_path: &str,
) {
    let set = |headers: &mut HeaderMap, name: &'static str, value: String| {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    };

    match kind {
        CdnKind::Fastly => set(headers, "surrogate-key", keys.join(" ")),
        CdnKind::Akamai => set(headers, "edge-cache-tag", keys.join(",")),
        CdnKind::Cloudflare => {
            // always purgeable by site and by exact path
            let mut tags = keys.to_vec();
            for extra in [site_key.to_string(), format!("{site_key}{request_path}")] {
                if !tags.contains(&extra) {
                    tags.push(extra);
                }
            }
            set(headers, "cache-tag", tags.join(","));
        }
        CdnKind::CloudFront | CdnKind::Unknown => {}
    }
}

/// Keep dynamic-data responses out of search indexes unless a
/// customer-owned reverse proxy (signalled by `x-forwarded-host`) is in
/// charge of indexing.
pub fn force_robots(headers: &mut HeaderMap, request_headers: &HeaderMap) {
    if request_headers.contains_key("x-forwarded-host") {
        return;
    }
    headers.insert("x-robots-tag", HeaderValue::from_static("noindex, nofollow"));
}
