//! Backend dispatch: the outbound fetch and response post-processing.
//!
//! # Data Flow
//! ```text
//! ResolvedConfig + RequestContext
//!     → upstream URL (protocol, origin, pathname, original query)
//!     → identity selection (mTLS for restricted origins)
//!     → fetch (manual redirects, forced accept-encoding)
//!     → strip transport internals
//!     → CDN cache-tag translation + robots (dynamic-data origin only)
//!     → fragment inlining + recompression (when eligible)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - `accept-encoding` upstream is always `gzip, deflate`: the cache layer
//!   between the mixer and its clients cannot decompress brotli, and the
//!   inliner has to be able to read every HTML body it scans
//! - Bodies stream through untouched unless inlining engages; only then is
//!   the payload buffered and possibly recompressed

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::Response;

use crate::error::{MixerError, MixerResult};
use crate::proxy::cdn;
use crate::proxy::client::CredentialStore;
use crate::routing::ResolvedConfig;
use crate::server::RequestContext;
use crate::settings::Settings;
use crate::transform::{compress, inline};

/// Request headers that must not travel upstream.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the upstream URL from the resolved config and the original query.
pub fn upstream_url(config: &ResolvedConfig, query: Option<&str>) -> String {
    let mut url = format!("{}://{}{}", config.protocol, config.origin, config.pathname);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn outbound_headers(ctx: &RequestContext) -> HeaderMap {
    let mut headers = ctx.headers.clone();
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.remove("host");
    // the body is re-framed by the client
    headers.remove("content-length");
    // never let brotli reach the cache layer or the inliner
    headers.insert("accept-encoding", HeaderValue::from_static("gzip, deflate"));
    headers
}

/// Issue the backend request and post-process the response.
pub async fn dispatch(
    settings: &Settings,
    clients: &CredentialStore,
    config: &ResolvedConfig,
    ctx: RequestContext,
) -> MixerResult<Response> {
    let url = upstream_url(config, ctx.query.as_deref());
    let client = clients.client_for(&config.origin, &config.site_key);

    tracing::debug!(
        site_key = %config.site_key,
        backend = %config.backend_id,
        url = %url,
        "dispatching"
    );

    let mut request = client
        .request(ctx.method.clone(), url.as_str())
        .headers(outbound_headers(&ctx));
    if ctx.method != Method::GET && ctx.method != Method::HEAD {
        request = request.body(reqwest::Body::wrap_stream(ctx.body.into_data_stream()));
    }

    let beresp = request
        .send()
        .await
        .map_err(|err| MixerError::backend_unreachable(err.to_string()))?;

    let status = beresp.status();
    let mut headers = beresp.headers().clone();
    for name in ["connection", "keep-alive", "transfer-encoding", "cf-cache-status"] {
        headers.remove(name);
    }

    if config.origin == settings.dynamic_origin {
        let kind = cdn::detect(&ctx.headers);
        let keys = cdn::backend_cache_keys(&headers, &config.site_key);
        cdn::apply_cache_tags(kind, &mut headers, &keys, &config.site_key, &ctx.path);
        cdn::force_robots(&mut headers, &ctx.headers);
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = if inline::eligible(
        settings,
        config,
        &ctx.method,
        status,
        content_type.as_deref(),
        &config.pathname,
    ) {
        let bytes = beresp
            .bytes()
            .await
            .map_err(|err| MixerError::backend_unreachable(err.to_string()))?;

        let content_encoding = headers
            .get("content-encoding")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let decoded = if content_encoding.is_empty() || content_encoding == "identity" {
            Some(bytes.to_vec())
        } else {
            compress::decode(&bytes, &content_encoding)
        };

        match decoded {
            None => Body::from(bytes), // undecodable: pass through untouched
            Some(decoded) => {
                let markup = String::from_utf8_lossy(&decoded).into_owned();
                let (markup, fragment_headers) =
                    inline::inline_fragments(clients.default_client(), config, markup).await;
                inline::merge_cache_keys(&mut headers, &fragment_headers);

                // the body was rewritten (or at least decompressed); re-frame
                // it for the client's own encoding
                headers.remove("content-length");
                let encoding = compress::negotiate(ctx.accept_encoding.as_deref());
                match compress::encode(markup.as_bytes(), encoding) {
                    Some(encoded) => {
                        let value = encoding
                            .header_value()
                            .and_then(|v| HeaderValue::from_str(v).ok());
                        match value {
                            Some(value) => headers.insert("content-encoding", value),
                            None => headers.remove("content-encoding"),
                        };
                        Body::from(encoded)
                    }
                    None => {
                        headers.remove("content-encoding");
                        Body::from(markup)
                    }
                }
            }
        }
    } else {
        Body::from_stream(beresp.bytes_stream())
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
