//! HTML fragment inlining: splice externally fetched nav/footer markup into
//! placeholder elements of a page response.
//!
//! # Responsibilities
//! - Gate inlining to GET/200/`text/html` responses from recognized
//!   platform origins (and not for fragment resources themselves)
//! - Extract placeholder/meta pairs, fetch `<path>.plain.html` fragments
//!   concurrently, splice them preserving indentation
//! - Union fragment cache keys with the main response's
//!
//! # Design Decisions
//! - A fragment failure (non-200, non-HTML, network error) leaves its
//!   placeholder untouched and never fails the response
//! - Both fragment fetches settle before the response is built; nothing
//!   outlives the request

use axum::http::{HeaderMap, Method, StatusCode};
use regex::Regex;

use crate::routing::ResolvedConfig;
use crate::settings::Settings;

/// Fragment paths announced by the page's meta tags, keyed by placeholder.
#[derive(Debug, Default, PartialEq)]
pub struct InlineMeta {
    pub nav: Option<String>,
    pub footer: Option<String>,
}

/// Decide whether a response participates in inlining at all.
pub fn eligible(
    settings: &Settings,
    config: &ResolvedConfig,
    method: &Method,
    status: StatusCode,
    content_type: Option<&str>,
    backend_path: &str,
) -> bool {
    if !settings.inline_enabled {
        return false;
    }
    if !config.inline_nav && !config.inline_footer {
        return false;
    }
    if *method != Method::GET {
        return false;
    }
    if status != StatusCode::OK {
        return false;
    }
    if !content_type.is_some_and(|ct| ct.contains("text/html")) {
        return false;
    }
    let origin_allowed = settings
        .inline_origin_suffixes
        .iter()
        .any(|suffix| config.origin.ends_with(suffix.as_str()));
    if !origin_allowed {
        return false;
    }
    // fragment resources are never themselves inlined into
    !backend_path.ends_with(".plain.html")
}

/// Pull the nav/footer fragment paths out of the meta tags, keeping only
/// the ones whose placeholder element is present in the body.
pub fn extract_inline_meta(markup: &str) -> InlineMeta {
    let mut meta = InlineMeta::default();
    if markup.contains("<header></header>") {
        meta.nav = meta_content(markup, "nav");
    }
    if markup.contains("<footer></footer>") {
        meta.footer = meta_content(markup, "footer");
    }
    meta
}

fn meta_content(markup: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"<meta name="{name}" content="([^"]+)""#)).ok()?;
    re.captures(markup)
        .map(|captures| captures[1].to_string())
}

/// Prefix every line with `count` spaces.
fn indent(markup: &str, count: usize) -> String {
    let pad = " ".repeat(count);
    markup
        .lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splice fragment markup into the empty placeholder, preserving the
/// placeholder's indentation.
pub fn splice(markup: &str, tag: &str, fragment: &str) -> String {
    let placeholder = format!("<{tag}></{tag}>");
    let indent_count = Regex::new(&format!(r"([^\S\n]*)<{tag}>"))
        .ok()
        .and_then(|re| re.captures(markup).map(|c| c[1].len()))
        .unwrap_or(0);

    let replacement = format!(
        "<{tag}>\n{}\n{}</{tag}>",
        indent(fragment.trim(), indent_count + 2),
        " ".repeat(indent_count),
    );
    markup.replacen(&placeholder, &replacement, 1)
}

/// Fetch one fragment; `None` skips the splice.
async fn fetch_fragment(
    client: &reqwest::Client,
    config: &ResolvedConfig,
    path: &str,
    tag: &str,
) -> Option<(String, HeaderMap)> {
    let plain_path = if path.ends_with(".plain.html") {
        path.to_string()
    } else {
        format!("{path}.plain.html")
    };
    let base = format!("{}://{}", config.protocol, config.origin);
    let url = url::Url::parse(&base).ok()?.join(&plain_path).ok()?;

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(tag = %tag, path = %path, error = %err, "fragment fetch failed");
            return None;
        }
    };

    let html = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/html"));
    if response.status() != reqwest::StatusCode::OK || !html {
        tracing::warn!(tag = %tag, path = %path, status = %response.status(), "skipping fragment");
        return None;
    }

    let headers = response.headers().clone();
    let markup = response.text().await.ok()?;
    Some((markup, headers))
}

/// Inline the configured fragments into `markup`.
///
/// Returns the (possibly rewritten) markup plus the headers of every
/// fragment that was spliced, for cache-key merging.
pub async fn inline_fragments(
    client: &reqwest::Client,
    config: &ResolvedConfig,
    markup: String,
) -> (String, Vec<HeaderMap>) {
    let meta = extract_inline_meta(&markup);

    let nav_path = meta.nav.filter(|_| config.inline_nav);
    let footer_path = meta.footer.filter(|_| config.inline_footer);
    if nav_path.is_none() && footer_path.is_none() {
        return (markup, Vec::new());
    }

    // independent fetches; both settle before the response is built
    let (nav, footer) = tokio::join!(
        async {
            match &nav_path {
                Some(path) => fetch_fragment(client, config, path, "header").await,
                None => None,
            }
        },
        async {
            match &footer_path {
                Some(path) => fetch_fragment(client, config, path, "footer").await,
                None => None,
            }
        },
    );

    let mut markup = markup;
    let mut fragment_headers = Vec::new();
    if let Some((fragment, headers)) = nav {
        markup = splice(&markup, "header", &fragment);
        fragment_headers.push(headers);
    }
    if let Some((fragment, headers)) = footer {
        markup = splice(&markup, "footer", &fragment);
        fragment_headers.push(headers);
    }
    (markup, fragment_headers)
}

/// Union the cache-key headers of spliced fragments into the main
/// response's, duplicate-free and order-preserving, for every CDN variant.
pub fn merge_cache_keys(headers: &mut HeaderMap, fragments: &[HeaderMap]) {
    for (name, separator) in [("surrogate-key", ' '), ("edge-cache-tag", ','), ("cache-tag", ',')] {
        let mut keys: Vec<String> = Vec::new();
        let mut push_all = |value: Option<&axum::http::HeaderValue>| {
            let Some(value) = value.and_then(|v| v.to_str().ok()) else {
                return;
            };
            for key in value.split(separator) {
                let key = key.trim();
                if !key.is_empty() && !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
        };

        push_all(headers.get(name));
        for fragment in fragments {
            push_all(fragment.get(name));
        }

        if !keys.is_empty() {
            if let Ok(value) = axum::http::HeaderValue::from_str(&keys.join(&separator.to_string())) {
                headers.insert(name, value);
            }
        }
    }
}
