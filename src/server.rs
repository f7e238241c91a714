//! HTTP entry point: builds the per-request context and sequences the
//! resolver and dispatcher.
//!
//! # Responsibilities
//! - Create the axum router with the catch-all proxy handler
//! - Derive tenant identity (service host label, custom-domain CNAME, or
//!   dev override)
//! - Convert pipeline errors into their paired responses
//!
//! # Design Decisions
//! - All process-wide state is read-only behind `Arc`; requests share
//!   nothing mutable
//! - The handler is a strict pipeline — nothing it spawns outlives the
//!   response

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::dns::DomainResolver;
use crate::error::MixerResult;
use crate::proxy::{dispatch, CredentialStore};
use crate::routing::{self, ConfigSource, Overrides};
use crate::settings::Settings;
use crate::tenant::Tenant;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub config_source: Arc<ConfigSource>,
    pub clients: Arc<CredentialStore>,
    pub resolver: Arc<DomainResolver>,
}

/// Everything the pipeline needs from the inbound request.
pub struct RequestContext {
    pub method: Method,
    pub headers: HeaderMap,
    pub path: String,
    pub query: Option<String>,
    /// The client's own `accept-encoding`, captured before the upstream
    /// header is forced.
    pub accept_encoding: Option<String>,
    pub body: Body,
}

/// HTTP server for the mixer.
pub struct MixerServer {
    router: Router,
}

impl MixerServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Wire up all subsystems from startup settings.
    pub fn from_settings(settings: Settings) -> MixerResult<Self> {
        let clients = CredentialStore::from_settings(&settings)?;
        let config_source = ConfigSource::new(clients.default_client().clone(), &settings);
        let resolver = DomainResolver::new(clients.default_client().clone(), &settings);
        Ok(Self::new(AppState {
            settings: Arc::new(settings),
            config_source: Arc::new(config_source),
            clients: Arc::new(clients),
            resolver: Arc::new(resolver),
        }))
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(entry_handler))
            .route("/", any(entry_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "mixer starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("mixer stopped");
        Ok(())
    }

    /// The router, for in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Main proxy handler: identity → config → dispatch.
async fn entry_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    match handle(&state, request, &request_id).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "request failed");
            err.into_response()
        }
    }
}

async fn handle(
    state: &AppState,
    request: Request<Body>,
    request_id: &str,
) -> MixerResult<Response> {
    let (parts, body) = request.into_parts();

    let host = parts
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        host = %host,
        path = %path,
        "handling request"
    );

    let tenant = identify(state, &host).await?;
    let overrides = Overrides::from_query(query.as_deref());
    let config = routing::resolve(
        &state.config_source,
        &state.settings,
        &tenant,
        &path,
        &overrides,
    )
    .await?;

    tracing::debug!(
        request_id = %request_id,
        site_key = %config.site_key,
        pattern = ?config.pattern,
        origin = %config.origin,
        pathname = %config.pathname,
        "resolved config"
    );

    let mut headers = parts.headers;
    let accept_encoding = headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert("x-request-id", value);
        }
    }

    let ctx = RequestContext {
        method: parts.method,
        headers,
        path,
        query,
        accept_encoding,
        body,
    };

    dispatch(&state.settings, &state.clients, &config, ctx).await
}

/// Derive the tenant: dev override, service-host label, or custom-domain
/// CNAME label.
async fn identify(state: &AppState, host: &str) -> MixerResult<Tenant> {
    if let Some(dev) = &state.settings.dev_identity {
        return Ok(dev.clone());
    }

    let hostname = host.split(':').next().unwrap_or(host);
    let label = if state.settings.is_service_host(hostname) {
        first_label(hostname)
    } else {
        match state.resolver.resolve_custom_domain(hostname).await {
            Some(cname) => {
                tracing::debug!(host = %hostname, cname = %cname, "custom domain resolved");
                first_label(&cname)
            }
            None => first_label(hostname),
        }
    };
    Tenant::from_host_label(&label)
}

fn first_label(hostname: &str) -> String {
    hostname.split('.').next().unwrap_or(hostname).to_string()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_label_extraction() {
        assert_eq!(first_label("main--site--org.orbit.live"), "main--site--org");
        assert_eq!(first_label("localhost"), "localhost");
    }
}
