//! Shared helpers for mixer integration tests.

use std::sync::Arc;

use edge_mixer::dns::DomainResolver;
use edge_mixer::proxy::CredentialStore;
use edge_mixer::routing::ConfigSource;
use edge_mixer::{AppState, MixerServer, Settings};
use tokio::net::TcpListener;

/// Assemble application state against mock endpoints.
pub fn make_state(settings: Settings, config_base: &str, doh_endpoint: &str) -> AppState {
    let clients = CredentialStore::from_settings(&settings).unwrap();
    let http = clients.default_client().clone();
    let config_source = ConfigSource::with_fixed_url(http.clone(), config_base);
    let resolver = DomainResolver::doh_only(http, doh_endpoint, settings.cname_suffix.clone());
    AppState {
        settings: Arc::new(settings),
        config_source: Arc::new(config_source),
        clients: Arc::new(clients),
        resolver: Arc::new(resolver),
    }
}

/// Serve the mixer on an ephemeral port; returns its base URL.
pub async fn spawn_mixer(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = MixerServer::new(state).into_router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A client that, like the mixer itself, never follows redirects.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// RFC 1035 name encoding (length-prefixed labels, zero terminator).
#[allow(dead_code)]
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for label in name.split('.').filter(|l| !l.is_empty()) {
        bytes.push(label.len() as u8);
        bytes.extend_from_slice(label.as_bytes());
    }
    bytes.push(0);
    bytes
}

/// Minimal DNS response: one question, optionally one answer whose NAME is
/// a compression pointer back to the question name.
#[allow(dead_code)]
pub fn dns_response(qname: &str, answer: Option<(u16, &str)>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0x1234u16.to_be_bytes()); // id
    buf.extend_from_slice(&0x8180u16.to_be_bytes()); // standard response
    buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    buf.extend_from_slice(&(answer.is_some() as u16).to_be_bytes()); // ANCOUNT
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());

    buf.extend_from_slice(&encode_name(qname));
    buf.extend_from_slice(&5u16.to_be_bytes()); // QTYPE CNAME
    buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN

    if let Some((rtype, target)) = answer {
        let rdata = if rtype == 5 {
            encode_name(target)
        } else {
            vec![1, 2, 3, 4]
        };
        buf.extend_from_slice(&[0xc0, 0x0c]); // pointer to the question name
        buf.extend_from_slice(&rtype.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&300u32.to_be_bytes());
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
    }
    buf
}
