//! Mixer binary: settings from the environment, tracing, serve.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_mixer::{MixerServer, Settings};

/// Multi-tenant edge request mixer.
#[derive(Parser, Debug)]
#[command(name = "edge-mixer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "MIXER_BIND_ADDRESS")]
    bind_address: String,

    /// Log filter (overrides RUST_LOG).
    #[arg(long, env = "MIXER_LOG")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = args
        .log
        .map(tracing_subscriber::EnvFilter::new)
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| "edge_mixer=info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        platform_domain = %settings.platform_domain,
        inline_enabled = settings.inline_enabled,
        dev = settings.dev_identity.is_some(),
        credentials = settings.certificates.len(),
        "configuration loaded"
    );

    let listener = TcpListener::bind(&args.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let server = MixerServer::from_settings(settings)?;
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
