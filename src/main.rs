mod app;
mod config;
mod error;
mod genome;
mod views;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app::AppState;
use config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = ServerConfig::from_env();
    info!(
        "missing gene policy: {} (override with BREED_MISSING_GENE_POLICY)",
        config.missing_gene_policy.label()
    );
    if !config.static_dir.is_dir() {
        warn!(
            "static directory {} does not exist; /static/ requests will 404",
            config.static_dir.display()
        );
    }

    let state = AppState::new(config.missing_gene_policy);
    let app = app::router(state, &config.static_dir);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {err}", config.listen_addr);
            return;
        }
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!("bound listener but failed reading local address: {err}");
            return;
        }
    };
    info!("genetic-fish listening on http://{addr}");
    if let Err(err) = axum::serve(listener, app).await {
        error!("server exited unexpectedly: {err}");
    }
}
