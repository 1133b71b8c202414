use std::sync::Arc;

use google_cloud_kms_v1::client::KeyManagementService;
use jvs_core::ServiceConfig;
use jvs_core::config::port_from_env;
use jvs_kms::gcp::GcpKmsAdapter;
use jvs_server::{AppState, build_router};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    jvs_shared::env::configure_env()?;
    jvs_shared::logging::configure_logging()?;
    jvs_shared::crypto::configure_crypto_provider()?;

    let config = ServiceConfig::from_env()?;
    let rotation_policy = config.rotation_policy.to_policy()?;

    let client = KeyManagementService::builder().build().await?;
    let adapter = Box::new(GcpKmsAdapter::new(client));

    let jwks_cache = jvs_core::JwksCache::new(config.key_names.clone(), config.public_key_cache_timeout);

    let state = Arc::new(AppState {
        adapter,
        key_names: config.key_names,
        rotation_policy,
        jwks_cache,
    });

    let port = port_from_env("PORT", 8080)?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "jvs-server listening");

    let router = build_router(state);
    let http = jvs_shared::subsystem::spawn_subsystem_manual("http", async move {
        if let Err(error) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            tracing::error!(%error, "http subsystem exited with an error");
        }
    });
    http.wait_for_shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(error) => tracing::error!(%error, "failed to install ctrl-c handler"),
    }
}
