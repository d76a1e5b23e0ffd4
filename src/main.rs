use anyhow::Context;
use huddle::{AppState, ChatConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ChatConfig::from_env()?;
    let bind_addr = config.bind_addr;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %bind_addr,
        upload_dir = %config.upload_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Starting huddle"
    );

    let app = huddle::app(AppState::new(config).await?)?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
