//! Mock backend: the Zara REST API served from memory with rule-based replies.
//!
//! Routes live under `/api` on a single port. Accounts, tokens and chats are lost on exit.

mod routes;
mod store;

use crate::config::{self, Config};
use crate::reply::ReplyRules;
use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;

/// Bind the configured address and serve until SIGINT or SIGTERM. Only loopback binds are
/// accepted.
pub async fn run_server(config: &Config) -> Result<()> {
    let bind = config.server.bind.trim();
    if !config::is_loopback_bind(bind) {
        anyhow::bail!(
            "refusing to bind mock backend to {} (only loopback addresses are allowed)",
            bind
        );
    }
    let bind_addr = format!("{}:{}", bind, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("mock backend listening on {}", bind_addr);
    serve_on(listener, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` completes.
pub async fn serve_on<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::router(routes::ServerState::new(ReplyRules::default()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("mock backend exited")?;
    log::info!("mock backend stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
