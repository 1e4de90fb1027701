use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rulegate::api::routes::{create_router, AppState};
use rulegate::config::Config;
use rulegate::observability::init_tracing;

const FORM_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting rulegate"
    );

    // Validates configuration and wires the remote endpoints
    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        login_url = %config.login_url,
        create_rules_url = %config.create_rules_url,
        signin_path = %config.signin_path,
        "Remote endpoints configured"
    );

    // Forms idle past the session TTL belong to no live session.
    let sweeper = {
        let forms = Arc::clone(&state.forms);
        let idle_secs = i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FORM_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = forms.evict_idle(idle_secs);
                if evicted > 0 {
                    info!(evicted, remaining = forms.len(), "Evicted idle rule forms");
                }
            }
        })
    };

    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if config.graceful_shutdown {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = stop_tx.send(true);
            })
            .into_future();

        // In-flight requests get `shutdown_timeout` to drain after the signal.
        let timeout = config.shutdown_timeout();
        let deadline = async move {
            let _ = stop_rx.changed().await;
            tokio::time::sleep(timeout).await;
        };

        tokio::select! {
            result = server => result?,
            _ = deadline => {
                warn!(timeout_secs = config.shutdown_timeout_secs, "Shutdown timed out with requests still in flight");
            }
        }
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutting down...");
    sweeper.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Received shutdown signal");
}
