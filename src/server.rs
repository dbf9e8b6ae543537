//! HTTP server lifecycle
//!
//! On SIGINT/SIGTERM the listener stops accepting, in-flight requests get until
//! `now + grace`, then background tasks get whatever is left of the same
//! deadline. Anything still running after that is abandoned and the process exits.

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::background::Drain;
use crate::routes::{app, AppState};

/// Bind the configured port and serve until a termination signal.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    run(listener, state, shutdown_signal()).await
}

/// Serve on `listener` until `shutdown` resolves, then drain.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let grace = state.config.shutdown_grace();
    let background = state.background.clone();
    let db = state.db.clone();
    let sweeper = state
        .config
        .limiter
        .enabled
        .then(|| state.limiter.spawn_sweeper());

    info!(
        "Starting {} server on {}",
        state.config.environment.as_str(),
        listener.local_addr()?
    );

    let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            if let Some(sweeper) = sweeper {
                sweeper.abort();
            }
            result.context("server task failed")?.context("server error")?;
            return Ok(());
        }
        _ = shutdown => {}
    }

    let deadline = Instant::now() + grace;
    info!("Shutting down server, grace period {:?}", grace);
    let _ = stop_tx.send(());

    match tokio::time::timeout_at(deadline, &mut server).await {
        Ok(Ok(Ok(()))) => info!("In-flight requests completed"),
        Ok(Ok(Err(e))) => error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => error!("Server task failed during shutdown: {}", e),
        Err(_) => {
            warn!("Requests still in flight at the shutdown deadline");
            server.abort();
        }
    }

    info!("Completing background tasks");
    match background.wait(deadline.saturating_duration_since(Instant::now())).await {
        Drain::Completed => info!("Background tasks completed"),
        Drain::TimedOut { outstanding } => {
            warn!("Forcing exit with {} background tasks outstanding", outstanding)
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    db.close().await;
    info!("Stopped server");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn with_grace(secs: u64) -> AppState {
        let (mut state, _) = test_state();
        let mut config = (*state.config).clone();
        config.server.shutdown_grace_secs = secs;
        state.config = Arc::new(config);
        state
    }

    #[tokio::test]
    async fn waits_for_background_work_before_returning() {
        let state = with_grace(5);
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        state.background.spawn("slow email", async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        run(listener, state, async {}).await.unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn forces_exit_when_grace_runs_out() {
        let state = with_grace(1);
        state.background.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let started = std::time::Instant::now();
        run(listener, state, async {}).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
