// Server loop module
// Accepts connections until shutdown is requested, then drains in-flight connections

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections may keep running after shutdown is requested
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop for the service listener.
///
/// Must run inside a `tokio::task::LocalSet`, connections are served with `spawn_local`.
/// Once `shutdown` is notified the listener is closed and every open connection is told to
/// close gracefully. Returns when they have drained or the grace period has elapsed.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (close_connections, connection_shutdown) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            connection_shutdown.clone(),
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                break;
            }
        }
    }

    // Stop accepting before waiting on in-flight requests
    drop(listener);
    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));
    // Idle keep-alive connections close now, busy ones after their current response
    let _ = close_connections.send(true);

    let drained = drain_connections(&active_connections, SHUTDOWN_GRACE_PERIOD).await;
    if !drained {
        logger::log_warning(&format!(
            "{} connection(s) still active after {}s grace period, closing",
            active_connections.load(Ordering::SeqCst),
            SHUTDOWN_GRACE_PERIOD.as_secs()
        ));
    }

    logger::log_shutdown_complete();
    Ok(())
}

/// Wait until no connection is active or `grace` elapses. Returns whether all drained.
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    true
}
