// Connection handling module
// Accepts a single TCP connection and serves HTTP/1 on it

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::cell::Cell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept and process a connection, checking limits and logging.
///
/// `shutdown` flips to `true` when the server stops; the connection then finishes its
/// in-flight request and closes.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.access_log_enabled() {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        shutdown,
    );
}

/// What woke the connection task
enum ConnEvent {
    Finished(Result<(), hyper::Error>),
    Shutdown,
    Timer,
}

/// Serve a single connection in a spawned local task.
///
/// Timeouts:
/// - `read_timeout` bounds reading each request's headers
/// - `keep_alive_timeout` bounds how long the connection may sit idle between requests
/// - `write_timeout` bounds how long a closing connection may take to finish its
///   in-flight response
///
/// Idle expiry and server shutdown both start a graceful close: an idle connection is
/// closed at once, a busy one after its current response. The connection counter is
/// decremented when the task finishes.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let idle_timeout = (performance.keep_alive_timeout > 0)
            .then(|| Duration::from_secs(performance.keep_alive_timeout));
        let close_timeout = Duration::from_secs(performance.write_timeout.max(1));

        let mut builder = http1::Builder::new();
        builder.keep_alive(idle_timeout.is_some());
        if performance.read_timeout > 0 {
            builder.timer(TokioTimer::new());
            builder.header_read_timeout(Duration::from_secs(performance.read_timeout));
        }

        let last_activity = Rc::new(Cell::new(Instant::now()));
        let service_activity = Rc::clone(&last_activity);
        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                service_activity.set(Instant::now());
                handler::handle_request(req, peer_addr, Arc::clone(&service_state))
            }),
        );
        let mut conn = std::pin::pin!(conn);

        let timer = tokio::time::sleep_until(last_activity.get() + idle_timeout.unwrap_or_default());
        let mut timer = std::pin::pin!(timer);
        let mut closing = *shutdown.borrow_and_update();
        if closing {
            conn.as_mut().graceful_shutdown();
            timer.as_mut().reset(Instant::now() + close_timeout);
        }

        loop {
            let event = tokio::select! {
                result = conn.as_mut() => ConnEvent::Finished(result),
                // A dropped sender also means the server is gone
                _ = shutdown.changed(), if !closing => ConnEvent::Shutdown,
                () = timer.as_mut(), if closing || idle_timeout.is_some() => ConnEvent::Timer,
            };

            match event {
                ConnEvent::Finished(Ok(())) => break,
                ConnEvent::Finished(Err(err)) => {
                    logger::log_connection_error(&err);
                    break;
                }
                ConnEvent::Timer if closing => {
                    logger::log_warning(&format!(
                        "Connection from {peer_addr} did not close within {} seconds, dropping",
                        close_timeout.as_secs()
                    ));
                    break;
                }
                ConnEvent::Timer => {
                    let idle_deadline = last_activity.get() + idle_timeout.unwrap_or_default();
                    if Instant::now() < idle_deadline {
                        // A request arrived since the timer was armed
                        timer.as_mut().reset(idle_deadline);
                        continue;
                    }
                    closing = true;
                }
                ConnEvent::Shutdown => closing = true,
            }

            conn.as_mut().graceful_shutdown();
            timer.as_mut().reset(Instant::now() + close_timeout);
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
