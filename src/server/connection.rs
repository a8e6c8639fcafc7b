// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Live connection count plus the drain signal used at shutdown
pub struct ConnectionTracker {
    active: AtomicUsize,
    idle: Notify,
    draining: watch::Sender<bool>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self {
            active: AtomicUsize::new(0),
            idle: Notify::new(),
            draining: watch::channel(false).0,
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Take a slot, or return the count already in use when `max` is reached
    fn try_acquire(&self, max: Option<u64>) -> Result<(), usize> {
        // Increment first, then check, so two accepts can't both slip under the limit
        let prev_count = self.active.fetch_add(1, Ordering::SeqCst);
        if let Some(max_conn) = max {
            if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
                self.release();
                return Err(prev_count);
            }
        }
        Ok(())
    }

    fn release(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Ask every connection to finish its in-flight request and close, then
    /// wait up to `limit` for them. Returns false if some were still open.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.draining.send_replace(true);
        let active = self.active();
        if active > 0 {
            logger::log_info(&format!("Waiting for {active} open connection(s) to finish"));
        }
        tokio::time::timeout(limit, self.wait_idle()).await.is_ok()
    }
}

/// Admit a connection if under `performance.max_connections`, then serve it.
///
/// Returns false when the connection was rejected and dropped.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    tracker: &Arc<ConnectionTracker>,
) -> bool {
    let max_conn = state.config.performance.max_connections;
    if let Err(in_use) = tracker.try_acquire(max_conn) {
        logger::log_warning(&format!(
            "Max connections reached: {in_use}/{}. Connection from {peer_addr} rejected.",
            max_conn.unwrap_or_default()
        ));
        drop(stream);
        return false;
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state), Arc::clone(tracker));
    true
}

/// Connection lifetime cap, the larger of the read and write timeouts
pub fn connection_timeout(state: &AppState) -> Duration {
    let perf = &state.config.performance;
    Duration::from_secs(perf.read_timeout.max(perf.write_timeout))
}

/// Serve one connection on a local task and release its slot when done.
///
/// Once draining starts the connection finishes the request in progress
/// and closes instead of waiting for the next keep-alive request.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    tracker: Arc<ConnectionTracker>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let timeout_duration = connection_timeout(&state);
        let mut draining = tracker.draining.subscribe();

        let mut builder = http1::Builder::new();
        builder.keep_alive(state.config.performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let service = service_fn(move |req| {
            handler::handle_request(req, Arc::clone(&service_state), Some(peer_addr))
        });
        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        let served = tokio::time::timeout(timeout_duration, async {
            let mut closing = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    _ = draining.wait_for(|on| *on), if !closing => {
                        closing = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        })
        .await;

        match served {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                timeout_duration.as_secs()
            )),
        }

        tracker.release();
    });
}
