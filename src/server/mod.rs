// Server module entry point
// Listener setup, the accept loop and per-connection serving

pub mod connection;
pub mod listener;
pub mod signal;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::AppState;
use crate::logger;
use connection::{accept_connection, connection_timeout, ConnectionTracker};
use signal::SignalHandler;

pub use listener::create_reusable_listener;

/// Accept connections until shutdown is signalled, then let open
/// connections finish for up to the connection timeout.
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
pub async fn run(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) -> std::io::Result<()> {
    let tracker = Arc::new(ConnectionTracker::new());

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &tracker);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = signals.shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    if !tracker.drain(connection_timeout(&state)).await {
        logger::log_warning(&format!(
            "Shutdown timed out with {} connection(s) still open",
            tracker.active()
        ));
    }
    Ok(())
}

/// Bind the configured address and serve until SIGTERM/SIGINT
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = create_reusable_listener(addr)?;
    let signals = Arc::new(SignalHandler::new());
    signal::start_signal_handler(Arc::clone(&signals))?;

    logger::log_server_start(&listener.local_addr()?, &state.config);
    run(listener, state, signals).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{handler_fn, CloudRegistry, CloudRegistryBuilder};
    use crate::gateway::tests::test_state;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_http_and_stops_on_shutdown() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let state = Arc::new(test_state("public", CloudRegistry::default()));
                let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
                let addr = listener.local_addr().unwrap();
                let signals = Arc::new(SignalHandler::new());
                let server = tokio::task::spawn_local(run(listener, state, Arc::clone(&signals)));

                let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
                client
                    .write_all(
                        b"GET /1/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                let mut raw = String::new();
                client.read_to_string(&mut raw).await.unwrap();
                assert!(raw.starts_with("HTTP/1.1 200"));
                assert!(raw.contains(r#"{"status":"ok"}"#));

                signals.trigger("test");
                server.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_request_finish() {
        let mut builder = CloudRegistryBuilder::new();
        builder.define(
            "slow",
            handler_fn(|_| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(json!("done"))
            }),
        );
        let registry = builder.build();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let state = Arc::new(test_state("public", registry));
                let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
                let addr = listener.local_addr().unwrap();
                let signals = Arc::new(SignalHandler::new());
                let server = tokio::task::spawn_local(run(listener, state, Arc::clone(&signals)));

                let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
                client
                    .write_all(
                        b"POST /1/functions/slow HTTP/1.1\r\nHost: localhost\r\n\
                          X-Application-Id: test-app\r\nContent-Length: 2\r\n\r\n{}",
                    )
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                signals.trigger("test");
                server.await.unwrap().unwrap();

                let mut raw = String::new();
                client.read_to_string(&mut raw).await.unwrap();
                assert!(raw.starts_with("HTTP/1.1 200"));
                assert!(raw.contains(r#"{"result":"done"}"#));
            })
            .await;
    }
}
