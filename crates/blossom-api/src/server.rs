//! Server lifecycle wrapper: `Created → Running → Stopped` (spec §4.5, §7)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

use axum::Router;
use thiserror::Error;
use tracing::info;

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns the bind address and router; borrowed by nothing, owns the listener
/// for the duration of `start()`. The state machine is terminal: once
/// `Stopped`, a server instance cannot be restarted (spec §4.5).
pub struct HttpServer {
    addr: SocketAddr,
    app: Router,
    state: AtomicU8,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, app: Router) -> Self {
        Self {
            addr,
            app,
            state: AtomicU8::new(CREATED),
        }
    }

    pub fn state(&self) -> &'static str {
        match self.state.load(Ordering::SeqCst) {
            CREATED => "created",
            RUNNING => "running",
            _ => "stopped",
        }
    }

    /// Binds and serves until `shutdown` resolves, then transitions to the
    /// terminal `Stopped` state. A second call on a `Running` or already
    /// `Stopped` server fails with [`ServerError::AlreadyRunning`] rather
    /// than silently rebinding.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self
            .state
            .compare_exchange(CREATED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServerError::AlreadyRunning);
        }

        let listener = match tokio::net::TcpListener::bind(self.addr).await {
            Ok(l) => l,
            Err(source) => {
                self.state.store(STOPPED, Ordering::SeqCst);
                return Err(ServerError::BindFailed {
                    addr: self.addr,
                    source,
                });
            }
        };

        info!("Listening on {}", self.addr);
        let result = axum::serve(listener, self.app.clone())
            .with_graceful_shutdown(shutdown)
            .await;

        self.state.store(STOPPED, Ordering::SeqCst);
        info!("Server stopped");
        result.map_err(ServerError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn test_server() -> HttpServer {
        let app = Router::new().route("/", get(|| async { "ok" }));
        HttpServer::new("127.0.0.1:0".parse().unwrap(), app)
    }

    #[test]
    fn starts_in_created_state() {
        assert_eq!(test_server().state(), "created");
    }

    #[tokio::test]
    async fn second_start_fails_with_already_running() {
        let server = std::sync::Arc::new(test_server());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server2 = server.clone();
        let handle = tokio::spawn(async move {
            server2.start(async { rx.await.ok().map(|_| ()).unwrap_or(()) }).await
        });

        // give the first start() a chance to claim the Running state
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let err = server.start(std::future::pending()).await;
        assert!(matches!(err, Err(ServerError::AlreadyRunning)));

        let _ = tx.send(());
        let _ = handle.await;
    }
}
