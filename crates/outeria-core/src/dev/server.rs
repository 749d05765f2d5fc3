use super::router;
use crate::config::ProjectConfig;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Dev server error.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "SERVE_BIND_FAILED",
            Self::Io(_) => "SERVE_IO_ERROR",
        }
    }
}

/// A bound, not yet running, server.
pub struct Server {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Address actually bound (differs from the configured one for port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("server stopped");
        Ok(())
    }
}

/// Bind the listener for `config`. Fails if the port is taken.
pub async fn bind(config: &ProjectConfig) -> Result<Server, ServeError> {
    let host = config.server.host.as_str();
    let port = config.server.port;

    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|source| ServeError::Bind {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = listener.local_addr()?;

    Ok(Server {
        listener,
        router: router(config),
        addr,
    })
}

/// Bind, announce, and serve until Ctrl-C.
pub async fn serve(config: &ProjectConfig) -> Result<(), ServeError> {
    let server = bind(config).await?;
    let addr = server.local_addr();

    println!("App listening on port {}", addr.port());
    info!(
        %addr,
        static_root = %config.static_root().display(),
        dist_root = %config.dist_root().display(),
        dev = config.server.dev,
        "server listening"
    );

    server.run_until(shutdown_signal()).await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
