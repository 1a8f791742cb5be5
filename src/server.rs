//! ChatServer implementation
//!
//! Owns the listener and the shared router, accepts connections and runs
//! one handler task per client until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::router::Router;

/// The chat server
///
/// The registry lives as long as the server; every connection task gets
/// a clone of the router pointing at it.
pub struct ChatServer {
    listener: TcpListener,
    router: Router,
    config: Arc<ServerConfig>,
}

impl ChatServer {
    /// Bind the listener
    ///
    /// A bind failure is fatal for the whole server.
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| AppError::Bind { addr, source })?;

        Ok(Self {
            listener,
            router: Router::new(Arc::new(Registry::new())),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run the accept loop until `shutdown` is cancelled
    ///
    /// On shutdown every open connection is closed and this waits for all
    /// connection tasks to finish before returning.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        info!("Chat server listening on {}", self.local_addr()?);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("New connection from {}", addr);
                        let router = self.router.clone();
                        let config = Arc::clone(&self.config);
                        let conn_shutdown = shutdown.child_token();

                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, router, &config, conn_shutdown).await {
                                warn!("Connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                Some(joined) = connections.join_next() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        info!(
            "Chat server shutting down, closing {} connection(s)",
            connections.len()
        );
        drop(self.listener);

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }

        debug!("Registry entries left at shutdown: {}", self.router.registry().len());
        info!("Chat server stopped");
        Ok(())
    }
}
