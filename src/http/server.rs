//! HTTP server for the health endpoints.
//!
//! # Responsibilities
//! - Mount the health responder on the configured paths
//! - Wire up middleware (tracing, request timeout)
//! - Serve over plain TCP or TLS
//! - Stop gracefully on the shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::{AppConfig, ListenerTlsConfig};
use crate::net::tls::load_tls_config;
use crate::responder::{HealthResponderFactory, HealthStatusProvider, HttpResponderFactory};

/// How long in-flight TLS connections get once shutdown starts.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves the health responder over HTTP(S).
pub struct HealthServer {
    router: Router,
    bind_address: String,
    tls: Option<ListenerTlsConfig>,
}

impl HealthServer {
    pub fn new(config: &AppConfig, provider: Arc<dyn HealthStatusProvider>) -> Self {
        let router = Self::build_router(config, provider);
        Self {
            router,
            bind_address: config.server.bind_address.clone(),
            tls: config.server.tls.clone(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, provider: Arc<dyn HealthStatusProvider>) -> Router {
        let health = &config.health;
        let routes = if health.enabled {
            HttpResponderFactory::new(health.responder.clone()).bind(
                &health.name,
                &health.health_check_url_paths,
                provider,
            )
        } else {
            tracing::info!("Health endpoints disabled");
            Router::new()
        };

        routes
            .layer(TimeoutLayer::new(config.server.request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for embedding in another server.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        match self.tls.clone() {
            Some(tls) => self.serve_tls(&tls, shutdown).await,
            None => {
                let listener = TcpListener::bind(&self.bind_address).await?;
                self.serve(listener, shutdown).await
            }
        }
    }

    /// Serve plain HTTP on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Health server listening");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health server received shutdown signal");
            })
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }

    async fn serve_tls(
        self,
        tls: &ListenerTlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.bind_address.clone()))?;
        let rustls = load_tls_config(tls).await.map_err(ServerError::Tls)?;

        let handle = axum_server::Handle::new();
        let signal = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Health server received shutdown signal");
            signal.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "Health server listening (TLS)");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}
