//! # HTTP Server
//!
//! Binds the CRUD router to a socket.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use super::routes::{crud_routes, CrudState};
use crate::config::AppConfig;
use crate::sqlite::{ConnectionProvider, RecordEngine, RuleRegistry};

/// HTTP server for the CRUD application
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server for the configured store, with the plant shop rules
    pub fn new(config: &AppConfig) -> Self {
        let state = CrudState::new(
            ConnectionProvider::new(config.database.clone()),
            RecordEngine::new(RuleRegistry::plant_store()),
        );
        Self::with_state(config.http.clone(), state)
    }

    pub fn with_state(config: HttpServerConfig, state: CrudState) -> Self {
        let router = crud_routes(Arc::new(state)).layer(TraceLayer::new_for_http());
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_with_shutdown<S>(self, shutdown: S) -> Result<(), std::io::Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
