//! Web server for depot.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{Config, SweeperConfig, WebConfig};
use crate::file::{BlobStore, Sweeper};
use crate::{Database, DepotError, Result};

use super::handlers::{AppState, SharedDatabase};
use super::router::create_router;

/// Web server for the file API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Web configuration.
    web_config: WebConfig,
    /// Orphan sweeper configuration.
    sweeper_config: SweeperConfig,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// The configuration is validated first.
    pub fn new(config: &Config, db: SharedDatabase, storage: Arc<BlobStore>) -> Result<Self> {
        config.validate()?;

        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                DepotError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;

        let app_state =
            AppState::new(db, storage).with_max_upload_size(config.storage.max_upload_bytes());

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            web_config: config.web.clone(),
            sweeper_config: config.sweeper.clone(),
        })
    }

    /// Create a new web server, opening the database and blob store from config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        // Nothing is created on disk for a rejected configuration
        config.validate()?;

        let db = Database::open(&config.database.path).await?;
        let storage = BlobStore::new(&config.storage.path)?;
        tracing::info!("Blob storage initialized at: {}", config.storage.path);

        Self::new(config, Arc::new(db), Arc::new(storage))
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the orphan sweeper if it is enabled.
    fn start_sweeper(&self) {
        if !self.sweeper_config.enabled {
            tracing::info!("Orphan sweeper disabled");
            return;
        }

        Sweeper::with_interval(
            self.app_state.db.clone(),
            self.app_state.storage.clone(),
            self.sweeper_config.interval_secs,
        )
        .spawn();
    }

    fn build_router(&self) -> Router {
        create_router(self.app_state.clone(), &self.web_config)
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // Sweep only once the port is ours
        self.start_sweeper();

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.start_sweeper();

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
