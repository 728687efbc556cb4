//! Server lifecycle: open the share, bind, serve until told to stop.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::files::SharedRoot;
use crate::frontend::Frontend;
use crate::http::{self, AppState};

/// The LanShare HTTP service.
///
/// The shared root is opened once here and handed to every handler; it is
/// never re-derived from configuration afterwards.
pub struct ShareServer {
    config: Config,
    root: Arc<SharedRoot>,
    frontend: Option<Arc<Frontend>>,
}

impl ShareServer {
    /// Validate the configuration and open (or create) the shared directory.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let root = SharedRoot::open(&config.share.directory).with_context(|| {
            format!(
                "Failed to open shared directory: {}",
                config.share.directory.display()
            )
        })?;

        let frontend = match &config.frontend.directory {
            Some(dir) => {
                let frontend = Frontend::open(dir, &config.frontend.index).with_context(|| {
                    format!("Failed to open frontend directory: {}", dir.display())
                })?;
                Some(Arc::new(frontend))
            }
            None => None,
        };

        Ok(Self {
            config,
            root: Arc::new(root),
            frontend,
        })
    }

    /// The shared directory being served.
    pub fn root(&self) -> &SharedRoot {
        &self.root
    }

    /// The configuration this server was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the router without binding.
    pub fn router(&self) -> Router {
        let mut state = AppState::new(Arc::clone(&self.root));
        if let Some(frontend) = &self.frontend {
            state = state.with_frontend(Arc::clone(frontend));
        }
        http::router(state)
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.listen_addr()?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let address = listener.local_addr()?;
        info!(
            address = %address,
            root = %self.root.path().display(),
            "LanShare server listening"
        );
        if let Some(frontend) = &self.frontend {
            info!(frontend = %frontend.path().display(), "Serving browser front-end");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("HTTP server failed")?;

        info!("LanShare server stopped");
        Ok(())
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(dir: PathBuf) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.share.directory = dir;
        config
    }

    #[test]
    fn test_new_creates_share() {
        let temp_dir = TempDir::new().unwrap();
        let share = temp_dir.path().join("incoming");

        let server = ShareServer::new(test_config(share.clone())).unwrap();

        assert!(share.is_dir());
        assert_eq!(server.root().name(), "incoming");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path().to_path_buf());
        config.server.host = "not an ip".to_string();

        assert!(ShareServer::new(config).is_err());
    }

    #[test]
    fn test_new_rejects_missing_frontend() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path().join("share"));
        config.frontend.directory = Some(temp_dir.path().join("no-ui"));

        assert!(ShareServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let temp_dir = TempDir::new().unwrap();
        let server = ShareServer::new(test_config(temp_dir.path().to_path_buf())).unwrap();

        let listener = server.bind().await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        server.serve(listener, shutdown).await.unwrap();
    }
}
