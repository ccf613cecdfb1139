//! # Keel Server
//!
//! Loads a keel HCL configuration and serves every declared `listener` with its
//! request limits, forwarded-for handling and custom response headers.
//!
//! ```no_run
//! use keel_server::{Server, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder().settings(Settings::default()).build()?.run().await
//! }
//! ```

mod router;
mod settings;

pub use router::REQUEST_HEADER;
pub use settings::{Settings, SettingsError, SettingsErrorExt, load_settings};

use anyhow::{Context, Result, bail};
use axum::Router;
use axum_server::Handle;
use keel_configutil::{Listener, ListenerKind, SharedConfig, load_config_dir, load_config_file};
use router::{AppState, listener_router};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Loads the HCL configuration named by `path`: a single file or a directory of `*.hcl`.
///
/// # Errors
/// Propagates read and parse failures.
pub fn load_shared_config(path: &Path) -> Result<SharedConfig> {
    let config = if path.is_dir() { load_config_dir(path) } else { load_config_file(path) };
    config.with_context(|| format!("Failed to load configuration from {}", path.display()))
}

#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    settings: Settings,
    config: Option<SharedConfig>,
}

impl ServerBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Uses an already parsed configuration instead of reading `settings.config_path`.
    pub fn config(mut self, config: SharedConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the configuration when needed and builds a router per listener.
    ///
    /// # Errors
    /// Fails when the configuration cannot be loaded, declares no listeners, or a
    /// listener's custom headers or TLS files are invalid.
    pub fn build(self) -> Result<Server> {
        let config = match self.config {
            Some(config) => config,
            None => load_shared_config(&self.settings.config_path)?,
        };
        if config.listeners.is_empty() {
            bail!("no listener blocks are configured");
        }
        for key in &config.unused_keys {
            warn!(key, "Ignoring unknown top-level configuration key");
        }

        let state = Arc::new(AppState::new(&config));
        let listeners = config
            .listeners
            .iter()
            .enumerate()
            .map(|(index, listener)| {
                validate_tls(listener).with_context(|| format!("listeners.{index}"))?;
                let router = listener_router(Arc::clone(&state), listener, config.default_max_request_duration)
                    .with_context(|| format!("listeners.{index}"))?;
                Ok((listener.clone(), router))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Server { settings: self.settings, config, listeners })
    }
}

fn validate_tls(listener: &Listener) -> Result<()> {
    if !listener.is_tcp() || listener.tls_disable {
        return Ok(());
    }
    let (Some(cert), Some(key)) = (&listener.tls_cert_file, &listener.tls_key_file) else {
        bail!("tls_cert_file and tls_key_file are required unless tls_disable is set");
    };
    for file in [cert, key] {
        if !Path::new(file).exists() {
            bail!("TLS file not found: {file}");
        }
    }
    Ok(())
}

/// A validated configuration with one router per listener.
#[must_use = "call .run().await to start serving"]
#[derive(Debug)]
pub struct Server {
    settings: Settings,
    config: SharedConfig,
    listeners: Vec<(Listener, Router)>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    #[must_use]
    pub const fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Router for the listener at `index`, as it will be served.
    #[must_use]
    pub fn router(&self, index: usize) -> Option<Router> {
        self.listeners.get(index).map(|(_, router)| router.clone())
    }

    /// Serves every listener until Ctrl+C or SIGTERM, then drains connections for the
    /// configured grace period.
    ///
    /// # Errors
    /// Returns the first listener that fails to bind or serve.
    pub async fn run(self) -> Result<()> {
        if let Some(pid_file) = &self.config.pid_file {
            tokio::fs::write(pid_file, std::process::id().to_string())
                .await
                .with_context(|| format!("Failed to write pid file {pid_file}"))?;
        }
        if self.config.disable_mlock {
            info!("Memory locking disabled by configuration");
        }

        let handle = Handle::<SocketAddr>::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let grace = self.settings.shutdown_grace();

        let signal_handle = handle.clone();
        let signal_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining listeners");
            signal_handle.graceful_shutdown(Some(grace));
            let _ = signal_tx.send(true);
        });

        let mut tasks = JoinSet::new();
        for (listener, router) in self.listeners {
            match listener.kind {
                ListenerKind::Tcp => {
                    tasks.spawn(serve_tcp(listener, router, handle.clone()));
                },
                ListenerKind::Unix => {
                    tasks.spawn(serve_unix(listener, router, shutdown_rx.clone()));
                },
            }
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.context("Listener task panicked").and_then(|r| r);
            if let Err(e) = outcome {
                error!(error = %e, "Listener stopped with an error");
                handle.graceful_shutdown(Some(grace));
                let _ = shutdown_tx.send(true);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if let Some(pid_file) = &self.config.pid_file
            && let Err(e) = tokio::fs::remove_file(pid_file).await
        {
            warn!(pid_file, error = %e, "Failed to remove pid file");
        }
        info!("Server shutdown complete");
        result
    }
}

async fn serve_tcp(listener: Listener, router: Router, handle: Handle<SocketAddr>) -> Result<()> {
    let raw = listener.address.as_deref().unwrap_or("127.0.0.1:8200");
    let mut address: SocketAddr = raw.parse().with_context(|| format!("Invalid listener address {raw}"))?;
    if listener.random_port {
        address.set_port(0);
    }
    let app = router.into_make_service_with_connect_info::<SocketAddr>();

    if listener.tls_disable {
        info!(%address, "Starting HTTP listener");
        axum_server::bind(address).handle(handle).serve(app).await.context("HTTP listener failed")
    } else {
        let (Some(cert), Some(key)) = (&listener.tls_cert_file, &listener.tls_key_file) else {
            bail!("listener {address} has TLS enabled without a certificate");
        };
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
            .await
            .context("Failed to load TLS certificate")?;
        info!(%address, "Starting HTTPS listener");
        axum_server::bind_rustls(address, tls).handle(handle).serve(app).await.context("HTTPS listener failed")
    }
}

#[cfg(unix)]
async fn serve_unix(listener: Listener, router: Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    use keel_listenerutil::{UnixSocketOptions, bind_unix_listener};

    let Some(path) = listener.address.clone() else {
        bail!("unix listener without an address");
    };
    let options = UnixSocketOptions::from_listener(&listener)?;
    let socket = bind_unix_listener(&path, &options)?;
    info!(path, "Starting unix socket listener");

    axum::serve(socket, router.into_make_service())
        .with_graceful_shutdown(async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // The signal task is gone; keep serving until the process exits.
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Unix socket listener failed")?;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path, error = %e, "Failed to remove unix socket");
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix(_listener: Listener, _router: Router, _shutdown: watch::Receiver<bool>) -> Result<()> {
    bail!("unix socket listeners are not supported on this platform")
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }
    Ok(())
}
