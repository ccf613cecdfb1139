//! # Plugin containers
//!
//! Runs a plugin binary inside a locked-down container and exposes it through the
//! [`Runner`] trait, which an RPC framework drives the same way it would drive a local
//! child process. The plugin's unix sockets live in a host directory bind-mounted to
//! [`PLUGIN_SOCKET_DIR`] inside the container; [`Runner::plugin_to_host`] and
//! [`Runner::host_to_plugin`] translate addresses across that mount.
//!
//! ```rust,no_run
//! use keel_plugincontainer::{ContainerConfig, ContainerRunner, Runner};
//!
//! # async fn run() -> Result<(), keel_plugincontainer::PluginContainerError> {
//! let config = ContainerConfig::builder()
//!     .image("keel/plugin-transit")
//!     .tag("1.2.0")
//!     .runtime("runsc")
//!     .group_add(1500)
//!     .build()?;
//!
//! let mut runner = ContainerRunner::new(config, "/run/keel/plugins/transit", vec![])?;
//! runner.start().await?;
//! let (_, host_addr) = runner.plugin_to_host("unix", "/tmp/go-plugin-container/plugin.sock")?;
//! # let _ = host_addr;
//! runner.wait().await
//! # }
//! ```

mod address;
mod config;
mod diagnose;
mod error;
mod runner;
mod spec;

pub use address::{ENV_UNIX_SOCKET_DIR, PLUGIN_SOCKET_DIR};
pub use config::{ContainerConfig, ContainerConfigBuilder, DEFAULT_STOP_TIMEOUT, NoImage, WithImage};
pub use diagnose::{Diagnosis, EngineFacts, Finding, Severity, evaluate, gather};
pub use error::{PluginContainerError, PluginContainerErrorExt};
pub use runner::{ContainerRunner, Runner};
