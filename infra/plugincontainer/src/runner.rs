use crate::address::{PLUGIN_SOCKET_DIR, translate};
use crate::config::ContainerConfig;
use crate::diagnose::{evaluate, gather};
use crate::error::{PluginContainerError, PluginContainerErrorExt};
use crate::spec::container_spec;
use bollard::Docker;
use bollard::container::{
    AttachContainerOptions, AttachContainerResults, Config, CreateContainerOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Buffer between the attach stream and each of the stdout/stderr readers.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Lifecycle and socket plumbing an RPC framework needs from a plugin process.
pub trait Runner {
    type Output: AsyncRead + Send + Unpin + 'static;

    fn start(&mut self) -> impl Future<Output = Result<(), PluginContainerError>> + Send;

    /// Resolves once the plugin has exited; a non-zero exit is an error.
    fn wait(&mut self) -> impl Future<Output = Result<(), PluginContainerError>> + Send;

    fn kill(&mut self) -> impl Future<Output = Result<(), PluginContainerError>> + Send;

    /// The plugin's stdout. Can be taken once.
    fn take_stdout(&mut self) -> Option<Self::Output>;

    fn take_stderr(&mut self) -> Option<Self::Output>;

    /// Maps a socket address announced by the plugin to one the host can dial.
    fn plugin_to_host(&self, network: &str, addr: &str) -> Result<(String, String), PluginContainerError>;

    /// Maps a host socket address to the path the plugin sees.
    fn host_to_plugin(&self, network: &str, addr: &str) -> Result<(String, String), PluginContainerError>;

    fn name(&self) -> &str;

    fn id(&self) -> &str;

    /// Human-readable hints for why the plugin may fail to start.
    fn diagnose(&self) -> impl Future<Output = String> + Send;
}

/// [`Runner`] that executes the plugin in a Docker (or compatible) container.
#[derive(Debug)]
pub struct ContainerRunner {
    docker: Docker,
    config: ContainerConfig,
    host_socket_dir: PathBuf,
    plugin_env: Vec<String>,
    id: String,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    pump: Option<JoinHandle<()>>,
}

impl ContainerRunner {
    /// Validates `config` and connects to the engine named by `DOCKER_HOST`, falling back
    /// to the platform's default socket.
    ///
    /// Connecting is lazy; an unreachable engine only surfaces on [`Runner::start`].
    pub fn new(
        config: ContainerConfig,
        host_socket_dir: impl Into<PathBuf>,
        plugin_env: Vec<String>,
    ) -> Result<Self, PluginContainerError> {
        config.validate()?;
        let docker = Docker::connect_with_local_defaults().context("Failed to configure container engine client")?;
        Ok(Self::with_docker(docker, config, host_socket_dir, plugin_env))
    }

    /// Uses an already configured engine client. The config is assumed valid.
    pub fn with_docker(
        docker: Docker,
        config: ContainerConfig,
        host_socket_dir: impl Into<PathBuf>,
        plugin_env: Vec<String>,
    ) -> Self {
        Self {
            docker,
            config,
            host_socket_dir: host_socket_dir.into(),
            plugin_env,
            id: String::new(),
            stdout: None,
            stderr: None,
            pump: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// The create request [`Runner::start`] sends to the engine.
    #[must_use]
    pub fn container_spec(&self) -> Config<String> {
        container_spec(&self.config, &self.host_socket_dir, &self.plugin_env)
    }

    async fn verify_image(&self) -> Result<(), PluginContainerError> {
        let Some(sha) = &self.config.sha256 else {
            return Ok(());
        };
        let image_ref = self.config.image_ref();
        let image = self
            .docker
            .inspect_image(&image_ref)
            .await
            .context(format!("Failed to inspect image {image_ref}"))?;

        let expected = format!("sha256:{sha}");
        match image.id {
            Some(id) if id == expected => Ok(()),
            found => Err(PluginContainerError::ImageMismatch {
                message: format!("expected {expected}, found {}", found.as_deref().unwrap_or("no id")).into(),
                context: Some(image_ref.into()),
            }),
        }
    }

    async fn attach_and_start(&mut self) -> Result<(), PluginContainerError> {
        let options = AttachContainerOptions::<String> {
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(true),
            ..Default::default()
        };
        let AttachContainerResults { output, .. } = self
            .docker
            .attach_container(&self.id, Some(options))
            .await
            .context("Failed to attach to plugin container")?;

        let (stdout_writer, stdout_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_writer, stderr_reader) = tokio::io::duplex(PIPE_CAPACITY);
        self.stdout = Some(stdout_reader);
        self.stderr = Some(stderr_reader);
        self.pump = Some(tokio::spawn(demux(output, stdout_writer, stderr_writer)));

        self.docker
            .start_container(&self.id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start plugin container")
    }

    async fn remove(&self) -> Result<(), PluginContainerError> {
        let options = RemoveContainerOptions { force: true, ..Default::default() };
        match self.docker.remove_container(&self.id, Some(options)).await {
            // 409: auto-remove is already deleting it.
            Ok(()) | Err(DockerError::DockerResponseServerError { status_code: 304 | 404 | 409, .. }) => Ok(()),
            Err(e) => Err(e).context(format!("Failed to remove plugin container {}", self.id)),
        }
    }
}

impl Runner for ContainerRunner {
    type Output = DuplexStream;

    async fn start(&mut self) -> Result<(), PluginContainerError> {
        self.verify_image().await?;

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, self.container_spec())
            .await
            .context(format!("Failed to create container from {}", self.config.image_ref()))?;
        self.id = created.id;
        for warning in created.warnings {
            warn!(container = %self.id, warning = %warning, "Container engine warning");
        }

        if let Err(e) = self.attach_and_start().await {
            if let Err(cleanup) = self.remove().await {
                warn!(container = %self.id, error = %cleanup, "Failed to clean up plugin container");
            }
            if let Some(pump) = self.pump.take() {
                pump.abort();
            }
            return Err(e);
        }

        info!(container = %self.id, image = %self.config.image_ref(), "Plugin container started");
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), PluginContainerError> {
        let options = WaitContainerOptions { condition: "not-running" };
        let mut stream = self.docker.wait_container(&self.id, Some(options));
        while let Some(item) = stream.next().await {
            match item {
                Ok(response) if response.status_code != 0 => {
                    return Err(PluginContainerError::ExitCode {
                        code: response.status_code,
                        context: Some(self.id.clone().into()),
                    });
                },
                Ok(_) => {},
                Err(DockerError::DockerContainerWaitError { code, .. }) => {
                    return Err(PluginContainerError::ExitCode { code, context: Some(self.id.clone().into()) });
                },
                // Already gone, removed by the engine after a clean exit.
                Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => break,
                Err(e) => return Err(e).context(format!("Failed waiting for plugin container {}", self.id)),
            }
        }
        debug!(container = %self.id, "Plugin container exited");
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), PluginContainerError> {
        if self.id.is_empty() {
            return Ok(());
        }
        let t = i64::try_from(self.config.stop_timeout.as_secs()).unwrap_or(i64::MAX);
        match self.docker.stop_container(&self.id, Some(StopContainerOptions { t })).await {
            Ok(()) | Err(DockerError::DockerResponseServerError { status_code: 304 | 404, .. }) => {},
            Err(e) => return Err(e).context(format!("Failed to stop plugin container {}", self.id)),
        }
        self.remove().await?;
        info!(container = %self.id, "Plugin container stopped");
        Ok(())
    }

    fn take_stdout(&mut self) -> Option<DuplexStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<DuplexStream> {
        self.stderr.take()
    }

    fn plugin_to_host(&self, network: &str, addr: &str) -> Result<(String, String), PluginContainerError> {
        translate(network, addr, Path::new(PLUGIN_SOCKET_DIR), &self.host_socket_dir)
    }

    fn host_to_plugin(&self, network: &str, addr: &str) -> Result<(String, String), PluginContainerError> {
        translate(network, addr, &self.host_socket_dir, Path::new(PLUGIN_SOCKET_DIR))
    }

    fn name(&self) -> &str {
        &self.config.image
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn diagnose(&self) -> String {
        let facts = gather(&self.docker, &self.config, &self.host_socket_dir).await;
        evaluate(&self.config, &self.host_socket_dir, &facts).to_string()
    }
}

/// Splits the multiplexed attach stream into the stdout and stderr pipes.
async fn demux<S>(mut output: S, mut stdout: DuplexStream, mut stderr: DuplexStream)
where
    S: Stream<Item = Result<LogOutput, DockerError>> + Unpin,
{
    while let Some(frame) = output.next().await {
        let written = match frame {
            Ok(LogOutput::StdOut { message } | LogOutput::Console { message }) => stdout.write_all(&message).await,
            Ok(LogOutput::StdErr { message }) => stderr.write_all(&message).await,
            Ok(LogOutput::StdIn { .. }) => Ok(()),
            Err(e) => {
                debug!(error = %e, "Plugin output stream ended with an error");
                break;
            },
        };
        if let Err(e) = written {
            debug!(error = %e, "Plugin output reader went away");
            break;
        }
    }
    let _ = stdout.shutdown().await;
    let _ = stderr.shutdown().await;
}
