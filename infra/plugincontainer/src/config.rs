use crate::error::PluginContainerError;
use private::Sealed;
use std::collections::BTreeMap;
use std::time::Duration;

/// Grace period given to a plugin between stop and kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// How a plugin container is created and constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    pub image: String,
    pub tag: Option<String>,
    /// Expected image digest, hex only (no `sha256:` prefix).
    pub sha256: Option<String>,
    /// OCI runtime, e.g. `runsc` for gVisor.
    pub runtime: Option<String>,
    pub cgroup_parent: Option<String>,
    pub nano_cpus: Option<i64>,
    pub memory: Option<i64>,
    /// Supplementary group granted to the plugin so it can reach the socket directory.
    pub group_add: Option<u32>,
    /// The engine runs rootless; socket access is granted through a capability instead.
    pub rootless: bool,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub entrypoint: Vec<String>,
    pub args: Vec<String>,
    pub network: bool,
    /// Keeps the container after exit for inspection.
    pub debug: bool,
    pub stop_timeout: Duration,
}

impl ContainerConfig {
    #[must_use = "Creates a builder for a plugin container configuration"]
    pub fn builder() -> ContainerConfigBuilder<NoImage> {
        ContainerConfigBuilder::default()
    }

    /// `image[:tag]`.
    #[must_use]
    pub fn image_ref(&self) -> String {
        match &self.tag {
            Some(tag) if !tag.is_empty() => format!("{}:{tag}", self.image),
            _ => self.image.clone(),
        }
    }

    /// Checks the invariants the runner relies on.
    ///
    /// # Errors
    /// Returns [`PluginContainerError::InvalidConfiguration`] for an empty image, a
    /// malformed digest or `rootless` combined with `group_add`.
    pub fn validate(&self) -> Result<(), PluginContainerError> {
        if self.image.trim().is_empty() {
            return Err(PluginContainerError::invalid("image is required"));
        }
        if let Some(sha) = &self.sha256
            && (sha.len() != 64 || !sha.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(PluginContainerError::invalid(format!(
                "sha256 must be 64 hex characters, got {sha:?}"
            )));
        }
        if self.rootless && self.group_add.is_some() {
            return Err(PluginContainerError::invalid(
                "group_add cannot be used with a rootless engine",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoImage;
#[derive(Debug)]
pub struct WithImage(String);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoImage {}
impl Sealed for WithImage {}

#[derive(Debug, Clone, Default)]
struct Options {
    tag: Option<String>,
    sha256: Option<String>,
    runtime: Option<String>,
    cgroup_parent: Option<String>,
    nano_cpus: Option<i64>,
    memory: Option<i64>,
    group_add: Option<u32>,
    rootless: bool,
    labels: BTreeMap<String, String>,
    env: Vec<String>,
    entrypoint: Vec<String>,
    args: Vec<String>,
    network: bool,
    debug: bool,
    stop_timeout: Option<Duration>,
}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct ContainerConfigBuilder<S: Sealed = NoImage> {
    state: S,
    options: Options,
}

#[allow(private_bounds)]
impl<S: Sealed> ContainerConfigBuilder<S> {
    #[must_use = "Sets the image tag"]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options.tag = Some(tag.into());
        self
    }

    #[must_use = "Pins the image to a sha256 digest"]
    pub fn sha256(mut self, digest: impl Into<String>) -> Self {
        let digest = digest.into();
        self.options.sha256 = Some(digest.strip_prefix("sha256:").map(str::to_owned).unwrap_or(digest));
        self
    }

    #[must_use = "Selects the OCI runtime"]
    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.options.runtime = Some(runtime.into());
        self
    }

    #[must_use = "Sets the parent cgroup"]
    pub fn cgroup_parent(mut self, parent: impl Into<String>) -> Self {
        self.options.cgroup_parent = Some(parent.into());
        self
    }

    #[must_use = "Limits CPU in units of 1e-9 CPUs"]
    pub const fn nano_cpus(mut self, nano_cpus: i64) -> Self {
        self.options.nano_cpus = Some(nano_cpus);
        self
    }

    #[must_use = "Limits memory in bytes"]
    pub const fn memory(mut self, bytes: i64) -> Self {
        self.options.memory = Some(bytes);
        self
    }

    #[must_use = "Adds a supplementary group to the plugin process"]
    pub const fn group_add(mut self, gid: u32) -> Self {
        self.options.group_add = Some(gid);
        self
    }

    #[must_use = "Marks the container engine as rootless"]
    pub const fn rootless(mut self, rootless: bool) -> Self {
        self.options.rootless = rootless;
        self
    }

    #[must_use = "Adds a container label"]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.labels.insert(key.into(), value.into());
        self
    }

    #[must_use = "Adds a KEY=VALUE environment entry"]
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.options.env.push(entry.into());
        self
    }

    #[must_use = "Overrides the image entrypoint"]
    pub fn entrypoint<I, T>(mut self, entrypoint: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.entrypoint = entrypoint.into_iter().map(Into::into).collect();
        self
    }

    #[must_use = "Sets the plugin arguments"]
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use = "Enables container networking"]
    pub const fn network(mut self, enabled: bool) -> Self {
        self.options.network = enabled;
        self
    }

    #[must_use = "Keeps the container after it exits"]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    #[must_use = "Sets the stop grace period"]
    pub const fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.options.stop_timeout = Some(timeout);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> ContainerConfigBuilder<N> {
        ContainerConfigBuilder { state, options: self.options }
    }
}

impl ContainerConfigBuilder<NoImage> {
    #[must_use = "Sets the plugin image"]
    pub fn image(self, image: impl Into<String>) -> ContainerConfigBuilder<WithImage> {
        self.transition(WithImage(image.into()))
    }
}

impl ContainerConfigBuilder<WithImage> {
    /// Finalizes and validates the configuration.
    ///
    /// # Errors
    /// See [`ContainerConfig::validate`].
    pub fn build(self) -> Result<ContainerConfig, PluginContainerError> {
        let o = self.options;
        let config = ContainerConfig {
            image: self.state.0,
            tag: o.tag,
            sha256: o.sha256.map(|s| s.to_ascii_lowercase()),
            runtime: o.runtime,
            cgroup_parent: o.cgroup_parent,
            nano_cpus: o.nano_cpus,
            memory: o.memory,
            group_add: o.group_add,
            rootless: o.rootless,
            labels: o.labels,
            env: o.env,
            entrypoint: o.entrypoint,
            args: o.args,
            network: o.network,
            debug: o.debug,
            stop_timeout: o.stop_timeout.unwrap_or(DEFAULT_STOP_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_builder_defaults() {
        let config = ContainerConfig::builder().image("keel/plugin-aws").build().unwrap();
        assert_eq!(config.image_ref(), "keel/plugin-aws");
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
        assert!(!config.network);
        assert!(!config.debug);
    }

    #[test]
    fn test_builder_full() {
        let config = ContainerConfig::builder()
            .image("keel/plugin-aws")
            .tag("1.4.0")
            .sha256(format!("sha256:{}", SHA.to_uppercase()))
            .runtime("runsc")
            .group_add(1001)
            .label("keel.plugin", "aws")
            .env("AWS_REGION=eu-west-1")
            .args(["--verbose"])
            .build()
            .unwrap();

        assert_eq!(config.image_ref(), "keel/plugin-aws:1.4.0");
        assert_eq!(config.sha256.as_deref(), Some(SHA));
        assert_eq!(config.args, vec!["--verbose"]);
    }

    #[test]
    fn test_validation() {
        let err = ContainerConfig::builder().image(" ").build().unwrap_err();
        assert!(err.to_string().contains("image is required"));

        let err = ContainerConfig::builder().image("p").sha256("abc").build().unwrap_err();
        assert!(err.to_string().contains("64 hex characters"));

        let err = ContainerConfig::builder().image("p").sha256("z".repeat(64)).build().unwrap_err();
        assert!(matches!(err, PluginContainerError::InvalidConfiguration { .. }));

        let err = ContainerConfig::builder().image("p").rootless(true).group_add(10).build().unwrap_err();
        assert!(err.to_string().contains("rootless"));
    }
}
