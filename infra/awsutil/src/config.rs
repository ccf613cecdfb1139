use crate::error::AwsUtilError;
use std::path::PathBuf;
use strum_macros::{AsRefStr, Display, IntoStaticStr};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub(crate) const ENV_REGION: &str = "AWS_REGION";
pub(crate) const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub(crate) const ENV_WEB_IDENTITY_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub(crate) const ENV_ROLE_ARN: &str = "AWS_ROLE_ARN";
pub(crate) const ENV_ROLE_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";

const PARTIAL_STATIC_KEYS: &str = "static AWS client credentials haven't been properly configured (the access key or secret key were provided but not both)";

/// One link of the credential chain, in the order they are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum CredentialSource {
    Static,
    Environment,
    Profile,
    WebIdentity,
    ContainerMetadata,
    InstanceMetadata,
}

/// Role assumed through a web identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebIdentity {
    pub token_file: PathBuf,
    pub role_arn: String,
    pub session_name: String,
}

/// Inputs for building AWS credentials and clients.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialsConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Shared credentials file overriding `~/.aws/credentials`.
    pub filename: Option<PathBuf>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub web_identity_token_file: Option<PathBuf>,
    pub sts_endpoint: Option<String>,
    pub iam_endpoint: Option<String>,
    pub max_retries: u32,
    pub allow_instance_metadata: bool,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("filename", &self.filename)
            .field("role_arn", &self.role_arn)
            .field("role_session_name", &self.role_session_name)
            .field("web_identity_token_file", &self.web_identity_token_file)
            .field("sts_endpoint", &self.sts_endpoint)
            .field("iam_endpoint", &self.iam_endpoint)
            .field("max_retries", &self.max_retries)
            .field("allow_instance_metadata", &self.allow_instance_metadata)
            .finish()
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            session_token: None,
            region: None,
            profile: None,
            filename: None,
            role_arn: None,
            role_session_name: None,
            web_identity_token_file: None,
            sts_endpoint: None,
            iam_endpoint: None,
            max_retries: DEFAULT_MAX_RETRIES,
            allow_instance_metadata: true,
        }
    }
}

impl CredentialsConfig {
    #[must_use = "Creates a builder for AWS credentials configuration"]
    pub fn builder() -> CredentialsConfigBuilder {
        CredentialsConfigBuilder::default()
    }

    /// Whether both halves of a static key pair are configured.
    #[must_use]
    pub const fn has_static_keys(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }

    /// The chain links in precedence order, reading the process environment.
    ///
    /// # Errors
    /// Fails when only one of `access_key` and `secret_key` is set.
    pub fn sources(&self) -> Result<Vec<CredentialSource>, AwsUtilError> {
        self.sources_with(|name| std::env::var(name).ok())
    }

    /// Same as [`CredentialsConfig::sources`] with a caller-supplied environment lookup.
    pub fn sources_with<F>(&self, lookup_env: F) -> Result<Vec<CredentialSource>, AwsUtilError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = Vec::with_capacity(6);
        match (&self.access_key, &self.secret_key) {
            (Some(_), Some(_)) => sources.push(CredentialSource::Static),
            (None, None) => {},
            _ => return Err(AwsUtilError::invalid(PARTIAL_STATIC_KEYS)),
        }
        sources.push(CredentialSource::Environment);
        sources.push(CredentialSource::Profile);
        if self.web_identity_with(&lookup_env).is_some() {
            sources.push(CredentialSource::WebIdentity);
        }
        sources.push(CredentialSource::ContainerMetadata);
        if self.allow_instance_metadata {
            sources.push(CredentialSource::InstanceMetadata);
        }
        Ok(sources)
    }

    /// Web identity settings from the config, falling back to the standard variables.
    pub fn web_identity_with<F>(&self, lookup_env: F) -> Option<WebIdentity>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_file = self
            .web_identity_token_file
            .clone()
            .or_else(|| lookup_env(ENV_WEB_IDENTITY_TOKEN_FILE).filter(|v| !v.is_empty()).map(PathBuf::from))?;
        let role_arn = self
            .role_arn
            .clone()
            .or_else(|| lookup_env(ENV_ROLE_ARN).filter(|v| !v.is_empty()))?;
        let session_name = self
            .role_session_name
            .clone()
            .or_else(|| lookup_env(ENV_ROLE_SESSION_NAME).filter(|v| !v.is_empty()))
            .unwrap_or_else(default_session_name);
        Some(WebIdentity { token_file, role_arn, session_name })
    }

    /// Explicit region, then `AWS_REGION`, then `AWS_DEFAULT_REGION`, then `us-east-1`.
    #[must_use]
    pub fn resolve_region(&self) -> String {
        self.resolve_region_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_region_with<F>(&self, lookup_env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| lookup_env(ENV_REGION).filter(|r| !r.is_empty()))
            .or_else(|| lookup_env(ENV_DEFAULT_REGION).filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_owned())
    }

    pub(crate) fn session_name(&self) -> String {
        self.role_session_name.clone().unwrap_or_else(default_session_name)
    }
}

pub(crate) fn default_session_name() -> String {
    format!("keel-{}", chrono::Utc::now().timestamp())
}

/// Fluent builder for [`CredentialsConfig`].
#[derive(Debug, Default)]
pub struct CredentialsConfigBuilder {
    config: Option<CredentialsConfig>,
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$doc])*
        #[must_use = "Sets a credentials configuration field"]
        pub fn $name(mut self, value: impl Into<$ty>) -> Self {
            self.config_mut().$field = Some(value.into());
            self
        }
    };
}

impl CredentialsConfigBuilder {
    fn config_mut(&mut self) -> &mut CredentialsConfig {
        self.config.get_or_insert_with(CredentialsConfig::default)
    }

    setter!(access_key, access_key: String);
    setter!(secret_key, secret_key: String);
    setter!(session_token, session_token: String);
    setter!(region, region: String);
    setter!(profile, profile: String);
    setter!(
        /// Shared credentials file to read the profile from.
        filename, filename: PathBuf
    );
    setter!(role_arn, role_arn: String);
    setter!(role_session_name, role_session_name: String);
    setter!(web_identity_token_file, web_identity_token_file: PathBuf);
    setter!(sts_endpoint, sts_endpoint: String);
    setter!(iam_endpoint, iam_endpoint: String);

    #[must_use = "Sets the maximum number of SDK retry attempts"]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config_mut().max_retries = retries;
        self
    }

    #[must_use = "Controls whether EC2 instance metadata is consulted"]
    pub fn allow_instance_metadata(mut self, allow: bool) -> Self {
        self.config_mut().allow_instance_metadata = allow;
        self
    }

    /// # Errors
    /// Fails when only one half of a static key pair was supplied.
    pub fn build(self) -> Result<CredentialsConfig, AwsUtilError> {
        let config = self.config.unwrap_or_default();
        if config.access_key.is_some() != config.secret_key.is_some() {
            return Err(AwsUtilError::invalid(PARTIAL_STATIC_KEYS));
        }
        Ok(config)
    }
}
