use crate::config::{CredentialSource, CredentialsConfig};
use crate::error::AwsUtilError;
use aws_config::ecs::EcsCredentialsProvider;
use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::sts::AssumeRoleProvider;
use aws_config::web_identity_token::{StaticConfiguration, WebIdentityTokenCredentialsProvider};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use tracing::debug;

const STATIC_PROVIDER_NAME: &str = "keel-static";

impl CredentialsConfig {
    /// Builds the credential provider chain described by [`CredentialsConfig::sources`].
    ///
    /// When `role_arn` is set and no web identity token is in play, the whole chain is
    /// used as the base identity for an STS `AssumeRole` call, sent to `sts_endpoint`
    /// when one is configured.
    ///
    /// # Errors
    /// Fails when the static key pair is only half configured.
    pub async fn generate_credential_chain(&self) -> Result<SharedCredentialsProvider, AwsUtilError> {
        let sources = self.sources()?;
        let region = Region::new(self.resolve_region());

        let mut chain: Option<CredentialsProviderChain> = None;
        for source in &sources {
            chain = Some(match source {
                CredentialSource::Static => link(chain, *source, self.static_credentials()?),
                CredentialSource::Environment => {
                    link(chain, *source, EnvironmentVariableCredentialsProvider::new())
                },
                CredentialSource::Profile => link(chain, *source, self.profile_provider()),
                CredentialSource::WebIdentity => {
                    let Some(identity) = self.web_identity_with(|name| std::env::var(name).ok()) else {
                        continue;
                    };
                    let provider = WebIdentityTokenCredentialsProvider::builder()
                        .static_configuration(StaticConfiguration {
                            web_identity_token_file: identity.token_file,
                            role_arn: identity.role_arn,
                            session_name: identity.session_name,
                        })
                        .configure(&ProviderConfig::default().with_region(Some(region.clone())))
                        .build();
                    link(chain, *source, provider)
                },
                CredentialSource::ContainerMetadata => {
                    link(chain, *source, EcsCredentialsProvider::builder().build())
                },
                CredentialSource::InstanceMetadata => {
                    link(chain, *source, ImdsCredentialsProvider::builder().build())
                },
            });
        }
        let chain = chain.ok_or_else(|| AwsUtilError::from("credential chain has no providers"))?;
        debug!(sources = ?sources, "Built AWS credential chain");

        let uses_web_identity = sources.contains(&CredentialSource::WebIdentity);
        match &self.role_arn {
            Some(role_arn) if !uses_web_identity => {
                let session_name = self.session_name();
                debug!(role_arn, session_name, "Wrapping credential chain in AssumeRole");
                let mut builder = AssumeRoleProvider::builder(role_arn).session_name(session_name);
                if let Some(endpoint) = &self.sts_endpoint {
                    let sts_config = aws_config::defaults(BehaviorVersion::latest())
                        .region(region.clone())
                        .endpoint_url(endpoint)
                        .load()
                        .await;
                    builder = builder.configure(&sts_config);
                }
                let provider = builder.region(region).build_from_provider(chain).await;
                Ok(SharedCredentialsProvider::new(provider))
            },
            _ => Ok(SharedCredentialsProvider::new(chain)),
        }
    }

    fn static_credentials(&self) -> Result<Credentials, AwsUtilError> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Credentials::new(
                access_key,
                secret_key,
                self.session_token.clone(),
                None,
                STATIC_PROVIDER_NAME,
            )),
            _ => Err(AwsUtilError::from("static credentials requested without a key pair")),
        }
    }

    fn profile_provider(&self) -> ProfileFileCredentialsProvider {
        let mut builder = ProfileFileCredentialsProvider::builder();
        if let Some(profile) = &self.profile {
            builder = builder.profile_name(profile);
        }
        if let Some(filename) = &self.filename {
            builder = builder.profile_files(
                EnvConfigFiles::builder()
                    .with_file(EnvConfigFileKind::Credentials, filename)
                    .include_default_config_file(true)
                    .build(),
            );
        }
        builder.build()
    }
}

fn link<P>(chain: Option<CredentialsProviderChain>, source: CredentialSource, provider: P) -> CredentialsProviderChain
where
    P: ProvideCredentials + 'static,
{
    let name: &'static str = source.into();
    match chain {
        Some(chain) => chain.or_else(name, provider),
        None => CredentialsProviderChain::first_try(name, provider),
    }
}
