use crate::config::CredentialsConfig;
use crate::error::AwsUtilError;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

/// Identity returned by STS `GetCallerIdentity`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub arn: String,
    pub account: String,
    pub user_id: String,
}

impl CredentialsConfig {
    /// Loads an SDK configuration backed by [`CredentialsConfig::generate_credential_chain`].
    ///
    /// The result carries no endpoint override; `sts_endpoint` and `iam_endpoint` only
    /// apply to the clients built by [`CredentialsConfig::sts_client`] and
    /// [`CredentialsConfig::iam_client`].
    ///
    /// # Errors
    /// Propagates credential chain construction failures.
    pub async fn load_sdk_config(&self) -> Result<SdkConfig, AwsUtilError> {
        let provider = self.generate_credential_chain().await?;
        let region = self.resolve_region();
        debug!(region, max_retries = self.max_retries, "Loading AWS SDK config");

        // Endpoint overrides are per service and applied by the client constructors.
        Ok(aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(provider)
            .region(Region::new(region))
            .retry_config(RetryConfig::standard().with_max_attempts(self.max_retries.saturating_add(1)))
            .load()
            .await)
    }

    pub async fn sts_client(&self) -> Result<aws_sdk_sts::Client, AwsUtilError> {
        let sdk_config = self.load_sdk_config().await?;
        Ok(self.sts_client_from(&sdk_config))
    }

    pub async fn iam_client(&self) -> Result<aws_sdk_iam::Client, AwsUtilError> {
        let sdk_config = self.load_sdk_config().await?;
        Ok(self.iam_client_from(&sdk_config))
    }

    pub(crate) fn sts_client_from(&self, sdk_config: &SdkConfig) -> aws_sdk_sts::Client {
        let mut builder = aws_sdk_sts::config::Builder::from(sdk_config);
        if let Some(endpoint) = &self.sts_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }

    pub(crate) fn iam_client_from(&self, sdk_config: &SdkConfig) -> aws_sdk_iam::Client {
        let mut builder = aws_sdk_iam::config::Builder::from(sdk_config);
        if let Some(endpoint) = &self.iam_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_iam::Client::from_conf(builder.build())
    }

    /// Calls STS `GetCallerIdentity` with the configured chain.
    ///
    /// # Errors
    /// Returns [`AwsUtilError::Sdk`] when the request fails.
    pub async fn caller_identity(&self) -> Result<CallerIdentity, AwsUtilError> {
        let client = self.sts_client().await?;
        caller_identity(&client).await
    }
}

pub(crate) async fn caller_identity(client: &aws_sdk_sts::Client) -> Result<CallerIdentity, AwsUtilError> {
    let output = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| AwsUtilError::sdk(e, "sts:GetCallerIdentity"))?;
    Ok(CallerIdentity {
        arn: output.arn().unwrap_or_default().to_owned(),
        account: output.account().unwrap_or_default().to_owned(),
        user_id: output.user_id().unwrap_or_default().to_owned(),
    })
}
