use crate::client::caller_identity;
use crate::config::CredentialsConfig;
use crate::error::AwsUtilError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a freshly created key is polled against STS before rotation gives up.
pub const DEFAULT_ROTATION_WAIT: Duration = Duration::from_secs(10);
const VERIFY_INTERVAL: Duration = Duration::from_secs(1);

/// The access key that replaced the previous static key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct RotatedKey {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub user_name: String,
}

impl std::fmt::Debug for RotatedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatedKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("user_name", &self.user_name)
            .finish()
    }
}

impl CredentialsConfig {
    /// Replaces the configured static access key with a new one.
    ///
    /// See [`CredentialsConfig::rotate_keys_with_wait`].
    pub async fn rotate_keys(&mut self) -> Result<RotatedKey, AwsUtilError> {
        self.rotate_keys_with_wait(DEFAULT_ROTATION_WAIT).await
    }

    /// Creates a new IAM access key for the caller, waits up to `wait` for STS to accept
    /// it, then deletes the old key using the new one. On success `self` holds the new pair
    /// and any session token is dropped.
    ///
    /// If anything fails after the new key exists, the new key is deleted again and the
    /// original error is returned.
    ///
    /// # Errors
    /// [`AwsUtilError::InvalidConfiguration`] without static keys, [`AwsUtilError::Sdk`]
    /// for failed requests and [`AwsUtilError::Rotation`] when the new key never verifies.
    pub async fn rotate_keys_with_wait(&mut self, wait: Duration) -> Result<RotatedKey, AwsUtilError> {
        let Some(old_access_key) = self.access_key.clone().filter(|_| self.secret_key.is_some()) else {
            return Err(AwsUtilError::invalid("cannot rotate credentials when static credentials are not configured"));
        };

        let sdk_config = self.load_sdk_config().await?;
        let iam = self.iam_client_from(&sdk_config);

        let user = iam.get_user().send().await.map_err(|e| AwsUtilError::sdk(e, "iam:GetUser"))?;
        let user_name = user
            .user()
            .map(|u| u.user_name().to_owned())
            .ok_or_else(|| AwsUtilError::from("iam:GetUser returned no user"))?;

        let created = iam
            .create_access_key()
            .user_name(&user_name)
            .send()
            .await
            .map_err(|e| AwsUtilError::sdk(e, "iam:CreateAccessKey"))?;
        let key = created
            .access_key()
            .map(|k| RotatedKey {
                access_key_id: k.access_key_id().to_owned(),
                secret_access_key: k.secret_access_key().to_owned(),
                user_name: k.user_name().to_owned(),
            })
            .ok_or_else(|| AwsUtilError::from("iam:CreateAccessKey returned no key"))?;
        info!(user = %key.user_name, access_key_id = %key.access_key_id, "Created new access key");

        let rotated = CredentialsConfig {
            access_key: Some(key.access_key_id.clone()),
            secret_key: Some(key.secret_access_key.clone()),
            session_token: None,
            ..self.clone()
        };

        if let Err(e) = rotated.finish_rotation(&old_access_key, &key.user_name, wait).await {
            warn!(error = %e, access_key_id = %key.access_key_id, "Rotation failed, deleting new access key");
            if let Err(cleanup) = iam
                .delete_access_key()
                .access_key_id(&key.access_key_id)
                .user_name(&key.user_name)
                .send()
                .await
            {
                warn!(error = %cleanup, access_key_id = %key.access_key_id, "Failed to delete new access key");
            }
            return Err(e);
        }

        *self = rotated;
        Ok(key)
    }

    async fn finish_rotation(&self, old_access_key: &str, user_name: &str, wait: Duration) -> Result<(), AwsUtilError> {
        let sdk_config = self.load_sdk_config().await?;
        let sts = self.sts_client_from(&sdk_config);

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match caller_identity(&sts).await {
                Ok(identity) => {
                    debug!(arn = %identity.arn, "New access key verified");
                    break;
                },
                Err(e) if tokio::time::Instant::now() + VERIFY_INTERVAL < deadline => {
                    debug!(error = %e, "New access key not yet accepted, retrying");
                    tokio::time::sleep(VERIFY_INTERVAL).await;
                },
                Err(e) => {
                    return Err(AwsUtilError::Rotation {
                        message: format!("new access key was not accepted by STS: {e}").into(),
                        context: None,
                    });
                },
            }
        }

        self.iam_client_from(&sdk_config)
            .delete_access_key()
            .access_key_id(old_access_key)
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| AwsUtilError::sdk(e, "iam:DeleteAccessKey"))?;
        info!(user = user_name, access_key_id = old_access_key, "Deleted previous access key");
        Ok(())
    }
}
