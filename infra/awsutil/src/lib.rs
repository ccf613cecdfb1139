//! # AWS Utilities
//!
//! Credential chain construction, region resolution and IAM access key rotation on top
//! of the official AWS SDK.
//!
//! ```no_run
//! # async fn run() -> Result<(), keel_awsutil::AwsUtilError> {
//! use keel_awsutil::CredentialsConfig;
//!
//! let config = CredentialsConfig::builder().region("eu-west-1").profile("ops").build()?;
//! let identity = config.caller_identity().await?;
//! println!("running as {}", identity.arn);
//! # Ok(())
//! # }
//! ```

mod chain;
mod client;
mod config;
mod error;
mod rotate;

pub use client::CallerIdentity;
pub use config::{
    CredentialSource, CredentialsConfig, CredentialsConfigBuilder, DEFAULT_MAX_RETRIES, DEFAULT_REGION,
    WebIdentity,
};
pub use error::{AwsUtilError, AwsUtilErrorExt};
pub use rotate::{DEFAULT_ROTATION_WAIT, RotatedKey};

pub use aws_config::SdkConfig;
pub use aws_credential_types::provider::SharedCredentialsProvider;
