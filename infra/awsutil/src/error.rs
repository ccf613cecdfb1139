use std::borrow::Cow;

#[keel_derive::keel_error]
pub enum AwsUtilError {
    #[error("Invalid AWS configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A call through the AWS SDK failed.
    #[error("AWS request failed{}: {source}", format_context(.context))]
    Sdk { source: Box<dyn std::error::Error + Send + Sync>, context: Option<Cow<'static, str>> },

    /// Key rotation could not complete; the new key has been cleaned up if it was created.
    #[error("Access key rotation failed{}: {message}", format_context(.context))]
    Rotation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl AwsUtilError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfiguration { message: message.into(), context: None }
    }

    pub(crate) fn sdk<E>(error: E, context: impl Into<Cow<'static, str>>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Sdk { source: Box::new(error), context: Some(context.into()) }
    }
}
