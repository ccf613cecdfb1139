use std::borrow::Cow;

#[keel_derive::keel_error]
pub enum PluginContainerError {
    /// The container configuration is incomplete or contradictory.
    #[error("Invalid container configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Container engine error{}: {source}", format_context(.context))]
    Docker { source: bollard::errors::Error, context: Option<Cow<'static, str>> },

    /// The local image does not carry the pinned digest.
    #[error("Image mismatch{}: {message}", format_context(.context))]
    ImageMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Plugin container exited with code {code}{}", format_context(.context))]
    ExitCode { code: i64, context: Option<Cow<'static, str>> },

    /// A socket address cannot be mapped between host and container.
    #[error("Address translation failed{}: {message}", format_context(.context))]
    AddressTranslation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl PluginContainerError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfiguration { message: message.into(), context: None }
    }

    pub(crate) fn translation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::AddressTranslation { message: message.into(), context: None }
    }
}
