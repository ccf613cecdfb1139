use std::borrow::Cow;

#[keel_derive::keel_error]
pub enum ListenerError {
    /// A `custom_response_headers` entry has a bad status key, header name or value.
    #[error("Invalid custom response headers{}: {message}", format_context(.context))]
    InvalidHeaders { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A listener setting cannot be applied (socket mode, owner, path).
    #[error("Invalid listener setting{}: {message}", format_context(.context))]
    InvalidValue { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

impl ListenerError {
    pub(crate) fn headers(context: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidHeaders { message: message.into(), context: Some(context.into()) }
    }

    pub(crate) fn invalid(context: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidValue { message: message.into(), context: Some(context.into()) }
    }
}
