use std::borrow::Cow;

/// Errors returned by the parsing helpers.
#[keel_derive::keel_error]
pub enum ParseError {
    /// The value has the wrong shape or cannot be interpreted.
    #[error("Invalid value{}: {message}", format_context(.context))]
    InvalidValue { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An `env://` indirection named a variable that is not set.
    #[error("Environment variable not set{}: {message}", format_context(.context))]
    MissingEnv { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A `file://` indirection could not be read.
    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A CIDR or IP literal failed to parse.
    #[error("Invalid address{}: {source}", format_context(.context))]
    Address { source: ipnet::AddrParseError, context: Option<Cow<'static, str>> },
}

impl ParseError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidValue { message: message.into(), context: None }
    }
}
