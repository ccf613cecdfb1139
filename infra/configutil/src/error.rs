use std::borrow::Cow;

/// Errors produced while loading or interpreting shared configuration.
#[keel_derive::keel_error]
pub enum ConfigError {
    /// The document is not valid HCL or could not be decoded.
    #[error("Parse error{}: {source}", format_context(.context))]
    Parse { source: hcl::Error, context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A value inside a stanza failed one of the lenient parsers.
    #[error("Invalid value{}: {source}", format_context(.context))]
    Value { source: keel_parseutil::ParseError, context: Option<Cow<'static, str>> },

    /// A stanza is structurally wrong (duplicate block, missing label, conflicting keys).
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidValue { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ConfigError {
    pub(crate) fn invalid(stanza: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidValue { message: message.into(), context: Some(stanza.into()) }
    }
}
