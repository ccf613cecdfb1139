use keel_derive::keel_error;
use std::borrow::Cow;

#[keel_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid value{}: {message}", format_context(.context))]
    InvalidValue { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read_missing() -> Result<String, DemoError> {
    Ok(std::fs::read_to_string("/definitely/not/here").context("reading demo file")?)
}

fn main() {
    let err = read_missing().unwrap_err();
    assert_eq!(err.context_message(), Some("reading demo file"));

    let internal: DemoError = "boom".into();
    assert!(internal.context_message().is_none());

    let annotated: Result<(), DemoError> = Err(internal);
    let annotated = annotated.context("while testing").unwrap_err();
    assert_eq!(annotated.to_string(), "Internal error (while testing): boom");
}
