use std::borrow::Cow;

#[keel_derive::keel_error]
pub enum RegexpError {
    #[error("Invalid pattern{}: {source}", format_context(.context))]
    Compile { source: regex::Error, context: Option<Cow<'static, str>> },
}
