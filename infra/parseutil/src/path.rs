use crate::error::{ParseError, ParseErrorExt};
use tracing::debug;

const ENV_SCHEME: &str = "env://";
const FILE_SCHEME: &str = "file://";

/// Resolves `env://NAME` and `file://path` indirections against the process environment.
///
/// Any other value is returned verbatim, so plain literals can be passed through safely.
///
/// # Errors
/// Returns [`ParseError::MissingEnv`] if the variable is unset and [`ParseError::Io`] if
/// the file cannot be read.
pub fn parse_path(value: &str) -> Result<String, ParseError> {
    parse_path_with(value, |name| std::env::var(name).ok())
}

/// Same as [`parse_path`] with a caller-supplied environment lookup.
pub fn parse_path_with<F>(value: &str, lookup_env: F) -> Result<String, ParseError>
where
    F: Fn(&str) -> Option<String>,
{
    let trimmed = value.trim();

    if let Some(name) = trimmed.strip_prefix(ENV_SCHEME) {
        debug!(variable = name, "Resolving value from environment");
        return lookup_env(name).ok_or_else(|| ParseError::MissingEnv {
            message: name.to_owned().into(),
            context: None,
        });
    }

    if let Some(path) = trimmed.strip_prefix(FILE_SCHEME) {
        debug!(path, "Resolving value from file");
        let contents = std::fs::read_to_string(path).context(format!("Failed to read {path}"))?;
        return Ok(contents.trim().to_owned());
    }

    Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fake_env(name: &str) -> Option<String> {
        (name == "VAULT_TOKEN_FOR_TEST").then(|| "s.abc123".to_owned())
    }

    #[test]
    fn test_literal_passthrough() {
        assert_eq!(parse_path_with("plain-value", fake_env).unwrap(), "plain-value");
        assert_eq!(parse_path_with("https://example.com", fake_env).unwrap(), "https://example.com");
    }

    #[test]
    fn test_env_indirection() {
        assert_eq!(parse_path_with("env://VAULT_TOKEN_FOR_TEST", fake_env).unwrap(), "s.abc123");
        let err = parse_path_with("env://NOT_SET_ANYWHERE", fake_env).unwrap_err();
        assert!(matches!(err, ParseError::MissingEnv { .. }));
    }

    #[test]
    fn test_file_indirection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  secret-from-file  ").unwrap();
        let value = format!("file://{}", file.path().display());
        assert_eq!(parse_path_with(&value, fake_env).unwrap(), "secret-from-file");

        let err = parse_path_with("file:///no/such/file", fake_env).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
        assert_eq!(err.context_message(), Some("Failed to read /no/such/file"));
    }
}
