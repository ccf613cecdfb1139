use crate::error::ConfigError;
use crate::listener::warn_unused;
use crate::stanza::{Stanza, blocks_named, single_label};
use hcl::Body;
use serde::Serialize;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EntropyMode {
    /// Mix seal-provided entropy into the local random source.
    Augmentation,
}

/// The `entropy "seal" {}` stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entropy {
    pub mode: EntropyMode,
    pub seal_name: Option<String>,
}

/// Parses the optional `entropy` block.
///
/// # Errors
/// Fails for a second block, a source other than `seal`, or an unknown mode.
pub fn parse_entropy(body: &Body) -> Result<Option<Entropy>, ConfigError> {
    let Some(block) = blocks_named(body, "entropy", 1)?.into_iter().next() else {
        return Ok(None);
    };
    let source = single_label(block, "entropy")?.unwrap_or_else(|| "seal".to_owned());
    if source != "seal" {
        return Err(ConfigError::invalid("entropy", format!("unsupported entropy source {source:?}, only \"seal\" is supported")));
    }

    let mut s = Stanza::from_block("entropy", block)?;
    let mode = match s.lowercase("mode") {
        Some(mode) => mode
            .parse::<EntropyMode>()
            .map_err(|_| s.invalid("mode", format!("unknown entropy mode {mode:?}")))?,
        None => return Err(s.invalid("mode", "entropy mode must be specified")),
    };
    let seal_name = s.string("seal_name");

    warn_unused("entropy", s.into_remaining());
    Ok(Some(Entropy { mode, seal_name }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entropy(doc: &str) -> Result<Option<Entropy>, ConfigError> {
        parse_entropy(&hcl::parse(doc).unwrap())
    }

    #[test]
    fn test_augmentation() {
        let e = entropy("entropy \"seal\" {\n mode = \"Augmentation\"\n}").unwrap().unwrap();
        assert_eq!(e.mode, EntropyMode::Augmentation);
        assert_eq!(e.seal_name, None);
    }

    #[test]
    fn test_rejections() {
        let err = entropy("entropy \"seal\" {\n mode = \"replace\"\n}").unwrap_err();
        assert_eq!(err.context_message(), Some("entropy.mode"));

        let err = entropy("entropy \"hsm\" {\n mode = \"augmentation\"\n}").unwrap_err();
        assert!(err.to_string().contains("unsupported entropy source"), "{err}");

        let err = entropy("entropy \"seal\" {}").unwrap_err();
        assert!(err.to_string().contains("must be specified"), "{err}");
    }
}
