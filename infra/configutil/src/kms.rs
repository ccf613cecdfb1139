use crate::error::{ConfigError, ConfigErrorExt};
use crate::stanza::{Stanza, blocks_named, single_label};
use hcl::Body;
use keel_parseutil::{parse_path_with, to_plain_string};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Maximum number of `seal` blocks, and separately of `kms` blocks, in one document.
pub const MAX_KMS_BLOCKS: usize = 5;

const KMS_BLOCK_NAMES: [&str; 2] = ["seal", "kms"];

/// One `seal "<type>" {}` or `kms "<type>" {}` stanza.
///
/// Everything besides the well-known keys lands in [`Kms::config`] as plain strings,
/// ready to hand to the wrapper for `kind`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Kms {
    #[serde(rename = "type")]
    pub kind: String,
    pub purpose: Vec<String>,
    pub disabled: bool,
    pub name: Option<String>,
    pub priority: Option<i64>,
    #[serde(skip)]
    pub config: BTreeMap<String, String>,
}

impl Kms {
    /// Resolves `env://` and `file://` indirections in every config value, in place.
    ///
    /// # Errors
    /// Fails on the first value whose variable is unset or whose file is unreadable.
    pub fn resolve_paths(&mut self) -> Result<(), ConfigError> {
        self.resolve_paths_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Kms::resolve_paths`] with a caller-supplied environment lookup.
    pub fn resolve_paths_with<F>(&mut self, lookup_env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, value) in &mut self.config {
            *value = parse_path_with(value, &lookup_env)
                .context(format!("{}.{key}", self.kind))?;
        }
        Ok(())
    }

    pub fn has_purpose(&self, purpose: &str) -> bool {
        self.purpose.iter().any(|p| p.eq_ignore_ascii_case(purpose))
    }
}

/// Parses every `seal` and `kms` block of an HCL document.
///
/// # Errors
/// Returns [`ConfigError::Parse`] for malformed HCL and [`ConfigError::InvalidValue`]
/// when a block is missing its type label or the block limit is exceeded.
pub fn parse_kmses(input: &str) -> Result<Vec<Kms>, ConfigError> {
    let body = hcl::parse(input).context("kms")?;
    parse_kms_blocks(&body)
}

pub(crate) fn parse_kms_blocks(body: &Body) -> Result<Vec<Kms>, ConfigError> {
    let mut out = Vec::new();
    for ident in KMS_BLOCK_NAMES {
        for (index, block) in blocks_named(body, ident, MAX_KMS_BLOCKS)?.into_iter().enumerate() {
            let path = format!("{ident}.{index}");
            let kind = single_label(block, &path)?
                .ok_or_else(|| ConfigError::invalid(path.clone(), format!("{ident} type must be specified")))?;

            let mut stanza = Stanza::from_block(path, block)?;
            let purpose = stanza.strings("purpose")?.into_iter().map(|p| p.to_ascii_lowercase()).collect();
            let disabled = stanza.flag("disabled")?;
            let name = stanza.string("name");
            let priority = stanza.int("priority")?;
            let config = stanza
                .into_remaining()
                .into_iter()
                .map(|(key, value)| (key, to_plain_string(&value)))
                .collect();

            debug!(kind = %kind, block = ident, disabled, "Parsed KMS stanza");
            out.push(Kms { kind, purpose, disabled, name, priority, config });
        }
    }
    Ok(out)
}
