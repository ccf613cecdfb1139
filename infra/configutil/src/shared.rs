use crate::entropy::{Entropy, parse_entropy};
use crate::error::{ConfigError, ConfigErrorExt};
use crate::kms::{Kms, parse_kms_blocks};
use crate::listener::{Listener, parse_listeners};
use crate::stanza::{Stanza, attributes_only};
use crate::telemetry::{Telemetry, parse_telemetry};
use hcl::Body;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const BLOCK_KEYS: [&str; 5] = ["listener", "seal", "kms", "telemetry", "entropy"];

/// Configuration shared by every service built on the platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedConfig {
    pub listeners: Vec<Listener>,
    pub seals: Vec<Kms>,
    pub entropy: Option<Entropy>,
    pub telemetry: Option<Telemetry>,

    pub disable_mlock: bool,
    pub default_max_request_duration: Option<Duration>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub pid_file: Option<String>,
    pub cluster_name: Option<String>,

    /// Every top-level attribute or block name seen, in document order.
    pub found_keys: Vec<String>,
    /// Top-level attributes that no parser consumed.
    pub unused_keys: Vec<String>,
}

/// Parses an HCL document into a [`SharedConfig`].
///
/// Unknown top-level attributes are not an error; they are recorded in
/// [`SharedConfig::unused_keys`] so the embedding service can parse them itself.
///
/// # Errors
/// Returns [`ConfigError::Parse`] for malformed HCL and the stanza-specific error of the
/// first listener, seal, telemetry or entropy block that fails to parse.
pub fn parse_config(input: &str) -> Result<SharedConfig, ConfigError> {
    let body = hcl::parse(input).context("config")?;
    parse_body(&body)
}

/// Reads and parses a single HCL file.
///
/// # Errors
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise see [`parse_config`].
pub fn load_config_file(path: impl AsRef<Path>) -> Result<SharedConfig, ConfigError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let config = parse_config(&input).inspect_err(|e| warn!(path = %path.display(), error = %e, "Rejected configuration file"))?;
    info!(path = %path.display(), listeners = config.listeners.len(), seals = config.seals.len(), "Loaded configuration file");
    Ok(config)
}

/// Loads every `*.hcl` file of a directory in name order and merges them.
///
/// # Errors
/// Fails if the directory cannot be listed or any file fails to load.
pub fn load_config_dir(dir: impl AsRef<Path>) -> Result<SharedConfig, ConfigError> {
    let dir = dir.as_ref();
    let mut files = std::fs::read_dir(dir)
        .context(format!("Failed to list {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "hcl"))
        .collect::<Vec<_>>();
    files.sort();

    let mut merged = SharedConfig::default();
    for file in files {
        merged = merged.merge(load_config_file(&file)?);
    }
    Ok(merged)
}

fn parse_body(body: &Body) -> Result<SharedConfig, ConfigError> {
    let mut found = Vec::new();
    for key in body.attributes().map(|a| a.key()).chain(body.blocks().map(|b| b.identifier())) {
        if !found.iter().any(|k| k == key) {
            found.push(key.to_owned());
        }
    }

    let mut top = Stanza::from_body("config", &attributes_only(body))?;
    let mut config = SharedConfig {
        disable_mlock: top.flag("disable_mlock")?,
        default_max_request_duration: top.duration("default_max_request_duration")?,
        log_level: top.lowercase("log_level"),
        log_format: top.lowercase("log_format"),
        pid_file: top.string("pid_file"),
        cluster_name: top.string("cluster_name"),
        ..SharedConfig::default()
    };

    config.listeners = parse_listeners(body)?;
    config.seals = parse_kms_blocks(body)?;
    config.telemetry = parse_telemetry(body)?;
    config.entropy = parse_entropy(body)?;

    config.unused_keys = top.into_remaining().into_iter().map(|(key, _)| key).collect();
    for block in body.blocks().map(|b| b.identifier()) {
        if !BLOCK_KEYS.contains(&block) && !config.unused_keys.iter().any(|k| k == block) {
            config.unused_keys.push(block.to_owned());
        }
    }
    config.found_keys = found;

    debug!(found = ?config.found_keys, unused = ?config.unused_keys, "Parsed shared configuration");
    Ok(config)
}

impl SharedConfig {
    /// Combines two configurations; `other` wins for scalars that it sets.
    ///
    /// Listeners and seals are appended, telemetry and entropy are replaced when
    /// `other` defines them.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let mut listeners = self.listeners;
        listeners.extend(other.listeners);
        let mut seals = self.seals;
        seals.extend(other.seals);

        let mut found_keys = self.found_keys;
        let mut unused_keys = self.unused_keys;
        for (into, from) in [(&mut found_keys, other.found_keys), (&mut unused_keys, other.unused_keys)] {
            let seen: BTreeSet<String> = into.iter().cloned().collect();
            into.extend(from.into_iter().filter(|k| !seen.contains(k)));
        }

        Self {
            listeners,
            seals,
            entropy: other.entropy.or(self.entropy),
            telemetry: other.telemetry.or(self.telemetry),
            disable_mlock: self.disable_mlock || other.disable_mlock,
            default_max_request_duration: other.default_max_request_duration.or(self.default_max_request_duration),
            log_level: other.log_level.or(self.log_level),
            log_format: other.log_format.or(self.log_format),
            pid_file: other.pid_file.or(self.pid_file),
            cluster_name: other.cluster_name.or(self.cluster_name),
            found_keys,
            unused_keys,
        }
    }

    /// Renders the configuration for display.
    ///
    /// Seal configuration maps are left out; they routinely carry credentials.
    #[must_use]
    pub fn sanitized(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("disable_mlock".into(), json!(self.disable_mlock));
        out.insert(
            "default_max_request_duration".into(),
            json!(self.default_max_request_duration.map(|d| d.as_secs_f64())),
        );
        out.insert("log_level".into(), json!(self.log_level));
        out.insert("log_format".into(), json!(self.log_format));
        out.insert("pid_file".into(), json!(self.pid_file));
        out.insert("cluster_name".into(), json!(self.cluster_name));

        let listeners = self
            .listeners
            .iter()
            .map(|l| match serde_json::to_value(l) {
                Ok(config) => json!({ "type": l.kind.as_ref(), "config": config }),
                Err(e) => {
                    warn!(error = %e, "Failed to render listener");
                    json!({ "type": l.kind.as_ref() })
                },
            })
            .collect::<Vec<_>>();
        out.insert("listeners".into(), Value::Array(listeners));

        let seals = self
            .seals
            .iter()
            .map(|s| json!({ "type": s.kind, "purpose": s.purpose, "disabled": s.disabled }))
            .collect::<Vec<_>>();
        out.insert("seals".into(), Value::Array(seals));

        if let Some(telemetry) = &self.telemetry {
            out.insert("telemetry".into(), serde_json::to_value(telemetry).unwrap_or(Value::Null));
        }
        if let Some(entropy) = &self.entropy {
            out.insert("entropy".into(), serde_json::to_value(entropy).unwrap_or(Value::Null));
        }
        out
    }
}
