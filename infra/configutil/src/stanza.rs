use crate::error::{ConfigError, ConfigErrorExt};
use hcl::{Block, Body, Structure};
use ipnet::IpNet;
use keel_parseutil as parse;
use serde_json::{Map, Value};
use std::time::Duration;

/// Decoded attributes of one HCL block, consumed key by key.
///
/// Every accessor removes the key it reads, so whatever remains at the end is reported
/// as unused.
pub(crate) struct Stanza {
    path: String,
    fields: Map<String, Value>,
}

impl Stanza {
    pub(crate) fn from_body(path: impl Into<String>, body: &Body) -> Result<Self, ConfigError> {
        let path = path.into();
        let fields: Map<String, Value> = hcl::from_body(body.clone()).context(path.clone())?;
        Ok(Self { path, fields })
    }

    pub(crate) fn from_block(path: impl Into<String>, block: &Block) -> Result<Self, ConfigError> {
        Self::from_body(path, block.body())
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn invalid(&self, key: &str, message: impl Into<String>) -> ConfigError {
        ConfigError::invalid(self.key_path(key), message.into())
    }

    fn key_path(&self, key: &str) -> String {
        format!("{}.{key}", self.path)
    }

    pub(crate) fn take(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key).filter(|v| !v.is_null())
    }

    fn with<T>(
        &mut self,
        key: &str,
        parse: impl FnOnce(&Value) -> Result<T, parse::ParseError>,
    ) -> Result<Option<T>, ConfigError> {
        match self.take(key) {
            Some(raw) => Ok(Some(parse(&raw).context(self.key_path(key))?)),
            None => Ok(None),
        }
    }

    pub(crate) fn string(&mut self, key: &str) -> Option<String> {
        self.take(key).map(|v| parse::to_plain_string(&v))
    }

    pub(crate) fn lowercase(&mut self, key: &str) -> Option<String> {
        self.string(key).map(|s| s.trim().to_ascii_lowercase())
    }

    pub(crate) fn bool(&mut self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.with(key, parse::parse_bool)
    }

    pub(crate) fn flag(&mut self, key: &str) -> Result<bool, ConfigError> {
        Ok(self.bool(key)?.unwrap_or(false))
    }

    pub(crate) fn int(&mut self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.with(key, parse::parse_int)
    }

    pub(crate) fn duration(&mut self, key: &str) -> Result<Option<Duration>, ConfigError> {
        self.with(key, parse::parse_duration_second)
    }

    pub(crate) fn strings(&mut self, key: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self.with(key, parse::parse_comma_strings)?.unwrap_or_default())
    }

    pub(crate) fn addrs(&mut self, key: &str) -> Result<Vec<IpNet>, ConfigError> {
        Ok(self.with(key, parse::parse_addrs)?.unwrap_or_default())
    }

    /// Takes a nested object. Repeated blocks decode as an array; only the first is used.
    pub(crate) fn object(&mut self, key: &str) -> Option<Map<String, Value>> {
        match self.take(key)? {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.into_iter().find_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            }),
            _ => None,
        }
    }

    pub(crate) fn nested(&mut self, key: &str) -> Option<Self> {
        let path = self.key_path(key);
        self.object(key).map(|fields| Self { path, fields })
    }

    /// Consumes the stanza, returning the keys no accessor asked for.
    pub(crate) fn into_remaining(self) -> Map<String, Value> {
        self.fields
    }
}

/// Attributes of a body, stripped of its nested blocks.
pub(crate) fn attributes_only(body: &Body) -> Body {
    body.attributes().cloned().map(Structure::Attribute).collect()
}

/// All blocks named `ident`, failing if there are more than `limit` of them.
pub(crate) fn blocks_named<'a>(body: &'a Body, ident: &str, limit: usize) -> Result<Vec<&'a Block>, ConfigError> {
    let blocks: Vec<&Block> = body.blocks().filter(|b| b.identifier() == ident).collect();
    if blocks.len() > limit {
        let noun = if limit == 1 { "block" } else { "blocks" };
        return Err(ConfigError::invalid(
            ident.to_owned(),
            format!("only {limit} {ident} {noun} may be defined, found {}", blocks.len()),
        ));
    }
    Ok(blocks)
}

/// The single label of a block, lowercased.
pub(crate) fn single_label(block: &Block, path: &str) -> Result<Option<String>, ConfigError> {
    match block.labels() {
        [] => Ok(None),
        [label] => Ok(Some(label.as_str().trim().to_ascii_lowercase())),
        more => Err(ConfigError::invalid(
            path.to_owned(),
            format!("expected a single label, found {}", more.len()),
        )),
    }
}
