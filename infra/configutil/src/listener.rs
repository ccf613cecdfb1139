use crate::error::ConfigError;
use crate::stanza::{Stanza, blocks_named, single_label};
use hcl::Body;
use ipnet::IpNet;
use keel_parseutil::{parse_capacity_string, to_plain_string};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

/// Request body limit applied when `max_request_size` is unset or zero.
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 32 * 1024 * 1024;
/// Request deadline applied when `max_request_duration` is unset or zero.
pub const DEFAULT_MAX_REQUEST_DURATION: Duration = Duration::from_secs(90);

const TLS_VERSIONS: [&str; 4] = ["tls10", "tls11", "tls12", "tls13"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ListenerKind {
    Tcp,
    Unix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProxyProtocolBehavior {
    UseAlways,
    AllowAuthorized,
    DenyUnauthorized,
}

/// Per-listener telemetry switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListenerTelemetry {
    pub unauthenticated_metrics_access: bool,
}

/// One `listener "<type>" {}` stanza.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listener {
    #[serde(rename = "type")]
    pub kind: ListenerKind,
    pub purpose: Vec<String>,
    pub address: Option<String>,
    pub cluster_address: Option<String>,

    /// Raw limit: zero means the default, a negative value disables the limit.
    pub max_request_size: i64,
    #[serde(with = "crate::serde_secs")]
    pub max_request_duration: Option<Duration>,
    pub require_request_header: bool,

    pub tls_disable: bool,
    pub tls_cert_file: Option<String>,
    pub tls_key_file: Option<String>,
    pub tls_min_version: Option<String>,
    pub tls_max_version: Option<String>,
    pub tls_cipher_suites: Vec<String>,
    pub tls_require_and_verify_client_cert: bool,
    pub tls_client_ca_file: Option<String>,
    pub tls_disable_client_certs: bool,

    #[serde(with = "crate::serde_secs")]
    pub http_read_timeout: Option<Duration>,
    #[serde(with = "crate::serde_secs")]
    pub http_read_header_timeout: Option<Duration>,
    #[serde(with = "crate::serde_secs")]
    pub http_write_timeout: Option<Duration>,
    #[serde(with = "crate::serde_secs")]
    pub http_idle_timeout: Option<Duration>,

    pub proxy_protocol_behavior: Option<ProxyProtocolBehavior>,
    pub proxy_protocol_authorized_addrs: Vec<IpNet>,

    pub x_forwarded_for_authorized_addrs: Vec<IpNet>,
    pub x_forwarded_for_hop_skips: usize,
    pub x_forwarded_for_reject_not_present: bool,
    pub x_forwarded_for_reject_not_authorized: bool,

    pub socket_mode: Option<String>,
    pub socket_user: Option<String>,
    pub socket_group: Option<String>,

    pub telemetry: ListenerTelemetry,

    pub cors_enabled: bool,
    pub cors_allowed_origins: Vec<String>,
    pub cors_allowed_headers: Vec<String>,

    /// Status key (`default`, `2xx`, `404`, …) → header name → value.
    pub custom_response_headers: BTreeMap<String, BTreeMap<String, String>>,
    pub random_port: bool,
}

impl Listener {
    /// Creates a listener with every optional setting at its default.
    #[must_use]
    pub fn new(kind: ListenerKind) -> Self {
        Self {
            kind,
            purpose: Vec::new(),
            address: None,
            cluster_address: None,
            max_request_size: 0,
            max_request_duration: None,
            require_request_header: false,
            tls_disable: false,
            tls_cert_file: None,
            tls_key_file: None,
            tls_min_version: None,
            tls_max_version: None,
            tls_cipher_suites: Vec::new(),
            tls_require_and_verify_client_cert: false,
            tls_client_ca_file: None,
            tls_disable_client_certs: false,
            http_read_timeout: None,
            http_read_header_timeout: None,
            http_write_timeout: None,
            http_idle_timeout: None,
            proxy_protocol_behavior: None,
            proxy_protocol_authorized_addrs: Vec::new(),
            x_forwarded_for_authorized_addrs: Vec::new(),
            x_forwarded_for_hop_skips: 0,
            x_forwarded_for_reject_not_present: true,
            x_forwarded_for_reject_not_authorized: true,
            socket_mode: None,
            socket_user: None,
            socket_group: None,
            telemetry: ListenerTelemetry::default(),
            cors_enabled: false,
            cors_allowed_origins: Vec::new(),
            cors_allowed_headers: Vec::new(),
            custom_response_headers: BTreeMap::new(),
            random_port: false,
        }
    }

    /// Body size limit in bytes, or `None` when the limit is disabled.
    #[must_use]
    pub fn effective_max_request_size(&self) -> Option<u64> {
        match self.max_request_size {
            0 => Some(DEFAULT_MAX_REQUEST_SIZE),
            n if n < 0 => None,
            n => u64::try_from(n).ok(),
        }
    }

    #[must_use]
    pub fn effective_max_request_duration(&self) -> Duration {
        match self.max_request_duration {
            Some(d) if !d.is_zero() => d,
            _ => DEFAULT_MAX_REQUEST_DURATION,
        }
    }

    #[must_use]
    pub fn is_tcp(&self) -> bool {
        self.kind == ListenerKind::Tcp
    }
}

/// Parses every `listener` block of a document body.
///
/// # Errors
/// Fails on the first listener with an unknown type, a malformed value or conflicting
/// settings. The error context names the listener index and key.
pub fn parse_listeners(body: &Body) -> Result<Vec<Listener>, ConfigError> {
    blocks_named(body, "listener", usize::MAX)?
        .into_iter()
        .enumerate()
        .map(|(index, block)| {
            let path = format!("listeners.{index}");
            let label = single_label(block, &path)?;
            let stanza = Stanza::from_block(path, block)?;
            parse_listener(label, stanza)
        })
        .collect()
}

fn parse_listener(label: Option<String>, mut s: Stanza) -> Result<Listener, ConfigError> {
    let declared = label.or_else(|| s.lowercase("type"));
    let kind = match declared {
        Some(kind) => kind
            .parse::<ListenerKind>()
            .map_err(|_| s.invalid("type", format!("unsupported listener type {kind:?}")))?,
        None => return Err(s.invalid("type", "listener type must be specified")),
    };
    // A labelled block may still repeat its type as an attribute.
    s.take("type");

    let mut l = Listener::new(kind);
    l.purpose = s.strings("purpose")?.into_iter().map(|p| p.to_ascii_lowercase()).collect();
    l.address = s.string("address");
    l.cluster_address = s.string("cluster_address");

    if let Some(raw) = s.take("max_request_size") {
        l.max_request_size = parse_request_size(&s, &raw)?;
    }
    l.max_request_duration = s.duration("max_request_duration")?;
    l.require_request_header = s.flag("require_request_header")?;

    parse_tls(&mut l, &mut s)?;

    l.http_read_timeout = s.duration("http_read_timeout")?;
    l.http_read_header_timeout = s.duration("http_read_header_timeout")?;
    l.http_write_timeout = s.duration("http_write_timeout")?;
    l.http_idle_timeout = s.duration("http_idle_timeout")?;

    parse_proxy_protocol(&mut l, &mut s)?;
    parse_forwarded_for(&mut l, &mut s)?;

    l.socket_mode = s.string("socket_mode");
    l.socket_user = s.string("socket_user");
    l.socket_group = s.string("socket_group");

    if let Some(mut telemetry) = s.nested("telemetry") {
        l.telemetry.unauthenticated_metrics_access = telemetry.flag("unauthenticated_metrics_access")?;
        let path = telemetry.path().to_owned();
        warn_unused(&path, telemetry.into_remaining());
    }

    parse_cors(&mut l, &mut s)?;

    if let Some(headers) = s.object("custom_response_headers") {
        l.custom_response_headers = parse_custom_headers(&s, headers)?;
    }
    l.random_port = s.flag("random_port")?;

    if l.kind == ListenerKind::Unix && l.address.is_none() {
        return Err(s.invalid("address", "unix listeners require a socket path"));
    }

    debug!(kind = %l.kind, address = ?l.address, "Parsed listener stanza");
    let path = s.path().to_owned();
    warn_unused(&path, s.into_remaining());
    Ok(l)
}

fn parse_request_size(s: &Stanza, raw: &Value) -> Result<i64, ConfigError> {
    if let Some(n) = raw.as_i64() {
        return Ok(n);
    }
    let text = to_plain_string(raw);
    if let Ok(n) = text.trim().parse::<i64>() {
        return Ok(n);
    }
    let bytes = parse_capacity_string(raw)
        .map_err(|e| s.invalid("max_request_size", e.to_string()))?;
    i64::try_from(bytes).map_err(|_| s.invalid("max_request_size", format!("{text:?} is too large")))
}

fn parse_tls(l: &mut Listener, s: &mut Stanza) -> Result<(), ConfigError> {
    l.tls_disable = s.flag("tls_disable")?;
    l.tls_cert_file = s.string("tls_cert_file");
    l.tls_key_file = s.string("tls_key_file");

    for (key, slot) in [
        ("tls_min_version", &mut l.tls_min_version),
        ("tls_max_version", &mut l.tls_max_version),
    ] {
        if let Some(version) = s.lowercase(key) {
            if !TLS_VERSIONS.contains(&version.as_str()) {
                return Err(s.invalid(key, format!("invalid value {version:?}, expected one of {TLS_VERSIONS:?}")));
            }
            *slot = Some(version);
        }
    }

    l.tls_cipher_suites = s.strings("tls_cipher_suites")?;
    l.tls_require_and_verify_client_cert = s.flag("tls_require_and_verify_client_cert")?;
    l.tls_client_ca_file = s.string("tls_client_ca_file");
    l.tls_disable_client_certs = s.flag("tls_disable_client_certs")?;

    if l.tls_require_and_verify_client_cert && l.tls_disable_client_certs {
        return Err(s.invalid(
            "tls_disable_client_certs",
            "'tls_disable_client_certs' and 'tls_require_and_verify_client_cert' are mutually exclusive",
        ));
    }
    Ok(())
}

fn parse_proxy_protocol(l: &mut Listener, s: &mut Stanza) -> Result<(), ConfigError> {
    if let Some(behavior) = s.lowercase("proxy_protocol_behavior") {
        let parsed = behavior
            .parse::<ProxyProtocolBehavior>()
            .map_err(|_| s.invalid("proxy_protocol_behavior", format!("unsupported behavior {behavior:?}")))?;
        l.proxy_protocol_behavior = Some(parsed);
    }
    l.proxy_protocol_authorized_addrs = s.addrs("proxy_protocol_authorized_addrs")?;

    let needs_addrs = matches!(
        l.proxy_protocol_behavior,
        Some(ProxyProtocolBehavior::AllowAuthorized | ProxyProtocolBehavior::DenyUnauthorized)
    );
    if needs_addrs && l.proxy_protocol_authorized_addrs.is_empty() {
        return Err(s.invalid(
            "proxy_protocol_authorized_addrs",
            "proxy_protocol_behavior only admits authorized addresses but none are configured",
        ));
    }
    Ok(())
}

fn parse_forwarded_for(l: &mut Listener, s: &mut Stanza) -> Result<(), ConfigError> {
    l.x_forwarded_for_authorized_addrs = s.addrs("x_forwarded_for_authorized_addrs")?;
    if let Some(skips) = s.int("x_forwarded_for_hop_skips")? {
        l.x_forwarded_for_hop_skips = usize::try_from(skips).map_err(|_| {
            s.invalid("x_forwarded_for_hop_skips", format!("cannot be negative but was {skips}"))
        })?;
    }
    if let Some(reject) = s.bool("x_forwarded_for_reject_not_present")? {
        l.x_forwarded_for_reject_not_present = reject;
    }
    if let Some(reject) = s.bool("x_forwarded_for_reject_not_authorized")? {
        l.x_forwarded_for_reject_not_authorized = reject;
    }
    Ok(())
}

fn parse_cors(l: &mut Listener, s: &mut Stanza) -> Result<(), ConfigError> {
    l.cors_enabled = s.flag("cors_enabled")?;
    l.cors_allowed_origins = s.strings("cors_allowed_origins")?;
    l.cors_allowed_headers = s.strings("cors_allowed_headers")?;

    if l.cors_allowed_origins.len() > 1 && l.cors_allowed_origins.iter().any(|o| o == "*") {
        return Err(s.invalid(
            "cors_allowed_origins",
            "must only contain a wildcard or only non-wildcard values",
        ));
    }
    Ok(())
}

/// Flattens `custom_response_headers` into status → header → value.
///
/// A header given as a list of values is joined with `"; "`.
fn parse_custom_headers(
    s: &Stanza,
    raw: Map<String, Value>,
) -> Result<BTreeMap<String, BTreeMap<String, String>>, ConfigError> {
    let mut out = BTreeMap::new();
    for (status, headers) in raw {
        let headers = match headers {
            Value::Object(map) => map,
            Value::Array(mut items) if items.len() == 1 && items[0].is_object() => match items.remove(0) {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            other => {
                return Err(s.invalid(
                    "custom_response_headers",
                    format!("headers for {status:?} must be an object, got {other}"),
                ));
            },
        };

        let mut flat = BTreeMap::new();
        for (name, value) in headers {
            let value = match value {
                Value::Array(values) => values.iter().map(to_plain_string).collect::<Vec<_>>().join("; "),
                other => to_plain_string(&other),
            };
            flat.insert(name, value);
        }
        out.insert(status, flat);
    }
    Ok(out)
}

pub(crate) fn warn_unused(path: &str, remaining: Map<String, Value>) {
    for key in remaining.keys() {
        warn!(stanza = path, key = %key, "Ignoring unknown configuration key");
    }
}
