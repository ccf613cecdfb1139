use crate::error::ConfigError;
use crate::listener::warn_unused;
use crate::stanza::{Stanza, attributes_only, blocks_named};
use hcl::Body;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_PROMETHEUS_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_USAGE_GAUGE_PERIOD: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAXIMUM_GAUGE_CARDINALITY: usize = 500;

/// The top-level `telemetry {}` stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    pub statsite_address: Option<String>,
    pub statsd_address: Option<String>,
    pub disable_hostname: bool,
    pub enable_hostname_label: bool,
    pub metrics_prefix: Option<String>,
    #[serde(with = "crate::serde_secs")]
    pub usage_gauge_period: Option<Duration>,
    pub maximum_gauge_cardinality: usize,
    #[serde(with = "crate::serde_secs")]
    pub prometheus_retention_time: Option<Duration>,
    pub dogstatsd_addr: Option<String>,
    pub dogstatsd_tags: Vec<String>,
    pub filter_default: bool,
    /// `+prefix` allows and `-prefix` blocks a metric family.
    pub prefix_filter: Vec<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            statsite_address: None,
            statsd_address: None,
            disable_hostname: false,
            enable_hostname_label: false,
            metrics_prefix: None,
            usage_gauge_period: Some(DEFAULT_USAGE_GAUGE_PERIOD),
            maximum_gauge_cardinality: DEFAULT_MAXIMUM_GAUGE_CARDINALITY,
            prometheus_retention_time: Some(DEFAULT_PROMETHEUS_RETENTION),
            dogstatsd_addr: None,
            dogstatsd_tags: Vec::new(),
            filter_default: true,
            prefix_filter: Vec::new(),
        }
    }
}

impl Telemetry {
    #[must_use]
    pub fn prometheus_enabled(&self) -> bool {
        self.prometheus_retention_time.is_some_and(|d| !d.is_zero())
    }
}

/// Parses the optional `telemetry` block.
///
/// # Errors
/// Fails when more than one block is present or a value does not parse.
pub fn parse_telemetry(body: &Body) -> Result<Option<Telemetry>, ConfigError> {
    let Some(block) = blocks_named(body, "telemetry", 1)?.into_iter().next() else {
        return Ok(None);
    };
    let mut s = Stanza::from_body("telemetry", &attributes_only(block.body()))?;
    let mut t = Telemetry {
        statsite_address: s.string("statsite_address"),
        statsd_address: s.string("statsd_address"),
        disable_hostname: s.flag("disable_hostname")?,
        enable_hostname_label: s.flag("enable_hostname_label")?,
        metrics_prefix: s.string("metrics_prefix"),
        dogstatsd_addr: s.string("dogstatsd_addr"),
        dogstatsd_tags: s.strings("dogstatsd_tags")?,
        prefix_filter: s.strings("prefix_filter")?,
        ..Telemetry::default()
    };

    if let Some(period) = s.duration("usage_gauge_period")? {
        t.usage_gauge_period = (!period.is_zero()).then_some(period);
    }
    if let Some(cardinality) = s.int("maximum_gauge_cardinality")? {
        t.maximum_gauge_cardinality = usize::try_from(cardinality)
            .map_err(|_| s.invalid("maximum_gauge_cardinality", "must not be negative"))?;
    }
    if let Some(retention) = s.duration("prometheus_retention_time")? {
        t.prometheus_retention_time = Some(retention);
    }
    if let Some(filter_default) = s.bool("filter_default")? {
        t.filter_default = filter_default;
    }
    if let Some(bad) = t.prefix_filter.iter().find(|p| !p.starts_with(['+', '-'])) {
        return Err(s.invalid("prefix_filter", format!("entry {bad:?} must start with '+' or '-'")));
    }

    warn_unused("telemetry", s.into_remaining());
    Ok(Some(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(doc: &str) -> Result<Option<Telemetry>, ConfigError> {
        parse_telemetry(&hcl::parse(doc).unwrap())
    }

    #[test]
    fn test_absent_block() {
        assert_eq!(telemetry("").unwrap(), None);
    }

    #[test]
    fn test_values_and_defaults() {
        let t = telemetry(
            r#"
            telemetry {
              statsd_address   = "127.0.0.1:8125"
              disable_hostname = true
              dogstatsd_tags   = ["env:prod", "team:infra"]
              prefix_filter    = ["-keel.expire", "+keel.expire.num_leases"]
              usage_gauge_period = "5m"
            }
            "#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(t.statsd_address.as_deref(), Some("127.0.0.1:8125"));
        assert!(t.disable_hostname);
        assert_eq!(t.dogstatsd_tags.len(), 2);
        assert_eq!(t.usage_gauge_period, Some(Duration::from_secs(300)));
        assert_eq!(t.maximum_gauge_cardinality, DEFAULT_MAXIMUM_GAUGE_CARDINALITY);
        assert!(t.filter_default);
        assert!(t.prometheus_enabled());
    }

    #[test]
    fn test_zero_retention_disables_prometheus() {
        let t = telemetry("telemetry {\n prometheus_retention_time = 0\n}").unwrap().unwrap();
        assert!(!t.prometheus_enabled());
    }

    #[test]
    fn test_rejections() {
        let err = telemetry("telemetry {}\ntelemetry {}").unwrap_err();
        assert!(err.to_string().contains("only 1 telemetry block"), "{err}");

        let err = telemetry("telemetry {\n prefix_filter = [\"keel\"]\n}").unwrap_err();
        assert_eq!(err.context_message(), Some("telemetry.prefix_filter"));
    }
}
