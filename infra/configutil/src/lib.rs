//! # Shared configuration
//!
//! Parses the HCL stanzas every platform service understands: `listener`, `seal`/`kms`,
//! `telemetry`, `entropy` and a handful of top-level keys. Service-specific keys are left
//! alone and reported through [`SharedConfig::unused_keys`].
//!
//! ```rust
//! let config = keel_configutil::parse_config(r#"
//!     log_level = "info"
//!     listener "tcp" {
//!       address     = "127.0.0.1:8200"
//!       tls_disable = true
//!     }
//! "#).unwrap();
//!
//! assert_eq!(config.listeners[0].address.as_deref(), Some("127.0.0.1:8200"));
//! ```

mod entropy;
mod error;
mod kms;
mod listener;
mod serde_secs;
mod shared;
mod stanza;
mod telemetry;

pub use entropy::{Entropy, EntropyMode, parse_entropy};
pub use error::{ConfigError, ConfigErrorExt};
pub use kms::{Kms, MAX_KMS_BLOCKS, parse_kmses};
pub use listener::{
    DEFAULT_MAX_REQUEST_DURATION, DEFAULT_MAX_REQUEST_SIZE, Listener, ListenerKind, ListenerTelemetry,
    ProxyProtocolBehavior, parse_listeners,
};
pub use shared::{SharedConfig, load_config_dir, load_config_file, parse_config};
pub use telemetry::{
    DEFAULT_MAXIMUM_GAUGE_CARDINALITY, DEFAULT_PROMETHEUS_RETENTION, DEFAULT_USAGE_GAUGE_PERIOD, Telemetry,
    parse_telemetry,
};

/// Re-exported so callers of [`parse_listeners`] and friends can build a body.
pub use hcl::Body;
