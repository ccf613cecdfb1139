//! Facade crate for the keel infrastructure utilities.
//! Re-exports each utility crate under a short module name; optional crates sit behind
//! cargo features (`aws`, `plugins`, `full`).
//!
//! Keep this crate thin: it composes the utility crates and implements nothing itself.

pub use keel_configutil as configutil;
pub use keel_lazy as lazy;
pub use keel_listenerutil as listenerutil;
pub use keel_logger as logger;
pub use keel_parseutil as parseutil;
pub use keel_permitpool as permitpool;
pub use keel_regexp as regexp;

#[cfg(feature = "aws")]
pub use keel_awsutil as awsutil;
#[cfg(feature = "plugins")]
pub use keel_plugincontainer as plugincontainer;

/// Build-time enabled optional features.
pub mod features {
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "aws")]
        "aws",
        #[cfg(feature = "plugins")]
        "plugins",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_registry_matches_cfg() {
        assert_eq!(features::is_enabled("aws"), cfg!(feature = "aws"));
        assert_eq!(features::is_enabled("plugins"), cfg!(feature = "plugins"));
        assert!(!features::is_enabled("server"));
    }

    #[test]
    fn test_reexports_resolve() {
        let config = configutil::parse_config("cluster_name = \"facade\"").unwrap();
        assert_eq!(config.cluster_name.as_deref(), Some("facade"));
        assert_eq!(permitpool::PermitPool::new(0).max_permits(), permitpool::DEFAULT_PERMITS);
    }
}
