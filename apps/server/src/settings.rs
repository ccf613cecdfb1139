use config::{Config, Environment, File};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_SETTINGS_FILE: &str = "keel-server";
const ENV_PREFIX: &str = "KEEL";

#[keel_derive::keel_error]
pub enum SettingsError {
    #[error("Settings error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Process bootstrap settings, separate from the HCL platform configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// An HCL file, or a directory whose `*.hcl` files are merged.
    pub config_path: PathBuf,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
    pub shutdown_grace_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { config_path: PathBuf::from("keel.hcl"), log_dir: None, shutdown_grace_secs: 30 }
    }
}

impl Settings {
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Layers an optional settings file (`keel-server.toml` by default) under `KEEL__*`
/// environment variables, e.g. `KEEL__CONFIG_PATH=/etc/keel`.
///
/// # Errors
/// Fails when an explicitly named file is missing or a value has the wrong type.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let (file, required) = path.map_or_else(
        || (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        |p| (p.to_path_buf(), true),
    );
    info!(path = %file.display(), required, "Loading server settings");

    Config::builder()
        .add_source(File::from(file.as_path()).required(required))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()
        .context("Failed to build settings")?
        .try_deserialize::<Settings>()
        .context("Failed to deserialize settings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_values_apply() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "config_path = \"/etc/keel\"\nshutdown_grace_secs = 5").unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.config_path, PathBuf::from("/etc/keel"));
        assert_eq!(settings.shutdown_grace(), Duration::from_secs(5));
        assert!(settings.log_dir.is_none());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = load_settings(Some(Path::new("/no/such/keel-server.toml"))).unwrap_err();
        assert_eq!(err.context_message(), Some("Failed to build settings"));
    }
}
