use keel_configutil::{ConfigError, load_config_dir, load_config_file};
use std::path::PathBuf;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_load_single_file() {
    let config = load_config_file(fixtures().join("server.hcl")).unwrap();
    assert_eq!(config.cluster_name.as_deref(), Some("keel-test"));
    assert_eq!(config.log_format.as_deref(), Some("json"));

    let listener = &config.listeners[0];
    assert_eq!(listener.custom_response_headers["default"]["Content-Security-Policy"], "default-src 'self'");
}

#[test]
fn test_load_dir_merges_in_name_order() {
    let config = load_config_dir(fixtures()).unwrap();
    assert!(config.disable_mlock);
    assert_eq!(config.listeners.len(), 1);
    assert_eq!(config.seals.len(), 1);
    assert_eq!(config.seals[0].config["token"], "env://KEEL_TRANSIT_TOKEN");
}

#[test]
fn test_missing_file() {
    let err = load_config_file("/definitely/not/here.hcl").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_dir_ignores_other_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.hcl"), "log_level = \"info\"").unwrap();
    std::fs::write(dir.path().join("b.hcl"), "log_level = \"trace\"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not hcl {").unwrap();

    let config = load_config_dir(dir.path()).unwrap();
    assert_eq!(config.log_level.as_deref(), Some("trace"));
}
