//! Runs against a live container engine; `cargo test -- --ignored` with Docker available.

use keel_plugincontainer::{ContainerConfig, ContainerRunner, PluginContainerError, Runner};
use tokio::io::AsyncReadExt;

#[tokio::test]
#[ignore = "requires a running container engine and the busybox image"]
async fn test_runs_plugin_and_collects_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = ContainerConfig::builder()
        .image("busybox")
        .tag("latest")
        .entrypoint(["sh", "-c"])
        .args(["echo hello from $PLUGIN_UNIX_SOCKET_DIR; echo oops >&2"])
        .build()
        .unwrap();

    let mut runner = ContainerRunner::new(config, dir.path(), vec![]).unwrap();
    runner.start().await.unwrap();
    let mut stdout = runner.take_stdout().unwrap();
    let mut stderr = runner.take_stderr().unwrap();
    runner.wait().await.unwrap();

    let mut out = String::new();
    stdout.read_to_string(&mut out).await.unwrap();
    let mut err = String::new();
    stderr.read_to_string(&mut err).await.unwrap();
    assert_eq!(out.trim(), "hello from /tmp/go-plugin-container");
    assert_eq!(err.trim(), "oops");
}

#[tokio::test]
#[ignore = "requires a running container engine and the busybox image"]
async fn test_non_zero_exit_and_pin_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let failing = ContainerConfig::builder()
        .image("busybox")
        .entrypoint(["sh", "-c", "exit 3"])
        .build()
        .unwrap();
    let mut runner = ContainerRunner::new(failing, dir.path(), vec![]).unwrap();
    runner.start().await.unwrap();
    let err = runner.wait().await.unwrap_err();
    assert!(matches!(err, PluginContainerError::ExitCode { code: 3, .. }));

    let pinned = ContainerConfig::builder().image("busybox").sha256("0".repeat(64)).build().unwrap();
    let mut runner = ContainerRunner::new(pinned, dir.path(), vec![]).unwrap();
    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, PluginContainerError::ImageMismatch { .. }));
    assert!(runner.id().is_empty());
}
