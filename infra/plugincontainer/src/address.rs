use crate::error::PluginContainerError;
use std::path::{Path, PathBuf};

/// Directory inside the container where the plugin creates its sockets.
pub const PLUGIN_SOCKET_DIR: &str = "/tmp/go-plugin-container";
/// Tells the plugin where to create its sockets.
pub const ENV_UNIX_SOCKET_DIR: &str = "PLUGIN_UNIX_SOCKET_DIR";

const UNIX: &str = "unix";

/// Maps a socket path between two directories that are bind-mounted onto each other.
pub(crate) fn translate(
    network: &str,
    addr: &str,
    from_dir: &Path,
    to_dir: &Path,
) -> Result<(String, String), PluginContainerError> {
    if network != UNIX {
        return Err(PluginContainerError::translation(format!(
            "only the unix network is supported, got {network:?}"
        )));
    }

    let addr = Path::new(addr);
    let (Some(dir), Some(file)) = (addr.parent(), addr.file_name()) else {
        return Err(PluginContainerError::translation(format!("{} is not a socket path", addr.display())));
    };
    if dir != from_dir {
        return Err(PluginContainerError::translation(format!(
            "{} is outside the shared socket directory {}",
            addr.display(),
            from_dir.display()
        )));
    }

    let mapped: PathBuf = to_dir.join(file);
    Ok((UNIX.to_owned(), mapped.to_string_lossy().into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_between_dirs() {
        let host = Path::new("/var/run/keel/plugins/abc");
        let plugin = Path::new(PLUGIN_SOCKET_DIR);

        let (net, addr) = translate("unix", "/tmp/go-plugin-container/plugin123", plugin, host).unwrap();
        assert_eq!(net, "unix");
        assert_eq!(addr, "/var/run/keel/plugins/abc/plugin123");

        let (_, back) = translate("unix", &addr, host, plugin).unwrap();
        assert_eq!(back, "/tmp/go-plugin-container/plugin123");
    }

    #[test]
    fn test_rejections() {
        let host = Path::new("/var/run/keel");
        let plugin = Path::new(PLUGIN_SOCKET_DIR);

        let err = translate("tcp", "127.0.0.1:1234", plugin, host).unwrap_err();
        assert!(err.to_string().contains("only the unix network"));

        let err = translate("unix", "/tmp/elsewhere/sock", plugin, host).unwrap_err();
        assert!(matches!(err, PluginContainerError::AddressTranslation { .. }));

        assert!(translate("unix", "/tmp/go-plugin-container/nested/sock", plugin, host).is_err());
        assert!(translate("unix", "/", plugin, host).is_err());
    }
}
