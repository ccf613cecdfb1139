use crate::error::{ListenerError, ListenerErrorExt};
use keel_configutil::Listener;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;
use tokio::net::UnixListener;
use tracing::info;

/// Mode and ownership applied to a freshly bound socket file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnixSocketOptions {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl UnixSocketOptions {
    /// Reads `socket_mode` (octal), `socket_user` and `socket_group` (numeric ids).
    ///
    /// # Errors
    /// Returns [`ListenerError::InvalidValue`] when a value does not parse.
    pub fn from_listener(listener: &Listener) -> Result<Self, ListenerError> {
        let mode = listener
            .socket_mode
            .as_deref()
            .map(|raw| {
                u32::from_str_radix(raw.trim(), 8)
                    .map_err(|_| ListenerError::invalid("socket_mode", format!("{raw:?} is not an octal mode")))
            })
            .transpose()?;
        let uid = parse_id("socket_user", listener.socket_user.as_deref())?;
        let gid = parse_id("socket_group", listener.socket_group.as_deref())?;
        Ok(Self { mode, uid, gid })
    }
}

fn parse_id(key: &'static str, raw: Option<&str>) -> Result<Option<u32>, ListenerError> {
    raw.map(|raw| {
        raw.trim()
            .parse::<u32>()
            .map_err(|_| ListenerError::invalid(key, format!("{raw:?} must be a numeric id")))
    })
    .transpose()
}

/// Binds a unix listener at `path`, replacing a stale socket left by a previous run.
///
/// A non-socket file at `path` is never removed.
///
/// # Errors
/// Returns [`ListenerError::Io`] if the socket cannot be bound or its mode or owner
/// cannot be changed.
pub fn bind_unix_listener(path: impl AsRef<Path>, opts: &UnixSocketOptions) -> Result<UnixListener, ListenerError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path).context(format!("Failed to remove stale socket {shown}"))?;
        },
        Ok(_) => {
            return Err(ListenerError::invalid(shown, "path exists and is not a socket"));
        },
        Err(_) => {},
    }

    let listener = UnixListener::bind(path).context(format!("Failed to bind {shown}"))?;

    if let Some(mode) = opts.mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .context(format!("Failed to set mode on {shown}"))?;
    }
    if opts.uid.is_some() || opts.gid.is_some() {
        std::os::unix::fs::chown(path, opts.uid, opts.gid).context(format!("Failed to change owner of {shown}"))?;
    }

    info!(path = %shown, mode = ?opts.mode.map(|m| format!("{m:o}")), "Unix listener bound");
    Ok(listener)
}
