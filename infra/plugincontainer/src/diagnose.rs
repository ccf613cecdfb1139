use crate::config::ContainerConfig;
use bollard::Docker;
use std::fmt;
use std::path::Path;

const ROOTLESS_SECURITY_OPTION: &str = "name=rootless";

/// Observed state of the container engine relevant to running one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineFacts {
    /// Set when the engine could not be reached at all.
    pub unreachable: Option<String>,
    pub version: Option<String>,
    pub rootless: bool,
    pub runtimes: Vec<String>,
    /// Id of the local image, `None` when it is not present.
    pub image_id: Option<String>,
    pub socket_dir_mode: Option<u32>,
    pub socket_dir_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub subject: &'static str,
    pub detail: String,
}

/// Result of [`evaluate`], rendered with `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub image: String,
    pub findings: Vec<Finding>,
}

impl Diagnosis {
    /// Worst severity among the findings.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.findings.iter().map(|f| f.severity).max().unwrap_or(Severity::Ok)
    }

    fn push(&mut self, severity: Severity, subject: &'static str, detail: impl Into<String>) {
        self.findings.push(Finding { severity, subject, detail: detail.into() });
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plugin container diagnostics for {}", self.image)?;
        for finding in &self.findings {
            let tag = match finding.severity {
                Severity::Ok => "[ok]  ",
                Severity::Warn => "[warn]",
                Severity::Fail => "[fail]",
            };
            writeln!(f, "  {tag} {}: {}", finding.subject, finding.detail)?;
        }
        Ok(())
    }
}

/// Turns raw engine facts into findings with operator hints.
#[must_use]
pub fn evaluate(config: &ContainerConfig, socket_dir: &Path, facts: &EngineFacts) -> Diagnosis {
    let mut d = Diagnosis { image: config.image_ref(), findings: Vec::new() };

    if let Some(err) = &facts.unreachable {
        d.push(
            Severity::Fail,
            "engine",
            format!("cannot reach the container engine ({err}); check DOCKER_HOST and that the daemon is running"),
        );
        return d;
    }
    d.push(
        Severity::Ok,
        "engine",
        format!("reachable, version {}", facts.version.as_deref().unwrap_or("unknown")),
    );

    match (facts.rootless, config.rootless) {
        (true, false) => d.push(
            Severity::Warn,
            "rootless",
            "engine is rootless but the plugin is configured for a rootful engine; enable rootless so socket access uses DAC_OVERRIDE",
        ),
        (false, true) => d.push(
            Severity::Warn,
            "rootless",
            "plugin is configured for a rootless engine but the engine runs as root; use group_add instead",
        ),
        (rootless, _) => d.push(
            Severity::Ok,
            "rootless",
            if rootless { "rootless engine detected and configured" } else { "rootful engine" },
        ),
    }

    if let Some(runtime) = &config.runtime {
        if facts.runtimes.iter().any(|r| r == runtime) {
            d.push(Severity::Ok, "runtime", format!("{runtime} is available"));
        } else {
            d.push(
                Severity::Fail,
                "runtime",
                format!("{runtime} is not registered with the engine (available: {})", facts.runtimes.join(", ")),
            );
        }
    }

    match (&facts.image_id, &config.sha256) {
        (None, _) => d.push(
            Severity::Fail,
            "image",
            format!("{} is not present locally; pull it before starting the plugin", config.image_ref()),
        ),
        (Some(id), Some(sha)) if id.strip_prefix("sha256:") != Some(sha.as_str()) => d.push(
            Severity::Fail,
            "image",
            format!("local image id {id} does not match the pinned sha256:{sha}; re-pull or update the pin"),
        ),
        (Some(id), _) => d.push(Severity::Ok, "image", format!("present as {id}")),
    }

    let dir = socket_dir.display();
    match (&facts.socket_dir_error, facts.socket_dir_mode) {
        (Some(err), _) => d.push(Severity::Fail, "socket dir", format!("{dir} is not usable: {err}")),
        (None, Some(mode)) if config.group_add.is_some() && mode & 0o060 != 0o060 => d.push(
            Severity::Warn,
            "socket dir",
            format!("{dir} has mode {mode:o}; the plugin group needs read and write access"),
        ),
        (None, Some(mode)) if !config.rootless && config.group_add.is_none() && mode & 0o006 != 0o006 => d.push(
            Severity::Warn,
            "socket dir",
            format!("{dir} has mode {mode:o}; grant access with group_add or the plugin cannot create its socket"),
        ),
        (None, mode) => d.push(
            Severity::Ok,
            "socket dir",
            mode.map_or_else(|| format!("{dir} exists"), |m| format!("{dir} has mode {m:o}")),
        ),
    }

    d
}

/// Queries the engine and the filesystem for [`EngineFacts`]. Never fails; problems are
/// recorded in the facts.
pub async fn gather(docker: &Docker, config: &ContainerConfig, socket_dir: &Path) -> EngineFacts {
    let mut facts = EngineFacts::default();

    match docker.version().await {
        Ok(version) => facts.version = version.version,
        Err(e) => {
            facts.unreachable = Some(e.to_string());
            return facts;
        },
    }

    if let Ok(info) = docker.info().await {
        facts.rootless = info
            .security_options
            .unwrap_or_default()
            .iter()
            .any(|opt| opt.contains(ROOTLESS_SECURITY_OPTION));
        let mut runtimes: Vec<String> = info.runtimes.unwrap_or_default().into_keys().collect();
        runtimes.sort();
        facts.runtimes = runtimes;
    }

    facts.image_id = docker.inspect_image(&config.image_ref()).await.ok().and_then(|image| image.id);

    match tokio::fs::metadata(socket_dir).await {
        Ok(meta) if meta.is_dir() => facts.socket_dir_mode = dir_mode(&meta),
        Ok(_) => facts.socket_dir_error = Some("not a directory".to_owned()),
        Err(e) => facts.socket_dir_error = Some(e.to_string()),
    }

    facts
}

#[cfg(unix)]
fn dir_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn dir_mode(_meta: &std::fs::Metadata) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn healthy() -> EngineFacts {
        EngineFacts {
            version: Some("27.3.1".into()),
            runtimes: vec!["runc".into(), "runsc".into()],
            image_id: Some(format!("sha256:{SHA}")),
            socket_dir_mode: Some(0o770),
            ..EngineFacts::default()
        }
    }

    fn config() -> ContainerConfig {
        ContainerConfig::builder().image("keel/plugin").sha256(SHA).runtime("runsc").group_add(2000).build().unwrap()
    }

    #[test]
    fn test_healthy_engine() {
        let d = evaluate(&config(), Path::new("/run/keel"), &healthy());
        assert_eq!(d.severity(), Severity::Ok);
        assert_eq!(d.findings.len(), 5);
        let text = d.to_string();
        assert!(text.starts_with("Plugin container diagnostics for keel/plugin\n"));
        assert!(text.contains("[ok]   runtime: runsc is available"));
    }

    #[test]
    fn test_unreachable_engine_stops_early() {
        let facts = EngineFacts { unreachable: Some("connection refused".into()), ..EngineFacts::default() };
        let d = evaluate(&config(), Path::new("/run/keel"), &facts);
        assert_eq!(d.findings.len(), 1);
        assert_eq!(d.severity(), Severity::Fail);
        assert!(d.to_string().contains("DOCKER_HOST"));
    }

    #[test]
    fn test_problems_are_reported() {
        let facts = EngineFacts {
            rootless: true,
            runtimes: vec!["runc".into()],
            image_id: Some("sha256:ffff".into()),
            socket_dir_mode: Some(0o700),
            ..healthy()
        };
        let d = evaluate(&config(), Path::new("/run/keel"), &facts);
        let by_subject = |s: &str| d.findings.iter().find(|f| f.subject == s).unwrap().severity;

        assert_eq!(by_subject("rootless"), Severity::Warn);
        assert_eq!(by_subject("runtime"), Severity::Fail);
        assert_eq!(by_subject("image"), Severity::Fail);
        assert_eq!(by_subject("socket dir"), Severity::Warn);
        assert!(d.to_string().contains("does not match the pinned sha256"));
    }

    #[test]
    fn test_missing_image_and_dir() {
        let facts = EngineFacts { image_id: None, socket_dir_error: Some("No such file".into()), ..healthy() };
        let d = evaluate(&config(), Path::new("/missing"), &facts);
        let text = d.to_string();
        assert!(text.contains("[fail] image: keel/plugin is not present locally"));
        assert!(text.contains("[fail] socket dir: /missing is not usable"));
    }
}
