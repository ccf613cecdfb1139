use crate::address::{ENV_UNIX_SOCKET_DIR, PLUGIN_SOCKET_DIR};
use crate::config::ContainerConfig;
use bollard::container::Config;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use std::collections::HashMap;
use std::path::Path;

const CAP_DAC_OVERRIDE: &str = "DAC_OVERRIDE";
const NO_NEW_PRIVILEGES: &str = "no-new-privileges";

/// Assembles the engine create request for one plugin run.
///
/// Environment order is the socket directory, then `plugin_env` from the caller, then
/// the configured entries, so configuration wins on duplicates.
pub(crate) fn container_spec(config: &ContainerConfig, host_socket_dir: &Path, plugin_env: &[String]) -> Config<String> {
    let mut env = Vec::with_capacity(1 + plugin_env.len() + config.env.len());
    env.push(format!("{ENV_UNIX_SOCKET_DIR}={PLUGIN_SOCKET_DIR}"));
    env.extend(plugin_env.iter().cloned());
    env.extend(config.env.iter().cloned());

    let mount = Mount {
        target: Some(PLUGIN_SOCKET_DIR.to_owned()),
        source: Some(host_socket_dir.to_string_lossy().into_owned()),
        typ: Some(MountTypeEnum::BIND),
        read_only: Some(false),
        ..Default::default()
    };

    let (group_add, cap_add) = if config.rootless {
        (None, Some(vec![CAP_DAC_OVERRIDE.to_owned()]))
    } else {
        (config.group_add.map(|gid| vec![gid.to_string()]), None)
    };

    let host_config = HostConfig {
        mounts: Some(vec![mount]),
        readonly_rootfs: Some(true),
        security_opt: Some(vec![NO_NEW_PRIVILEGES.to_owned()]),
        network_mode: (!config.network).then(|| "none".to_owned()),
        runtime: config.runtime.clone(),
        cgroup_parent: config.cgroup_parent.clone(),
        nano_cpus: config.nano_cpus,
        memory: config.memory,
        group_add,
        cap_add,
        auto_remove: Some(!config.debug),
        ..Default::default()
    };

    let labels: HashMap<String, String> = config.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    Config {
        image: Some(config.image_ref()),
        env: Some(env),
        entrypoint: (!config.entrypoint.is_empty()).then(|| config.entrypoint.clone()),
        cmd: (!config.args.is_empty()).then(|| config.args.clone()),
        labels: (!labels.is_empty()).then_some(labels),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        network_disabled: Some(!config.network),
        host_config: Some(host_config),
        ..Default::default()
    }
}
