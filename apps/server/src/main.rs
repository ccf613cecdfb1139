use anyhow::Context;
use keel_logger::Logger;
use keel_server::{Server, load_settings};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = load_settings(settings_path.as_deref()).context("Critical: server settings are malformed")?;
    let config = keel_server::load_shared_config(&settings.config_path)?;

    let builder = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .log_level(config.log_level.as_deref().unwrap_or_default())?
        .log_format(config.log_format.as_deref().unwrap_or_default())?;
    let _log = match &settings.log_dir {
        Some(dir) => builder.path(dir).init()?,
        None => builder.init()?,
    };

    Server::builder().settings(settings).config(config).build()?.run().await
}
