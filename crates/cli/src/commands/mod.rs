pub mod chat;
pub mod ingest;
pub mod init;
pub mod serve;
pub mod settings;

use docmind_agent::Services;
use docmind_config::AppConfig;

/// Load config and wire the services every command shares.
pub(crate) async fn load_services() -> Result<(AppConfig, Services), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let services = Services::from_config(&config)
        .await
        .map_err(|e| format!("Failed to start services: {e}"))?;
    Ok((config, services))
}
