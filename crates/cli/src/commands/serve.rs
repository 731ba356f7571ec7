//! `docmind serve`: start the HTTP gateway.

use docmind_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("DocMind gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Vector backend: {:?}", config.vector.backend);

    docmind_gateway::start(config).await?;

    Ok(())
}
