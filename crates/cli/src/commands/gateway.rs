//! `eliza gateway`: start the HTTP API server.

use eliza_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
        config.validate()?;
    }

    println!("ELIZA Gateway");
    println!("   Listening: {}", config.bind_address());
    println!("   Sessions:  {} ({})", config.sessions.backend, config.sessions_dir().display());
    println!("   Endpoint:  POST /v1/chat/completions");

    eliza_gateway::start(config).await?;

    Ok(())
}
