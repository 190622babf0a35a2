//! `eliza status`: show configuration and stored sessions.

use eliza_config::{AppConfig, SessionBackend};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let script = config
        .engine
        .script
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in DOCTOR".into());

    println!("ELIZA Status");
    println!("============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Gateway:      {}", config.bind_address());
    println!("  Timeout:      {}s", config.gateway.request_timeout_secs);
    println!("  Script:       {script}");
    println!("  Packs:        {}", config.engine.builtin_packs.join(", "));
    for pack in &config.engine.packs {
        println!("                {}", pack.display());
    }
    println!("  Memory:       {} deferred replies", config.engine.memory_capacity);
    println!("  Sessions:     {}", config.sessions.backend);
    println!("  Expiry:       {}h", config.sessions.max_age_hours);

    if config.sessions.backend == SessionBackend::File {
        let store = eliza_gateway::open_store(&config);
        let sessions = store.list().await?;
        let newest = sessions.iter().map(|s| s.updated_at).max();
        println!("  Session dir:  {}", config.sessions_dir().display());
        println!("  Stored:       {} session(s)", sessions.len());
        if let Some(at) = newest {
            println!("  Last write:   {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, run `eliza onboard` first");
    }

    Ok(())
}
