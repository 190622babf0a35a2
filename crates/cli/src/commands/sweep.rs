//! `eliza sweep`: expire idle sessions once.

use eliza_config::AppConfig;
use eliza_sessions::SessionSweeper;

pub async fn run(max_age_override: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(hours) = max_age_override {
        config.sessions.max_age_hours = hours;
        config.validate()?;
    }

    let store = eliza_gateway::open_store(&config);
    let sweeper = SessionSweeper::from_hours(
        store.clone(),
        config.sessions.max_age_hours,
        config.sessions.sweep_interval_minutes,
    );
    let removed = sweeper.sweep_once().await?;
    let remaining = store.list().await?.len();

    println!(
        "Removed {removed} session(s) idle for more than {}h; {remaining} remain.",
        config.sessions.max_age_hours
    );
    Ok(())
}
