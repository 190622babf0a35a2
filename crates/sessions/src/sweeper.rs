//! Background expiry of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eliza_core::{SessionError, SessionStore};
use tracing::{debug, info, warn};

/// Periodically deletes sessions that have not been written for `max_age`.
pub struct SessionSweeper {
    store: Arc<dyn SessionStore>,
    max_age: Duration,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<dyn SessionStore>, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            max_age,
            interval,
        }
    }

    /// Build from the `[sessions]` config values (hours, minutes).
    pub fn from_hours(store: Arc<dyn SessionStore>, max_age_hours: u64, interval_minutes: u64) -> Self {
        Self::new(
            store,
            Duration::from_secs(max_age_hours.saturating_mul(3600)),
            Duration::from_secs(interval_minutes.max(1).saturating_mul(60)),
        )
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single sweep. Returns the number of sessions removed.
    pub async fn sweep_once(&self) -> Result<usize, SessionError> {
        let Ok(age) = chrono::Duration::from_std(self.max_age) else {
            return Ok(0);
        };
        // An age reaching past the epoch expires nothing
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return Ok(0);
        };

        let removed = self.store.purge_older_than(cutoff).await?;
        if removed > 0 {
            info!(store = self.store.name(), removed, "Expired idle sessions");
        } else {
            debug!(store = self.store.name(), "Session sweep found nothing to expire");
        }
        Ok(removed)
    }

    /// Start the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately. Storage errors are logged and the
    /// loop keeps going; abort the returned handle to stop it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        info!(
            store = self.store.name(),
            max_age_secs = self.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Session sweeper started"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep_once().await {
                    warn!(error = %e, "Session sweep failed");
                }
            }
        })
    }
}
