//! Background purge of old one-time codes and expired sessions.
//!
//! Verification never depends on this task: expiry is enforced lazily when
//! a code is submitted or a session is looked up. The sweeper only keeps
//! the tables small.

use chrono::Duration as ChronoDuration;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::gate::clock::Clock;
use crate::store::{CodeRepository, SessionStore, StoreError};

const DEFAULT_RETENTION_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SweeperConfig {
    interval: Duration,
    retention: Duration,
}

impl SweeperConfig {
    /// Disabled sweeper with a one-day retention window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::ZERO,
            retention: Duration::from_secs(DEFAULT_RETENTION_SECONDS),
        }
    }

    /// Zero disables the sweeper.
    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_retention_seconds(mut self, seconds: u64) -> Self {
        self.retention = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn retention(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.retention).unwrap_or(ChronoDuration::MAX)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows removed by one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Swept {
    pub codes: u64,
    pub sessions: u64,
}

/// Delete codes that expired more than `retention` ago and sessions that
/// are already past their expiry. Used codes expire like any other, so they
/// are removed on the same schedule.
pub async fn sweep_once(
    codes: &dyn CodeRepository,
    sessions: &dyn SessionStore,
    clock: &dyn Clock,
    config: &SweeperConfig,
) -> Result<Swept, StoreError> {
    let now = clock.now();
    let cutoff = now
        .checked_sub_signed(config.retention())
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
    Ok(Swept {
        codes: codes.purge_expired(cutoff).await?,
        sessions: sessions.purge_expired(now).await?,
    })
}

/// Spawn the sweeper loop. Returns `None` when disabled.
pub fn spawn_sweeper(
    codes: Arc<dyn CodeRepository>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
) -> Option<tokio::task::JoinHandle<()>> {
    if !config.enabled() {
        debug!("sweeper disabled");
        return None;
    }

    info!(interval = ?config.interval(), "starting sweeper");
    Some(tokio::spawn(async move {
        loop {
            sleep(config.interval()).await;
            match sweep_once(codes.as_ref(), sessions.as_ref(), clock.as_ref(), &config).await {
                Ok(Swept {
                    codes: 0,
                    sessions: 0,
                }) => {}
                Ok(swept) => info!(
                    codes = swept.codes,
                    sessions = swept.sessions,
                    "purged expired records"
                ),
                Err(err) => error!("sweep failed: {err}"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::clock::ManualClock;
    use crate::gate::models::{OneTimeCode, Principal, PrincipalId};
    use crate::store::memory::{MemoryCodeRepository, MemorySessionStore};
    use anyhow::Context;
    use chrono::Utc;

    fn code(
        owner: &PrincipalId,
        digits: &str,
        at: chrono::DateTime<Utc>,
    ) -> anyhow::Result<OneTimeCode> {
        OneTimeCode::new(owner.clone(), digits.to_string(), at, ChronoDuration::minutes(5))
            .context("code expiry out of range")
    }

    #[tokio::test]
    async fn sweep_keeps_codes_inside_retention() -> anyhow::Result<()> {
        let clock = ManualClock::new(Utc::now());
        let repo = MemoryCodeRepository::new();
        let sessions = MemorySessionStore::new();
        let owner = PrincipalId::new("uid-1");

        repo.insert(&code(&owner, "000001", clock.now() - ChronoDuration::hours(3))?)
            .await?;
        repo.insert(&code(&owner, "000002", clock.now() - ChronoDuration::minutes(30))?)
            .await?;

        let config = SweeperConfig::new().with_retention_seconds(60 * 60);
        let swept = sweep_once(&repo, &sessions, &clock, &config).await?;
        assert_eq!(swept.codes, 1);

        let left = repo.records().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].code, "000002");
        Ok(())
    }

    #[tokio::test]
    async fn sweep_drops_sessions_that_were_never_used_again() -> anyhow::Result<()> {
        let clock = ManualClock::new(Utc::now());
        let repo = MemoryCodeRepository::new();
        let sessions = MemorySessionStore::new();
        let principal = Principal {
            id: PrincipalId::new("uid-1"),
            email: "owner@example.com".to_string(),
        };

        for _ in 0..3 {
            sessions
                .create(&principal, clock.now() + ChronoDuration::hours(1))
                .await?;
        }
        let live = sessions
            .create(&principal, clock.now() + ChronoDuration::days(2))
            .await?;

        clock.advance(ChronoDuration::hours(2));
        let config = SweeperConfig::new();
        let swept = sweep_once(&repo, &sessions, &clock, &config).await?;
        assert_eq!(
            swept,
            Swept {
                codes: 0,
                sessions: 3
            }
        );
        assert_eq!(sessions.len().await, 1);
        assert!(sessions.lookup(&live, clock.now()).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_sweeper_does_not_spawn() {
        let handle = spawn_sweeper(
            Arc::new(MemoryCodeRepository::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(ManualClock::new(Utc::now())),
            SweeperConfig::new(),
        );
        assert!(handle.is_none());
        assert!(SweeperConfig::new().with_interval_seconds(60).enabled());
    }
}
