//! Periodic run loop.
//!
//! Every tick reloads the bot config, decides whether a run is due and,
//! if so, runs the orchestrator. A tick never overlaps another run, and a
//! failing tick only gets logged.

use super::orchestrator::{RunOrchestrator, RunOutcome};
use crate::config::{BotSettings, ConfigHandle};
use crate::platform::LoginFlow;
use crate::storage::{RunType, StorageError, Store};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Whether a run is due.
///
/// Due means active, logged in and either never run or strictly past
/// `last_run + interval_minutes`.
pub fn gate(
    settings: &BotSettings,
    logged_in: bool,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !settings.is_active || !logged_in {
        return false;
    }

    match last_run {
        None => true,
        Some(last) => next_run_after(last, settings.interval_minutes).is_some_and(|next| now > next),
    }
}

/// `last + interval_minutes`, or `None` when the interval is out of range.
pub fn next_run_after(last: DateTime<Utc>, interval_minutes: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_minutes(interval_minutes).and_then(|interval| last.checked_add_signed(interval))
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NotDue,
    /// Another run was still in progress.
    Busy,
    Ran(RunOutcome),
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    config: ConfigHandle,
    login: Arc<LoginFlow>,
    orchestrator: RunOrchestrator,
    tick_interval: Duration,
    running: AtomicBool,
}

/// Clears the in-progress flag when a run ends, including by panic or cancellation.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        config: ConfigHandle,
        login: Arc<LoginFlow>,
        orchestrator: RunOrchestrator,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            config,
            login,
            orchestrator,
            tick_interval,
            running: AtomicBool::new(false),
        }
    }

    /// Reloads config and evaluates the gate against the store's clock.
    pub async fn is_runnable(&self) -> Result<bool, StorageError> {
        let config = self.config.reload().await?;
        let settings = &config.settings;

        if !settings.is_active {
            return Ok(false);
        }
        if !self.login.is_logged_in().await {
            return Ok(false);
        }

        let last_run = self
            .store
            .last_run_by_type(RunType::Process)
            .await?
            .map(|record| record.created_at);
        let now = self.store.now().await?;

        Ok(gate(settings, true, last_run, now))
    }

    pub async fn tick(&self) -> Result<TickOutcome, StorageError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Previous run still in progress, skipping tick");
            return Ok(TickOutcome::Busy);
        }
        let _guard = RunGuard(&self.running);

        if !self.is_runnable().await? {
            tracing::info!("Bot is not runnable, skipping run");
            return Ok(TickOutcome::NotDue);
        }

        let outcome = self.orchestrator.run_once().await?;
        Ok(TickOutcome::Ran(outcome))
    }

    /// Ticks until `shutdown` fires. The pause is measured from the end of one tick.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(tick = ?self.tick_interval, "Starting scheduler");

        loop {
            match self.tick().await {
                Ok(outcome) => tracing::debug!(?outcome, "Scheduler tick finished"),
                Err(e) => tracing::error!(error = %e, "Scheduler error"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }
}
