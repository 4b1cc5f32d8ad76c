use super::channel::{ChannelIngestor, ChannelReport, IngestSettings};
use crate::config::{BotConfig, ConfigHandle};
use crate::platform::{Credentials, PlatformError, PlatformSession, SessionFactory};
use crate::pricing::{PriceResolver, TextGenerator};
use crate::storage::{NewRunRecord, RunType, StorageError, Store};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The bot is switched off; nothing was touched.
    Inactive,
    Completed(Vec<ChannelReport>),
    Failed(String),
}

/// Runs one pass over every configured source channel.
pub struct RunOrchestrator {
    store: Arc<dyn Store>,
    config: ConfigHandle,
    sessions: Arc<dyn SessionFactory>,
    generator: Arc<dyn TextGenerator>,
    settings: IngestSettings,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        config: ConfigHandle,
        sessions: Arc<dyn SessionFactory>,
        generator: Arc<dyn TextGenerator>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            config,
            sessions,
            generator,
            settings,
        }
    }

    /// Processes channels sequentially and appends one run record.
    ///
    /// Only a failure to write that record is returned as an error.
    pub async fn run_once(&self) -> Result<RunOutcome, StorageError> {
        let config = self.config.current().await?;
        let settings = &config.settings;

        if !settings.is_active {
            tracing::info!("Bot is not active, skipping run");
            return Ok(RunOutcome::Inactive);
        }

        match self.run_channels(&config).await {
            Ok(reports) => {
                let message = format!(
                    "Scheduled run completed. Processed channels: {}",
                    settings.source_channels.join(", ")
                );
                self.store
                    .append_run_record(&NewRunRecord::success(RunType::Process, message))
                    .await?;
                tracing::info!(channels = reports.len(), "Scheduled run completed successfully");
                Ok(RunOutcome::Completed(reports))
            }
            Err(e) => {
                let message = format!("Scheduled run failed: {}", e);
                // Failed runs do not count toward the schedule interval
                self.store
                    .append_run_record(&NewRunRecord::error(RunType::Info, message.clone()))
                    .await?;
                tracing::error!(error = %e, "Scheduled run failed");
                Ok(RunOutcome::Failed(message))
            }
        }
    }

    async fn run_channels(&self, config: &BotConfig) -> Result<Vec<ChannelReport>, PlatformError> {
        let session = self.sessions.open(&Credentials::from(&config.settings))?;

        let result = match session.connect().await {
            Ok(()) => Ok(self.process_all(session.as_ref(), config).await),
            Err(e) => Err(e),
        };

        if let Err(e) = session.disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect platform session");
        }
        result
    }

    async fn process_all(&self, session: &dyn PlatformSession, config: &BotConfig) -> Vec<ChannelReport> {
        let settings = &config.settings;
        let resolver = PriceResolver::new(
            self.generator.clone(),
            settings.gemini_api_key.clone(),
            settings.add_fee,
        );
        let ingestor = ChannelIngestor::new(
            self.store.clone(),
            resolver,
            settings.target_channel.clone(),
            self.settings,
        );

        let mut reports = Vec::with_capacity(settings.source_channels.len());
        for channel in &settings.source_channels {
            reports.push(ingestor.process_channel(session, channel).await);
        }
        reports
    }
}
