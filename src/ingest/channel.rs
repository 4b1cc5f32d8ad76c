//! Per-channel ingestion pass.
//!
//! Fetches messages newer than the channel's watermark, groups media with
//! the price caption that follows it, republishes each group to the target
//! channel and advances the watermark past everything fetched.

use crate::platform::{MediaRef, PlatformError, PlatformSession, RawMessage};
use crate::pricing::classifier::closes_cluster;
use crate::pricing::PriceResolver;
use crate::storage::{StorageError, Store, NO_WATERMARK};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub publish_delay: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            publish_delay: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::types::SchedulerConfig> for IngestSettings {
    fn from(config: &crate::config::types::SchedulerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            publish_delay: config.publish_delay,
        }
    }
}

/// Messages collected since the last cluster boundary.
#[derive(Debug, Default)]
pub struct MediaCluster {
    messages: Vec<RawMessage>,
}

impl MediaCluster {
    pub fn push(&mut self, message: RawMessage) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Empties the cluster, returning what it held.
    pub fn take(&mut self) -> MediaCluster {
        std::mem::take(self)
    }

    /// Splits off the closing caption message from the media before it.
    fn into_caption_and_media(mut self) -> Option<(RawMessage, Vec<MediaRef>)> {
        let caption = self.messages.pop()?;
        let media = self
            .messages
            .into_iter()
            .flat_map(|message| message.media)
            .collect();
        Some((caption, media))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    Failed,
    /// Empty cluster or a caption with no usable price text.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelReport {
    pub channel: String,
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Unterminated media messages left at the end of the fetch.
    pub dropped: usize,
    /// The new watermark, when it moved.
    pub watermark: Option<i64>,
    pub error: Option<String>,
}

impl ChannelReport {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::Sent => self.sent += 1,
            PublishOutcome::Failed => self.failed += 1,
            PublishOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct ChannelIngestor {
    store: Arc<dyn Store>,
    resolver: PriceResolver,
    target_channel: String,
    settings: IngestSettings,
}

impl ChannelIngestor {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: PriceResolver,
        target_channel: impl Into<String>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            target_channel: target_channel.into(),
            settings,
        }
    }

    /// Runs one pass over `channel`. Failures are logged and reported, never returned.
    pub async fn process_channel(&self, session: &dyn PlatformSession, channel: &str) -> ChannelReport {
        tracing::info!(channel, "Processing channel");
        let mut report = ChannelReport::new(channel);

        match self.ingest(session, channel, &mut report).await {
            Ok(()) => {
                tracing::info!(
                    channel,
                    fetched = report.fetched,
                    sent = report.sent,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Finished processing channel"
                );
            }
            Err(e) => {
                tracing::error!(channel, error = %e, "Error processing channel");
                report.error = Some(e.to_string());
            }
        }

        report
    }

    async fn ingest(
        &self,
        session: &dyn PlatformSession,
        channel: &str,
        report: &mut ChannelReport,
    ) -> Result<(), IngestError> {
        let watermark = self.store.get_watermark(channel).await?;
        let min_id = (watermark != NO_WATERMARK).then_some(watermark);

        let messages = session
            .fetch_messages(channel, min_id, self.settings.batch_size)
            .await?;
        report.fetched = messages.len();

        if messages.is_empty() {
            tracing::info!(channel, "No new messages");
            return Ok(());
        }

        let mut newest = watermark;
        let mut media_seen = false;
        let mut cluster = MediaCluster::default();

        for message in messages {
            newest = newest.max(message.id);

            // Nothing counts until the first media message of this fetch
            if !media_seen && !message.has_media() {
                continue;
            }
            media_seen = true;

            if closes_cluster(&message) {
                cluster.push(message);
                let outcome = self.publish_cluster(session, cluster.take()).await;
                report.record(outcome);
            } else if message.has_media() {
                cluster.push(message);
            }
        }

        if !cluster.is_empty() {
            tracing::debug!(channel, dropped = cluster.len(), "Dropping media without a price caption");
            report.dropped = cluster.len();
        }

        if newest > watermark {
            self.store.set_watermark(channel, newest).await?;
            report.watermark = Some(newest);
        }

        Ok(())
    }

    /// Publishes a cluster as one message: the resolved caption plus the media before it.
    ///
    /// Every attempted send is followed by the configured publish delay.
    pub async fn publish_cluster(
        &self,
        session: &dyn PlatformSession,
        cluster: MediaCluster,
    ) -> PublishOutcome {
        let Some((caption, media)) = cluster.into_caption_and_media() else {
            return PublishOutcome::Skipped;
        };

        let Some(text) = self.resolver.resolve_caption(caption.text.as_deref()).await else {
            tracing::debug!(message_id = caption.id, "Caption has no usable price, skipping");
            return PublishOutcome::Skipped;
        };

        let outcome = match session.send_message(&self.target_channel, &text, &media).await {
            Ok(()) => {
                tracing::info!(
                    target_channel = %self.target_channel,
                    media = media.len(),
                    "Sent message group"
                );
                PublishOutcome::Sent
            }
            Err(e) => {
                tracing::error!(
                    target_channel = %self.target_channel,
                    error = %e,
                    "Error sending message"
                );
                PublishOutcome::Failed
            }
        };

        tokio::time::sleep(self.settings.publish_delay).await;
        outcome
    }
}
