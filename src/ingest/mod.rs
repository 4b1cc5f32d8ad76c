pub mod channel;
pub mod orchestrator;
pub mod scheduler;

pub use channel::{ChannelIngestor, ChannelReport, IngestSettings, MediaCluster, PublishOutcome};
pub use orchestrator::{RunOrchestrator, RunOutcome};
pub use scheduler::{gate, Scheduler, TickOutcome};
