use super::bot::BotConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Process-level configuration loaded from the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub web: WebConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub text_generation: TextGenerationConfig,
    pub platform: PlatformConfig,
    /// Seed values for the stored bot config, written once on an empty store.
    #[serde(default)]
    pub defaults: BotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub listen: String,
    /// Directory of a built frontend to serve at `/`.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between the end of one tick and the start of the next.
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,
    /// Pause after every cluster publish.
    #[serde(default = "default_publish_delay", with = "humantime_serde")]
    pub publish_delay: Duration,
    /// Messages fetched per channel per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            publish_delay: default_publish_delay(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_tick() -> Duration {
    Duration::from_secs(60)
}

fn default_publish_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_batch_size() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationConfig {
    #[serde(default = "default_text_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for TextGenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_text_generation_endpoint(),
            timeout: default_request_timeout(),
        }
    }
}

fn default_text_generation_endpoint() -> String {
    crate::pricing::gemini::GEMINI_ENDPOINT.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the chat-platform bridge.
    pub url: String,
    #[serde(default = "default_session_name")]
    pub session: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// How long a requested login code blocks a new request.
    #[serde(default = "default_login_code_ttl", with = "humantime_serde")]
    pub login_code_ttl: Duration,
}

fn default_session_name() -> String {
    "message_bot".to_string()
}

fn default_login_code_ttl() -> Duration {
    Duration::from_secs(300)
}
