use crate::config::bot::BotConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Watermark value for a channel that has never been processed.
pub const NO_WATERMARK: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "success" => Ok(RunStatus::Success),
            "error" => Ok(RunStatus::Error),
            other => Err(StorageError::InvalidData(format!("unknown run status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// A scheduled ingestion run. The scheduler measures its interval from these.
    Process,
    Info,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Process => "process",
            RunType::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "process" => Ok(RunType::Process),
            "info" => Ok(RunType::Info),
            other => Err(StorageError::InvalidData(format!("unknown run type '{}'", other))),
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run history entry about to be appended. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRunRecord {
    pub status: RunStatus,
    pub run_type: RunType,
    pub message: String,
}

impl NewRunRecord {
    pub fn success(run_type: RunType, message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            run_type,
            message: message.into(),
        }
    }

    pub fn error(run_type: RunType, message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            run_type,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub status: RunStatus,
    #[serde(rename = "type")]
    pub run_type: RunType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

/// Durable state shared by the scheduler and the HTTP API.
///
/// Every method is a single atomic operation; callers never hold a
/// transaction across calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Raw config rows, values JSON-encoded.
    async fn config_entries(&self) -> Result<HashMap<String, String>, StorageError>;

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Upserts all given rows in one transaction.
    async fn replace_config(&self, entries: &[(String, String)]) -> Result<(), StorageError>;

    async fn is_config_empty(&self) -> Result<bool, StorageError>;

    /// Last processed message id for `channel`, or [`NO_WATERMARK`].
    async fn get_watermark(&self, channel: &str) -> Result<i64, StorageError>;

    /// Stores `message_id` for `channel` unless the stored value is already higher.
    async fn set_watermark(&self, channel: &str, message_id: i64) -> Result<(), StorageError>;

    async fn append_run_record(&self, record: &NewRunRecord) -> Result<(), StorageError>;

    /// Most recent records first.
    async fn run_history(&self, limit: usize) -> Result<Vec<RunRecord>, StorageError>;

    async fn last_run_by_type(&self, run_type: RunType) -> Result<Option<RunRecord>, StorageError>;

    /// Current time according to the database clock.
    async fn now(&self) -> Result<DateTime<Utc>, StorageError>;

    /// Clears history, watermarks and login codes. Config rows are untouched.
    async fn reset_except_config(&self) -> Result<(), StorageError>;

    async fn save_login_code_hash(&self, hash: &str) -> Result<(), StorageError>;

    async fn login_code_hash(&self) -> Result<Option<String>, StorageError>;

    async fn clear_login_code_hash(&self) -> Result<(), StorageError>;

    async fn get_config(&self) -> Result<BotConfig, StorageError> {
        let entries = self.config_entries().await?;
        BotConfig::from_entries(&entries)
    }
}
