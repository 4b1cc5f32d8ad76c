//! Runtime bot configuration.
//!
//! Stored as key/value rows in the store's `config` table with JSON-encoded
//! values, and read back as an immutable [`BotConfig`] snapshot.

use crate::storage::{Store, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub admin_password: String,
    #[serde(flatten)]
    pub settings: BotSettings,
}

/// The part of the bot configuration exposed through the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub api_id: i64,
    pub api_hash: String,
    pub phone_number: String,
    pub source_channels: Vec<String>,
    pub target_channel: String,
    pub add_fee: i64,
    pub gemini_api_key: String,
    pub is_active: bool,
    pub interval_minutes: i64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            phone_number: String::new(),
            source_channels: Vec::new(),
            target_channel: String::new(),
            add_fee: 0,
            gemini_api_key: String::new(),
            is_active: true,
            interval_minutes: 60,
        }
    }
}

impl BotConfig {
    /// Builds a snapshot from stored rows, falling back to defaults for missing keys.
    ///
    /// Values that are not valid JSON are taken as raw strings. A value whose
    /// default is a string is kept as its raw text even when it parses as
    /// another JSON type, so `905551112233` stays a phone number string.
    pub fn from_entries(entries: &HashMap<String, String>) -> Result<Self, StorageError> {
        let mut merged = match serde_json::to_value(BotConfig::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        for (key, raw) in entries {
            let Some(default) = merged.get(key) else {
                continue;
            };

            let decoded = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            let value = match (default, decoded) {
                (Value::String(_), Value::String(s)) => Value::String(s),
                (Value::String(_), _) => Value::String(raw.clone()),
                (_, other) => other,
            };
            merged.insert(key.clone(), value);
        }

        serde_json::from_value(Value::Object(merged))
            .map_err(|e| StorageError::InvalidData(format!("invalid bot config: {}", e)))
    }

    /// JSON-encoded rows for every field, ready for [`Store::replace_config`].
    pub fn to_entries(&self) -> Result<Vec<(String, String)>, StorageError> {
        value_to_entries(serde_json::to_value(self)?)
    }
}

impl BotSettings {
    pub fn to_entries(&self) -> Result<Vec<(String, String)>, StorageError> {
        value_to_entries(serde_json::to_value(self)?)
    }
}

fn value_to_entries(value: Value) -> Result<Vec<(String, String)>, StorageError> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::to_string(&value)?)))
            .collect(),
        other => Err(StorageError::InvalidData(format!(
            "expected config object, got {}",
            other
        ))),
    }
}

/// Writes `defaults` into the store when the config table is empty.
///
/// Returns whether anything was written.
pub async fn seed_defaults(store: &dyn Store, defaults: &BotConfig) -> Result<bool, StorageError> {
    if !store.is_config_empty().await? {
        tracing::info!("Config table already has data, skipping default initialization");
        return Ok(false);
    }

    tracing::info!("Initializing default configuration");
    store.replace_config(&defaults.to_entries()?).await?;
    Ok(true)
}

/// Cached view of the stored bot config.
///
/// `reload` always reads the store and swaps in a fresh snapshot; readers
/// holding an older `Arc<BotConfig>` keep seeing a consistent value.
#[derive(Clone)]
pub struct ConfigHandle {
    store: Arc<dyn Store>,
    cached: Arc<RwLock<Option<Arc<BotConfig>>>>,
}

impl ConfigHandle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Cached snapshot, loading it on first use.
    pub async fn current(&self) -> Result<Arc<BotConfig>, StorageError> {
        if let Some(config) = self.cached.read().await.as_ref() {
            return Ok(config.clone());
        }
        self.reload().await
    }

    pub async fn reload(&self) -> Result<Arc<BotConfig>, StorageError> {
        let config = Arc::new(self.store.get_config().await?);
        *self.cached.write().await = Some(config.clone());
        Ok(config)
    }
}
