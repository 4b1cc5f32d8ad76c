//! In-process chat platform.
//!
//! Keeps channels, sent messages and login state in memory. Every session
//! opened from a [`MemoryPlatform`] shares the same state, so a test can
//! seed channels, run the pipeline and inspect what was published.
//!
//! Like the bridge, there is one platform connection per session name:
//! a `disconnect` from any handle drops it, and `sign_in` needs it up.

use super::traits::{PlatformError, PlatformSession, SessionFactory};
use super::types::{Credentials, MediaRef, RawMessage};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A message published through [`PlatformSession::send_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
    pub media: Vec<MediaRef>,
}

/// One recorded `fetch_messages` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub channel: String,
    pub min_id: Option<i64>,
    pub limit: usize,
}

/// What `sign_in` answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInBehavior {
    Accept,
    CodeExpired,
    PasswordRequired,
}

#[derive(Debug)]
struct MemoryState {
    channels: HashMap<String, Vec<RawMessage>>,
    sent: Vec<SentMessage>,
    fetches: Vec<FetchCall>,
    failing_channels: HashSet<String>,
    fail_sends: bool,
    fail_connect: bool,
    connected: bool,
    authorized: bool,
    sign_in: SignInBehavior,
    next_code: u64,
    issued_hashes: Vec<String>,
    connects: usize,
    disconnects: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    state: Arc<Mutex<MemoryState>>,
    opened: Arc<AtomicUsize>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                channels: HashMap::new(),
                sent: Vec::new(),
                fetches: Vec::new(),
                failing_channels: HashSet::new(),
                fail_sends: false,
                fail_connect: false,
                connected: false,
                authorized: false,
                sign_in: SignInBehavior::Accept,
                next_code: 0,
                issued_hashes: Vec::new(),
                connects: 0,
                disconnects: 0,
            })),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adds messages to a channel. Order does not matter.
    pub async fn post(&self, channel: &str, messages: impl IntoIterator<Item = RawMessage>) {
        let mut state = self.state.lock().await;
        let stored = state.channels.entry(channel.to_string()).or_default();
        stored.extend(messages);
        stored.sort_by_key(|m| m.id);
    }

    pub async fn set_authorized(&self, authorized: bool) {
        self.state.lock().await.authorized = authorized;
    }

    pub async fn set_sign_in_behavior(&self, behavior: SignInBehavior) {
        self.state.lock().await.sign_in = behavior;
    }

    pub async fn fail_fetches_for(&self, channel: &str) {
        self.state
            .lock()
            .await
            .failing_channels
            .insert(channel.to_string());
    }

    pub async fn set_fail_sends(&self, fail: bool) {
        self.state.lock().await.fail_sends = fail;
    }

    pub async fn set_fail_connect(&self, fail: bool) {
        self.state.lock().await.fail_connect = fail;
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().await.sent.clone()
    }

    pub async fn fetches(&self) -> Vec<FetchCall> {
        self.state.lock().await.fetches.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn issued_hashes(&self) -> Vec<String> {
        self.state.lock().await.issued_hashes.clone()
    }

    /// Returns `(opened, connects, disconnects)`.
    pub async fn session_counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().await;
        (
            self.opened.load(Ordering::SeqCst),
            state.connects,
            state.disconnects,
        )
    }
}

impl SessionFactory for MemoryPlatform {
    fn open(&self, _credentials: &Credentials) -> Result<Arc<dyn PlatformSession>, PlatformError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl PlatformSession for MemoryPlatform {
    async fn connect(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if state.fail_connect {
            return Err(PlatformError::Other("connection refused".to_string()));
        }
        state.connects += 1;
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.disconnects += 1;
        state.connected = false;
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, PlatformError> {
        Ok(self.state.lock().await.authorized)
    }

    async fn send_code(&self, _phone: &str) -> Result<String, PlatformError> {
        let mut state = self.state.lock().await;
        state.next_code += 1;
        let hash = format!("hash-{}", state.next_code);
        state.issued_hashes.push(hash.clone());
        Ok(hash)
    }

    async fn sign_in(&self, _phone: &str, _code: &str, code_hash: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(PlatformError::Other("session is not connected".to_string()));
        }
        if !state.issued_hashes.iter().any(|h| h == code_hash) {
            return Err(PlatformError::Status {
                status: 400,
                message: "PHONE_CODE_HASH_INVALID".to_string(),
            });
        }
        let behavior = state.sign_in;
        match behavior {
            SignInBehavior::Accept => {
                state.authorized = true;
                Ok(())
            }
            SignInBehavior::CodeExpired => Err(PlatformError::CodeExpired),
            SignInBehavior::PasswordRequired => Err(PlatformError::PasswordRequired),
        }
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        min_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        let mut state = self.state.lock().await;
        state.fetches.push(FetchCall {
            channel: channel.to_string(),
            min_id,
            limit,
        });

        if state.failing_channels.contains(channel) {
            return Err(PlatformError::Other(format!("channel not found: {}", channel)));
        }

        let floor = min_id.unwrap_or(i64::MIN);
        let messages: Vec<RawMessage> = state
            .channels
            .get(channel)
            .map(|stored| {
                stored
                    .iter()
                    .rev()
                    .filter(|m| m.id > floor)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }

    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        media: &[MediaRef],
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if state.fail_sends {
            return Err(PlatformError::Status {
                status: 420,
                message: "FLOOD_WAIT".to_string(),
            });
        }
        state.sent.push(SentMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            media: media.to_vec(),
        });
        Ok(())
    }
}
