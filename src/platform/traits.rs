use super::types::{Credentials, MediaRef, RawMessage};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("login code expired")]
    CodeExpired,

    #[error("two-step verification password required")]
    PasswordRequired,

    #[error("session is not authorized")]
    Unauthorized,

    #[error("{0}")]
    Other(String),
}

/// A client connection to the chat platform.
///
/// Callers pair every successful `connect` with a `disconnect`.
#[async_trait]
pub trait PlatformSession: Send + Sync {
    async fn connect(&self) -> Result<(), PlatformError>;

    async fn disconnect(&self) -> Result<(), PlatformError>;

    async fn is_authorized(&self) -> Result<bool, PlatformError>;

    /// Asks the platform to send a login code by SMS.
    /// Returns the code hash that must accompany the code on sign-in.
    async fn send_code(&self, phone: &str) -> Result<String, PlatformError>;

    async fn sign_in(&self, phone: &str, code: &str, code_hash: &str) -> Result<(), PlatformError>;

    /// Most recent messages first, at most `limit`, only ids strictly greater than `min_id`.
    async fn fetch_messages(
        &self,
        channel: &str,
        min_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError>;

    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        media: &[MediaRef],
    ) -> Result<(), PlatformError>;
}

/// Opens independent sessions for the scheduler and the login flow.
pub trait SessionFactory: Send + Sync {
    fn open(&self, credentials: &Credentials) -> Result<Arc<dyn PlatformSession>, PlatformError>;
}
