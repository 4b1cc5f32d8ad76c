//! Login handshake with the chat platform.
//!
//! Requesting a code opens a dedicated session that stays connected until
//! the code is submitted. Only one such pending login exists at a time.

use super::traits::{PlatformError, PlatformSession, SessionFactory};
use super::types::Credentials;
use crate::config::ConfigHandle;
use crate::storage::{StorageError, Store};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no login in progress, request a code first")]
    NoPendingLogin,

    #[error("login code was not requested")]
    CodeNotRequested,

    #[error("a login code was already requested, submit it or wait for it to expire")]
    LoginPending,

    #[error("login code expired, request a new one")]
    CodeExpired,

    #[error("two-step verification is enabled for this account, password login is not supported")]
    PasswordRequired,

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRequest {
    AlreadyLoggedIn,
    Sent,
}

struct PendingLogin {
    session: Arc<dyn PlatformSession>,
    phone: String,
    requested_at: Instant,
}

pub struct LoginFlow {
    store: Arc<dyn Store>,
    config: ConfigHandle,
    sessions: Arc<dyn SessionFactory>,
    pending: Mutex<Option<PendingLogin>>,
    code_ttl: Duration,
}

impl LoginFlow {
    pub fn new(
        store: Arc<dyn Store>,
        config: ConfigHandle,
        sessions: Arc<dyn SessionFactory>,
        code_ttl: Duration,
    ) -> Self {
        Self {
            store,
            config,
            sessions,
            pending: Mutex::new(None),
            code_ttl,
        }
    }

    /// Checks authorization with a throwaway session. Failures count as not logged in.
    pub async fn is_logged_in(&self) -> bool {
        match self.check_authorized().await {
            Ok(authorized) => authorized,
            Err(e) => {
                tracing::warn!(error = %e, "Login check failed");
                false
            }
        }
    }

    async fn check_authorized(&self) -> Result<bool, SessionError> {
        // A pending login holds the platform connection until it completes
        if let Some(login) = self.pending.lock().await.as_ref() {
            return Ok(login.session.is_authorized().await?);
        }

        let config = self.config.reload().await?;
        let session = self.sessions.open(&Credentials::from(&config.settings))?;
        session.connect().await?;
        let authorized = session.is_authorized().await;
        disconnect_quietly(session.as_ref()).await;
        Ok(authorized?)
    }

    pub async fn request_code(&self) -> Result<CodeRequest, SessionError> {
        if self.is_logged_in().await {
            tracing::info!("Already logged in, not requesting a code");
            return Ok(CodeRequest::AlreadyLoggedIn);
        }

        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.as_ref() {
            if existing.requested_at.elapsed() < self.code_ttl {
                return Err(SessionError::LoginPending);
            }
            tracing::info!("Discarding stale pending login");
            disconnect_quietly(existing.session.as_ref()).await;
            *pending = None;
        }

        let config = self.config.reload().await?;
        let credentials = Credentials::from(&config.settings);
        let session = self.sessions.open(&credentials)?;
        session.connect().await?;

        let hash = match session.send_code(&credentials.phone_number).await {
            Ok(hash) => hash,
            Err(e) => {
                disconnect_quietly(session.as_ref()).await;
                return Err(e.into());
            }
        };

        self.store.clear_login_code_hash().await?;
        self.store.save_login_code_hash(&hash).await?;
        *pending = Some(PendingLogin {
            session,
            phone: credentials.phone_number,
            requested_at: Instant::now(),
        });

        tracing::info!("Login code requested");
        Ok(CodeRequest::Sent)
    }

    pub async fn submit_code(&self, code: &str) -> Result<(), SessionError> {
        let mut pending = self.pending.lock().await;
        let Some(login) = pending.as_ref() else {
            return Err(SessionError::NoPendingLogin);
        };

        let Some(hash) = self.store.login_code_hash().await? else {
            return Err(SessionError::CodeNotRequested);
        };

        match login.session.sign_in(&login.phone, code, &hash).await {
            Ok(()) => {
                self.store.clear_login_code_hash().await?;
                disconnect_quietly(login.session.as_ref()).await;
                *pending = None;
                tracing::info!("Login completed");
                Ok(())
            }
            Err(PlatformError::CodeExpired) => {
                self.store.clear_login_code_hash().await?;
                disconnect_quietly(login.session.as_ref()).await;
                *pending = None;
                tracing::warn!("Login code expired");
                Err(SessionError::CodeExpired)
            }
            Err(PlatformError::PasswordRequired) => {
                tracing::warn!("Account requires a two-step verification password");
                Err(SessionError::PasswordRequired)
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn disconnect_quietly(session: &dyn PlatformSession) {
    if let Err(e) = session.disconnect().await {
        tracing::warn!(error = %e, "Failed to disconnect platform session");
    }
}
