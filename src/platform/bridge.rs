//! HTTP client for the chat-platform bridge.
//!
//! The bridge owns the MTProto connection and keeps one authorized session
//! per session name. Every call here is a single request with the
//! configured timeout; nothing is retried.

use super::traits::{PlatformError, PlatformSession, SessionFactory};
use super::types::{Credentials, MediaRef, RawMessage};
use crate::config::types::PlatformConfig;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BridgeSessionFactory {
    base_url: Url,
    session: String,
    client: reqwest::Client,
}

impl BridgeSessionFactory {
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| PlatformError::Other(format!("invalid bridge URL '{}': {}", config.url, e)))?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url,
            session: config.session.clone(),
            client,
        })
    }
}

impl SessionFactory for BridgeSessionFactory {
    fn open(&self, credentials: &Credentials) -> Result<Arc<dyn PlatformSession>, PlatformError> {
        Ok(Arc::new(BridgeSession {
            base_url: self.base_url.clone(),
            session: self.session.clone(),
            client: self.client.clone(),
            credentials: credentials.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct BridgeSession {
    base_url: Url,
    session: String,
    client: reqwest::Client,
    credentials: Credentials,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    api_id: i64,
    api_hash: &'a str,
}

#[derive(Deserialize)]
struct AuthorizedResponse {
    authorized: bool,
}

#[derive(Serialize)]
struct SendCodeRequest<'a> {
    phone: &'a str,
    force_sms: bool,
}

#[derive(Deserialize)]
struct SendCodeResponse {
    phone_code_hash: String,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    phone: &'a str,
    code: &'a str,
    phone_code_hash: &'a str,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    text: &'a str,
    media: &'a [MediaRef],
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeSession {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PlatformError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PlatformError::Other(format!("bridge URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push("sessions")
            .push(&self.session)
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<reqwest::Response, PlatformError> {
        let url = self.endpoint(segments)?;
        let response = self.client.post(url).json(body).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    Err(error_from_body(status, &text))
}

fn error_from_body(status: u16, text: &str) -> PlatformError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    match body.code.as_deref() {
        Some("PHONE_CODE_EXPIRED") => PlatformError::CodeExpired,
        Some("SESSION_PASSWORD_NEEDED") => PlatformError::PasswordRequired,
        Some("AUTH_KEY_UNREGISTERED") => PlatformError::Unauthorized,
        _ => PlatformError::Status {
            status,
            message: body.message.unwrap_or_else(|| text.to_string()),
        },
    }
}

#[async_trait]
impl PlatformSession for BridgeSession {
    async fn connect(&self) -> Result<(), PlatformError> {
        let body = ConnectRequest {
            api_id: self.credentials.api_id,
            api_hash: &self.credentials.api_hash,
        };
        self.post(&["connect"], &body).await?;
        tracing::debug!(session = %self.session, "Connected to platform bridge");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PlatformError> {
        self.post(&["disconnect"], &serde_json::json!({})).await?;
        tracing::debug!(session = %self.session, "Disconnected from platform bridge");
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, PlatformError> {
        let url = self.endpoint(&["authorized"])?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let body: AuthorizedResponse = response.json().await?;
        Ok(body.authorized)
    }

    async fn send_code(&self, phone: &str) -> Result<String, PlatformError> {
        let body = SendCodeRequest {
            phone,
            force_sms: true,
        };
        let response = self.post(&["send-code"], &body).await?;
        let body: SendCodeResponse = response.json().await?;
        Ok(body.phone_code_hash)
    }

    async fn sign_in(&self, phone: &str, code: &str, code_hash: &str) -> Result<(), PlatformError> {
        let body = SignInRequest {
            phone,
            code,
            phone_code_hash: code_hash,
        };
        self.post(&["sign-in"], &body).await?;
        Ok(())
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        min_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        let mut url = self.endpoint(&["channels", channel, "messages"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(min_id) = min_id {
                query.append_pair("min_id", &min_id.to_string());
            }
        }

        let response = check_status(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        media: &[MediaRef],
    ) -> Result<(), PlatformError> {
        let body = SendMessageRequest { text, media };
        self.post(&["channels", channel, "messages"], &body).await?;
        Ok(())
    }
}
