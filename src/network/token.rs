//! Token Service client
//!
//! Exchanges (room, participant) for a signed session credential and the
//! server address. The service answers in one of two shapes:
//!
//! ```text
//! {"tokens": {"<room>": "<credential>", ...}, "livekitUrl": "wss://..."}
//! {"token": "<credential>", "livekitUrl": "wss://..."}
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::TokenServiceConfig;
use crate::error::{AuthError, Error, Result};

/// Session credential plus the server to present it to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub server_url: Option<String>,
}

/// Source of session credentials
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn fetch(&self, room: &str, identity: &str) -> std::result::Result<Credential, AuthError>;
}

/// Either response shape of the Token Service
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenResponse {
    Multi {
        tokens: HashMap<String, String>,
        #[serde(rename = "livekitUrl", default)]
        livekit_url: Option<String>,
    },
    Single {
        token: String,
        #[serde(rename = "livekitUrl", default)]
        livekit_url: Option<String>,
    },
}

impl TokenResponse {
    pub fn parse(body: &[u8]) -> std::result::Result<Self, AuthError> {
        serde_json::from_slice(body).map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    /// Pick the credential for `room`
    pub fn resolve(self, room: &str) -> std::result::Result<Credential, AuthError> {
        let (token, server_url) = match self {
            TokenResponse::Multi {
                mut tokens,
                livekit_url,
            } => {
                let token = tokens
                    .remove(room)
                    .ok_or_else(|| AuthError::MissingCredential(room.to_string()))?;
                (token, livekit_url)
            }
            TokenResponse::Single { token, livekit_url } => (token, livekit_url),
        };

        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential(room.to_string()));
        }

        Ok(Credential {
            token,
            server_url: server_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

/// HTTP Token Service client
#[derive(Clone)]
pub struct HttpTokenService {
    url: String,
    multi_room: bool,
    http_client: reqwest::Client,
}

impl HttpTokenService {
    pub fn new(config: &TokenServiceConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::Config("Token service URL is empty".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            multi_room: config.multi_room,
            http_client,
        })
    }

    fn request_body(&self, room: &str, identity: &str) -> serde_json::Value {
        if self.multi_room {
            json!({ "roomNames": [room], "participantName": identity })
        } else {
            json!({ "roomName": room, "participantName": identity })
        }
    }
}

#[async_trait]
impl TokenService for HttpTokenService {
    async fn fetch(&self, room: &str, identity: &str) -> std::result::Result<Credential, AuthError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&self.request_body(room, identity))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), room, "Token service refused request");
            return Err(AuthError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        TokenResponse::parse(&body)?.resolve(room)
    }
}

/// In-process token issuer for tests and drills
#[derive(Debug, Clone, Default)]
pub struct StaticTokenService {
    server_url: Option<String>,
    fail_status: Option<u16>,
    delay: Option<Duration>,
}

impl StaticTokenService {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Self::default()
        }
    }

    /// Issue credentials without a server address
    pub fn without_server_url() -> Self {
        Self::default()
    }

    /// Answer every request with this HTTP status
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    /// Wait before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TokenService for StaticTokenService {
    async fn fetch(&self, room: &str, identity: &str) -> std::result::Result<Credential, AuthError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.fail_status {
            return Err(AuthError::Status(status));
        }
        Ok(Credential {
            token: format!("static.{}.{}", room, identity),
            server_url: self.server_url.clone(),
        })
    }
}
