//! Messaging gateway transport.
//!
//! The dispatcher talks to notification providers through the narrow
//! [`MessageGateway`] seam; the provider's wire protocol and
//! authentication live entirely in the [`HttpGateway`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;

/// REST endpoint of the hosted messaging provider.
pub const DEFAULT_GATEWAY_URL: &str = "https://api.twilio.com/2010-04-01";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Narrow transport seam toward the notification provider.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send a text message, returning the provider's receipt id.
    async fn send_sms(&self, to: &str, from: &str, body: &str) -> Result<String, TransportError>;

    /// Place a voice call that plays the instructions at `url`.
    async fn place_call(&self, to: &str, from: &str, url: &str) -> Result<String, TransportError>;
}

/// Gateway credentials section of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Account identifier.
    pub sid: Option<String>,
    /// Account auth token.
    pub token: Option<String>,
    /// Provider-registered sender number.
    pub from: Option<String>,
    /// Override for the REST endpoint; defaults to the hosted provider.
    pub url: Option<String>,
}

/// Twilio-style REST gateway over HTTP basic auth.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl HttpGateway {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Result<Self, TransportError> {
        Self::with_base_url(account_sid, auth_token, DEFAULT_GATEWAY_URL)
    }

    pub fn with_base_url(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        })
    }

    async fn post_form(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TransportError> {
        let url = format!(
            "{}/Accounts/{}/{resource}.json",
            self.base_url, self.account_sid
        );
        debug!(%url, "posting to gateway");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status, body });
        }

        let payload: serde_json::Value = response.json().await?;
        payload
            .get("sid")
            .and_then(|sid| sid.as_str())
            .map(str::to_owned)
            .ok_or(TransportError::MissingReceipt)
    }
}

#[async_trait]
impl MessageGateway for HttpGateway {
    async fn send_sms(&self, to: &str, from: &str, body: &str) -> Result<String, TransportError> {
        self.post_form("Messages", &[("To", to), ("From", from), ("Body", body)])
            .await
    }

    async fn place_call(&self, to: &str, from: &str, url: &str) -> Result<String, TransportError> {
        self.post_form("Calls", &[("To", to), ("From", from), ("Url", url)])
            .await
    }
}
