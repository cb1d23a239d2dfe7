//! Outbound notification channels.
//!
//! Each variant implements exactly the capability set the dispatcher
//! needs: render a payload for a batch, execute one send, describe the
//! would-be delivery for dry-run. Adding a channel means adding one
//! variant here and one configuration section; nothing else changes.

use std::sync::Arc;

use async_trait::async_trait;
use binlog::LogEvent;
use chrono::Local;
use serde::Deserialize;

use crate::error::{NotifyError, TransportError};
use crate::gateway::{GatewayConfig, HttpGateway, MessageGateway};

/// Maximum number of message characters carried in a text payload.
pub const SMS_LENGTH: usize = 100;

/// Timestamp format at the head of a text payload.
const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Capability set every outbound channel implements.
#[async_trait]
pub trait Channel: Send + Sync + std::fmt::Debug {
    /// Stable channel name used in logs and failure accounting.
    fn name(&self) -> &'static str;

    /// Destinations this channel delivers to.
    fn destinations(&self) -> &[String];

    /// Render the outbound payload for a batch of new events, newest
    /// first. Rendered once per channel and reused for every destination.
    fn render(&self, batch: &[LogEvent]) -> String;

    /// Execute one delivery attempt, returning the provider receipt.
    async fn send(&self, destination: &str, payload: &str) -> Result<String, TransportError>;

    /// Human-readable line describing the would-be delivery.
    fn describe_dry_run(&self, destination: &str, payload: &str) -> String;
}

/// `sms` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsConfig {
    /// Destination numbers.
    pub to: Option<Vec<String>>,
    /// Template appended when more than one event is new; `{}` is
    /// replaced with the count of additional events.
    #[serde(rename = "long")]
    pub more_template: Option<String>,
}

/// `call` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallConfig {
    /// Destination numbers.
    pub to: Option<Vec<String>>,
    /// Instruction document the provider plays to the callee.
    pub url: Option<String>,
}

/// Text-message channel.
pub struct SmsChannel {
    gateway: Arc<dyn MessageGateway>,
    from: String,
    to: Vec<String>,
    more_template: String,
}

impl std::fmt::Debug for SmsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsChannel")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("more_template", &self.more_template)
            .finish_non_exhaustive()
    }
}

impl SmsChannel {
    pub fn from_config(
        gateway: Arc<dyn MessageGateway>,
        from: String,
        config: SmsConfig,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            gateway,
            from,
            to: config.to.ok_or_else(|| NotifyError::missing("sms.to"))?,
            more_template: config
                .more_template
                .ok_or_else(|| NotifyError::missing("sms.long"))?,
        })
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn destinations(&self) -> &[String] {
        &self.to
    }

    fn render(&self, batch: &[LogEvent]) -> String {
        let mut payload = Local::now().format(STAMP_FORMAT).to_string();
        payload.push_str(" - ");
        if let Some(newest) = batch.first() {
            payload.push_str(
                newest
                    .message
                    .get(..SMS_LENGTH)
                    .unwrap_or(newest.message.as_str()),
            );
        }
        if batch.len() > 1 {
            let more = (batch.len() - 1).to_string();
            payload.push_str(&self.more_template.replace("{}", &more));
        }
        payload
    }

    async fn send(&self, destination: &str, payload: &str) -> Result<String, TransportError> {
        self.gateway.send_sms(destination, &self.from, payload).await
    }

    fn describe_dry_run(&self, destination: &str, payload: &str) -> String {
        format!("from: {}, to: {destination}, ({payload})", self.from)
    }
}

/// Voice-call channel.
pub struct CallChannel {
    gateway: Arc<dyn MessageGateway>,
    from: String,
    to: Vec<String>,
    url: String,
}

impl std::fmt::Debug for CallChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallChannel")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl CallChannel {
    pub fn from_config(
        gateway: Arc<dyn MessageGateway>,
        from: String,
        config: CallConfig,
    ) -> Result<Self, NotifyError> {
        Ok(Self {
            gateway,
            from,
            to: config.to.ok_or_else(|| NotifyError::missing("call.to"))?,
            url: config.url.ok_or_else(|| NotifyError::missing("call.url"))?,
        })
    }
}

#[async_trait]
impl Channel for CallChannel {
    fn name(&self) -> &'static str {
        "call"
    }

    fn destinations(&self) -> &[String] {
        &self.to
    }

    fn render(&self, _batch: &[LogEvent]) -> String {
        self.url.clone()
    }

    async fn send(&self, destination: &str, payload: &str) -> Result<String, TransportError> {
        self.gateway
            .place_call(destination, &self.from, payload)
            .await
    }

    fn describe_dry_run(&self, destination: &str, payload: &str) -> String {
        format!("from: {}, to: {destination}, ({payload})", self.from)
    }
}

/// Build the configured channel set over one shared gateway client.
///
/// Validates the required parameters of every configured section before
/// any send attempt; a missing one aborts with the dotted key name.
pub fn build_channels(
    gateway: GatewayConfig,
    sms: Option<SmsConfig>,
    call: Option<CallConfig>,
) -> Result<Vec<Box<dyn Channel>>, NotifyError> {
    if sms.is_none() && call.is_none() {
        return Err(NotifyError::NoChannels);
    }

    let sid = gateway
        .sid
        .ok_or_else(|| NotifyError::missing("gateway.sid"))?;
    let token = gateway
        .token
        .ok_or_else(|| NotifyError::missing("gateway.token"))?;
    let from = gateway
        .from
        .ok_or_else(|| NotifyError::missing("gateway.from"))?;

    let transport = match gateway.url {
        Some(url) => HttpGateway::with_base_url(sid, token, url),
        None => HttpGateway::new(sid, token),
    }
    .map_err(|source| NotifyError::GatewayInit { source })?;
    let transport: Arc<dyn MessageGateway> = Arc::new(transport);

    let mut channels: Vec<Box<dyn Channel>> = Vec::new();
    if let Some(config) = sms {
        channels.push(Box::new(SmsChannel::from_config(
            Arc::clone(&transport),
            from.clone(),
            config,
        )?));
    }
    if let Some(config) = call {
        channels.push(Box::new(CallChannel::from_config(
            Arc::clone(&transport),
            from,
            config,
        )?));
    }
    Ok(channels)
}
