use thiserror::Error;

/// One failed delivery attempt.
///
/// Consumed locally by the dispatch queue's retry loop; only surfaces to
/// the caller once a target exhausts its failure budget.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("gateway rejected the request with HTTP {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("gateway response carries no receipt id")]
    MissingReceipt,
}

/// Errors surfaced by channel validation and the dispatch queue.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing required configuration item: {key}")]
    MissingParameter { key: String },

    #[error("not configured to call or message anyone")]
    NoChannels,

    #[error("cannot initialize gateway client: {source}")]
    GatewayInit {
        #[source]
        source: TransportError,
    },

    #[error("failure cap exceeded sending {channel} to {destination} after {attempts} attempts")]
    Exhausted {
        channel: &'static str,
        destination: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl NotifyError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingParameter { key: key.into() }
    }
}
