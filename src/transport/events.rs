//! Event listener for the bridge sidecar.
//!
//! Long-polls `/events/poll`, folds lifecycle events into the
//! [`ConnectionTracker`], and logs incoming messages without replying.
//! Event types the bridge adds later are skipped individually.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ConnectionEvent, ConnectionTracker, TransportError};

/// An event emitted by the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The client started initializing.
    Connecting,
    /// A pairing QR code was issued.
    Qr,
    /// WhatsApp connection established.
    Connected,
    /// Authentication was rejected.
    AuthFailure {
        /// Human-readable reason, if available.
        message: Option<String>,
    },
    /// WhatsApp connection lost.
    Disconnected {
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
    /// An incoming message. Logged only.
    Message {
        /// Sender JID.
        jid: String,
        /// Message type reported by WhatsApp (`chat`, `image`, ...).
        #[serde(default)]
        kind: Option<String>,
        /// Text body, empty for pure media.
        #[serde(default)]
        text: Option<String>,
    },
}

impl BridgeEvent {
    /// The lifecycle fact carried by this event, if any.
    pub fn connection_event(&self) -> Option<ConnectionEvent> {
        match self {
            Self::Connecting => Some(ConnectionEvent::Connecting),
            Self::Qr => Some(ConnectionEvent::Qr),
            Self::Connected => Some(ConnectionEvent::Ready),
            Self::AuthFailure { message } => Some(ConnectionEvent::AuthFailure(
                message.clone().unwrap_or_default(),
            )),
            Self::Disconnected { reason } => Some(ConnectionEvent::Disconnected(
                reason.clone().unwrap_or_default(),
            )),
            Self::Message { .. } => None,
        }
    }
}

/// Characters of an incoming body kept in the log.
const PREVIEW_CHARS: usize = 100;

/// Log preview of an incoming message body.
pub fn preview(text: Option<&str>) -> String {
    match text {
        None | Some("") => "Media message".to_owned(),
        Some(body) => {
            let mut out: String = body.chars().take(PREVIEW_CHARS).collect();
            if body.chars().nth(PREVIEW_CHARS).is_some() {
                out.push_str("...");
            }
            out
        }
    }
}

/// Apply one event: update the tracker or log the message.
pub fn handle_event(event: &BridgeEvent, connection: &ConnectionTracker) {
    if let Some(lifecycle) = event.connection_event() {
        connection.observe(&lifecycle);
        return;
    }
    if let BridgeEvent::Message { kind, text, .. } = event {
        info!(
            kind = kind.as_deref().unwrap_or("unknown"),
            message = %preview(text.as_deref()),
            "incoming message"
        );
    }
}

/// Decode one poll response body.
///
/// Events this client does not model (acks, presence, ...) are skipped one
/// by one so the rest of the batch is still applied.
///
/// # Errors
///
/// Returns an error only if the body is not a JSON array.
pub fn decode_batch(body: &str) -> Result<Vec<BridgeEvent>, serde_json::Error> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let kind = value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing>")
                .to_owned();
            match serde_json::from_value::<BridgeEvent>(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(%kind, error = %e, "skipping unhandled WhatsApp event");
                    None
                }
            }
        })
        .collect())
}

/// Long-poll timeout for the HTTP client (seconds).
const POLL_TIMEOUT_SECS: u64 = 60;

/// First reconnect delay (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Wait before polling again after the sidecar answered with an error.
const REJECTED_RETRY_SECS: u64 = 5;

/// Reconnect delay: doubles on every failure up to a cap, resets on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            current_ms: INITIAL_BACKOFF_MS,
        }
    }
}

impl Backoff {
    /// Delay the next failure will wait.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Record a failure; returns how long to wait before retrying.
    pub fn fail(&mut self) -> Duration {
        let delay = self.delay();
        self.current_ms = self.current_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
        delay
    }

    /// Record a successful poll.
    pub fn reset(&mut self) {
        self.current_ms = INITIAL_BACKOFF_MS;
    }
}

/// Fetch one batch from `poll_url` and apply it to `connection`.
///
/// Returns the number of events applied.
///
/// # Errors
///
/// Returns [`TransportError::Http`] when the sidecar cannot be reached (or
/// the long poll timed out), [`TransportError::Rejected`] on a non-success
/// status, and [`TransportError::Failed`] when the body is not an event
/// array.
pub async fn poll_once(
    client: &reqwest::Client,
    poll_url: &str,
    connection: &ConnectionTracker,
) -> Result<usize, TransportError> {
    let resp = client.get(poll_url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let body = resp.text().await?;
    let events = decode_batch(&body)
        .map_err(|e| TransportError::Failed(format!("malformed event batch: {e}")))?;
    for event in &events {
        debug!(?event, "received WhatsApp event");
        handle_event(event, connection);
    }
    Ok(events.len())
}

/// Spawn a listener feeding `connection` from the sidecar at `base_url`.
///
/// Returns immediately. The listener runs as a background Tokio task until
/// aborted. While the sidecar is unreachable the connection is marked
/// disconnected and polling retries with exponential backoff.
pub fn spawn_event_listener(
    base_url: String,
    connection: Arc<ConnectionTracker>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{}/events/poll", base_url.trim_end_matches('/'));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build event poll client, using default");
                reqwest::Client::default()
            });
        let mut backoff = Backoff::default();

        info!(url = %poll_url, "listening for WhatsApp events");
        loop {
            match poll_once(&client, &poll_url, &connection).await {
                Ok(_) => backoff.reset(),
                Err(TransportError::Http(e)) if e.is_timeout() => backoff.reset(),
                Err(TransportError::Http(e)) => {
                    connection.observe(&ConnectionEvent::Disconnected(e.to_string()));
                    let delay = backoff.fail();
                    warn!(
                        error = %e,
                        backoff_ms = %delay.as_millis(),
                        "WhatsApp event stream error, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(error = %e, "event poll failed, retrying");
                    tokio::time::sleep(Duration::from_secs(REJECTED_RETRY_SECS)).await;
                }
            }
        }
    })
}
