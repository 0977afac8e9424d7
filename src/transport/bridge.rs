//! HTTP client for a WhatsApp-web bridge sidecar.
//!
//! The sidecar owns the browser session, QR pairing and reconnects. This
//! client only asks for status and submits sends.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{
    ConnectionEvent, ConnectionTracker, Payload, SendOptions, Transport, TransportError,
};
use crate::contacts::RecipientId;
use crate::media::MediaPayload;

/// Default URL the bridge listens on.
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3001";

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout. Video uploads can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Connection status reported by the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Whether the sidecar is connected to WhatsApp.
    pub connected: bool,
    /// The linked phone number, if connected.
    pub phone_number: Option<String>,
}

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse<T> {
    #[allow(dead_code)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Body of `POST /send-media`.
#[derive(Serialize)]
struct MediaSend<'a> {
    jid: &'a str,
    media: &'a MediaPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    send_audio_as_voice: bool,
}

/// Client for the bridge sidecar.
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: Url,
    connection: Arc<ConnectionTracker>,
}

impl BridgeClient {
    /// Create a client for `base_url`, reporting readiness from `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, connection: Arc<ConnectionTracker>) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Ok(Self {
            client,
            base_url,
            connection,
        })
    }

    /// The bridge base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The tracker this client reports readiness from.
    pub fn connection(&self) -> &Arc<ConnectionTracker> {
        &self.connection
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }

    /// Fetch the sidecar's connection status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the sidecar is unreachable, or
    /// [`TransportError::Failed`] if the response carries no status.
    pub async fn status(&self) -> Result<BridgeStatus, TransportError> {
        let resp = self.client.get(self.endpoint("status")?).send().await?;
        let body: BridgeResponse<BridgeStatus> = resp.json().await?;
        body.data.ok_or_else(|| {
            TransportError::Failed(body.error.unwrap_or_else(|| "no status in response".to_owned()))
        })
    }

    /// Poll `/status` once and fold the answer into the connection tracker.
    ///
    /// An unreachable sidecar counts as disconnected.
    pub async fn refresh(&self) -> bool {
        let event = match self.status().await {
            Ok(status) if status.connected => ConnectionEvent::Ready,
            Ok(_) => ConnectionEvent::Connecting,
            Err(e) => ConnectionEvent::Disconnected(e.to_string()),
        };
        self.connection.observe(&event);
        self.connection.is_ready()
    }

    /// Send a text message to `jid`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] on a non-success response.
    pub async fn send_text(&self, jid: &str, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "jid": jid, "text": text });
        let resp = self
            .client
            .post(self.endpoint("send")?)
            .json(&body)
            .send()
            .await?;
        check_response(resp).await?;
        debug!("text sent via WhatsApp bridge");
        Ok(())
    }

    /// Send a media message to `jid`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] on a non-success response.
    pub async fn send_media(
        &self,
        jid: &str,
        media: &MediaPayload,
        options: &SendOptions,
    ) -> Result<(), TransportError> {
        let body = MediaSend {
            jid,
            media,
            caption: options.caption.as_deref(),
            send_audio_as_voice: options.send_audio_as_voice,
        };
        let resp = self
            .client
            .post(self.endpoint("send-media")?)
            .json(&body)
            .send()
            .await?;
        check_response(resp).await?;
        debug!(mimetype = %media.mimetype, "media sent via WhatsApp bridge");
        Ok(())
    }
}

/// Map a non-success response to [`TransportError::Rejected`].
async fn check_response(resp: reqwest::Response) -> Result<(), TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let raw = resp.text().await.unwrap_or_default();
    let body = serde_json::from_str::<BridgeResponse<serde_json::Value>>(&raw)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(raw);
    warn!(%status, "WhatsApp bridge rejected send: {body}");
    Err(TransportError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Transport for BridgeClient {
    fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    async fn send(
        &self,
        recipient: &RecipientId,
        payload: &Payload,
        options: &SendOptions,
    ) -> Result<(), TransportError> {
        match payload {
            Payload::Text(text) => self.send_text(recipient.as_str(), text).await,
            Payload::Media(media) => self.send_media(recipient.as_str(), media, options).await,
        }
    }
}
