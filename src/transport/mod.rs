//! Messaging transport seam.
//!
//! The dispatcher only needs two things from a transport: whether it is
//! ready, and a way to send one payload to one recipient. Connection,
//! pairing and reconnection belong to the transport side; their observed
//! outcome is folded into a [`connection::ConnectionTracker`].

pub mod bridge;
pub mod connection;
pub mod events;

use std::sync::Arc;

use async_trait::async_trait;

use crate::contacts::RecipientId;
use crate::media::MediaPayload;

pub use connection::{ConnectionEvent, ConnectionState, ConnectionTracker};

/// Errors from a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP request to the bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge URL could not be used.
    #[error("invalid bridge URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The bridge answered with a non-success status.
    #[error("send rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// Any other send failure reported by the transport.
    #[error("{0}")]
    Failed(String),
}

/// What is delivered to a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Plain message body.
    Text(String),
    /// An attachment, shared across the whole run.
    Media(Arc<MediaPayload>),
}

/// Transport-level delivery hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Caption shown with an image or video.
    pub caption: Option<String>,
    /// Deliver audio as a voice note.
    pub send_audio_as_voice: bool,
}

/// A messaging client able to deliver to one recipient at a time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the client is connected and able to send.
    fn is_ready(&self) -> bool;

    /// Deliver `payload` to `recipient`.
    async fn send(
        &self,
        recipient: &RecipientId,
        payload: &Payload,
        options: &SendOptions,
    ) -> Result<(), TransportError>;
}
