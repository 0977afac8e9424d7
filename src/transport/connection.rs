//! Connection lifecycle as an explicit state machine.
//!
//! `Disconnected -> Connecting -> Ready -> Disconnected`. Transitions are
//! driven by facts the transport reports; the core only reads the state.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Observed connection state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Starting up or waiting for QR pairing.
    Connecting,
    /// Connected and able to send.
    Ready,
}

/// A lifecycle fact reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The client started initializing.
    Connecting,
    /// A pairing QR code was issued.
    Qr,
    /// The client finished connecting.
    Ready,
    /// Authentication was rejected.
    AuthFailure(String),
    /// The connection was lost or logged out.
    Disconnected(String),
}

impl ConnectionState {
    /// State after observing `event`.
    ///
    /// `Ready` is accepted from any state since it is an observed fact. A
    /// QR code while ready means the session was lost and pairing restarted.
    pub fn on(self, event: &ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Connecting | ConnectionEvent::Qr => Self::Connecting,
            ConnectionEvent::Ready => Self::Ready,
            ConnectionEvent::AuthFailure(_) | ConnectionEvent::Disconnected(_) => {
                Self::Disconnected
            }
        }
    }
}

/// Shared, watchable connection state.
#[derive(Debug)]
pub struct ConnectionTracker {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    /// Start in [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Whether the transport can send right now.
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Fold an observed event into the state and return the new state.
    pub fn observe(&self, event: &ConnectionEvent) -> ConnectionState {
        let mut next = ConnectionState::Disconnected;
        self.tx.send_modify(|state| {
            let before = *state;
            *state = before.on(event);
            next = *state;
            if before != next {
                match event {
                    ConnectionEvent::Ready => info!("WhatsApp client is ready"),
                    ConnectionEvent::AuthFailure(msg) => warn!(reason = %msg, "authentication failed"),
                    ConnectionEvent::Disconnected(reason) => {
                        warn!(%reason, "WhatsApp client disconnected");
                    }
                    ConnectionEvent::Qr => info!("waiting for QR code pairing"),
                    ConnectionEvent::Connecting => debug!("WhatsApp client connecting"),
                }
            }
        });
        next
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Wait until the state is `Ready`, up to `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| *state == ConnectionState::Ready),
        )
        .await;
        matches!(waited, Ok(Ok(_)))
    }
}
