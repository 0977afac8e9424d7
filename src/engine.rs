//! The shared aggregate the admin surface talks to.
//!
//! Holds the registry, the media slots, the message draft and the
//! dispatcher behind one value that callers share by reference. Every
//! mutation goes through the owning component's methods.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::info;

use crate::campaign::{Campaign, CampaignDispatcher, CampaignError, CampaignPhase, CampaignResult};
use crate::contacts::{ContactRegistry, Group};
use crate::media::{ContentKind, MediaKind, MediaSlotStore};
use crate::transport::{ConnectionState, ConnectionTracker};

/// Snapshot of the engine for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Whether the transport can send.
    pub ready: bool,
    /// Observed connection state.
    pub connection: ConnectionState,
    /// Phase of the current or last campaign.
    pub campaign: CampaignPhase,
    /// Members of `ALL`.
    pub total_numbers: usize,
    /// An image slot is set.
    pub has_image: bool,
    /// An audio slot is set.
    pub has_audio: bool,
    /// A video slot is set.
    pub has_video: bool,
    /// A message draft is stored.
    pub has_message: bool,
    /// Configured sender display name.
    pub sender_name: String,
    /// Member count per group.
    pub group_counts: BTreeMap<Group, usize>,
}

/// Registry, media, message draft and dispatcher in one place.
pub struct Engine {
    registry: Arc<ContactRegistry>,
    media: Arc<MediaSlotStore>,
    connection: Arc<ConnectionTracker>,
    dispatcher: CampaignDispatcher,
    message: RwLock<Option<String>>,
    sender_name: String,
}

impl Engine {
    /// Assemble an engine. `dispatcher` must share `registry` and `media`.
    pub fn new(
        registry: Arc<ContactRegistry>,
        media: Arc<MediaSlotStore>,
        connection: Arc<ConnectionTracker>,
        dispatcher: CampaignDispatcher,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            media,
            connection,
            dispatcher,
            message: RwLock::new(None),
            sender_name: sender_name.into(),
        }
    }

    /// The contact registry.
    pub fn registry(&self) -> &ContactRegistry {
        &self.registry
    }

    /// The media slots.
    pub fn media(&self) -> &MediaSlotStore {
        &self.media
    }

    /// Store the message draft used by [`Engine::send_campaign`].
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::NoMessage`] if `text` is empty after trimming.
    pub fn set_message(&self, text: &str) -> Result<String, CampaignError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CampaignError::NoMessage);
        }
        let saved = trimmed.to_owned();
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = Some(saved.clone());
        info!(chars = saved.chars().count(), "custom message saved");
        Ok(saved)
    }

    /// The current message draft.
    pub fn message(&self) -> Option<String> {
        self.message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send the stored draft to `group`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::NoMessage`] when no draft is stored, or any
    /// error from [`CampaignDispatcher::run`].
    pub async fn send_campaign(
        &self,
        group: Group,
        kind: ContentKind,
    ) -> Result<CampaignResult, CampaignError> {
        let message = self.message().unwrap_or_default();
        self.dispatcher
            .run(&Campaign::new(group, kind, message))
            .await
    }

    /// Current readiness, counts and slot occupancy.
    pub fn status(&self) -> StatusReport {
        let group_counts = self.registry.counts_by_group();
        let has = |kind| self.media.get(kind).is_some();
        StatusReport {
            ready: self.connection.is_ready(),
            connection: self.connection.state(),
            campaign: self.dispatcher.phase(),
            total_numbers: group_counts.get(&Group::All).copied().unwrap_or(0),
            has_image: has(MediaKind::Image),
            has_audio: has(MediaKind::Audio),
            has_video: has(MediaKind::Video),
            has_message: self.message().is_some_and(|m| !m.is_empty()),
            sender_name: self.sender_name.clone(),
            group_counts,
        }
    }
}
