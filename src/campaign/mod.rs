//! Campaign dispatch: one message (plus optional attachment) to every
//! member of a group, strictly one recipient at a time.
//!
//! A run goes `Idle -> Validating -> Sending -> Completed`. Validation
//! failures return before any send. Per-recipient failures are recorded in
//! the [`CampaignResult`] and never stop the batch. There is no retry and
//! no cancellation.

pub mod dispatcher;
pub mod pacer;

use serde::Serialize;

use crate::contacts::Group;
use crate::media::{ContentKind, MediaError, MediaKind};

pub use dispatcher::CampaignDispatcher;
pub use pacer::{DelayPolicy, Pacer, TokioPacer};

/// Errors that stop a campaign before its first send.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// The transport is not connected.
    #[error("WhatsApp client is not ready. Please check connection.")]
    NotReady,

    /// The target group has no members.
    #[error("No contacts found for {0} party")]
    EmptyGroup(Group),

    /// The message is empty after trimming.
    #[error("No custom message set. Please add a message first.")]
    NoMessage,

    /// The campaign needs an attachment that is not configured or no longer
    /// exists on disk.
    #[error("No {0} file set. Please upload one first.")]
    MediaMissing(MediaKind),

    /// The attachment exists but could not be loaded.
    #[error("Failed to load {kind} file: {source}")]
    MediaLoadFailed {
        /// Which slot failed.
        kind: MediaKind,
        /// Loader error.
        source: MediaError,
    },

    /// Another campaign is already sending.
    #[error("a campaign is already running")]
    AlreadyRunning,
}

/// One dispatch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    /// Target group.
    pub group: Group,
    /// Plain text or one media kind.
    pub kind: ContentKind,
    /// Message body, or caption for image and video.
    pub message: String,
}

impl Campaign {
    /// Build a campaign request.
    pub fn new(group: Group, kind: ContentKind, message: impl Into<String>) -> Self {
        Self {
            group,
            kind,
            message: message.into(),
        }
    }
}

/// Where the dispatcher is in its current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignPhase {
    /// No run started, or the last run failed validation.
    #[default]
    Idle,
    /// Checking readiness, recipients, message and media.
    Validating,
    /// Delivering to recipients.
    Sending,
    /// The last run finished.
    Completed,
}

/// Delivery outcome for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    /// The transport accepted the message.
    Success,
    /// The transport reported an error.
    Failed,
}

/// One entry of the per-recipient outcome list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    /// Masked recipient number.
    pub recipient: String,
    /// Outcome of the send.
    pub status: SendStatus,
    /// Transport error message for failed sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignResult {
    /// Group the run targeted.
    pub group: Group,
    /// Content kind that was sent.
    pub kind: ContentKind,
    /// Recipients in the snapshot taken at the start of the run.
    pub total_targeted: usize,
    /// Successful sends.
    pub succeeded: usize,
    /// Failed sends.
    pub failed: usize,
    /// Outcomes in send order.
    pub per_recipient: Vec<RecipientOutcome>,
}
