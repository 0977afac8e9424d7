//! The sequential, throttled send loop.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::pacer::{DelayPolicy, Pacer, TokioPacer};
use super::{Campaign, CampaignError, CampaignPhase, CampaignResult, RecipientOutcome, SendStatus};
use crate::contacts::{ContactRegistry, RecipientId};
use crate::media::{ContentKind, MediaPayload, MediaSlotStore};
use crate::transport::{Payload, SendOptions, Transport};

/// Error text recorded when a transport fails without a message.
const UNKNOWN_SEND_ERROR: &str = "unknown send error";

/// Everything resolved during validation. Later registry or media changes
/// do not affect a run that holds one of these.
struct PreparedRun {
    recipients: Vec<RecipientId>,
    payload: Payload,
    options: SendOptions,
}

/// Runs campaigns against a [`Transport`].
///
/// Only one run sends at a time; a second concurrent [`run`](Self::run)
/// fails with [`CampaignError::AlreadyRunning`].
pub struct CampaignDispatcher {
    registry: Arc<ContactRegistry>,
    media: Arc<MediaSlotStore>,
    transport: Arc<dyn Transport>,
    pacer: Arc<dyn Pacer>,
    delays: DelayPolicy,
    worker: tokio::sync::Mutex<()>,
    phase: Mutex<CampaignPhase>,
}

impl CampaignDispatcher {
    /// Create a dispatcher with the default delays and the Tokio timer.
    pub fn new(
        registry: Arc<ContactRegistry>,
        media: Arc<MediaSlotStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            media,
            transport,
            pacer: Arc::new(TokioPacer),
            delays: DelayPolicy::default(),
            worker: tokio::sync::Mutex::new(()),
            phase: Mutex::new(CampaignPhase::Idle),
        }
    }

    /// Replace the pacer.
    #[must_use]
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Replace the delay policy.
    #[must_use]
    pub fn with_delays(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    /// Phase of the current or most recent run.
    pub fn phase(&self) -> CampaignPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: CampaignPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Run `campaign` to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`CampaignError`] if validation fails or another run is in
    /// progress. No message has been sent in either case.
    pub async fn run(&self, campaign: &Campaign) -> Result<CampaignResult, CampaignError> {
        let _worker = self
            .worker
            .try_lock()
            .map_err(|_| CampaignError::AlreadyRunning)?;

        let span = info_span!(
            "campaign",
            run_id = %Uuid::new_v4(),
            group = %campaign.group,
            kind = %campaign.kind
        );

        async {
            self.set_phase(CampaignPhase::Validating);
            let prepared = match self.prepare(campaign).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    warn!(error = %e, "campaign rejected");
                    self.set_phase(CampaignPhase::Idle);
                    return Err(e);
                }
            };

            self.set_phase(CampaignPhase::Sending);
            let result = self.send_all(campaign, prepared).await;
            self.set_phase(CampaignPhase::Completed);

            info!(
                total = result.total_targeted,
                succeeded = result.succeeded,
                failed = result.failed,
                "campaign completed"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Validate the request and resolve recipients and payload once.
    async fn prepare(&self, campaign: &Campaign) -> Result<PreparedRun, CampaignError> {
        if !self.transport.is_ready() {
            return Err(CampaignError::NotReady);
        }

        let recipients = self.registry.members_of(campaign.group);
        if recipients.is_empty() {
            return Err(CampaignError::EmptyGroup(campaign.group));
        }

        if campaign.message.trim().is_empty() {
            return Err(CampaignError::NoMessage);
        }

        let (payload, options) = match campaign.kind.media_kind() {
            None => (Payload::Text(campaign.message.clone()), SendOptions::default()),
            Some(kind) => {
                let path = self
                    .media
                    .existing(kind)
                    .ok_or(CampaignError::MediaMissing(kind))?;
                let media = MediaPayload::from_file(&path)
                    .await
                    .map_err(|source| CampaignError::MediaLoadFailed { kind, source })?;
                info!(%kind, file = %media.filename, "campaign media loaded");

                let options = match campaign.kind {
                    ContentKind::Audio => SendOptions {
                        caption: None,
                        send_audio_as_voice: true,
                    },
                    _ => SendOptions {
                        caption: Some(campaign.message.clone()),
                        send_audio_as_voice: false,
                    },
                };
                (Payload::Media(Arc::new(media)), options)
            }
        };

        Ok(PreparedRun {
            recipients,
            payload,
            options,
        })
    }

    /// Deliver to each recipient in order, pausing after every attempt.
    async fn send_all(&self, campaign: &Campaign, prepared: PreparedRun) -> CampaignResult {
        let total = prepared.recipients.len();
        info!(recipients = total, "starting campaign");

        let mut per_recipient = Vec::with_capacity(total);
        let mut succeeded: usize = 0;
        let mut failed: usize = 0;

        for recipient in &prepared.recipients {
            let masked = recipient.masked();
            let attempt = self
                .transport
                .send(recipient, &prepared.payload, &prepared.options)
                .await;

            let delay = match attempt {
                Ok(()) => {
                    succeeded = succeeded.saturating_add(1);
                    info!(recipient = %masked, "sent");
                    per_recipient.push(RecipientOutcome {
                        recipient: masked,
                        status: SendStatus::Success,
                        error: None,
                    });
                    self.delays.after_success(campaign.kind)
                }
                Err(e) => {
                    failed = failed.saturating_add(1);
                    let mut error = e.to_string();
                    if error.trim().is_empty() {
                        error = UNKNOWN_SEND_ERROR.to_owned();
                    }
                    warn!(recipient = %masked, %error, "send failed");
                    per_recipient.push(RecipientOutcome {
                        recipient: masked,
                        status: SendStatus::Failed,
                        error: Some(error),
                    });
                    self.delays.after_failure(campaign.kind)
                }
            };
            self.pacer.pause(delay).await;
        }

        CampaignResult {
            group: campaign.group,
            kind: campaign.kind,
            total_targeted: total,
            succeeded,
            failed,
            per_recipient,
        }
    }
}
