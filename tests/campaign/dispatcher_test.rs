//! Dispatcher validation, ordering, failure isolation and payload shaping.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use segcast::campaign::{
    Campaign, CampaignDispatcher, CampaignError, CampaignPhase, SendStatus,
};
use segcast::contacts::{ContactRegistry, Group, RecipientId};
use segcast::media::{ContentKind, MediaKind, MediaSlotStore};
use segcast::store::{DiskStore, FileStore, StoreError};
use segcast::transport::{Payload, SendOptions, Transport, TransportError};

use crate::fakes::{registry_in, RecordingPacer, ScriptedTransport};

struct Fixture {
    _tmp: tempfile::TempDir,
    media_dir: PathBuf,
    registry: Arc<ContactRegistry>,
    media: Arc<MediaSlotStore>,
    transport: Arc<ScriptedTransport>,
    pacer: Arc<RecordingPacer>,
    dispatcher: CampaignDispatcher,
}

fn fixture(transport: ScriptedTransport) -> Fixture {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(&tmp.path().join("contacts"));
    let media = Arc::new(MediaSlotStore::new(Arc::new(DiskStore)));
    let transport = Arc::new(transport);
    let pacer = Arc::new(RecordingPacer::default());
    let dispatcher = CampaignDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&media),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .with_pacer(Arc::clone(&pacer) as Arc<dyn segcast::campaign::Pacer>);
    let media_dir = tmp.path().join("media");
    if let Err(err) = std::fs::create_dir_all(&media_dir) {
        panic!("media dir should be created: {err}");
    }
    Fixture {
        _tmp: tmp,
        media_dir,
        registry,
        media,
        transport,
        pacer,
        dispatcher,
    }
}

fn write_media(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Err(err) = std::fs::write(&path, b"fake media") {
        panic!("media fixture should be written: {err}");
    }
    path
}

#[tokio::test]
async fn second_failure_is_isolated_and_order_is_kept() {
    let f = fixture(ScriptedTransport::failing_on(&[1]));
    f.registry
        .add_many(&["9000000001", "9000000002", "9000000003"], Group::Inc);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "Vote on Sunday"))
        .await;
    let result = match result {
        Ok(result) => result,
        Err(err) => panic!("campaign should complete: {err}"),
    };

    assert_eq!(result.total_targeted, 3);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    let masked: Vec<&str> = result
        .per_recipient
        .iter()
        .map(|o| o.recipient.as_str())
        .collect();
    assert_eq!(masked, vec!["XXXXXX0001", "XXXXXX0002", "XXXXXX0003"]);

    let statuses: Vec<SendStatus> = result.per_recipient.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![SendStatus::Success, SendStatus::Failed, SendStatus::Success]
    );
    assert!(result.per_recipient[1]
        .error
        .as_deref()
        .is_some_and(|e| !e.is_empty()));
    assert!(result.per_recipient[0].error.is_none());

    let sent_to: Vec<String> = f.transport.calls().into_iter().map(|c| c.recipient).collect();
    assert_eq!(
        sent_to,
        vec!["919000000001@c.us", "919000000002@c.us", "919000000003@c.us"]
    );
    assert_eq!(
        f.pacer.pauses(),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(5),
            Duration::from_secs(3)
        ]
    );
    assert_eq!(f.dispatcher.phase(), CampaignPhase::Completed);
}

#[tokio::test]
async fn every_recipient_failing_still_completes() {
    let f = fixture(ScriptedTransport::failing_on(&[0, 1]));
    f.registry.add_many(&["9000000001", "9000000002"], Group::Bjp);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Bjp, ContentKind::Text, "hello"))
        .await;
    assert!(matches!(result, Ok(ref r) if r.failed == 2 && r.succeeded == 0));
    assert_eq!(f.transport.calls().len(), 2);
}

#[tokio::test]
async fn empty_video_slot_fails_before_any_send() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::All);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::All, ContentKind::Video, "watch this"))
        .await;
    assert!(matches!(
        result,
        Err(CampaignError::MediaMissing(MediaKind::Video))
    ));
    assert!(f.transport.calls().is_empty());
    assert!(f.pacer.pauses().is_empty());
    assert_eq!(f.dispatcher.phase(), CampaignPhase::Idle);
}

#[tokio::test]
async fn deleted_media_file_counts_as_missing() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::All);
    let image = write_media(&f.media_dir, "poster.jpg");
    f.media.set(MediaKind::Image, image.clone());
    if let Err(err) = std::fs::remove_file(&image) {
        panic!("fixture should be removable: {err}");
    }

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::All, ContentKind::Image, "caption"))
        .await;
    assert!(matches!(
        result,
        Err(CampaignError::MediaMissing(MediaKind::Image))
    ));
    assert!(f.transport.calls().is_empty());
}

#[tokio::test]
async fn not_ready_transport_is_rejected() {
    let f = fixture(ScriptedTransport::not_ready());
    f.registry.add_many(&["9000000001"], Group::Inc);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "hello"))
        .await;
    assert!(matches!(result, Err(CampaignError::NotReady)));
    assert!(f.transport.calls().is_empty());
}

#[tokio::test]
async fn empty_group_is_rejected() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::Inc);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Brs, ContentKind::Text, "hello"))
        .await;
    assert!(matches!(result, Err(CampaignError::EmptyGroup(Group::Brs))));
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::Inc);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "  \n\t "))
        .await;
    assert!(matches!(result, Err(CampaignError::NoMessage)));
    assert!(f.transport.calls().is_empty());
}

#[tokio::test]
async fn text_campaign_sends_plain_body() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::Inc);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "plain body"))
        .await;
    assert!(result.is_ok());

    let calls = f.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload, Payload::Text("plain body".to_owned()));
    assert_eq!(calls[0].options, SendOptions::default());
}

#[tokio::test]
async fn image_campaign_uses_message_as_caption() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001", "9000000002"], Group::Inc);
    let image = write_media(&f.media_dir, "poster.jpg");
    f.media.set(MediaKind::Image, image);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Image, "Rally at 5"))
        .await;
    assert!(result.is_ok());

    let calls = f.transport.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        match &call.payload {
            Payload::Media(media) => {
                assert_eq!(media.mimetype, "image/jpeg");
                assert_eq!(media.filename, "poster.jpg");
            }
            other => panic!("expected media payload, got {other:?}"),
        }
        assert_eq!(call.options.caption.as_deref(), Some("Rally at 5"));
        assert!(!call.options.send_audio_as_voice);
    }
    // The payload is resolved once and shared by every send.
    match (&calls[0].payload, &calls[1].payload) {
        (Payload::Media(a), Payload::Media(b)) => assert!(Arc::ptr_eq(a, b)),
        other => panic!("expected media payloads, got {other:?}"),
    }
}

#[tokio::test]
async fn audio_campaign_is_a_voice_note_without_caption() {
    let f = fixture(ScriptedTransport::ready());
    f.registry.add_many(&["9000000001"], Group::Brs);
    let audio = write_media(&f.media_dir, "speech.ogg");
    f.media.set(MediaKind::Audio, audio);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Brs, ContentKind::Audio, "ignored for audio"))
        .await;
    assert!(result.is_ok());

    let calls = f.transport.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].options.send_audio_as_voice);
    assert!(calls[0].options.caption.is_none());
}

#[tokio::test]
async fn video_success_waits_longer() {
    let f = fixture(ScriptedTransport::failing_on(&[1]));
    f.registry.add_many(&["9000000001", "9000000002"], Group::Inc);
    let clip = write_media(&f.media_dir, "clip.mp4");
    f.media.set(MediaKind::Video, clip);

    let result = f
        .dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Video, "watch"))
        .await;
    assert!(result.is_ok());
    assert_eq!(
        f.pacer.pauses(),
        vec![Duration::from_secs(5), Duration::from_secs(5)]
    );
}

/// Store that claims every file exists, so loading is what fails.
struct PhantomStore;

impl FileStore for PhantomStore {
    fn read_text(&self, _path: &Path) -> Result<Option<String>, StoreError> {
        Ok(None)
    }
    fn write_text(&self, _path: &Path, _content: &str) -> Result<(), StoreError> {
        Ok(())
    }
    fn copy(&self, _from: &Path, _to: &Path) -> Result<(), StoreError> {
        Ok(())
    }
    fn exists(&self, _path: &Path) -> bool {
        true
    }
    fn delete(&self, _path: &Path) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn unloadable_media_aborts_before_sending() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(tmp.path());
    registry.add_many(&["9000000001"], Group::Inc);
    let media = Arc::new(MediaSlotStore::new(Arc::new(PhantomStore)));
    media.set(MediaKind::Image, tmp.path().join("ghost.jpg"));
    let transport = Arc::new(ScriptedTransport::ready());
    let dispatcher = CampaignDispatcher::new(
        registry,
        media,
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .with_pacer(Arc::new(RecordingPacer::default()));

    let result = dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Image, "caption"))
        .await;
    assert!(matches!(
        result,
        Err(CampaignError::MediaLoadFailed {
            kind: MediaKind::Image,
            ..
        })
    ));
    assert!(transport.calls().is_empty());
}

/// Transport that clears the group and adds a newcomer on its first send.
struct MutatingTransport {
    registry: Arc<ContactRegistry>,
    sent: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for MutatingTransport {
    fn is_ready(&self) -> bool {
        true
    }

    async fn send(
        &self,
        recipient: &RecipientId,
        _payload: &Payload,
        _options: &SendOptions,
    ) -> Result<(), TransportError> {
        let first = match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(recipient.as_str().to_owned());
                sent.len() == 1
            }
            Err(err) => panic!("sent lock poisoned: {err}"),
        };
        if first {
            let _ = self.registry.clear(Some(Group::Inc));
            self.registry.add_many(&["9000000099"], Group::Inc);
        }
        Ok(())
    }
}

#[tokio::test]
async fn registry_changes_during_a_run_do_not_affect_it() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(tmp.path());
    registry.add_many(&["9000000001", "9000000002"], Group::Inc);
    let transport = Arc::new(MutatingTransport {
        registry: Arc::clone(&registry),
        sent: std::sync::Mutex::new(Vec::new()),
    });
    let dispatcher = CampaignDispatcher::new(
        Arc::clone(&registry),
        Arc::new(MediaSlotStore::new(Arc::new(DiskStore))),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .with_pacer(Arc::new(RecordingPacer::default()));

    let result = dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "hi"))
        .await;
    assert!(matches!(result, Ok(ref r) if r.total_targeted == 2 && r.succeeded == 2));

    let sent = match transport.sent.lock() {
        Ok(sent) => sent.clone(),
        Err(err) => panic!("sent lock poisoned: {err}"),
    };
    assert_eq!(sent, vec!["919000000001@c.us", "919000000002@c.us"]);
    assert_eq!(registry.members_of(Group::Inc).len(), 1);
}
