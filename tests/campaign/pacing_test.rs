//! Real-timer pacing on Tokio's paused clock, and the single-worker guard.

use std::sync::Arc;
use std::time::Duration;

use segcast::campaign::{Campaign, CampaignDispatcher, CampaignError, DelayPolicy};
use segcast::contacts::Group;
use segcast::media::{ContentKind, MediaSlotStore};
use segcast::store::DiskStore;
use segcast::transport::Transport;

use crate::fakes::{registry_in, ScriptedTransport};

#[tokio::test(start_paused = true)]
async fn tokio_pacer_sleeps_between_sends() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(tmp.path());
    registry.add_many(&["9000000001", "9000000002", "9000000003"], Group::Inc);
    let transport = Arc::new(ScriptedTransport::failing_on(&[2]));
    let dispatcher = CampaignDispatcher::new(
        registry,
        Arc::new(MediaSlotStore::new(Arc::new(DiskStore))),
        transport as Arc<dyn Transport>,
    );

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "hello"))
        .await;
    assert!(result.is_ok());

    // 3s + 3s after two successes, 5s after the failure.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(11), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(12), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn configured_delays_are_used() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(tmp.path());
    registry.add_many(&["9000000001", "9000000002"], Group::Bjp);
    let dispatcher = CampaignDispatcher::new(
        registry,
        Arc::new(MediaSlotStore::new(Arc::new(DiskStore))),
        Arc::new(ScriptedTransport::ready()) as Arc<dyn Transport>,
    )
    .with_delays(DelayPolicy {
        success: Duration::from_millis(100),
        video_success: Duration::from_millis(200),
        failure: Duration::from_millis(300),
    });

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .run(&Campaign::new(Group::Bjp, ContentKind::Text, "hello"))
        .await;
    assert!(result.is_ok());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn second_run_while_sending_is_refused() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let registry = registry_in(tmp.path());
    registry.add_many(&["9000000001", "9000000002"], Group::Inc);
    let transport = Arc::new(ScriptedTransport::ready());
    let dispatcher = Arc::new(CampaignDispatcher::new(
        registry,
        Arc::new(MediaSlotStore::new(Arc::new(DiskStore))),
        Arc::clone(&transport) as Arc<dyn Transport>,
    ));

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .run(&Campaign::new(Group::Inc, ContentKind::Text, "first"))
                .await
        })
    };
    // Let the first run reach its first pause.
    tokio::task::yield_now().await;

    let second = dispatcher
        .run(&Campaign::new(Group::Inc, ContentKind::Text, "second"))
        .await;
    assert!(matches!(second, Err(CampaignError::AlreadyRunning)));

    let first = match first.await {
        Ok(result) => result,
        Err(err) => panic!("first run task should join: {err}"),
    };
    assert!(matches!(first, Ok(ref r) if r.succeeded == 2));
    assert_eq!(transport.calls().len(), 2);
}
