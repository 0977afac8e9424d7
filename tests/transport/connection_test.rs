//! Connection state machine and readiness waiting.

use std::sync::Arc;
use std::time::Duration;

use segcast::transport::{ConnectionEvent, ConnectionState, ConnectionTracker};

#[test]
fn lifecycle_follows_observed_events() {
    let tracker = ConnectionTracker::new();
    assert_eq!(tracker.state(), ConnectionState::Disconnected);
    assert!(!tracker.is_ready());

    assert_eq!(
        tracker.observe(&ConnectionEvent::Connecting),
        ConnectionState::Connecting
    );
    assert_eq!(tracker.observe(&ConnectionEvent::Qr), ConnectionState::Connecting);
    assert_eq!(tracker.observe(&ConnectionEvent::Ready), ConnectionState::Ready);
    assert!(tracker.is_ready());

    assert_eq!(
        tracker.observe(&ConnectionEvent::Disconnected("LOGOUT".to_owned())),
        ConnectionState::Disconnected
    );
    assert!(!tracker.is_ready());
}

#[test]
fn auth_failure_drops_readiness() {
    let tracker = ConnectionTracker::new();
    tracker.observe(&ConnectionEvent::Ready);
    tracker.observe(&ConnectionEvent::AuthFailure("bad session".to_owned()));
    assert_eq!(tracker.state(), ConnectionState::Disconnected);
}

#[test]
fn qr_while_ready_restarts_pairing() {
    assert_eq!(
        ConnectionState::Ready.on(&ConnectionEvent::Qr),
        ConnectionState::Connecting
    );
    assert_eq!(
        ConnectionState::Disconnected.on(&ConnectionEvent::Ready),
        ConnectionState::Ready
    );
}

#[tokio::test(start_paused = true)]
async fn wait_ready_times_out_when_never_ready() {
    let tracker = ConnectionTracker::new();
    assert!(!tracker.wait_ready(Duration::from_secs(30)).await);
}

#[tokio::test]
async fn wait_ready_returns_immediately_when_ready() {
    let tracker = ConnectionTracker::new();
    tracker.observe(&ConnectionEvent::Ready);
    assert!(tracker.wait_ready(Duration::from_millis(10)).await);
}

#[tokio::test]
async fn wait_ready_wakes_on_transition() {
    let tracker = Arc::new(ConnectionTracker::new());
    let waiter = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.wait_ready(Duration::from_secs(5)).await })
    };
    tokio::task::yield_now().await;
    tracker.observe(&ConnectionEvent::Connecting);
    tracker.observe(&ConnectionEvent::Ready);

    match waiter.await {
        Ok(ready) => assert!(ready),
        Err(err) => panic!("waiter should join: {err}"),
    }
}
