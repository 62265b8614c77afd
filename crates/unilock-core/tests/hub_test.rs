#![allow(clippy::unwrap_used)]
// Integration tests for `AccessHub` against a mocked hub.
//
// Frames are fed through `AccessHub::ingest`, so no WebSocket is involved;
// the REST side runs against wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unilock_core::{
    AccessHub, ContactState, CoreError, DeviceKind, HubConfig, LockState, StateChange,
    TlsVerification,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AccessHub) {
    let server = MockServer::start().await;
    let mut config = HubConfig::new(
        server.uri().parse().unwrap(),
        SecretString::from("test-token".to_string()),
    );
    config.tls = TlsVerification::SystemDefaults;
    let hub = AccessHub::new(config).unwrap();
    (server, hub)
}

async fn mount_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/developer/devices"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "SUCCESS",
            "data": [
                [
                    { "id": "hub-1", "name": "Front Hub", "type": "UAH" },
                    { "id": "reader-1", "name": "Front Reader", "type": "UA-G2-MINI" }
                ],
                [
                    { "id": "cam-1", "name": "Lobby Camera", "type": "UVC-G4" }
                ]
            ]
        })))
        .mount(server)
        .await;
}

/// Wait for the first change matching `pred`, skipping the rest.
async fn wait_for(
    changes: &mut broadcast::Receiver<StateChange>,
    pred: impl Fn(&StateChange) -> bool,
) -> StateChange {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let change = changes.recv().await.unwrap();
            if pred(&change) {
                return change;
            }
        }
    })
    .await
    .unwrap()
}

fn link_frame(device_id: &str, door_id: &str) -> serde_json::Value {
    json!({
        "event": "access.data.device.update",
        "deviceId": device_id,
        "data": {
            "unique_id": device_id,
            "door": { "unique_id": door_id, "name": "Front Door" },
            "configs": [
                { "key": "input_state_rly-lock_dry", "value": "on" }
            ]
        }
    })
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discover_seeds_kind_defaults() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;

    assert_eq!(hub.discover().await.unwrap(), 3);

    let snapshot = hub.devices_snapshot();
    let ids: Vec<_> = snapshot.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["cam-1", "hub-1", "reader-1"]);

    let front = hub.device("hub-1").unwrap();
    assert_eq!(front.kind, DeviceKind::DoorLockHub);
    assert_eq!(front.state.lock, Some(LockState::Locked));
    assert_eq!(front.state.door, Some(ContactState::Closed));

    let reader = hub.device("reader-1").unwrap();
    assert_eq!(reader.state.door, Some(ContactState::Closed));
    assert_eq!(reader.state.lock, None);

    let camera = hub.device("cam-1").unwrap();
    assert_eq!(camera.kind, DeviceKind::Unknown);
    assert_eq!(camera.state.door, None);

    assert_eq!(hub.device_by_uuid(&front.uuid).unwrap().id, "hub-1");
    hub.shutdown().await;
}

#[tokio::test]
async fn rediscovery_keeps_live_state() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    hub.discover().await.unwrap();

    let mut changes = hub.subscribe();
    hub.ingest(link_frame("hub-1", "door-9")).unwrap();
    wait_for(&mut changes, |c| {
        matches!(c, StateChange::Snapshot(r) if r.id == "hub-1")
    })
    .await;
    assert_eq!(hub.device("hub-1").unwrap().state.lock, Some(LockState::Unlocked));

    assert_eq!(hub.discover().await.unwrap(), 0);
    assert_eq!(hub.device("hub-1").unwrap().state.lock, Some(LockState::Unlocked));
    hub.shutdown().await;
}

#[tokio::test]
async fn empty_listing_is_an_error() {
    let (server, hub) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/developer/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [[]] })))
        .mount(&server)
        .await;

    let err = hub.discover().await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }), "got {err:?}");
    assert!(hub.devices_snapshot().is_empty());
    hub.shutdown().await;
}

// ── Unlock ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unlock_device_needs_a_linked_door() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    hub.discover().await.unwrap();

    let err = hub.unlock_device("hub-1").await.unwrap_err();
    assert!(matches!(err, CoreError::DoorNotLinked { .. }), "got {err:?}");
    hub.shutdown().await;
}

#[tokio::test]
async fn unlock_device_sends_one_put_to_its_door() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/developer/doors/door-9/unlock"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "SUCCESS" })))
        .expect(1)
        .mount(&server)
        .await;

    hub.discover().await.unwrap();
    let mut changes = hub.subscribe();
    hub.ingest(link_frame("hub-1", "door-9")).unwrap();

    let linked = wait_for(&mut changes, |c| matches!(c, StateChange::DoorLinked { .. })).await;
    let StateChange::DoorLinked {
        device_id, door_id, ..
    } = linked
    else {
        unreachable!()
    };
    assert_eq!(device_id, "hub-1");
    assert_eq!(door_id.as_deref(), Some("door-9"));

    hub.unlock_device("hub-1").await.unwrap();
    hub.shutdown().await;
}

#[tokio::test]
async fn failed_unlock_leaves_state_alone() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/developer/doors/door-9/unlock"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    hub.discover().await.unwrap();
    let before = hub.device("hub-1").unwrap();

    let err = hub.unlock_door("door-9").await.unwrap_err();
    match err {
        CoreError::Api { status, .. } => assert_eq!(status, Some(403)),
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(hub.device("hub-1").unwrap().state, before.state);
    hub.shutdown().await;
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn door_position_reaches_linked_hub() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    hub.discover().await.unwrap();

    let mut changes = hub.subscribe();
    hub.ingest(link_frame("hub-1", "door-9")).unwrap();
    hub.ingest(json!({
        "event": "access.dps_change",
        "data": { "door_id": "door-9", "door_name": "Front Door", "status": "open" }
    }))
    .unwrap();

    wait_for(&mut changes, |c| {
        matches!(
            c,
            StateChange::Field { device_id, change: unilock_core::FieldChange::DoorContact(ContactState::Open) }
                if device_id == "hub-1"
        )
    })
    .await;
    assert_eq!(hub.device("hub-1").unwrap().state.door, Some(ContactState::Open));
    hub.shutdown().await;
}

#[tokio::test]
async fn remove_device_forgets_it() {
    let (server, hub) = setup().await;
    mount_devices(&server).await;
    hub.discover().await.unwrap();

    let removed = hub.remove_device("cam-1").await.unwrap().unwrap();
    assert_eq!(removed.id, "cam-1");
    assert!(hub.device("cam-1").is_none());
    assert_eq!(hub.devices_snapshot().len(), 2);
    hub.shutdown().await;
}
