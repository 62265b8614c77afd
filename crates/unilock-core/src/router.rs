// ── Event router ──
//
// Classifies one decoded notification frame and applies it through the
// reconciler. Nothing in here returns an error: malformed input is logged
// and dropped at the boundary of the frame that carried it.

use serde_json::Value;
use tracing::{debug, info, trace, warn};
use unilock_api::events::{DeviceUpdate, DoorPositionChange, LogAdded};
use unilock_api::{AccessEvent, Envelope};

use crate::mapper;
use crate::model::{ContactState, DeviceKind, FieldChange};
use crate::reconcile::Reconciler;

/// Route one frame. Returns `false` if the frame was not a valid envelope.
pub fn route(reconciler: &mut Reconciler, frame: &Value) -> bool {
    let Some(envelope) = Envelope::from_value(frame) else {
        trace!("ignoring frame without a string event");
        return false;
    };

    match AccessEvent::decode(&envelope) {
        Ok(event) => dispatch(reconciler, event),
        Err(e) => {
            warn!(event = %envelope.event, error = %e, "skipping malformed event payload");
        }
    }

    if let Some(device_id) = envelope.device_id.as_deref() {
        reconciler.emit_snapshot(device_id);
    }
    true
}

fn dispatch(reconciler: &mut Reconciler, event: AccessEvent) {
    match event {
        AccessEvent::RemoteUnlock(data) => {
            info!(data = ?data, "remote unlock reported by hub");
        }
        AccessEvent::DeviceUpdate(update) => on_device_update(reconciler, &update),
        AccessEvent::LogAdded(log) => on_log_added(reconciler, &log),
        AccessEvent::DoorPositionChange(change) => on_door_position(reconciler, &change),
        AccessEvent::DoorBell(_) | AccessEvent::RemoteView(_) | AccessEvent::RemoteViewChange(_) => {
            debug!(event = event.name(), "accepted");
        }
        AccessEvent::Unrecognized { event, data } => {
            debug!(event = %event, data = ?data, "unrecognized event");
        }
    }
}

fn on_device_update(reconciler: &mut Reconciler, update: &DeviceUpdate) {
    let device_id = update.unique_id.as_str();
    if reconciler.store().get(device_id).is_none() {
        warn!(device_id, "device update for unregistered device; run discovery to pick it up");
        return;
    }

    if let Some(door) = &update.door {
        reconciler.link_door(device_id, door.unique_id.clone(), door.name.clone());
    }

    for entry in update.entries() {
        let Some(mapped) = mapper::map_config(&entry.key, &entry.value) else {
            continue;
        };
        if mapped.defaulted {
            warn!(
                device_id,
                key = %entry.key,
                value = %entry.value,
                fallback = mapped.change.value_str(),
                "unhandled config value, using fallback"
            );
        }
        reconciler.apply_config_field(device_id, mapped.change);
    }
}

fn on_log_added(reconciler: &mut Reconciler, log: &LogAdded) {
    let Some(device_id) = log
        .source
        .targets()
        .filter(|t| DeviceKind::from_vendor_type(&t.target_type).is_reader_class())
        .find_map(|t| t.id)
    else {
        trace!("access log without a reader target");
        return;
    };

    if reconciler.store().get(&device_id).is_none() {
        warn!(device_id = %device_id, "access log for unregistered reader; run discovery to pick it up");
        return;
    }

    let opened = log.source.event.is_some();
    debug!(device_id = %device_id, opened, "reader access event");
    reconciler.apply_contact_event(&device_id, opened);
}

fn on_door_position(reconciler: &mut Reconciler, change: &DoorPositionChange) {
    let state = if change.is_closed() {
        ContactState::Closed
    } else {
        ContactState::Open
    };

    let hubs: Vec<_> = reconciler
        .store()
        .on_door(&change.door_id)
        .into_iter()
        .filter(|r| r.kind.is_hub_class())
        .collect();

    if hubs.is_empty() {
        debug!(door_id = %change.door_id, "door position change for a door with no linked hub");
        return;
    }
    for hub in hubs {
        reconciler.apply_config_field(&hub.id, FieldChange::DoorContact(state));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::{broadcast, mpsc};

    use super::*;
    use crate::model::{DeviceRecord, LockState};
    use crate::reconcile::StateChange;
    use crate::store::{DebounceFired, DeviceStore};

    fn setup() -> (
        Reconciler,
        broadcast::Receiver<StateChange>,
        mpsc::UnboundedReceiver<DebounceFired>,
    ) {
        let (changes_tx, mut changes) = broadcast::channel(64);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let mut reconciler = Reconciler::with_debounce(
            Arc::new(DeviceStore::new()),
            changes_tx,
            Duration::from_secs(5),
            fired_tx,
        );
        reconciler.seed(vec![
            DeviceRecord::new("hub-1", "Front Hub", "UAH"),
            DeviceRecord::new("reader-1", "Front Reader", "UA-G2-MINI"),
            DeviceRecord::new("mystery-1", "Thing", "UA-ULTRA"),
        ]);
        while changes.try_recv().is_ok() {}
        (reconciler, changes, fired_rx)
    }

    fn collect(changes: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
        let mut out = Vec::new();
        while let Ok(change) = changes.try_recv() {
            out.push(change);
        }
        out
    }

    fn device_update(configs: &Value) -> Value {
        json!({
            "event": "access.data.device.update",
            "data": {
                "unique_id": "hub-1",
                "door": { "unique_id": "door-9", "name": "Front" },
                "configs": configs
            }
        })
    }

    #[test]
    fn invalid_envelopes_are_noops() {
        let (mut reconciler, mut changes, _fired) = setup();
        let before = reconciler.store().snapshot();

        for frame in [
            json!(null),
            json!("access.logs.add"),
            json!([1, 2]),
            json!({ "event": 7, "deviceId": "hub-1" }),
            json!({ "deviceId": "hub-1", "data": {} }),
        ] {
            assert!(!route(&mut reconciler, &frame));
        }

        assert!(collect(&mut changes).is_empty());
        assert_eq!(reconciler.store().snapshot(), before);
    }

    #[test]
    fn device_update_maps_configs_and_links_door() {
        let (mut reconciler, mut changes, _fired) = setup();
        route(
            &mut reconciler,
            &device_update(&json!([
                { "key": "input_state_dps", "value": "off" },
                { "key": "input_state_rly-lock_dry", "value": "on" },
                { "key": "input_state_rex", "value": "off" },
                { "key": "wiegand_in", "value": "on" }
            ])),
        );

        let hub = reconciler.store().get("hub-1").unwrap();
        assert_eq!(hub.door_id.as_deref(), Some("door-9"));
        assert_eq!(hub.door_name.as_deref(), Some("Front"));
        assert_eq!(hub.state.door, Some(ContactState::Open));
        assert_eq!(hub.state.lock, Some(LockState::Unlocked));
        assert_eq!(hub.state.request_to_exit, Some(ContactState::Closed));

        let fields: Vec<_> = collect(&mut changes)
            .into_iter()
            .filter_map(|c| match c {
                StateChange::Field { change, .. } => Some(change),
                _ => None,
            })
            .collect();
        assert_eq!(
            fields,
            [
                FieldChange::DoorContact(ContactState::Open),
                FieldChange::Lock(LockState::Unlocked),
            ]
        );
    }

    #[test]
    fn repeated_device_updates_notify_once() {
        let (mut reconciler, mut changes, _fired) = setup();
        let frame = device_update(&json!([{ "key": "input_state_rly-lock_dry", "value": "on" }]));

        route(&mut reconciler, &frame);
        route(&mut reconciler, &frame);
        route(&mut reconciler, &frame);

        let field_changes = collect(&mut changes)
            .into_iter()
            .filter(|c| matches!(c, StateChange::Field { .. }))
            .count();
        assert_eq!(field_changes, 1);
    }

    #[test]
    fn repeated_door_open_reports_one_transition() {
        let (mut reconciler, mut changes, _fired) = setup();
        let frame = device_update(&json!([{ "key": "input_state_dps", "value": "off" }]));

        route(&mut reconciler, &frame);
        route(&mut reconciler, &frame);

        let fields: Vec<_> = collect(&mut changes)
            .into_iter()
            .filter_map(|c| match c {
                StateChange::Field { change, .. } => Some(change),
                _ => None,
            })
            .collect();
        assert_eq!(fields, [FieldChange::DoorContact(ContactState::Open)]);
    }

    #[test]
    fn bad_config_entry_does_not_drop_the_update() {
        let (mut reconciler, _changes, _fired) = setup();
        route(
            &mut reconciler,
            &device_update(&json!([
                { "key": "input_state_rly-lock_dry", "value": "on" },
                { "tag": "no key here", "value": "on" }
            ])),
        );

        let hub = reconciler.store().get("hub-1").unwrap();
        assert_eq!(hub.state.lock, Some(LockState::Unlocked));
        assert_eq!(hub.door_id.as_deref(), Some("door-9"));
    }

    #[test]
    fn door_position_on_means_closed() {
        let (mut reconciler, _changes, _fired) = setup();
        route(
            &mut reconciler,
            &device_update(&json!([{ "key": "input_state_dps", "value": "off" }])),
        );
        assert_eq!(
            reconciler.store().get("hub-1").unwrap().state.door,
            Some(ContactState::Open)
        );

        route(
            &mut reconciler,
            &device_update(&json!([{ "key": "input_state_dps", "value": "on" }])),
        );
        assert_eq!(
            reconciler.store().get("hub-1").unwrap().state.door,
            Some(ContactState::Closed)
        );
    }

    #[test]
    fn device_update_for_unknown_device_is_ignored() {
        let (mut reconciler, mut changes, _fired) = setup();
        route(
            &mut reconciler,
            &json!({
                "event": "access.data.device.update",
                "data": { "unique_id": "ghost", "configs": [
                    { "key": "input_state_dps", "value": "off" }
                ]}
            }),
        );
        assert!(collect(&mut changes).is_empty());
    }

    #[test]
    fn reader_fields_never_touch_hub_only_state() {
        let (mut reconciler, _changes, _fired) = setup();
        route(
            &mut reconciler,
            &json!({
                "event": "access.data.device.update",
                "data": { "unique_id": "reader-1", "configs": [
                    { "key": "input_state_rly-lock_dry", "value": "on" },
                    { "key": "input_state_rel", "value": "on" }
                ]}
            }),
        );
        let reader = reconciler.store().get("reader-1").unwrap();
        assert_eq!(reader.state.lock, None);
        assert_eq!(reader.state.relay, None);
    }

    #[tokio::test(start_paused = true)]
    async fn access_log_opens_first_reader_target() {
        let (mut reconciler, _changes, mut fired) = setup();
        route(
            &mut reconciler,
            &json!({
                "event": "access.logs.add",
                "data": { "_source": {
                    "event": { "type": "access.door.unlock", "result": "ACCESS" },
                    "target": [
                        { "type": "door", "id": "door-9" },
                        { "type": "UA-G2-MINI", "id": "reader-1" }
                    ]
                }}
            }),
        );
        assert_eq!(
            reconciler.store().get("reader-1").unwrap().state.door,
            Some(ContactState::Open)
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        let due = fired.try_recv().unwrap();
        reconciler.on_debounce_fired(&due);
        assert_eq!(
            reconciler.store().get("reader-1").unwrap().state.door,
            Some(ContactState::Closed)
        );
    }

    #[tokio::test]
    async fn access_log_tolerates_targets_without_id() {
        let (mut reconciler, _changes, _fired) = setup();
        route(
            &mut reconciler,
            &json!({
                "event": "access.logs.add",
                "data": { "_source": {
                    "event": { "type": "access.door.unlock" },
                    "target": [
                        { "type": "UA-G2-MINI", "id": "reader-1" },
                        { "type": "device_config", "display_name": "x" }
                    ]
                }}
            }),
        );
        assert_eq!(
            reconciler.store().get("reader-1").unwrap().state.door,
            Some(ContactState::Open)
        );
    }

    #[test]
    fn access_log_without_event_closes() {
        let (mut reconciler, _changes, _fired) = setup();
        reconciler.apply_config_field("reader-1", FieldChange::DoorContact(ContactState::Open));

        route(
            &mut reconciler,
            &json!({
                "event": "access.logs.add",
                "data": { "_source": {
                    "target": [{ "type": "UA-G2-MINI", "id": "reader-1" }]
                }}
            }),
        );
        assert_eq!(
            reconciler.store().get("reader-1").unwrap().state.door,
            Some(ContactState::Closed)
        );
    }

    #[test]
    fn door_position_change_updates_linked_hub() {
        let (mut reconciler, _changes, _fired) = setup();
        route(&mut reconciler, &device_update(&json!([])));

        route(
            &mut reconciler,
            &json!({
                "event": "access.dps_change",
                "data": { "door_id": "door-9", "door_name": "Front", "status": "open" }
            }),
        );
        assert_eq!(
            reconciler.store().get("hub-1").unwrap().state.door,
            Some(ContactState::Open)
        );
    }

    #[test]
    fn malformed_payload_is_skipped_but_snapshot_still_emitted() {
        let (mut reconciler, mut changes, _fired) = setup();
        assert!(route(
            &mut reconciler,
            &json!({
                "event": "access.data.device.update",
                "deviceId": "hub-1",
                "data": { "configs": 12 }
            }),
        ));

        let emitted = collect(&mut changes);
        assert_eq!(emitted.len(), 1);
        assert!(matches!(&emitted[0], StateChange::Snapshot(r) if r.id == "hub-1"));
    }

    #[test]
    fn inert_and_unknown_events_only_snapshot() {
        let (mut reconciler, mut changes, _fired) = setup();
        for event in [
            "access.hw.door_bell",
            "access.remote_view",
            "access.remote_view.change",
            "access.data.device.remote_unlock",
            "access.brand.new",
        ] {
            route(
                &mut reconciler,
                &json!({ "event": event, "deviceId": "mystery-1", "data": { "x": 1 } }),
            );
        }

        let emitted = collect(&mut changes);
        assert_eq!(emitted.len(), 5);
        assert!(emitted.iter().all(|c| matches!(c, StateChange::Snapshot(_))));
        assert_eq!(
            reconciler.store().get("hub-1").unwrap().state.lock,
            Some(LockState::Locked)
        );
    }
}
