// ── State reconciliation ──
//
// Owns the write side of the device store plus the debounce timers, and
// publishes every effective change on a broadcast channel. Only the state
// engine task holds a `Reconciler`, so all writes are serialised.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::model::{ContactState, DeviceRecord, FieldChange, FieldUpdate};
use crate::store::{DebounceFired, DebounceTimers, DeviceStore, Registration};

/// A change published to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChange {
    /// A device was seen for the first time.
    Registered(Arc<DeviceRecord>),
    /// One field of a device changed value.
    Field {
        device_id: String,
        change: FieldChange,
    },
    /// A device's door linkage changed.
    DoorLinked {
        device_id: String,
        door_id: Option<String>,
        door_name: Option<String>,
    },
    /// Full current record, emitted after any event addressed to a device.
    Snapshot(Arc<DeviceRecord>),
    Removed { device_id: String },
}

pub struct Reconciler {
    store: Arc<DeviceStore>,
    timers: DebounceTimers,
    changes: broadcast::Sender<StateChange>,
}

impl Reconciler {
    pub fn new(
        store: Arc<DeviceStore>,
        changes: broadcast::Sender<StateChange>,
        timers: DebounceTimers,
    ) -> Self {
        Self {
            store,
            timers,
            changes,
        }
    }

    /// Convenience constructor that wires a fresh timer set to `fired_tx`.
    pub fn with_debounce(
        store: Arc<DeviceStore>,
        changes: broadcast::Sender<StateChange>,
        debounce_delay: std::time::Duration,
        fired_tx: mpsc::UnboundedSender<DebounceFired>,
    ) -> Self {
        Self::new(store, changes, DebounceTimers::new(debounce_delay, fired_tx))
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    pub fn timers(&self) -> &DebounceTimers {
        &self.timers
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Register discovered devices. Returns how many were new.
    pub fn seed(&mut self, records: Vec<DeviceRecord>) -> usize {
        let mut added = 0;
        for record in records {
            match self.store.register(record) {
                Registration::New(record) => {
                    info!(device_id = %record.id, kind = %record.kind, name = %record.name, "device registered");
                    added += 1;
                    self.publish(StateChange::Registered(record));
                }
                Registration::Renamed(record) => {
                    debug!(device_id = %record.id, name = %record.name, "device renamed");
                }
                Registration::Known => {}
            }
        }
        added
    }

    /// Set-if-changed; notifies exactly once per effective change.
    pub fn apply_config_field(&mut self, device_id: &str, change: FieldChange) -> FieldUpdate {
        let update = self.store.set_field(device_id, change);
        match update {
            FieldUpdate::Changed => {
                info!(device_id, field = %change.field(), value = change.value_str(), "state changed");
                self.publish(StateChange::Field {
                    device_id: device_id.to_owned(),
                    change,
                });
            }
            FieldUpdate::NotApplicable => {
                debug!(device_id, field = %change.field(), "field not applicable to device kind");
            }
            FieldUpdate::Unchanged | FieldUpdate::UnknownDevice => {}
        }
        update
    }

    /// A reader reported an access event.
    ///
    /// `opened` sets the door contact open and (re)arms the debounce timer,
    /// so the contact closes again once the reader stays quiet. A non-open
    /// event closes the contact immediately and cancels any pending timer.
    pub fn apply_contact_event(&mut self, device_id: &str, opened: bool) {
        if opened {
            let update =
                self.apply_config_field(device_id, FieldChange::DoorContact(ContactState::Open));
            if matches!(update, FieldUpdate::Changed | FieldUpdate::Unchanged) {
                self.timers.arm(device_id);
            }
        } else {
            self.apply_config_field(device_id, FieldChange::DoorContact(ContactState::Closed));
            self.timers.cancel(device_id);
        }
    }

    /// A debounce timer elapsed. Stale firings are ignored.
    pub fn on_debounce_fired(&mut self, fired: &DebounceFired) {
        if !self.timers.settle(fired) {
            debug!(device_id = %fired.device_id, generation = fired.generation, "stale debounce firing ignored");
            return;
        }
        self.apply_config_field(
            &fired.device_id,
            FieldChange::DoorContact(ContactState::Closed),
        );
    }

    /// Record door linkage; notifies when it changed.
    pub fn link_door(&mut self, device_id: &str, door_id: Option<String>, door_name: Option<String>) {
        if self
            .store
            .link_door(device_id, door_id.clone(), door_name.clone())
        {
            debug!(device_id, door_id = ?door_id, "door linked");
            self.publish(StateChange::DoorLinked {
                device_id: device_id.to_owned(),
                door_id,
                door_name,
            });
        }
    }

    /// Publish the full current record of a known device.
    pub fn emit_snapshot(&self, device_id: &str) {
        if let Some(record) = self.store.get(device_id) {
            self.publish(StateChange::Snapshot(record));
        }
    }

    /// Forget a device and any timer it had pending.
    pub fn remove(&mut self, device_id: &str) -> Option<Arc<DeviceRecord>> {
        self.timers.cancel(device_id);
        let removed = self.store.remove(device_id)?;
        info!(device_id, "device removed");
        self.publish(StateChange::Removed {
            device_id: device_id.to_owned(),
        });
        Some(removed)
    }

    fn publish(&self, change: StateChange) {
        // no subscribers is fine
        let _ = self.changes.send(change);
    }
}
