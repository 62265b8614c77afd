// ── Device state store ──
//
// Concurrent O(1) lookups by vendor id and derived UUID, with a full
// snapshot republished through a `watch` channel after every mutation.
// Writes come only from the state engine; any task may read.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::model::{DeviceRecord, FieldChange, FieldUpdate};

/// All known devices, sorted by id.
pub type DeviceSnapshot = Vec<Arc<DeviceRecord>>;

/// Outcome of registering a discovered device.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    /// First sighting; the record was inserted with kind defaults.
    New(Arc<DeviceRecord>),
    /// Already known; only the display name was refreshed.
    Renamed(Arc<DeviceRecord>),
    /// Already known and unchanged.
    Known,
}

pub struct DeviceStore {
    by_id: DashMap<String, Arc<DeviceRecord>>,
    uuid_to_id: DashMap<Uuid, String>,
    snapshot: watch::Sender<Arc<DeviceSnapshot>>,
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            uuid_to_id: DashMap::new(),
            snapshot,
        }
    }

    /// Insert a new record, or refresh the name of a known one.
    ///
    /// State and door linkage of a known device are never touched here.
    pub fn register(&self, record: DeviceRecord) -> Registration {
        let registration = match self.by_id.get(&record.id).map(|r| Arc::clone(r.value())) {
            Some(existing) if existing.name == record.name => return Registration::Known,
            Some(existing) => {
                let mut renamed = (*existing).clone();
                renamed.name = record.name;
                let renamed = Arc::new(renamed);
                self.by_id.insert(renamed.id.clone(), Arc::clone(&renamed));
                Registration::Renamed(renamed)
            }
            None => {
                let record = Arc::new(record);
                self.uuid_to_id.insert(record.uuid, record.id.clone());
                self.by_id.insert(record.id.clone(), Arc::clone(&record));
                Registration::New(record)
            }
        };

        self.rebuild_snapshot();
        registration
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<Arc<DeviceRecord>> {
        let id = self.uuid_to_id.get(uuid)?;
        self.get(id.value())
    }

    /// Set-if-changed on one field. The snapshot is republished only on
    /// `Changed`.
    pub fn set_field(&self, id: &str, change: FieldChange) -> FieldUpdate {
        let Some(mut entry) = self.by_id.get_mut(id) else {
            return FieldUpdate::UnknownDevice;
        };

        let mut state = entry.state;
        let update = state.apply(change);
        if update == FieldUpdate::Changed {
            let mut record = (**entry).clone();
            record.state = state;
            *entry = Arc::new(record);
        }
        drop(entry);

        if update == FieldUpdate::Changed {
            self.rebuild_snapshot();
        }
        update
    }

    /// Record which door a device is mounted on. Returns `true` if the
    /// linkage changed.
    pub fn link_door(&self, id: &str, door_id: Option<String>, door_name: Option<String>) -> bool {
        let Some(mut entry) = self.by_id.get_mut(id) else {
            return false;
        };
        if entry.door_id == door_id && entry.door_name == door_name {
            return false;
        }

        let mut record = (**entry).clone();
        record.door_id = door_id;
        record.door_name = door_name;
        *entry = Arc::new(record);
        drop(entry);

        self.rebuild_snapshot();
        true
    }

    /// Devices mounted on `door_id`.
    pub fn on_door(&self, door_id: &str) -> Vec<Arc<DeviceRecord>> {
        self.by_id
            .iter()
            .filter(|r| r.door_id.as_deref() == Some(door_id))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    /// Remove a device. Returns the removed record if it existed.
    pub fn remove(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        let (_, removed) = self.by_id.remove(id)?;
        self.uuid_to_id.remove(&removed.uuid);
        self.rebuild_snapshot();
        Some(removed)
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn rebuild_snapshot(&self) {
        let mut all: DeviceSnapshot = self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        self.snapshot.send_replace(Arc::new(all));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ContactState, DeviceKind, LockState, device_uuid};

    fn seeded() -> DeviceStore {
        let store = DeviceStore::new();
        store.register(DeviceRecord::new("hub-1", "Front Hub", "UAH"));
        store.register(DeviceRecord::new("reader-1", "Front Reader", "UA-G2-MINI"));
        store
    }

    #[test]
    fn lookup_by_id_and_uuid() {
        let store = seeded();
        assert_eq!(store.get("hub-1").unwrap().kind, DeviceKind::DoorLockHub);
        assert_eq!(
            store.get_by_uuid(&device_uuid("reader-1")).unwrap().id,
            "reader-1"
        );
        assert!(store.get("nope").is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn register_known_device_only_refreshes_name() {
        let store = seeded();
        store.set_field("hub-1", FieldChange::Lock(LockState::Unlocked));

        assert_eq!(
            store.register(DeviceRecord::new("hub-1", "Front Hub", "UAH")),
            Registration::Known
        );

        let Registration::Renamed(renamed) =
            store.register(DeviceRecord::new("hub-1", "Main Entrance", "UAH"))
        else {
            panic!("expected rename");
        };
        assert_eq!(renamed.name, "Main Entrance");
        assert_eq!(renamed.state.lock, Some(LockState::Unlocked));
    }

    #[test]
    fn set_field_reports_outcome() {
        let store = seeded();
        let open = FieldChange::DoorContact(ContactState::Open);
        assert_eq!(store.set_field("reader-1", open), FieldUpdate::Changed);
        assert_eq!(store.set_field("reader-1", open), FieldUpdate::Unchanged);
        assert_eq!(
            store.set_field("reader-1", FieldChange::Relay(ContactState::Open)),
            FieldUpdate::NotApplicable
        );
        assert_eq!(store.set_field("ghost", open), FieldUpdate::UnknownDevice);
    }

    #[test]
    fn snapshot_follows_mutations() {
        let store = seeded();
        let mut rx = store.subscribe();
        rx.mark_unchanged();

        store.set_field("hub-1", FieldChange::Lock(LockState::Locked));
        assert!(!rx.has_changed().unwrap(), "no-op write must not republish");

        store.set_field("hub-1", FieldChange::Lock(LockState::Unlocked));
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot[0].id, "hub-1");
        assert_eq!(snapshot[0].state.lock, Some(LockState::Unlocked));
    }

    #[test]
    fn link_door_and_remove() {
        let store = seeded();
        assert!(store.link_door("hub-1", Some("door-9".into()), Some("Front".into())));
        assert!(!store.link_door("hub-1", Some("door-9".into()), Some("Front".into())));
        assert_eq!(store.on_door("door-9").len(), 1);

        let removed = store.remove("hub-1").unwrap();
        assert!(store.get_by_uuid(&removed.uuid).is_none());
        assert!(store.remove("hub-1").is_none());
        assert_eq!(store.snapshot().len(), 1);
    }
}
