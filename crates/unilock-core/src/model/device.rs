// ── Device domain types ──

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Namespace for deriving stable per-device UUIDs from vendor ids.
const DEVICE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b0e_8a4d_5e3f_9b71_c0d2_e4a5_1f36);

/// Canonical device kind, normalized from the vendor model string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceKind {
    DoorLockHub,
    MiniReader,
    LiteReader,
    Intercom,
    IntercomViewer,
    Unknown,
}

impl DeviceKind {
    /// Map a vendor `type` string to a kind.
    pub fn from_vendor_type(vendor_type: &str) -> Self {
        match vendor_type {
            "UAH" | "UAH-DOOR" => Self::DoorLockHub,
            "UA-G2-MINI" => Self::MiniReader,
            "UA-LITE" => Self::LiteReader,
            "UA-Intercom" => Self::Intercom,
            "UA-Intercom-viewer" | "UA-Int-Viewer" => Self::IntercomViewer,
            _ => Self::Unknown,
        }
    }

    /// Hubs drive a lock relay and carry the auxiliary contacts.
    pub fn is_hub_class(self) -> bool {
        matches!(self, Self::DoorLockHub)
    }

    /// Readers and intercoms only expose a debounced door contact.
    pub fn is_reader_class(self) -> bool {
        matches!(
            self,
            Self::MiniReader | Self::LiteReader | Self::Intercom | Self::IntercomViewer
        )
    }
}

/// Lock relay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
}

/// A binary contact. `Closed` also means "not triggered" for the
/// request-to-exit, request-to-enter and relay inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContactState {
    Closed,
    Open,
}

/// Mirrored state of one device.
///
/// `None` means the field does not exist for this kind of device. Such
/// fields are never read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub lock: Option<LockState>,
    pub door: Option<ContactState>,
    pub request_to_exit: Option<ContactState>,
    pub request_to_enter: Option<ContactState>,
    pub relay: Option<ContactState>,
}

impl DeviceState {
    /// Initial state for a freshly discovered device.
    pub fn defaults_for(kind: DeviceKind) -> Self {
        if kind.is_hub_class() {
            Self {
                lock: Some(LockState::Locked),
                door: Some(ContactState::Closed),
                request_to_exit: Some(ContactState::Closed),
                request_to_enter: Some(ContactState::Closed),
                relay: Some(ContactState::Closed),
            }
        } else if kind.is_reader_class() {
            Self {
                door: Some(ContactState::Closed),
                ..Self::default()
            }
        } else {
            Self::default()
        }
    }

    /// Set-if-changed.
    pub fn apply(&mut self, change: FieldChange) -> FieldUpdate {
        fn set<T: PartialEq>(slot: &mut Option<T>, value: T) -> FieldUpdate {
            match slot {
                None => FieldUpdate::NotApplicable,
                Some(current) if *current == value => FieldUpdate::Unchanged,
                Some(current) => {
                    *current = value;
                    FieldUpdate::Changed
                }
            }
        }

        match change {
            FieldChange::DoorContact(v) => set(&mut self.door, v),
            FieldChange::Lock(v) => set(&mut self.lock, v),
            FieldChange::RequestToExit(v) => set(&mut self.request_to_exit, v),
            FieldChange::RequestToEnter(v) => set(&mut self.request_to_enter, v),
            FieldChange::Relay(v) => set(&mut self.relay, v),
        }
    }
}

/// Which state field a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StateField {
    Door,
    Lock,
    RequestToExit,
    RequestToEnter,
    Relay,
}

/// A new value for one state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "kebab-case")]
pub enum FieldChange {
    DoorContact(ContactState),
    Lock(LockState),
    RequestToExit(ContactState),
    RequestToEnter(ContactState),
    Relay(ContactState),
}

impl FieldChange {
    pub fn field(self) -> StateField {
        match self {
            Self::DoorContact(_) => StateField::Door,
            Self::Lock(_) => StateField::Lock,
            Self::RequestToExit(_) => StateField::RequestToExit,
            Self::RequestToEnter(_) => StateField::RequestToEnter,
            Self::Relay(_) => StateField::Relay,
        }
    }

    /// Display form of the new value.
    pub fn value_str(self) -> &'static str {
        match self {
            Self::Lock(LockState::Locked) => "locked",
            Self::Lock(LockState::Unlocked) => "unlocked",
            Self::DoorContact(c)
            | Self::RequestToExit(c)
            | Self::RequestToEnter(c)
            | Self::Relay(c) => match c {
                ContactState::Closed => "closed",
                ContactState::Open => "open",
            },
        }
    }
}

/// Outcome of a set-if-changed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    Changed,
    Unchanged,
    /// The field does not exist for this device's kind.
    NotApplicable,
    UnknownDevice,
}

/// One physical device mirrored from the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable vendor id.
    pub id: String,
    /// Deterministic UUID derived from `id`.
    pub uuid: Uuid,
    pub name: String,
    pub kind: DeviceKind,
    /// Raw vendor model string.
    pub vendor_type: String,
    pub state: DeviceState,
    pub door_id: Option<String>,
    pub door_name: Option<String>,
}

impl DeviceRecord {
    /// A record with kind-appropriate defaults and no door linkage.
    pub fn new(id: impl Into<String>, name: impl Into<String>, vendor_type: impl Into<String>) -> Self {
        let id = id.into();
        let vendor_type = vendor_type.into();
        let kind = DeviceKind::from_vendor_type(&vendor_type);
        Self {
            uuid: device_uuid(&id),
            id,
            name: name.into(),
            kind,
            vendor_type,
            state: DeviceState::defaults_for(kind),
            door_id: None,
            door_name: None,
        }
    }
}

/// UUID v5 of a vendor id. Same id, same UUID, across restarts.
pub fn device_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&DEVICE_NAMESPACE, id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_types_map_to_kinds() {
        assert_eq!(DeviceKind::from_vendor_type("UAH"), DeviceKind::DoorLockHub);
        assert_eq!(DeviceKind::from_vendor_type("UAH-DOOR"), DeviceKind::DoorLockHub);
        assert_eq!(DeviceKind::from_vendor_type("UA-G2-MINI"), DeviceKind::MiniReader);
        assert_eq!(DeviceKind::from_vendor_type("UA-LITE"), DeviceKind::LiteReader);
        assert_eq!(DeviceKind::from_vendor_type("UA-Intercom"), DeviceKind::Intercom);
        assert_eq!(
            DeviceKind::from_vendor_type("UA-Int-Viewer"),
            DeviceKind::IntercomViewer
        );
        assert_eq!(DeviceKind::from_vendor_type("UA-ULTRA"), DeviceKind::Unknown);
        assert_eq!(DeviceKind::DoorLockHub.to_string(), "door-lock-hub");
    }

    #[test]
    fn defaults_depend_on_kind() {
        let hub = DeviceState::defaults_for(DeviceKind::DoorLockHub);
        assert_eq!(hub.lock, Some(LockState::Locked));
        assert_eq!(hub.relay, Some(ContactState::Closed));

        let reader = DeviceState::defaults_for(DeviceKind::MiniReader);
        assert_eq!(reader.door, Some(ContactState::Closed));
        assert_eq!(reader.lock, None);
        assert_eq!(reader.request_to_exit, None);

        assert_eq!(DeviceState::defaults_for(DeviceKind::Unknown), DeviceState::default());
    }

    #[test]
    fn apply_is_set_if_changed() {
        let mut state = DeviceState::defaults_for(DeviceKind::DoorLockHub);
        let unlock = FieldChange::Lock(LockState::Unlocked);
        assert_eq!(state.apply(unlock), FieldUpdate::Changed);
        assert_eq!(state.apply(unlock), FieldUpdate::Unchanged);

        let mut reader = DeviceState::defaults_for(DeviceKind::LiteReader);
        assert_eq!(reader.apply(unlock), FieldUpdate::NotApplicable);
        assert_eq!(reader.lock, None);
    }

    #[test]
    fn uuid_is_deterministic() {
        assert_eq!(device_uuid("abc"), device_uuid("abc"));
        assert_ne!(device_uuid("abc"), device_uuid("abd"));
        assert_eq!(DeviceRecord::new("abc", "x", "UAH").uuid, device_uuid("abc"));
    }
}
