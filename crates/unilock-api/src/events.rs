//! Notification stream envelope and typed event payloads.
//!
//! Every frame on `/api/v1/developer/devices/notifications` is a JSON object
//! of the form `{ "event": "...", "deviceId": "...", "data": ... }`. The
//! [`Envelope`] captures that shape; [`AccessEvent::decode`] classifies it
//! into a tagged union keyed on the vendor's event name.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ── Event names ──────────────────────────────────────────────────────

pub const REMOTE_UNLOCK: &str = "access.data.device.remote_unlock";
pub const DEVICE_UPDATE: &str = "access.data.device.update";
pub const LOGS_ADD: &str = "access.logs.add";
pub const DOOR_POSITION_CHANGE: &str = "access.dps_change";
pub const DOOR_BELL: &str = "access.hw.door_bell";
pub const REMOTE_VIEW: &str = "access.remote_view";
pub const REMOTE_VIEW_CHANGE: &str = "access.remote_view.change";

// ── Envelope ─────────────────────────────────────────────────────────

/// The outer shape every notification shares.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: String,
    pub device_id: Option<String>,
    pub data: Option<Value>,
}

impl Envelope {
    /// Validate and extract the envelope from a decoded frame.
    ///
    /// Returns `None` unless the frame is an object whose `event` field is a
    /// string. A non-string `deviceId` is treated as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let event = obj.get("event")?.as_str()?.to_owned();
        let device_id = obj
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let data = obj.get("data").filter(|d| !d.is_null()).cloned();
        Some(Self {
            event,
            device_id,
            data,
        })
    }
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Decode each element of a list on its own, dropping the ones that do not
/// fit so one bad entry never costs its siblings.
fn decode_each<'a, T: DeserializeOwned>(
    items: &'a [Value],
    what: &'static str,
) -> impl Iterator<Item = T> + 'a {
    items.iter().filter_map(move |item| {
        serde_json::from_value(item.clone())
            .inspect_err(|e| warn!(entry = %item, error = %e, "skipping malformed {what}"))
            .ok()
    })
}

/// `access.data.device.update` payload.
///
/// `configs` stays raw; [`entries`](Self::entries) decodes it entry by entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub unique_id: String,
    #[serde(default)]
    pub door: Option<DoorRef>,
    #[serde(default)]
    pub configs: Vec<Value>,
}

impl DeviceUpdate {
    /// The well-formed `{ key, value }` entries, in order.
    pub fn entries(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        decode_each(&self.configs, "config entry")
    }
}

/// The door a device is mounted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorRef {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One `{ key, value }` pair from a device's config list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// `access.logs.add` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAdded {
    #[serde(rename = "_source")]
    pub source: LogSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSource {
    /// Present when the log entry describes an access event (door opened).
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub target: Vec<Value>,
}

impl LogSource {
    /// The decodable entries of `target`, in order.
    pub fn targets(&self) -> impl Iterator<Item = LogTarget> + '_ {
        decode_each(&self.target, "log target")
    }
}

/// One entry of a log's `target` list. Non-device targets often carry no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogTarget {
    #[serde(rename = "type", default)]
    pub target_type: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// `access.dps_change` payload: the door position sensor of a door moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorPositionChange {
    pub door_id: String,
    #[serde(default)]
    pub door_name: Option<String>,
    /// `"open"` or `"close"`.
    pub status: String,
}

impl DoorPositionChange {
    pub fn is_closed(&self) -> bool {
        self.status == "close"
    }
}

// ── AccessEvent ──────────────────────────────────────────────────────

/// A classified notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessEvent {
    /// Someone unlocked a door remotely. Informational only.
    RemoteUnlock(Option<Value>),
    DeviceUpdate(DeviceUpdate),
    LogAdded(LogAdded),
    DoorPositionChange(DoorPositionChange),
    DoorBell(Option<Value>),
    RemoteView(Option<Value>),
    RemoteViewChange(Option<Value>),
    /// Any event name this crate does not know about.
    Unrecognized { event: String, data: Option<Value> },
}

impl AccessEvent {
    /// Classify an envelope by its event name and decode the payload.
    ///
    /// Fails only when a known event carries a payload that does not match
    /// its expected shape.
    pub fn decode(envelope: &Envelope) -> Result<Self, serde_json::Error> {
        let data = envelope.data.clone();
        let typed = |data: Option<Value>| data.unwrap_or(Value::Null);

        Ok(match envelope.event.as_str() {
            REMOTE_UNLOCK => Self::RemoteUnlock(data),
            DEVICE_UPDATE => Self::DeviceUpdate(serde_json::from_value(typed(data))?),
            LOGS_ADD => Self::LogAdded(serde_json::from_value(typed(data))?),
            DOOR_POSITION_CHANGE => Self::DoorPositionChange(serde_json::from_value(typed(data))?),
            DOOR_BELL => Self::DoorBell(data),
            REMOTE_VIEW => Self::RemoteView(data),
            REMOTE_VIEW_CHANGE => Self::RemoteViewChange(data),
            other => Self::Unrecognized {
                event: other.to_owned(),
                data,
            },
        })
    }

    /// The vendor event name this variant was decoded from.
    pub fn name(&self) -> &str {
        match self {
            Self::RemoteUnlock(_) => REMOTE_UNLOCK,
            Self::DeviceUpdate(_) => DEVICE_UPDATE,
            Self::LogAdded(_) => LOGS_ADD,
            Self::DoorPositionChange(_) => DOOR_POSITION_CHANGE,
            Self::DoorBell(_) => DOOR_BELL,
            Self::RemoteView(_) => REMOTE_VIEW,
            Self::RemoteViewChange(_) => REMOTE_VIEW_CHANGE,
            Self::Unrecognized { event, .. } => event,
        }
    }
}
