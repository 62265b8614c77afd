// ── Device discovery ──

use tracing::{debug, info};
use unilock_api::{AccessClient, RawDevice};

use crate::error::CoreError;
use crate::model::{DeviceKind, DeviceRecord};

impl From<RawDevice> for DeviceRecord {
    fn from(raw: RawDevice) -> Self {
        DeviceRecord::new(raw.id, raw.name, raw.device_type)
    }
}

/// Fetch the hub's device listing and convert it to records with
/// kind-appropriate default state.
pub async fn discover(client: &AccessClient) -> Result<Vec<DeviceRecord>, CoreError> {
    let raw = client.list_devices().await?;
    let records: Vec<DeviceRecord> = raw.into_iter().map(DeviceRecord::from).collect();

    for record in records.iter().filter(|r| r.kind == DeviceKind::Unknown) {
        debug!(device_id = %record.id, vendor_type = %record.vendor_type, "unsupported device type, tracking without state");
    }
    info!(count = records.len(), "devices discovered");
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ContactState, LockState};

    fn raw(id: &str, device_type: &str) -> RawDevice {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("{id} name"),
            "type": device_type,
        }))
        .unwrap()
    }

    #[test]
    fn conversion_applies_kind_defaults() {
        let hub = DeviceRecord::from(raw("hub-1", "UAH-DOOR"));
        assert_eq!(hub.kind, DeviceKind::DoorLockHub);
        assert_eq!(hub.state.lock, Some(LockState::Locked));
        assert_eq!(hub.state.request_to_enter, Some(ContactState::Closed));

        let viewer = DeviceRecord::from(raw("view-1", "UA-Intercom-viewer"));
        assert_eq!(viewer.kind, DeviceKind::IntercomViewer);
        assert_eq!(viewer.state.door, Some(ContactState::Closed));
        assert_eq!(viewer.state.lock, None);

        let other = DeviceRecord::from(raw("cam-1", "UVC-G4"));
        assert_eq!(other.kind, DeviceKind::Unknown);
        assert_eq!(other.vendor_type, "UVC-G4");
        assert_eq!(other.state.door, None);
    }
}
