// Wire types returned by the developer HTTP API.

use serde::{Deserialize, Serialize};

/// A device entry from `GET /api/v1/developer/devices`.
///
/// Only the fields the domain layer reads are typed; everything else the hub
/// sends is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDevice {
    pub id: String,
    pub name: String,
    /// Vendor model string, e.g. `"UAH"`, `"UA-G2-MINI"`.
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Flatten the `data` array of a device listing to depth 2.
///
/// The hub groups devices per door, so `data` is usually an array of arrays.
/// Anything nested deeper than two levels is passed through as-is and will
/// fail to decode as a device.
pub(crate) fn flatten_depth2(data: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    fn push(out: &mut Vec<serde_json::Value>, value: serde_json::Value, depth: u8) {
        match value {
            serde_json::Value::Array(items) if depth > 0 => {
                for item in items {
                    push(out, item, depth - 1);
                }
            }
            other => out.push(other),
        }
    }

    let mut out = Vec::with_capacity(data.len());
    for value in data {
        push(&mut out, value, 2);
    }
    out
}
