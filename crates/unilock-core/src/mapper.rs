// ── Config-key mapper ──
//
// Translates `{ key, value }` entries from device-update events into typed
// field changes. `input_state_dps` is inverted on the wire: `on` means the
// door position switch reads closed.

use serde_json::Value;

use crate::model::{ContactState, FieldChange, LockState};

pub const DOOR_POSITION: &str = "input_state_dps";
pub const LOCK_RELAY: &str = "input_state_rly-lock_dry";
pub const REQUEST_TO_EXIT: &str = "input_state_rex";
pub const REQUEST_TO_ENTER: &str = "input_state_ren";
pub const AUX_RELAY: &str = "input_state_rel";

/// A mapped config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    pub change: FieldChange,
    /// The raw value was neither `on` nor `off`; `change` holds the fallback.
    pub defaulted: bool,
}

/// Map one config entry. Unknown keys return `None`.
pub fn map_config(key: &str, raw: &Value) -> Option<Mapped> {
    let switch = match raw.as_str() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    };
    let defaulted = switch.is_none();

    let contact = |on: ContactState, off: ContactState, fallback: ContactState| match switch {
        Some(true) => on,
        Some(false) => off,
        None => fallback,
    };

    let change = match key {
        DOOR_POSITION => FieldChange::DoorContact(contact(
            ContactState::Closed,
            ContactState::Open,
            ContactState::Open,
        )),
        LOCK_RELAY => FieldChange::Lock(match switch {
            Some(true) => LockState::Unlocked,
            Some(false) | None => LockState::Locked,
        }),
        REQUEST_TO_EXIT => FieldChange::RequestToExit(contact(
            ContactState::Open,
            ContactState::Closed,
            ContactState::Open,
        )),
        REQUEST_TO_ENTER => FieldChange::RequestToEnter(contact(
            ContactState::Open,
            ContactState::Closed,
            ContactState::Open,
        )),
        AUX_RELAY => FieldChange::Relay(contact(
            ContactState::Open,
            ContactState::Closed,
            ContactState::Open,
        )),
        _ => return None,
    };

    Some(Mapped { change, defaulted })
}
