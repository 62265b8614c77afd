// ── Domain model ──

pub mod device;

pub use device::{
    ContactState, DeviceKind, DeviceRecord, DeviceState, FieldChange, FieldUpdate, LockState,
    StateField, device_uuid,
};
