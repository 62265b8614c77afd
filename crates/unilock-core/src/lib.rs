// unilock-core: Device state mirroring between unilock-api and hosts (CLI, bridges).

pub mod config;
pub mod discovery;
mod engine;
pub mod error;
pub mod hub;
pub mod mapper;
pub mod model;
pub mod reconcile;
pub mod router;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{HubConfig, TlsVerification};
pub use error::CoreError;
pub use hub::AccessHub;
pub use reconcile::{Reconciler, StateChange};
pub use router::route;
pub use store::{DeviceSnapshot, DeviceStore};
pub use unilock_api::ConnectionState;

pub use model::{
    ContactState, DeviceKind, DeviceRecord, DeviceState, FieldChange, FieldUpdate, LockState,
    StateField, device_uuid,
};
