// ── Device state storage ──

pub mod debounce;
mod device_store;

pub use debounce::{DebounceFired, DebounceTimers};
pub use device_store::{DeviceSnapshot, DeviceStore, Registration};
