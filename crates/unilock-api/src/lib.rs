// unilock-api: Async Rust client for the UniFi Access developer API and notification stream

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use client::AccessClient;
pub use error::Error;
pub use events::{AccessEvent, Envelope};
pub use models::RawDevice;
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    ConnectionState, Dialer, MessageStream, NotificationDialer, StreamConfig, StreamSupervisor,
};
