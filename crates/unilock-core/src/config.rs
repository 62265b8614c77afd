// ── Runtime hub configuration ──
//
// Describes how to reach one Access hub and how the stream and debounce
// behave. Carries the bearer token but never touches disk; the CLI (or any
// other host) builds a `HubConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled web PKI roots (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Default, since hubs use self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub URL (e.g., `https://192.168.1.1:12445`).
    pub url: Url,
    /// Developer API bearer token.
    pub token: SecretString,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Silence tolerated on the notification stream before redialing.
    pub heartbeat_timeout: Duration,
    /// How often the stream watchdog checks for silence.
    pub watchdog_interval: Duration,
    /// Pause between stream sessions. Zero redials immediately.
    pub redial_delay: Duration,
    /// Upper bound on one WebSocket handshake.
    pub connect_timeout: Duration,
    /// How long a reader's door contact stays open after an access event.
    pub debounce_delay: Duration,
}

impl HubConfig {
    /// A config with default timings for the given hub and token.
    pub fn new(url: Url, token: SecretString) -> Self {
        Self {
            url,
            token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(60),
            redial_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            debounce_delay: Duration::from_secs(5),
        }
    }
}
