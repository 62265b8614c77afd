// ── Hub abstraction ──
//
// Lifecycle management for one Access hub: the notification stream, the
// state engine, discovery and door commands, plus read access to the
// mirrored device state.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use unilock_api::transport::{TlsMode, TransportConfig};
use unilock_api::{AccessClient, ConnectionState, NotificationDialer, StreamConfig, StreamSupervisor};

use crate::config::{HubConfig, TlsVerification};
use crate::discovery;
use crate::engine::{self, EngineHandle};
use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::reconcile::StateChange;
use crate::store::{DeviceSnapshot, DeviceStore};

const CHANGE_CHANNEL_SIZE: usize = 256;

// ── AccessHub ────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<HubInner>`. Construction does no I/O and
/// spawns nothing; call [`start()`](Self::start) to bring up the stream.
#[derive(Clone)]
pub struct AccessHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    client: AccessClient,
    store: Arc<DeviceStore>,
    changes: broadcast::Sender<StateChange>,
    supervisor: StreamSupervisor<NotificationDialer>,
    engine: Mutex<Option<EngineHandle>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AccessHub {
    /// Build the HTTP client and stream dialer for a hub.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = AccessClient::new(config.url.clone(), &config.token, &transport)?;

        let dialer = NotificationDialer::new(
            client.notifications_url()?,
            config.token.clone(),
            &transport.tls,
            config.connect_timeout,
        )?;
        let supervisor = StreamSupervisor::new(dialer, stream_config(&config));

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(HubInner {
                config,
                client,
                store: Arc::new(DeviceStore::new()),
                changes,
                supervisor,
                engine: Mutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &AccessClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the state engine and the notification stream.
    ///
    /// Idempotent: returns `false` if the stream was already running (or the
    /// hub has been shut down). Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let Ok(engine) = self.engine() else {
            return false;
        };
        let started = self.inner.supervisor.start(engine.frame_sink());
        if started {
            info!(hub = %self.inner.config.url, "hub started");
        }
        started
    }

    /// Fetch the device listing and register any devices not seen before.
    ///
    /// Known devices keep their state; only their names are refreshed.
    /// Returns how many devices were new.
    pub async fn discover(&self) -> Result<usize, CoreError> {
        let records = discovery::discover(&self.inner.client).await?;
        let added = self.engine()?.seed(records).await?;
        debug!(added, total = self.inner.store.len(), "discovery applied");
        Ok(added)
    }

    /// Feed one notification frame through the engine as if it had arrived
    /// on the stream.
    pub fn ingest(&self, frame: Value) -> Result<(), CoreError> {
        self.engine()?
            .frame_sink()
            .send(frame)
            .map_err(|_| CoreError::EngineStopped)
    }

    /// Stop the stream and the engine, and wait for both to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.supervisor.shutdown().await;

        let handles: Vec<_> = self
            .inner
            .task_handles
            .lock()
            .map(|mut h| h.drain(..).collect())
            .unwrap_or_default();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("hub shut down");
    }

    /// The running engine, spawning it on first use.
    fn engine(&self) -> Result<EngineHandle, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }

        let mut slot = self
            .inner
            .engine
            .lock()
            .map_err(|_| CoreError::Internal("engine lock poisoned".into()))?;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        let (engine, task) = engine::spawn(
            Arc::clone(&self.inner.store),
            self.inner.changes.clone(),
            self.inner.config.debounce_delay,
            self.inner.cancel.child_token(),
        );
        if let Ok(mut handles) = self.inner.task_handles.lock() {
            handles.push(task);
        }
        *slot = Some(engine.clone());
        Ok(engine)
    }

    // ── Door commands ────────────────────────────────────────────

    /// Door listing, passed through untouched.
    pub async fn list_doors(&self) -> Result<Value, CoreError> {
        Ok(self.inner.client.list_doors().await?)
    }

    /// Remote-unlock a door. Local lock state is left alone; the hub's
    /// own device-update event reports the relay change.
    pub async fn unlock_door(&self, door_id: &str) -> Result<(), CoreError> {
        self.inner.client.unlock_door(door_id).await?;
        info!(door_id, "unlock requested");
        Ok(())
    }

    /// Unlock the door a device is mounted on.
    pub async fn unlock_device(&self, device_id: &str) -> Result<(), CoreError> {
        let record = self
            .device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_owned(),
            })?;
        let door_id = record
            .door_id
            .as_deref()
            .ok_or_else(|| CoreError::DoorNotLinked {
                device_id: device_id.to_owned(),
            })?;
        self.unlock_door(door_id).await
    }

    /// Forget a device. Returns the removed record, if it was known.
    pub async fn remove_device(
        &self,
        device_id: &str,
    ) -> Result<Option<Arc<DeviceRecord>>, CoreError> {
        self.engine()?.remove(device_id.to_owned()).await
    }

    // ── State observation ────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<DeviceSnapshot> {
        self.inner.store.snapshot()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<DeviceRecord>> {
        self.inner.store.get(device_id)
    }

    pub fn device_by_uuid(&self, uuid: &Uuid) -> Option<Arc<DeviceRecord>> {
        self.inner.store.get_by_uuid(uuid)
    }

    /// Subscribe to individual state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }

    /// Subscribe to full device snapshots.
    pub fn watch_devices(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.inner.store.subscribe()
    }

    /// Subscribe to notification stream state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.supervisor.state()
    }

    /// Wall-clock time the stream last proved alive.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.inner.supervisor.last_heartbeat()
    }

    /// Number of stream redials since start.
    pub fn reconnects(&self) -> u64 {
        self.inner.supervisor.reconnects()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &HubConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

fn stream_config(config: &HubConfig) -> StreamConfig {
    StreamConfig {
        heartbeat_timeout: config.heartbeat_timeout,
        watchdog_interval: config.watchdog_interval,
        redial_delay: config.redial_delay,
        connect_timeout: config.connect_timeout,
    }
}
