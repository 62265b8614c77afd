// ── State engine ──
//
// Single-writer actor that owns the `Reconciler`. Stream frames, debounce
// firings and host commands arrive on separate mailboxes and are handled
// one at a time, so no two mutations ever interleave.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::reconcile::{Reconciler, StateChange};
use crate::router;
use crate::store::{DebounceFired, DeviceStore};

const COMMAND_CHANNEL_SIZE: usize = 64;

/// Requests from the host side, each with its reply channel.
pub(crate) enum EngineCommand {
    Seed {
        records: Vec<DeviceRecord>,
        reply: oneshot::Sender<usize>,
    },
    Remove {
        device_id: String,
        reply: oneshot::Sender<Option<Arc<DeviceRecord>>>,
    },
}

/// Host-side handle to a running engine.
#[derive(Clone)]
pub(crate) struct EngineHandle {
    frames: mpsc::UnboundedSender<Value>,
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Sender the stream supervisor forwards decoded frames into.
    pub(crate) fn frame_sink(&self) -> mpsc::UnboundedSender<Value> {
        self.frames.clone()
    }

    pub(crate) async fn seed(&self, records: Vec<DeviceRecord>) -> Result<usize, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Seed { records, reply }).await?;
        rx.await.map_err(|_| CoreError::EngineStopped)
    }

    pub(crate) async fn remove(
        &self,
        device_id: String,
    ) -> Result<Option<Arc<DeviceRecord>>, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Remove { device_id, reply }).await?;
        rx.await.map_err(|_| CoreError::EngineStopped)
    }

    async fn send(&self, command: EngineCommand) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::EngineStopped)
    }
}

/// Spawn the engine task.
pub(crate) fn spawn(
    store: Arc<DeviceStore>,
    changes: broadcast::Sender<StateChange>,
    debounce_delay: Duration,
    cancel: CancellationToken,
) -> (EngineHandle, JoinHandle<()>) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (fired_tx, fired_rx) = mpsc::unbounded_channel();

    let reconciler = Reconciler::with_debounce(store, changes, debounce_delay, fired_tx);
    let task = tokio::spawn(run(reconciler, frames_rx, fired_rx, commands_rx, cancel));

    (
        EngineHandle {
            frames: frames_tx,
            commands: commands_tx,
        },
        task,
    )
}

async fn run(
    mut reconciler: Reconciler,
    mut frames_rx: mpsc::UnboundedReceiver<Value>,
    mut fired_rx: mpsc::UnboundedReceiver<DebounceFired>,
    mut commands_rx: mpsc::Receiver<EngineCommand>,
    cancel: CancellationToken,
) {
    debug!("state engine started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(fired) = fired_rx.recv() => reconciler.on_debounce_fired(&fired),
            Some(command) = commands_rx.recv() => handle_command(&mut reconciler, command),
            Some(frame) = frames_rx.recv() => {
                router::route(&mut reconciler, &frame);
            }
            else => break,
        }
    }

    debug!("state engine stopped");
}

fn handle_command(reconciler: &mut Reconciler, command: EngineCommand) {
    match command {
        EngineCommand::Seed { records, reply } => {
            let _ = reply.send(reconciler.seed(records));
        }
        EngineCommand::Remove { device_id, reply } => {
            let _ = reply.send(reconciler.remove(&device_id));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::ContactState;

    fn start() -> (
        EngineHandle,
        Arc<DeviceStore>,
        broadcast::Receiver<StateChange>,
        CancellationToken,
        JoinHandle<()>,
    ) {
        let store = Arc::new(DeviceStore::new());
        let (changes_tx, changes) = broadcast::channel(64);
        let cancel = CancellationToken::new();
        let (handle, task) = spawn(
            Arc::clone(&store),
            changes_tx,
            Duration::from_secs(5),
            cancel.clone(),
        );
        (handle, store, changes, cancel, task)
    }

    #[tokio::test(start_paused = true)]
    async fn seed_then_frames_drive_debounce() {
        let (engine, store, mut changes, _cancel, _task) = start();
        let added = engine
            .seed(vec![DeviceRecord::new("reader-1", "Reader", "UA-LITE")])
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert!(matches!(changes.recv().await.unwrap(), StateChange::Registered(_)));

        engine
            .frame_sink()
            .send(json!({
                "event": "access.logs.add",
                "data": { "_source": {
                    "event": { "type": "access.door.unlock" },
                    "target": [{ "type": "UA-LITE", "id": "reader-1" }]
                }}
            }))
            .unwrap();

        assert!(matches!(
            changes.recv().await.unwrap(),
            StateChange::Field { .. }
        ));
        assert_eq!(store.get("reader-1").unwrap().state.door, Some(ContactState::Open));

        // the engine applies the debounce firing on its own
        assert!(matches!(
            changes.recv().await.unwrap(),
            StateChange::Field { .. }
        ));
        assert_eq!(store.get("reader-1").unwrap().state.door, Some(ContactState::Closed));
    }

    #[tokio::test]
    async fn remove_replies_with_the_record() {
        let (engine, store, _changes, _cancel, _task) = start();
        engine
            .seed(vec![DeviceRecord::new("hub-1", "Hub", "UAH")])
            .await
            .unwrap();

        let removed = engine.remove("hub-1".into()).await.unwrap();
        assert_eq!(removed.unwrap().id, "hub-1");
        assert!(store.is_empty());
        assert!(engine.remove("hub-1".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_engine_reports_stopped() {
        let (engine, _store, _changes, cancel, task) = start();
        cancel.cancel();
        task.await.unwrap();

        let result = engine.seed(Vec::new()).await;
        assert!(matches!(result, Err(CoreError::EngineStopped)));
    }
}
