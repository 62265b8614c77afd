// ── Debounce timers ──
//
// One pending timer per device. Arming replaces any existing timer for the
// same id. Firings are delivered to the engine mailbox tagged with a
// generation number, and only a firing whose generation still matches the
// pending entry is honoured.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

/// A debounce timer elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceFired {
    pub device_id: String,
    pub generation: u64,
}

struct PendingTimer {
    generation: u64,
    abort: AbortHandle,
}

pub struct DebounceTimers {
    delay: Duration,
    pending: HashMap<String, PendingTimer>,
    next_generation: u64,
    fired_tx: mpsc::UnboundedSender<DebounceFired>,
}

impl DebounceTimers {
    pub fn new(delay: Duration, fired_tx: mpsc::UnboundedSender<DebounceFired>) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            next_generation: 0,
            fired_tx,
        }
    }

    /// Start (or restart) the timer for `device_id`. Returns its generation.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, device_id: &str) -> u64 {
        self.cancel(device_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let delay = self.delay;
        let tx = self.fired_tx.clone();
        let id = device_id.to_owned();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(DebounceFired {
                device_id: id,
                generation,
            });
        });

        trace!(device_id, generation, "debounce armed");
        self.pending.insert(
            device_id.to_owned(),
            PendingTimer {
                generation,
                abort: handle.abort_handle(),
            },
        );
        generation
    }

    /// Abort the pending timer for `device_id`. Returns `true` if one existed.
    pub fn cancel(&mut self, device_id: &str) -> bool {
        match self.pending.remove(device_id) {
            Some(timer) => {
                timer.abort.abort();
                trace!(device_id, generation = timer.generation, "debounce cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume a firing. Returns `false` for stale firings, which leave the
    /// current entry in place.
    pub fn settle(&mut self, fired: &DebounceFired) -> bool {
        match self.pending.get(&fired.device_id) {
            Some(timer) if timer.generation == fired.generation => {
                self.pending.remove(&fired.device_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, device_id: &str) -> bool {
        self.pending.contains_key(device_id)
    }
}

impl Drop for DebounceTimers {
    fn drop(&mut self) {
        for timer in self.pending.values() {
            timer.abort.abort();
        }
    }
}
