//! CleanerCore - registry と worker フラグの共有状態
//!
//! # 学習ポイント
//! - registry と `thread_running` を一つの Mutex で守る
//!   （空判定とフラグのクリアを同じ critical section で行うため）
//! - cleanup action はロックを手放してから実行する
//! - action の失敗（Err / panic）は log して握りつぶす

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::worker_loop::{PendingWorker, WorkerLoop};
use crate::domain::{CleanerError, NodeKey};
use crate::ports::{ReferenceQueue, ThreadFactory};
use crate::registry::{BoxedAction, Registry};

struct State {
    registry: Registry,
    thread_running: bool,
}

/// Shared state behind a `LazyCleaner`, its handles and its worker.
pub(crate) struct CleanerCore {
    ttl: Duration,
    thread_factory: Arc<dyn ThreadFactory>,
    queue: Arc<dyn ReferenceQueue>,
    state: Mutex<State>,
}

impl CleanerCore {
    pub(crate) fn new(
        ttl: Duration,
        thread_factory: Arc<dyn ThreadFactory>,
        queue: Arc<dyn ReferenceQueue>,
    ) -> Self {
        Self {
            ttl,
            thread_factory,
            queue,
            state: Mutex::new(State {
                registry: Registry::new(),
                thread_running: false,
            }),
        }
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn queue(&self) -> &dyn ReferenceQueue {
        self.queue.as_ref()
    }

    /// Link a node and make sure a worker is alive to observe it.
    ///
    /// Starting the worker happens in the same critical section as the insert,
    /// so a registration is never left without a worker. If the factory fails,
    /// or drops the job before returning, the node is unlinked again before the
    /// error is returned.
    pub(crate) fn add(self: &Arc<Self>, action: Option<BoxedAction>) -> Result<NodeKey, CleanerError> {
        let mut state = self.state.lock();
        let key = state.registry.insert(action);
        if state.thread_running {
            return Ok(key);
        }

        let pending = PendingWorker::new(WorkerLoop::new(Arc::clone(self)));
        let handoff = pending.handoff();
        let spawned = self
            .thread_factory
            .spawn(Box::new(move || pending.run()))
            .and_then(|()| {
                if handoff.accept() {
                    Ok(())
                } else {
                    Err(io::Error::other("worker job was dropped before it started"))
                }
            });
        match spawned {
            Ok(()) => {
                state.thread_running = true;
                debug!(ttl = ?self.ttl, "cleaner worker spawned");
                Ok(key)
            }
            Err(err) => {
                let rejected = state.registry.remove(key);
                drop(state);
                // the action may run arbitrary Drop code; keep it outside the lock
                drop(rejected);
                warn!(error = %err, "could not spawn cleaner worker, registration rolled back");
                Err(CleanerError::WorkerSpawn(err))
            }
        }
    }

    /// One-shot cleanup path shared by explicit release and the worker.
    ///
    /// Returns `false` when the node had already been removed, in which case
    /// nothing runs.
    pub(crate) fn fire(&self, key: NodeKey, leak: bool) -> bool {
        let removed = self.state.lock().registry.remove(key);
        let Some(action) = removed else {
            return false;
        };
        if let Some(action) = action {
            run_action(key, action, leak);
        }
        true
    }

    /// Post `key` to the reference queue if the node is still registered.
    ///
    /// Called when a phantom reference is dropped. Posting under the state lock
    /// means the worker cannot observe an empty registry while the key is in
    /// flight.
    pub(crate) fn enqueue_unreachable(&self, key: NodeKey) {
        let state = self.state.lock();
        if state.registry.contains(key) {
            self.queue.enqueue(key);
        }
    }

    /// A handed-off worker job was dropped without running. Nodes stay
    /// registered; the next `add` spawns a replacement.
    pub(crate) fn abandon_worker(&self) {
        let mut state = self.state.lock();
        state.thread_running = false;
        warn!(
            watched = state.registry.len(),
            pending = self.queue.len(),
            "cleaner worker job dropped before it ran"
        );
    }

    /// Empty check used by an idle worker. Clears the running flag in the same
    /// critical section when the registry is empty.
    pub(crate) fn check_empty(&self) -> bool {
        let mut state = self.state.lock();
        if state.registry.is_empty() {
            state.thread_running = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_watched(&self, key: NodeKey) -> bool {
        self.state.lock().registry.contains(key)
    }

    pub(crate) fn watched_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    pub(crate) fn is_thread_running(&self) -> bool {
        self.state.lock().thread_running
    }

    /// `(watched_count, thread_running)` read in one critical section.
    pub(crate) fn snapshot(&self) -> (usize, bool) {
        let state = self.state.lock();
        (state.registry.len(), state.thread_running)
    }
}

fn run_action(key: NodeKey, action: BoxedAction, leak: bool) {
    match panic::catch_unwind(AssertUnwindSafe(move || action(leak))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(node = %key, leak, error = ?err, "cleanup action failed");
        }
        Err(payload) => {
            warn!(node = %key, leak, panic = panic_message(payload.as_ref()), "cleanup action panicked");
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
