//! WorkerLoop - 到達不能通知を処理するループ
//!
//! # フロー
//! 1. ReferenceQueue::remove(ttl) で通知を待つ
//! 2. node が届いたら leak = true で cleanup（空判定はしない。まだ通知が残っているかもしれない）
//! 3. timeout なら registry の空判定。空なら running フラグを落として終了
//! 4. それ以外のエラー / panic は log してループを続ける
//!
//! 終了するのは 3 の「idle かつ空」を観測した時だけです。
//!
//! # PendingWorker
//! factory に渡した job が実行されずに drop されることがある（shutdown 済みの
//! tokio runtime など）。その場合 running フラグを戻し、次の登録で worker を
//! 起動し直せるようにする。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, trace, warn};

use super::cleaner_core::{CleanerCore, panic_message};
use crate::domain::QueueError;

/// Result of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A notification was handled.
    Cleaned,
    /// Timed out but the registry still has nodes.
    Idle,
    /// Timed out with an empty registry; the running flag has been cleared.
    Stop,
}

/// WorkerLoop は cleaner の background worker
pub(crate) struct WorkerLoop {
    core: Arc<CleanerCore>,
}

impl WorkerLoop {
    pub(crate) fn new(core: Arc<CleanerCore>) -> Self {
        Self { core }
    }

    /// Run until the registry is observed empty after an idle wait.
    pub(crate) fn run(self) {
        debug!(ttl = ?self.core.ttl(), "cleaner worker started");
        let mut cleaned = 0_u64;
        loop {
            match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(Step::Cleaned)) => cleaned += 1,
                Ok(Ok(Step::Idle)) => trace!("cleaner worker idle, registry not empty"),
                Ok(Ok(Step::Stop)) => break,
                Ok(Err(err)) => {
                    warn!(error = %err, "unexpected error in cleaner worker loop");
                }
                Err(payload) => {
                    warn!(
                        panic = panic_message(payload.as_ref()),
                        "cleaner worker loop panicked, continuing"
                    );
                }
            }
        }
        debug!(cleaned, "cleaner worker stopped");
    }

    pub(crate) fn step(&self) -> Result<Step, QueueError> {
        match self.core.queue().remove(self.core.ttl())? {
            Some(key) => {
                self.core.fire(key, true);
                Ok(Step::Cleaned)
            }
            None if self.core.check_empty() => Ok(Step::Stop),
            None => Ok(Step::Idle),
        }
    }
}

const PENDING: u8 = 0;
const HANDED_OFF: u8 = 1;
const LOST: u8 = 2;

/// Worker job between `ThreadFactory::spawn` and its first run.
///
/// Dropped before `add` accepted the handoff: `add` sees it through
/// [`Handoff::accept`] and rolls back. Dropped afterwards: the running flag is
/// cleared here.
pub(crate) struct PendingWorker {
    worker: Option<WorkerLoop>,
    handoff: Arc<AtomicU8>,
}

impl PendingWorker {
    pub(crate) fn new(worker: WorkerLoop) -> Self {
        Self {
            worker: Some(worker),
            handoff: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub(crate) fn handoff(&self) -> Handoff {
        Handoff(Arc::clone(&self.handoff))
    }

    pub(crate) fn run(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.run();
        }
    }
}

impl Drop for PendingWorker {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // `add` still holds the state lock while PENDING; never lock here then
        if self
            .handoff
            .compare_exchange(PENDING, LOST, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return;
        }
        worker.core.abandon_worker();
    }
}

/// `add`'s side of a [`PendingWorker`].
pub(crate) struct Handoff(Arc<AtomicU8>);

impl Handoff {
    /// `false` if the job was already dropped without running.
    pub(crate) fn accept(&self) -> bool {
        self.0
            .compare_exchange(PENDING, HANDED_OFF, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
