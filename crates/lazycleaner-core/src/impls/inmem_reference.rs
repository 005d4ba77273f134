//! InMemoryReferenceQueue - プロセス内の通知キュー
//!
//! # 学習ポイント
//! - Mutex + Condvar による timeout 付き blocking pop
//! - deadline を固定して spurious wakeup でも待ち時間が延びないようにする
//! - interrupt フラグは一度だけ消費される
//! - deadline が Instant で表せないほど長い timeout は無期限の wait として扱う

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::domain::{NodeKey, QueueError};
use crate::ports::ReferenceQueue;

#[derive(Default)]
struct Inner {
    pending: VecDeque<NodeKey>,
    interrupted: bool,
}

/// InMemoryReferenceQueue は既定の ReferenceQueue
///
/// # 実装詳細
/// - VecDeque<NodeKey> を FIFO で管理
/// - Mutex で排他制御
/// - Condvar で enqueue / interrupt 時に待機中の worker を起こす
#[derive(Default)]
pub struct InMemoryReferenceQueue {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl InMemoryReferenceQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceQueue for InMemoryReferenceQueue {
    fn enqueue(&self, key: NodeKey) {
        let mut inner = self.inner.lock();
        inner.pending.push_back(key);
        self.condvar.notify_one();
    }

    fn remove(&self, timeout: Duration) -> Result<Option<NodeKey>, QueueError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        loop {
            if std::mem::take(&mut inner.interrupted) {
                return Err(QueueError::Interrupted);
            }
            if let Some(key) = inner.pending.pop_front() {
                return Ok(Some(key));
            }
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut inner, deadline).timed_out() {
                        // last look: an enqueue may have raced the timeout
                        return Ok(inner.pending.pop_front());
                    }
                }
                None => self.condvar.wait(&mut inner),
            }
        }
    }

    fn interrupt(&self) {
        let mut inner = self.inner.lock();
        inner.interrupted = true;
        self.condvar.notify_all();
    }

    fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
