//! TokioBlockingFactory - tokio の blocking pool で worker を動かす
//!
//! worker の待機は同期的な blocking wait なので、async タスクではなく
//! `spawn_blocking` に載せます。tokio アプリケーションの中で専用スレッドを
//! 作りたくない場合に使います。
//!
//! 注意: runtime の shutdown は blocking タスクの終了を待つため、
//! keep-alive を有効にしたままだと `shutdown_timeout` が必要になります。
//! shutdown 済みの runtime は job を実行せずに drop するので、register は
//! `CleanerError::WorkerSpawn` になります。

use std::io;

use tokio::runtime::Handle;

use crate::ports::{Job, ThreadFactory};

#[derive(Debug, Clone)]
pub struct TokioBlockingFactory {
    handle: Handle,
}

impl TokioBlockingFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Factory bound to the runtime of the calling context.
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current() -> io::Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))
    }
}

impl ThreadFactory for TokioBlockingFactory {
    fn spawn(&self, job: Job) -> io::Result<()> {
        // JoinHandle is dropped: nobody waits for the worker
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
