//! Errors - エラー型と分類
//!
//! - `CleanerError`: 呼び出し側に返るエラー（register / 設定読み込み）
//! - `QueueError`: reference queue の待機中に起きるエラー（worker が log して続行）
//!
//! cleanup action 自身の失敗は `anyhow::Error` で表され、ここには現れません。
//! action の失敗は常に log されて握りつぶされます。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// CleanerError は cleaner の利用者に返るエラー
#[derive(Debug, Error)]
pub enum CleanerError {
    /// The thread factory refused to start the worker. The registration that
    /// needed the worker has been rolled back.
    #[error("failed to spawn cleaner worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("invalid cleaner config: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse cleaner config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

/// QueueError は ReferenceQueue の待機エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The wait was interrupted before a notification or the timeout arrived.
    #[error("wait on reference queue was interrupted")]
    Interrupted,
}
