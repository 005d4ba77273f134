//! App - cleaner 本体
//!
//! # 主要コンポーネント
//! - **CleanerCore**: registry + running フラグ（一つの Mutex）、one-shot の fire
//! - **WorkerLoop**: 到達不能通知を処理し、idle かつ空なら終了する
//! - **LazyCleaner**: 公開 facade（register / keep-alive / 状態取得）
//! - **CleanerBuilder**: 構築と起動時検証
//! - **Cleanable / PhantomRef / Tracked**: 利用者に返すハンドル
//! - **CleanerStatus**: 状態スナップショット

pub mod builder;
pub mod cleaner;
mod cleaner_core;
pub mod handle;
pub mod status;
mod worker_loop;

pub use self::builder::CleanerBuilder;
pub use self::cleaner::{LazyCleaner, MIN_TTL};
pub use self::handle::{Cleanable, PhantomRef, Tracked};
pub use self::status::CleanerStatus;
