//! Ports - 外部コラボレータの抽象化
//!
//! cleaner が自前で持たないもの（スレッド生成、到達不能通知のキュー）を
//! trait として切り出します。
//!
//! - **ThreadFactory**: worker を走らせるスレッド / タスクの生成
//! - **ReferenceQueue**: 到達不能になった node の通知と、timeout 付きの blocking wait

pub mod reference_queue;
pub mod thread_factory;

pub use self::reference_queue::ReferenceQueue;
pub use self::thread_factory::{Job, ThreadFactory};
