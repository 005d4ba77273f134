//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryReferenceQueue**: Mutex + Condvar による通知キュー（既定）
//! - **NamedThreadFactory**: 名前付きの OS スレッドで worker を動かす（既定）
//! - **TokioBlockingFactory**: tokio の blocking pool で worker を動かす

pub mod inmem_reference;
pub mod named_thread;
pub mod tokio_blocking;

pub use self::inmem_reference::InMemoryReferenceQueue;
pub use self::named_thread::NamedThreadFactory;
pub use self::tokio_blocking::TokioBlockingFactory;
