//! lazycleaner-core
//!
//! Deferred cleanup for resources whose owners may never release them.
//!
//! An owner registers a cleanup action and keeps the returned phantom reference
//! (or the `Tracked` wrapper). Releasing explicitly runs the action right away
//! with `leak = false`. Dropping the owner without releasing hands the node to a
//! background worker, which runs the action with `leak = true`. Either way the
//! action runs exactly once.
//!
//! The worker is started on the first registration and stops by itself once it
//! has been idle for `ttl` with nothing registered.
//!
//! # モジュール構成
//! - **domain**: NodeKey, エラー型
//! - **ports**: ThreadFactory, ReferenceQueue
//! - **impls**: NamedThreadFactory, TokioBlockingFactory, InMemoryReferenceQueue
//! - **app**: LazyCleaner, worker loop, ハンドル, builder, status
//! - **config**: YAML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
mod registry;

pub use app::{Cleanable, CleanerBuilder, CleanerStatus, LazyCleaner, PhantomRef, Tracked, MIN_TTL};
pub use config::CleanerConfig;
pub use domain::{CleanerError, NodeKey, QueueError};
pub use registry::BoxedAction;
