//! CleanerBuilder - cleaner の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン
//! - 起動時検証（Fail-fast 設計）: 不正な ttl はここで弾く
//! - ports の差し替え（テスト用の ThreadFactory / ReferenceQueue）

use std::sync::Arc;
use std::time::Duration;

use super::cleaner::LazyCleaner;
use crate::config::{CleanerConfig, DEFAULT_THREAD_NAME, DEFAULT_TTL};
use crate::domain::CleanerError;
use crate::impls::{InMemoryReferenceQueue, NamedThreadFactory};
use crate::ports::{ReferenceQueue, ThreadFactory};

/// CleanerBuilder は LazyCleaner を構築
///
/// # 使用例
/// ```ignore
/// let cleaner = LazyCleaner::builder()
///     .ttl(Duration::from_millis(50))
///     .thread_name("pool-cleaner")
///     .keep_thread_alive(true)
///     .build()?;
/// ```
pub struct CleanerBuilder {
    ttl: Duration,
    thread_name: String,
    stack_size: Option<usize>,
    keep_thread_alive: bool,
    thread_factory: Option<Arc<dyn ThreadFactory>>,
    queue: Option<Arc<dyn ReferenceQueue>>,
}

impl CleanerBuilder {
    pub fn new() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
            keep_thread_alive: false,
            thread_factory: None,
            queue: None,
        }
    }

    pub fn from_config(config: &CleanerConfig) -> Self {
        Self {
            ttl: config.ttl,
            thread_name: config.thread_name.clone(),
            stack_size: config.stack_size,
            keep_thread_alive: config.keep_thread_alive,
            thread_factory: None,
            queue: None,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Name of the worker thread. Ignored when a custom factory is set.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Ignored when a custom factory is set.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn keep_thread_alive(mut self, alive: bool) -> Self {
        self.keep_thread_alive = alive;
        self
    }

    pub fn thread_factory(mut self, factory: impl ThreadFactory + 'static) -> Self {
        self.thread_factory = Some(Arc::new(factory));
        self
    }

    pub fn reference_queue(mut self, queue: impl ReferenceQueue + 'static) -> Self {
        self.queue = Some(Arc::new(queue));
        self
    }

    /// Build the cleaner.
    ///
    /// # 検証
    /// - ttl == 0 は `InvalidConfig`（worker が空回りするため）
    /// - thread_name / stack_size は既定の factory を使う時だけ検証
    /// - keep_thread_alive が有効なら、ここで worker が起動する
    pub fn build(self) -> Result<LazyCleaner, CleanerError> {
        if self.ttl.is_zero() {
            return Err(CleanerError::InvalidConfig("ttl must be greater than zero".into()));
        }
        let thread_factory = match self.thread_factory {
            Some(factory) => factory,
            None => {
                CleanerConfig {
                    ttl: self.ttl,
                    thread_name: self.thread_name.clone(),
                    stack_size: self.stack_size,
                    keep_thread_alive: self.keep_thread_alive,
                }
                .validate()?;
                let mut factory = NamedThreadFactory::new(self.thread_name);
                if let Some(bytes) = self.stack_size {
                    factory = factory.with_stack_size(bytes);
                }
                Arc::new(factory)
            }
        };
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryReferenceQueue::new()));

        let cleaner = LazyCleaner::from_parts(self.ttl, thread_factory, queue);
        if self.keep_thread_alive {
            cleaner.set_keep_thread_alive(true)?;
        }
        Ok(cleaner)
    }
}

impl Default for CleanerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
