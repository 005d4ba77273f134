//! NamedThreadFactory - 名前付き OS スレッド
//!
//! std のスレッドは JoinHandle を捨てると detach されるので、
//! worker はプロセス終了を妨げません（daemon スレッド相当）。

use std::io;
use std::thread;

use crate::ports::{Job, ThreadFactory};

/// Spawns each worker on a fresh, detached OS thread carrying `name`.
#[derive(Debug, Clone)]
pub struct NamedThreadFactory {
    name: String,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, job: Job) -> io::Result<()> {
        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        // detached: the worker ends on its own once idle
        builder.spawn(job).map(drop)
    }
}
