//! LazyCleaner - 公開エントリポイント
//!
//! # 使用例
//! ```ignore
//! let cleaner = LazyCleaner::new(Duration::from_millis(100), "fd-cleaner");
//!
//! let file = cleaner.register(RawFd::open(path)?, move |leak| {
//!     if leak {
//!         tracing::warn!("file handle leaked, closing");
//!     }
//!     close_fd(fd)
//! })?;
//!
//! file.clean();   // explicit release: leak = false
//! drop(file);     // no second run
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::builder::CleanerBuilder;
use super::cleaner_core::CleanerCore;
use super::handle::{PhantomRef, Tracked};
use super::status::CleanerStatus;
use crate::config::CleanerConfig;
use crate::domain::CleanerError;
use crate::impls::{InMemoryReferenceQueue, NamedThreadFactory};
use crate::ports::{ReferenceQueue, ThreadFactory};
use crate::registry::BoxedAction;

/// Smallest ttl `new` accepts; zero would make an idle worker spin.
pub const MIN_TTL: Duration = Duration::from_millis(1);

/// LazyCleaner は owner が到達不能になった時の cleanup を遅延実行する
///
/// # 状態
/// - registry と worker の running フラグは `CleanerCore` の一つの Mutex の中
/// - keep-alive 用の phantom reference は cleaner 自身が持つ
///   （cleaner を drop すると、その node も worker に届く）
pub struct LazyCleaner {
    core: Arc<CleanerCore>,
    keep_alive: Mutex<Option<PhantomRef>>,
}

impl LazyCleaner {
    /// Cleaner whose worker runs on a detached thread named `thread_name`.
    ///
    /// A zero `ttl` is raised to `MIN_TTL`.
    pub fn new(ttl: Duration, thread_name: impl Into<String>) -> Self {
        Self::with_thread_factory(ttl, NamedThreadFactory::new(thread_name))
    }

    pub fn with_thread_factory(ttl: Duration, factory: impl ThreadFactory + 'static) -> Self {
        Self::from_parts(
            ttl.max(MIN_TTL),
            Arc::new(factory),
            Arc::new(InMemoryReferenceQueue::new()),
        )
    }

    pub fn builder() -> CleanerBuilder {
        CleanerBuilder::new()
    }

    pub fn from_config(config: &CleanerConfig) -> Result<Self, CleanerError> {
        CleanerBuilder::from_config(config).build()
    }

    pub(crate) fn from_parts(
        ttl: Duration,
        thread_factory: Arc<dyn ThreadFactory>,
        queue: Arc<dyn ReferenceQueue>,
    ) -> Self {
        Self {
            core: Arc::new(CleanerCore::new(ttl, thread_factory, queue)),
            keep_alive: Mutex::new(None),
        }
    }

    /// Track `object` and run `action` once it is released or dropped.
    ///
    /// The action receives `leak = true` when the returned `Tracked` was
    /// dropped without an explicit `clean`. It must not capture the object
    /// itself. Errors and panics from the action are logged and swallowed.
    ///
    /// Fails only if the worker had to be started and could not be.
    pub fn register<T, F>(&self, object: T, action: F) -> Result<Tracked<T>, CleanerError>
    where
        F: FnOnce(bool) -> anyhow::Result<()> + Send + 'static,
    {
        let phantom = self.watch(Some(Box::new(action)))?;
        Ok(Tracked::new(object, phantom))
    }

    /// Like `register`, for owners that store the phantom reference in their
    /// own struct instead of being wrapped in `Tracked`.
    pub fn register_phantom<F>(&self, action: F) -> Result<PhantomRef, CleanerError>
    where
        F: FnOnce(bool) -> anyhow::Result<()> + Send + 'static,
    {
        self.watch(Some(Box::new(action)))
    }

    fn watch(&self, action: Option<BoxedAction>) -> Result<PhantomRef, CleanerError> {
        let key = self.core.add(action)?;
        Ok(PhantomRef::new(key, Arc::clone(&self.core)))
    }

    /// Keep the worker running even with nothing else registered.
    ///
    /// Enabling registers the cleaner itself with no action; disabling releases
    /// that registration. Redundant calls change nothing.
    pub fn set_keep_thread_alive(&self, alive: bool) -> Result<&Self, CleanerError> {
        let mut keep_alive = self.keep_alive.lock();
        if alive == keep_alive.is_some() {
            return Ok(self);
        }

        if alive {
            *keep_alive = Some(self.watch(None)?);
        } else if let Some(phantom) = keep_alive.take() {
            phantom.clean();
        }
        debug!(alive, "cleaner keep-alive toggled");
        Ok(self)
    }

    pub fn is_keep_thread_alive(&self) -> bool {
        self.keep_alive.lock().is_some()
    }

    /// Registrations whose action has not run yet.
    pub fn watched_count(&self) -> usize {
        self.core.watched_count()
    }

    pub fn is_thread_running(&self) -> bool {
        self.core.is_thread_running()
    }

    pub fn ttl(&self) -> Duration {
        self.core.ttl()
    }

    /// Wake the worker's current wait with an interruption.
    ///
    /// The worker logs it and keeps going; this never stops it.
    pub fn interrupt_worker(&self) {
        self.core.queue().interrupt();
    }

    pub fn status(&self) -> CleanerStatus {
        let keep_alive = self.is_keep_thread_alive();
        let (watched, thread_running) = self.core.snapshot();
        CleanerStatus {
            watched,
            thread_running,
            keep_alive,
            pending: self.core.queue().len(),
            observed_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for LazyCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (watched, thread_running) = self.core.snapshot();
        f.debug_struct("LazyCleaner")
            .field("ttl", &self.core.ttl())
            .field("watched", &watched)
            .field("thread_running", &thread_running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::TokioBlockingFactory;
    use crate::ports::Job;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    const TTL: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(10);

    fn await_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while !condition() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    #[test]
    fn phantom_cleaner_reports_leaks_and_releases() {
        let cleaner = LazyCleaner::new(TTL, "Cleaner");
        assert!(!cleaner.is_thread_running());
        assert_eq!(cleaner.watched_count(), 0);

        let collected = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let mut objects = Vec::new();
        for id in 0..3 {
            let collected = Arc::clone(&collected);
            objects.push(
                cleaner
                    .register(format!("object-{id}"), move |leak| {
                        collected.lock().insert(id, leak);
                        Ok(())
                    })
                    .unwrap(),
            );
        }
        assert_eq!(cleaner.watched_count(), 3);
        assert!(await_until(|| cleaner.is_thread_running()));

        objects[1].clean();
        assert_eq!(cleaner.watched_count(), 2);

        objects.clear();

        assert!(await_until(|| !cleaner.is_thread_running()));
        assert_eq!(cleaner.watched_count(), 0);
        let collected = collected.lock();
        assert_eq!(collected.len(), 3);
        assert!(collected[&0]);
        assert!(!collected[&1]);
        assert!(collected[&2]);
    }

    #[test]
    fn explicit_release_fires_once_and_drop_does_not_refire() {
        let cleaner = LazyCleaner::new(TTL, "release-once");
        let runs = Arc::new(AtomicUsize::new(0));
        let leaked = Arc::new(AtomicBool::new(false));

        let tracked = cleaner
            .register(vec![1_u8, 2, 3], {
                let runs = Arc::clone(&runs);
                let leaked = Arc::clone(&leaked);
                move |leak| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    leaked.store(leak, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();
        let handle = tracked.cleanable();

        handle.clean();
        handle.clone().clean();
        tracked.clean();
        assert!(handle.is_cleaned());
        assert_eq!(tracked.len(), 3);
        drop(tracked);

        assert!(await_until(|| !cleaner.is_thread_running()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!leaked.load(Ordering::SeqCst));
    }

    #[test]
    fn force_thread_alive_cycles() {
        let cleaner = LazyCleaner::new(TTL, "Cleaner");

        for _ in 0..5 {
            assert!(!cleaner.is_thread_running());
            assert_eq!(cleaner.watched_count(), 0);

            let same = cleaner.set_keep_thread_alive(true).unwrap();
            assert!(std::ptr::eq(same, &cleaner));
            assert!(await_until(|| cleaner.is_thread_running()));
            assert_eq!(cleaner.watched_count(), 1);

            cleaner.set_keep_thread_alive(true).unwrap();
            assert_eq!(cleaner.watched_count(), 1);

            // several ttl periods pass; the sentinel keeps the worker up
            thread::sleep(TTL * 5);
            assert!(cleaner.is_thread_running());

            cleaner.set_keep_thread_alive(false).unwrap();
            cleaner.set_keep_thread_alive(false).unwrap();
            assert!(await_until(|| !cleaner.is_thread_running()));
            assert_eq!(cleaner.watched_count(), 0);
        }
    }

    #[test]
    fn failing_action_and_interrupt_do_not_stop_worker() {
        let cleaner = LazyCleaner::new(TTL, "failing-actions");
        let survivor_ran = Arc::new(AtomicBool::new(false));

        let failing = cleaner
            .register((), |_leak| anyhow::bail!("abc"))
            .unwrap();
        let panicking = cleaner
            .register((), |_leak| -> anyhow::Result<()> { panic!("abc") })
            .unwrap();
        let survivor = cleaner
            .register((), {
                let survivor_ran = Arc::clone(&survivor_ran);
                move |leak| {
                    assert!(leak);
                    survivor_ran.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();
        assert!(await_until(|| cleaner.is_thread_running()));

        cleaner.interrupt_worker();
        drop(failing);
        drop(panicking);
        assert!(await_until(|| cleaner.watched_count() == 1));
        thread::sleep(TTL * 3);
        assert!(cleaner.is_thread_running());

        drop(survivor);
        assert!(await_until(|| !cleaner.is_thread_running()));
        assert!(survivor_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn spawn_failure_is_returned_from_register() {
        let cleaner = LazyCleaner::with_thread_factory(TTL, |_job: Job| -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::OutOfMemory, "cannot spawn"))
        });

        let err = cleaner.register((), |_leak| Ok(())).unwrap_err();

        assert!(matches!(err, CleanerError::WorkerSpawn(_)));
        assert_eq!(cleaner.watched_count(), 0);
        assert!(!cleaner.is_thread_running());
    }

    #[test]
    fn worker_restarts_after_going_idle() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let cleaner = LazyCleaner::with_thread_factory(TTL, {
            let spawned = Arc::clone(&spawned);
            let threads = NamedThreadFactory::new("restarting");
            move |job: Job| -> io::Result<()> {
                spawned.fetch_add(1, Ordering::SeqCst);
                threads.spawn(job)
            }
        });

        for round in 1..=3 {
            let tracked = cleaner.register(round, |_leak| Ok(())).unwrap();
            assert!(cleaner.is_thread_running());
            drop(tracked);
            assert!(await_until(|| !cleaner.is_thread_running()));
            assert_eq!(spawned.load(Ordering::SeqCst), round);
        }
    }

    #[test]
    fn embedded_phantom_ref_tracks_its_owner() {
        struct Connection {
            id: u32,
            phantom: PhantomRef,
        }

        let cleaner = LazyCleaner::new(TTL, "connections");
        let closed = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let open = |id: u32| {
            let closed = Arc::clone(&closed);
            Connection {
                id,
                phantom: cleaner
                    .register_phantom(move |leak| {
                        closed.lock().push((id, leak));
                        Ok(())
                    })
                    .unwrap(),
            }
        };

        let kept = open(1);
        let dropped = open(2);
        assert!(kept.phantom.is_watched());
        drop(dropped);

        // the action runs after the node is unlinked, so wait on its effect
        assert!(await_until(|| closed.lock().len() == 1));
        assert_eq!(cleaner.watched_count(), 1);
        assert_eq!(*closed.lock(), vec![(2, true)]);

        kept.phantom.clean();
        assert_eq!(kept.id, 1);
        assert_eq!(*closed.lock(), vec![(2, true), (1, false)]);
    }

    #[test]
    fn dropping_cleaner_with_keep_alive_lets_worker_stop() {
        let cleaner = LazyCleaner::new(TTL, "dropped-cleaner");
        let probe = Arc::clone(&cleaner.core);
        cleaner.set_keep_thread_alive(true).unwrap();
        assert!(await_until(|| probe.is_thread_running()));

        drop(cleaner);

        assert!(await_until(|| !probe.is_thread_running()));
        assert_eq!(probe.watched_count(), 0);
    }

    #[test]
    fn status_reflects_registrations() {
        let cleaner = LazyCleaner::new(TTL, "status");
        let before = cleaner.status();
        assert_eq!(before.watched, 0);
        assert!(!before.thread_running);
        assert!(!before.keep_alive);

        cleaner.set_keep_thread_alive(true).unwrap();
        let tracked = cleaner.register(7, |_leak| Ok(())).unwrap();
        let during = cleaner.status();
        assert_eq!(during.watched, 2);
        assert!(during.thread_running);
        assert!(during.keep_alive);

        tracked.clean();
        cleaner.set_keep_thread_alive(false).unwrap();
        assert!(await_until(|| !cleaner.status().thread_running));
        assert_eq!(cleaner.status().watched, 0);
    }

    #[rstest]
    #[case::released(true)]
    #[case::dropped(false)]
    fn worker_stops_within_a_few_ttls_once_empty(#[case] release: bool) {
        let ttl = Duration::from_millis(20);
        let cleaner = LazyCleaner::new(ttl, "prompt-stop");
        let tracked = cleaner.register((), |_leak| Ok(())).unwrap();
        assert!(cleaner.is_thread_running());
        // let the worker reach its wait
        thread::sleep(ttl * 2);

        if release {
            tracked.clean();
        } else {
            drop(tracked);
        }
        let emptied = Instant::now();
        let bound = ttl * 5 + Duration::from_millis(200);
        while cleaner.is_thread_running() {
            assert!(
                emptied.elapsed() < bound,
                "worker still running {:?} after the registry emptied",
                emptied.elapsed()
            );
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(cleaner.watched_count(), 0);
    }

    #[test]
    fn unbounded_ttl_still_delivers_leaks() {
        let cleaner = LazyCleaner::new(Duration::MAX, "unbounded-ttl");
        let runs = Arc::new(AtomicUsize::new(0));
        let tracked = cleaner
            .register((), {
                let runs = Arc::clone(&runs);
                move |leak| {
                    assert!(leak);
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        drop(tracked);

        assert!(await_until(|| runs.load(Ordering::SeqCst) == 1));
        assert_eq!(cleaner.watched_count(), 0);
        // the worker now waits without a deadline
        assert!(cleaner.is_thread_running());
    }

    #[test]
    fn shut_down_runtime_rejects_registration() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let handle = runtime.handle().clone();
        runtime.shutdown_background();

        let cleaner = LazyCleaner::with_thread_factory(TTL, TokioBlockingFactory::new(handle));
        let err = cleaner.register((), |_leak| Ok(())).unwrap_err();

        assert!(matches!(err, CleanerError::WorkerSpawn(_)));
        assert_eq!(cleaner.watched_count(), 0);
        assert!(!cleaner.is_thread_running());
    }

    #[test]
    fn zero_ttl_is_raised_to_minimum() {
        let cleaner = LazyCleaner::new(Duration::ZERO, "zero");
        assert_eq!(cleaner.ttl(), MIN_TTL);
    }

    #[test]
    fn concurrent_release_and_collection_fire_each_exactly_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 10_000;

        let cleaner = Arc::new(LazyCleaner::new(TTL, "Resource Cleaner"));
        let created = Arc::new(AtomicU64::new(0));
        let disposed = Arc::new(AtomicU64::new(0));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let cleaner = Arc::clone(&cleaner);
                let created = Arc::clone(&created);
                let disposed = Arc::clone(&disposed);
                thread::spawn(move || {
                    for j in 0..PER_THREAD {
                        created.fetch_add(1, Ordering::SeqCst);
                        let disposed = Arc::clone(&disposed);
                        let resource = cleaner
                            .register(j, move |_leak| {
                                disposed.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            })
                            .unwrap();
                        if j % 2 == 0 {
                            resource.clean();
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(await_until(|| disposed.load(Ordering::SeqCst) == created.load(Ordering::SeqCst)));
        assert!(await_until(|| !cleaner.is_thread_running()));
        assert_eq!(created.load(Ordering::SeqCst), (THREADS * PER_THREAD) as u64);
        assert_eq!(disposed.load(Ordering::SeqCst), (THREADS * PER_THREAD) as u64);
        assert_eq!(cleaner.watched_count(), 0);
    }

    #[test]
    fn release_racing_collection_fires_once() {
        let cleaner = LazyCleaner::new(TTL, "racing");
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..1_000 {
            let tracked = cleaner
                .register((), {
                    let runs = Arc::clone(&runs);
                    move |_leak| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .unwrap();
            let handle = tracked.cleanable();
            drop(tracked);
            // the worker may already be running this node
            handle.clean();
        }

        assert!(await_until(|| !cleaner.is_thread_running()));
        assert_eq!(runs.load(Ordering::SeqCst), 1_000);
    }
}
