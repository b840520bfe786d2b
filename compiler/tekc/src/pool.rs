//! The worker pool: N named OS threads running the scheduler loop.
//!
//! ```text
//! create worker → start barrier → (worker 0: seed) → loop { next → dispatch → finish }
//! ```
//!
//! The driving thread blocks on a [`Latch`] that the last worker to exit
//! releases, then joins every thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::utils::Backoff;

use crate::flags::RunFlags;
use crate::jobs::{JobKind, JobSystem};
use crate::latch::Latch;
use crate::CompileError;

/// What a pool runs: the shared state workers dispatch into.
pub trait JobHost: Send + Sync + 'static {
    type Kind: JobKind;
    /// Worker-private scratch state, created on the worker's own thread.
    type Worker;

    fn jobs(&self) -> &JobSystem<Self::Kind>;

    fn create_worker(&self, index: usize) -> Self::Worker;

    /// Queues the first jobs. Runs once, on worker 0, after every worker
    /// has passed the start barrier.
    fn seed(&self, worker: &mut Self::Worker);

    /// Runs one job. Diagnostics go to the host's error log; the return
    /// value only says whether the job succeeded.
    fn dispatch(&self, worker: &mut Self::Worker, kind: Self::Kind, payload: u32) -> bool;
}

struct PoolShared {
    workers: u32,
    started: AtomicU32,
    running: AtomicU32,
    done: Latch,
}

/// A started pool. Consume it with [`WorkerPool::wait`].
pub struct WorkerPool<H: JobHost> {
    host: Arc<H>,
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl<H: JobHost> WorkerPool<H> {
    /// Spawns one thread per scheduler worker.
    ///
    /// Fails if the host's scheduler was already started, or if a thread
    /// cannot be spawned (the threads already running are stopped and
    /// joined first).
    pub fn start(host: Arc<H>) -> Result<Self, CompileError> {
        let jobs = host.jobs();
        let previous = jobs.flags().insert(RunFlags::STARTING_UP);
        if previous.intersects(RunFlags::STARTING_UP | RunFlags::RUNNING | RunFlags::STOPPING) {
            if !previous.contains(RunFlags::STARTING_UP) {
                jobs.flags().remove(RunFlags::STARTING_UP);
            }
            return Err(CompileError::AlreadyStarted);
        }
        let workers = u32::try_from(jobs.workers()).unwrap_or(u32::MAX);
        let shared = Arc::new(PoolShared {
            workers,
            started: AtomicU32::new(0),
            running: AtomicU32::new(workers),
            done: Latch::new(),
        });
        tracing::debug!(workers, "starting worker pool");

        let mut pool = WorkerPool {
            host,
            shared,
            handles: Vec::with_capacity(workers as usize),
        };
        for index in 0..workers as usize {
            let host = Arc::clone(&pool.host);
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("tek-worker-{index}"))
                .spawn(move || worker_main(&*host, &shared, index));
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    tracing::error!(index, %source, "failed to spawn worker");
                    pool.host.jobs().signal_stop();
                    pool.abandon(index);
                    let _ = pool.join();
                    return Err(CompileError::Spawn { index, source });
                }
            }
        }
        Ok(pool)
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Blocks until every worker has exited, then joins them.
    pub fn wait(self) -> Result<(), CompileError> {
        self.shared.done.wait();
        self.join()
    }

    fn join(self) -> Result<(), CompileError> {
        let mut panicked = false;
        for handle in self.handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            Err(CompileError::WorkerPanicked)
        } else {
            Ok(())
        }
    }

    /// Accounts for workers `from..` that were never spawned.
    fn abandon(&self, from: usize) {
        let missing = self.shared.workers - u32::try_from(from).unwrap_or(self.shared.workers);
        self.shared.started.fetch_add(missing, Ordering::AcqRel);
        let previous = self.shared.running.fetch_sub(missing, Ordering::AcqRel);
        if previous == missing {
            self.host.jobs().flags().remove(RunFlags::STARTING_UP | RunFlags::RUNNING);
            self.shared.done.release();
        }
    }
}

/// Marks its worker as exited when dropped, even on panic.
struct RunningGuard<'a, K: JobKind> {
    jobs: &'a JobSystem<K>,
    shared: &'a PoolShared,
    index: usize,
}

impl<K: JobKind> Drop for RunningGuard<'_, K> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!(worker = self.index, "worker panicked, stopping");
            self.jobs.signal_stop();
        }
        if self.shared.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.jobs
                .flags()
                .remove(RunFlags::STARTING_UP | RunFlags::RUNNING);
            tracing::debug!("last worker exited");
            self.shared.done.release();
        }
    }
}

fn worker_main<H: JobHost>(host: &H, shared: &PoolShared, index: usize) {
    let jobs = host.jobs();
    let _running = RunningGuard {
        jobs,
        shared,
        index,
    };
    let mut worker = host.create_worker(index);

    shared.started.fetch_add(1, Ordering::AcqRel);
    let backoff = Backoff::new();
    while shared.started.load(Ordering::Acquire) < shared.workers {
        if jobs.is_stopping() {
            return;
        }
        backoff.snooze();
    }

    if index == 0 {
        // Set before clearing, so a concurrent `start` always sees one of them.
        let flags = jobs.flags();
        flags.insert(RunFlags::RUNNING);
        flags.remove(RunFlags::STARTING_UP);
        host.seed(&mut worker);
    }

    let mut last = None;
    while let Some(id) = jobs.next(last) {
        let job = jobs.get(id);
        tracing::trace!(
            worker = index,
            ?id,
            kind = ?job.kind,
            payload = job.payload,
            "dispatch"
        );
        let success = host.dispatch(&mut worker, job.kind, job.payload);
        jobs.finish(id, success);
        last = Some(job.kind);
    }
    tracing::trace!(worker = index, "worker exiting");
}
