//! The scheduler and worker pool driven by synthetic job hosts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tekc::{CompileError, JobHost, JobKind, JobStats, JobSystem, WorkerPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    /// Retryable; declared first so it is tried before its producer.
    Waiter,
    /// Critical.
    Producer,
}

impl JobKind for Kind {
    const ALL: &'static [Kind] = &[Kind::Waiter, Kind::Producer];

    fn index(self) -> usize {
        self as usize
    }

    fn is_critical(self) -> bool {
        self == Kind::Producer
    }
}

fn run<H: JobHost>(host: &Arc<H>) -> JobStats {
    WorkerPool::start(Arc::clone(host)).unwrap().wait().unwrap();
    host.jobs().stats()
}

fn assert_accounted(stats: JobStats) {
    assert_eq!(
        stats.queued,
        stats.recycled + stats.critical + stats.parked + stats.pending,
        "{stats:?}"
    );
}

/// The waiter fails until the producer has run, or forever.
struct WaitForProducer {
    jobs: JobSystem<Kind>,
    produced: AtomicBool,
    waiter_gives_up: bool,
    waiter_done: AtomicBool,
}

impl WaitForProducer {
    fn new(workers: usize, waiter_gives_up: bool) -> Arc<Self> {
        Arc::new(WaitForProducer {
            jobs: JobSystem::new(workers, 64).unwrap(),
            produced: AtomicBool::new(false),
            waiter_gives_up,
            waiter_done: AtomicBool::new(false),
        })
    }
}

impl JobHost for WaitForProducer {
    type Kind = Kind;
    type Worker = ();

    fn jobs(&self) -> &JobSystem<Kind> {
        &self.jobs
    }

    fn create_worker(&self, _index: usize) {}

    fn seed(&self, _worker: &mut ()) {
        self.jobs.queue(Kind::Waiter, 0);
        self.jobs.queue(Kind::Producer, 0);
    }

    fn dispatch(&self, _worker: &mut (), kind: Kind, _payload: u32) -> bool {
        match kind {
            Kind::Producer => {
                self.produced.store(true, Ordering::Release);
                true
            }
            Kind::Waiter => {
                let ready = !self.waiter_gives_up && self.produced.load(Ordering::Acquire);
                if ready {
                    self.waiter_done.store(true, Ordering::Release);
                }
                ready
            }
        }
    }
}

#[test]
fn test_waiter_succeeds_after_retry() {
    let host = WaitForProducer::new(1, false);
    let stats = run(&host);

    assert!(host.waiter_done.load(Ordering::Acquire));
    assert_eq!(stats.recycled, 2);
    assert_eq!(stats.parked, 0);
    assert_eq!(stats.retries, 1);
    // The retry pass, then the final stop.
    assert_eq!(stats.stall_decisions, 2);
    assert_accounted(stats);
}

#[test]
fn test_waiter_succeeds_with_many_workers() {
    for _ in 0..20 {
        let host = WaitForProducer::new(4, false);
        let stats = run(&host);
        assert!(host.waiter_done.load(Ordering::Acquire));
        assert_eq!(stats.recycled, 2);
        assert_eq!(stats.critical, 0);
        assert!(stats.retries <= 1);
        assert_accounted(stats);
    }
}

#[test]
fn test_forever_failing_job_stops_the_run() {
    for workers in [1, 3] {
        let host = WaitForProducer::new(workers, true);
        let stats = run(&host);

        assert!(host.jobs.is_stopping());
        assert!(!host.waiter_done.load(Ordering::Acquire));
        assert_eq!(stats.recycled, 1);
        assert_eq!(stats.parked, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(host.jobs.failed_len(Kind::Waiter), 1);
        assert_accounted(stats);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TreeKind {
    Spawn,
    Flaky,
}

impl JobKind for TreeKind {
    const ALL: &'static [TreeKind] = &[TreeKind::Spawn, TreeKind::Flaky];

    fn index(self) -> usize {
        self as usize
    }

    fn is_critical(self) -> bool {
        self == TreeKind::Spawn
    }
}

const TREE_NODES: u32 = 2047;

/// Every node spawns its two children plus one job that fails on its first
/// attempt.
struct Tree {
    jobs: JobSystem<TreeKind>,
    spawned: Vec<AtomicU32>,
    flaky_attempts: Vec<AtomicU8>,
    flaky_done: Vec<AtomicU32>,
}

impl JobHost for Tree {
    type Kind = TreeKind;
    type Worker = ();

    fn jobs(&self) -> &JobSystem<TreeKind> {
        &self.jobs
    }

    fn create_worker(&self, _index: usize) {}

    fn seed(&self, _worker: &mut ()) {
        self.jobs.queue(TreeKind::Spawn, 1);
    }

    fn dispatch(&self, _worker: &mut (), kind: TreeKind, node: u32) -> bool {
        let index = node as usize;
        match kind {
            TreeKind::Spawn => {
                self.spawned[index].fetch_add(1, Ordering::Relaxed);
                for child in [node * 2, node * 2 + 1] {
                    if child <= TREE_NODES {
                        self.jobs.queue(TreeKind::Spawn, child);
                    }
                }
                self.jobs.queue(TreeKind::Flaky, node);
                true
            }
            TreeKind::Flaky => {
                if self.flaky_attempts[index].fetch_add(1, Ordering::Relaxed) == 0 {
                    return false;
                }
                self.flaky_done[index].fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }
}

#[test]
fn test_no_job_is_lost_or_run_twice() {
    let slots = TREE_NODES as usize + 1;
    let host = Arc::new(Tree {
        jobs: JobSystem::new(6, 8192).unwrap(),
        spawned: (0..slots).map(|_| AtomicU32::new(0)).collect(),
        flaky_attempts: (0..slots).map(|_| AtomicU8::new(0)).collect(),
        flaky_done: (0..slots).map(|_| AtomicU32::new(0)).collect(),
    });
    let stats = run(&host);

    for node in 1..slots {
        assert_eq!(host.spawned[node].load(Ordering::Relaxed), 1, "spawn {node}");
        assert_eq!(host.flaky_done[node].load(Ordering::Relaxed), 1, "flaky {node}");
    }
    assert_eq!(stats.queued, u64::from(TREE_NODES) * 2);
    assert_eq!(stats.recycled, stats.queued);
    assert_eq!(stats.parked, 0);
    assert_eq!(stats.pending, 0);
    assert!(stats.retries >= 1);
    assert_accounted(stats);
}

/// One critical job that fails, with more work queued behind it.
struct CriticalFailure {
    jobs: JobSystem<Kind>,
}

impl JobHost for CriticalFailure {
    type Kind = Kind;
    type Worker = ();

    fn jobs(&self) -> &JobSystem<Kind> {
        &self.jobs
    }

    fn create_worker(&self, _index: usize) {}

    fn seed(&self, _worker: &mut ()) {
        self.jobs.queue(Kind::Producer, 0);
    }

    fn dispatch(&self, _worker: &mut (), kind: Kind, _payload: u32) -> bool {
        if kind == Kind::Waiter {
            return true;
        }
        for payload in 1..=10 {
            self.jobs.queue(Kind::Waiter, payload);
        }
        false
    }
}

#[test]
fn test_critical_failure_stops_every_worker() {
    let host = Arc::new(CriticalFailure {
        jobs: JobSystem::new(2, 64).unwrap(),
    });
    let stats = run(&host);
    assert!(host.jobs.is_stopping());
    assert_eq!(stats.critical, 1);
    assert_accounted(stats);
}

struct Panics {
    jobs: JobSystem<Kind>,
}

impl JobHost for Panics {
    type Kind = Kind;
    type Worker = ();

    fn jobs(&self) -> &JobSystem<Kind> {
        &self.jobs
    }

    fn create_worker(&self, _index: usize) {}

    fn seed(&self, _worker: &mut ()) {
        self.jobs.queue(Kind::Producer, 0);
    }

    fn dispatch(&self, _worker: &mut (), _kind: Kind, _payload: u32) -> bool {
        panic!("dispatch blew up");
    }
}

#[test]
fn test_worker_panic_is_reported() {
    let host = Arc::new(Panics {
        jobs: JobSystem::new(2, 64).unwrap(),
    });
    let pool = WorkerPool::start(Arc::clone(&host)).unwrap();
    assert!(matches!(pool.wait(), Err(CompileError::WorkerPanicked)));
    assert!(host.jobs.is_stopping());
}

#[test]
fn test_pool_cannot_start_twice() {
    let host = WaitForProducer::new(2, false);
    let pool = WorkerPool::start(Arc::clone(&host)).unwrap();
    assert!(matches!(
        WorkerPool::start(Arc::clone(&host)),
        Err(CompileError::AlreadyStarted)
    ));
    pool.wait().unwrap();
    assert!(matches!(
        WorkerPool::start(Arc::clone(&host)),
        Err(CompileError::AlreadyStarted)
    ));
}
