//! The job scheduler.
//!
//! Jobs are small recyclable records in one segment: a kind, a `u32`
//! payload, an 8-bit generation and an intrusive `next` link. Each kind has
//! an *available* list and a *failed* list; finished slots go back on a
//! global free list. Every list is a head/tail pair behind its own
//! spinlock, held only while linking.
//!
//! A [`JobId`] packs the 1-based slot index with the slot's generation:
//!
//! ```text
//! | generation: 8 | slot: 24 |
//! ```
//!
//! Recycling a slot bumps its generation, so ids held past
//! [`JobSystem::finish`] fail the check on their next use.
//!
//! # Stalls
//!
//! One 64-bit word holds the available-job count (low half) and the number
//! of stalled workers (high half). A worker that sees no available job
//! marks itself stalled and spins; claiming a job clears the mark in the
//! same CAS. The worker whose mark makes every worker stalled decides:
//!
//! - nothing parked, or no job succeeded since the last decision: stop;
//! - otherwise move every failed list onto its available list and publish
//!   the promoted jobs as available.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use crossbeam::utils::{Backoff, CachePadded};
use tek_arena::{SegmentSet, VirtMemError, ZeroInit};

use crate::flags::{AtomicRunFlags, RunFlags};
use crate::spin::SpinMutex;

const SLOTS: usize = 0;
const SLOT_BITS: u32 = 24;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

/// Largest usable slot index.
pub const MAX_JOB_SLOTS: usize = SLOT_MASK as usize;

/// The closed set of job types a scheduler serves.
pub trait JobKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every kind, in priority order.
    const ALL: &'static [Self];

    /// Position in [`JobKind::ALL`].
    fn index(self) -> usize;

    /// Whether a failure stops the run instead of parking the job.
    fn is_critical(self) -> bool;
}

/// A generation-checked handle to a job slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(NonZeroU32);

impl JobId {
    fn new(slot: u32, generation: u8) -> JobId {
        debug_assert!(slot != 0 && slot <= SLOT_MASK);
        match NonZeroU32::new(slot | (u32::from(generation) << SLOT_BITS)) {
            Some(raw) => JobId(raw),
            None => unreachable!("job slot 0 is never handed out"),
        }
    }

    pub fn from_raw(raw: u32) -> Option<JobId> {
        NonZeroU32::new(raw).map(JobId)
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }

    /// The 1-based slot index.
    pub fn slot(self) -> usize {
        (self.0.get() & SLOT_MASK) as usize
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "the generation is the top 8 bits"
    )]
    pub fn generation(self) -> u8 {
        (self.0.get() >> SLOT_BITS) as u8
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({}#{})", self.slot(), self.generation())
    }
}

/// A claimed job, as read through a live id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job<K> {
    pub id: JobId,
    pub kind: K,
    pub payload: u32,
}

/// The id's generation no longer matches its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("stale job id {id:?} (live generation {live:?})")]
pub struct StaleJobId {
    pub id: JobId,
    /// The slot's current generation; `None` if the slot was never minted.
    pub live: Option<u8>,
}

/// Scheduler counters. Only exact once every worker has exited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Jobs ever queued.
    pub queued: u64,
    /// Jobs that succeeded and went back on the free list.
    pub recycled: u64,
    /// Critical failures; each one stopped the run.
    pub critical: u64,
    /// Jobs still on failed lists.
    pub parked: u64,
    /// Jobs still on available lists.
    pub pending: u64,
    /// All-stalled decisions taken.
    pub stall_decisions: u64,
    /// Decisions that promoted failed jobs for another pass.
    pub retries: u64,
}

#[derive(Default)]
#[repr(C)]
struct JobSlot {
    next: AtomicU32,
    payload: AtomicU32,
    kind: AtomicU8,
    generation: AtomicU8,
}

// SAFETY: all fields are atomics, for which zero is a valid value.
#[allow(unsafe_code)]
unsafe impl ZeroInit for JobSlot {}

/// Raw ids of the first and last job, linked through `JobSlot::next`.
#[derive(Debug, Default)]
struct JobList {
    head: u32,
    tail: u32,
    len: u32,
}

fn pack(available: u32, stalled: u32) -> u64 {
    (u64::from(stalled) << 32) | u64::from(available)
}

#[expect(clippy::cast_possible_truncation, reason = "splitting the halves")]
fn unpack(word: u64) -> (u32, u32) {
    (word as u32, (word >> 32) as u32)
}

/// Per-kind job queues plus the stall protocol, shared by every worker.
pub struct JobSystem<K: JobKind> {
    segments: SegmentSet,
    /// Slot capacity, slot 0 included.
    capacity: usize,
    workers: u32,
    flags: AtomicRunFlags,
    state: CachePadded<AtomicU64>,
    available: Box<[SpinMutex<JobList>]>,
    failed: Box<[SpinMutex<JobList>]>,
    free: SpinMutex<JobList>,
    /// Next never-used slot.
    minted: AtomicU32,
    parked: CachePadded<AtomicU32>,
    /// Successes since the last stall decision.
    progress: CachePadded<AtomicU64>,
    decision: SpinMutex<()>,
    queued: AtomicU64,
    recycled: AtomicU64,
    critical: AtomicU64,
    stall_decisions: AtomicU64,
    retries: AtomicU64,
    _kind: PhantomData<K>,
}

impl<K: JobKind> JobSystem<K> {
    /// A scheduler for `workers` threads with room for `max_jobs` live jobs.
    pub fn new(workers: usize, max_jobs: usize) -> Result<Self, VirtMemError> {
        assert!(
            !K::ALL.is_empty() && K::ALL.len() <= usize::from(u8::MAX),
            "job kinds must fit in a byte"
        );
        let slot_bytes = max_jobs
            .max(1)
            .saturating_add(1)
            .saturating_mul(mem::size_of::<JobSlot>());
        let segments = SegmentSet::reserve(&[slot_bytes])?;
        let capacity = segments
            .capacity_of::<JobSlot>(SLOTS)
            .min(MAX_JOB_SLOTS + 1);
        let lists = || -> Box<[SpinMutex<JobList>]> {
            K::ALL
                .iter()
                .map(|_| SpinMutex::new(JobList::default()))
                .collect()
        };
        Ok(JobSystem {
            segments,
            capacity,
            workers: u32::try_from(workers.max(1)).unwrap_or(u32::MAX),
            flags: AtomicRunFlags::default(),
            state: CachePadded::new(AtomicU64::new(0)),
            available: lists(),
            failed: lists(),
            free: SpinMutex::new(JobList::default()),
            minted: AtomicU32::new(1),
            parked: CachePadded::new(AtomicU32::new(0)),
            progress: CachePadded::new(AtomicU64::new(0)),
            decision: SpinMutex::new(()),
            queued: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            critical: AtomicU64::new(0),
            stall_decisions: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            _kind: PhantomData,
        })
    }

    /// Returns a finished scheduler to its initial state for another run:
    /// no flags, no jobs, every slot unminted. Ids from before the reset
    /// must not be used afterwards.
    pub fn reset(&mut self) -> Result<(), VirtMemError> {
        self.segments.reset()?;
        self.flags = AtomicRunFlags::default();
        *self.state.get_mut() = 0;
        for list in self.available.iter_mut().chain(self.failed.iter_mut()) {
            *list.get_mut() = JobList::default();
        }
        *self.free.get_mut() = JobList::default();
        *self.minted.get_mut() = 1;
        *self.parked.get_mut() = 0;
        *self.progress.get_mut() = 0;
        for counter in [
            &mut self.queued,
            &mut self.recycled,
            &mut self.critical,
            &mut self.stall_decisions,
            &mut self.retries,
        ] {
            *counter.get_mut() = 0;
        }
        tracing::debug!("job system reset");
        Ok(())
    }

    /// Number of worker threads the stall protocol waits for.
    pub fn workers(&self) -> usize {
        self.workers as usize
    }

    /// The run's state flags.
    pub fn flags(&self) -> &AtomicRunFlags {
        &self.flags
    }

    pub fn signal_stop(&self) {
        let previous = self.flags.insert(RunFlags::STOPPING);
        if !previous.contains(RunFlags::STOPPING) {
            tracing::debug!("stop signaled");
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.flags.contains(RunFlags::STOPPING)
    }

    /// Queues a job of `kind` carrying `payload`.
    ///
    /// Aborts the process when the job pool is exhausted.
    pub fn queue(&self, kind: K, payload: u32) -> JobId {
        let id = match self.pop_locked(&self.free) {
            Some(id) => id,
            None => self.mint(),
        };
        let slot = self.slot(id.raw());
        slot.payload.store(payload, Ordering::Relaxed);
        slot.kind.store(kind_byte(kind), Ordering::Relaxed);
        {
            let mut list = self.available[kind.index()].lock();
            self.push(&mut list, id);
        }
        self.queued.fetch_add(1, Ordering::Relaxed);
        // The job is linked before it is counted, so a claim always finds
        // something to pop.
        self.state.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(?id, ?kind, payload, "job queued");
        id
    }

    /// Claims the next job, preferring `preferred`'s list.
    ///
    /// Blocks (spinning) while other workers may still produce work.
    /// Returns `None` once the run is stopping.
    pub fn next(&self, preferred: Option<K>) -> Option<JobId> {
        let backoff = Backoff::new();
        let mut stalled = false;
        loop {
            if self.is_stopping() {
                return None;
            }
            let word = self.state.load(Ordering::Acquire);
            let (available, stalled_workers) = unpack(word);
            if available > 0 {
                let claimed = pack(available - 1, stalled_workers - u32::from(stalled));
                if self
                    .state
                    .compare_exchange_weak(word, claimed, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Some(self.take(preferred));
                }
                continue;
            }
            if !stalled {
                let marked = pack(0, stalled_workers + 1);
                if self
                    .state
                    .compare_exchange_weak(word, marked, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    continue;
                }
                stalled = true;
                if stalled_workers + 1 == self.workers {
                    self.decide();
                    continue;
                }
            }
            backoff.snooze();
        }
    }

    /// Reads a job. Panics if `id` is stale.
    pub fn get(&self, id: JobId) -> Job<K> {
        self.try_get(id).unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_get(&self, id: JobId) -> Result<Job<K>, StaleJobId> {
        let index = id.slot();
        if index == 0 || index >= self.minted_slots() {
            return Err(StaleJobId { id, live: None });
        }
        let slot = &self.slots()[index];
        let live = slot.generation.load(Ordering::Acquire);
        if live != id.generation() {
            return Err(StaleJobId {
                id,
                live: Some(live),
            });
        }
        Ok(Job {
            id,
            kind: K::ALL[usize::from(slot.kind.load(Ordering::Relaxed))],
            payload: slot.payload.load(Ordering::Relaxed),
        })
    }

    /// Retires a claimed job.
    ///
    /// Success recycles the slot under a new generation. A failed critical
    /// job stops the run; any other failure parks the job, payload intact,
    /// on its kind's failed list. Panics if `id` is stale.
    pub fn finish(&self, id: JobId, success: bool) {
        let job = self.get(id);
        if success {
            let generation = id.generation().wrapping_add(1);
            self.slot(id.raw())
                .generation
                .store(generation, Ordering::Release);
            self.progress.fetch_add(1, Ordering::AcqRel);
            self.recycled.fetch_add(1, Ordering::Relaxed);
            let fresh = JobId::new(id.raw() & SLOT_MASK, generation);
            let mut free = self.free.lock();
            self.push(&mut free, fresh);
        } else if job.kind.is_critical() {
            self.critical.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(?id, kind = ?job.kind, payload = job.payload, "critical job failed");
            self.signal_stop();
        } else {
            {
                let mut failed = self.failed[job.kind.index()].lock();
                self.push(&mut failed, id);
            }
            self.parked.fetch_add(1, Ordering::AcqRel);
            tracing::trace!(?id, kind = ?job.kind, payload = job.payload, "job parked");
        }
    }

    pub fn stats(&self) -> JobStats {
        let (pending, _) = unpack(self.state.load(Ordering::Acquire));
        JobStats {
            queued: self.queued.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            critical: self.critical.load(Ordering::Relaxed),
            parked: u64::from(self.parked.load(Ordering::Acquire)),
            pending: u64::from(pending),
            stall_decisions: self.stall_decisions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    /// Jobs of `kind` waiting to be claimed.
    pub fn available_len(&self, kind: K) -> usize {
        self.available[kind.index()].lock().len as usize
    }

    /// Jobs of `kind` parked after a failure.
    pub fn failed_len(&self, kind: K) -> usize {
        self.failed[kind.index()].lock().len as usize
    }

    /// Recycled slots ready for reuse.
    pub fn free_len(&self) -> usize {
        self.free.lock().len as usize
    }

    /// Pops from the preferred list, else the first non-empty list in
    /// priority order. Only called after a successful claim, so some list
    /// holds a job for us.
    fn take(&self, preferred: Option<K>) -> JobId {
        let backoff = Backoff::new();
        loop {
            let first = preferred.map(|kind| &self.available[kind.index()]);
            for list in first.into_iter().chain(self.available.iter()) {
                if let Some(id) = self.pop_locked(list) {
                    tracing::trace!(?id, "job claimed");
                    return id;
                }
            }
            backoff.snooze();
        }
    }

    fn decide(&self) {
        let _decision = self.decision.lock();
        if self.is_stopping() || self.state.load(Ordering::Acquire) != pack(0, self.workers) {
            return;
        }
        self.stall_decisions.fetch_add(1, Ordering::Relaxed);
        let parked = self.parked.load(Ordering::Acquire);
        let progress = self.progress.swap(0, Ordering::AcqRel);
        if parked == 0 || progress == 0 {
            tracing::debug!(parked, progress, "all workers stalled, stopping");
            self.signal_stop();
            return;
        }

        let mut promoted = 0u32;
        for (available, failed) in self.available.iter().zip(self.failed.iter()) {
            let mut failed = failed.lock();
            if failed.len == 0 {
                continue;
            }
            let mut available = available.lock();
            promoted += failed.len;
            self.append(&mut available, &mut failed);
        }
        self.parked.fetch_sub(promoted, Ordering::AcqRel);
        self.retries.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(promoted, progress, "all workers stalled, retrying parked jobs");
        self.state.fetch_add(u64::from(promoted), Ordering::AcqRel);
    }

    fn mint(&self) -> JobId {
        let slot = self.minted.fetch_add(1, Ordering::AcqRel);
        if slot as usize >= self.capacity {
            tek_arena::fatal!("job pool is full ({} jobs)", self.capacity - 1);
        }
        JobId::new(slot, 0)
    }

    fn minted_slots(&self) -> usize {
        (self.minted.load(Ordering::Acquire) as usize).min(self.capacity)
    }

    fn slots(&self) -> &[JobSlot] {
        self.segments.slice(SLOTS)
    }

    fn slot(&self, raw: u32) -> &JobSlot {
        &self.slots()[(raw & SLOT_MASK) as usize]
    }

    fn pop_locked(&self, list: &SpinMutex<JobList>) -> Option<JobId> {
        let mut list = list.lock();
        self.pop(&mut list)
    }

    // List links are only touched under the list's lock, which orders them.

    fn push(&self, list: &mut JobList, id: JobId) {
        self.slot(id.raw()).next.store(0, Ordering::Relaxed);
        if list.tail == 0 {
            list.head = id.raw();
        } else {
            self.slot(list.tail).next.store(id.raw(), Ordering::Relaxed);
        }
        list.tail = id.raw();
        list.len += 1;
    }

    fn pop(&self, list: &mut JobList) -> Option<JobId> {
        let id = JobId::from_raw(list.head)?;
        list.head = self.slot(id.raw()).next.load(Ordering::Relaxed);
        if list.head == 0 {
            list.tail = 0;
        }
        list.len -= 1;
        Some(id)
    }

    /// Moves all of `from` to the tail of `to`.
    fn append(&self, to: &mut JobList, from: &mut JobList) {
        if from.head == 0 {
            return;
        }
        if to.tail == 0 {
            to.head = from.head;
        } else {
            self.slot(to.tail).next.store(from.head, Ordering::Relaxed);
        }
        to.tail = from.tail;
        to.len += from.len;
        *from = JobList::default();
    }
}

impl<K: JobKind> fmt::Debug for JobSystem<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSystem")
            .field("workers", &self.workers)
            .field("flags", &self.flags.load())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "JobSystem::new checks that kinds fit in a byte"
)]
fn kind_byte<K: JobKind>(kind: K) -> u8 {
    kind.index() as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
