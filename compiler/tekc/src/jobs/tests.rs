use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::thread;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Lex,
    Check,
}

impl JobKind for Kind {
    const ALL: &'static [Kind] = &[Kind::Lex, Kind::Check];

    fn index(self) -> usize {
        self as usize
    }

    fn is_critical(self) -> bool {
        self == Kind::Lex
    }
}

fn system(workers: usize) -> JobSystem<Kind> {
    JobSystem::new(workers, 4096).unwrap()
}

fn claim(jobs: &JobSystem<Kind>, preferred: Option<Kind>) -> Job<Kind> {
    let id = jobs.next(preferred).expect("a job should be available");
    jobs.get(id)
}

#[test]
fn test_fifo_within_kind() {
    let jobs = system(1);
    jobs.queue(Kind::Check, 1);
    jobs.queue(Kind::Check, 2);
    jobs.queue(Kind::Check, 3);
    let payloads: Vec<u32> = (0..3).map(|_| claim(&jobs, None).payload).collect();
    assert_eq!(payloads, vec![1, 2, 3]);
}

#[test]
fn test_preferred_kind_first() {
    let jobs = system(1);
    jobs.queue(Kind::Lex, 1);
    jobs.queue(Kind::Check, 2);
    let job = claim(&jobs, Some(Kind::Check));
    assert_eq!((job.kind, job.payload), (Kind::Check, 2));
    let job = claim(&jobs, Some(Kind::Check));
    assert_eq!((job.kind, job.payload), (Kind::Lex, 1));
}

#[test]
fn test_declaration_order_without_preference() {
    let jobs = system(1);
    jobs.queue(Kind::Check, 1);
    jobs.queue(Kind::Lex, 2);
    assert_eq!(claim(&jobs, None).kind, Kind::Lex);
    assert_eq!(claim(&jobs, None).kind, Kind::Check);
}

#[test]
fn test_recycled_slot_gets_new_generation() {
    let jobs = system(1);
    let first = jobs.queue(Kind::Check, 10);
    assert_eq!(jobs.next(None), Some(first));
    jobs.finish(first, true);
    assert_eq!(jobs.free_len(), 1);

    let second = jobs.queue(Kind::Check, 11);
    assert_eq!(second.slot(), first.slot());
    assert_eq!(second.generation(), first.generation() + 1);
    assert_eq!(jobs.get(second).payload, 11);
    assert_eq!(
        jobs.try_get(first),
        Err(StaleJobId {
            id: first,
            live: Some(second.generation()),
        })
    );
}

#[test]
#[should_panic(expected = "stale job id")]
fn test_get_with_stale_id_panics() {
    let jobs = system(1);
    let id = jobs.queue(Kind::Check, 0);
    jobs.next(None);
    jobs.finish(id, true);
    jobs.queue(Kind::Check, 0);
    jobs.get(id);
}

#[test]
#[should_panic(expected = "stale job id")]
fn test_finish_twice_panics() {
    let jobs = system(1);
    let id = jobs.queue(Kind::Check, 0);
    jobs.next(None);
    jobs.finish(id, true);
    jobs.finish(id, true);
}

#[test]
fn test_unminted_slot_is_stale() {
    let jobs = system(1);
    let bogus = JobId::from_raw(5).unwrap();
    assert_eq!(jobs.try_get(bogus), Err(StaleJobId { id: bogus, live: None }));
}

#[test]
fn test_generation_wraps() {
    let jobs = system(1);
    let first = jobs.queue(Kind::Check, 0);
    let mut id = first;
    for _ in 0..256 {
        assert_eq!(jobs.next(None), Some(id));
        jobs.finish(id, true);
        id = jobs.queue(Kind::Check, 0);
    }
    assert_eq!(id, first);
}

#[test]
fn test_retryable_failure_parks_job() {
    let jobs = system(1);
    let id = jobs.queue(Kind::Check, 7);
    jobs.next(None);
    jobs.finish(id, false);

    assert!(!jobs.is_stopping());
    assert_eq!(jobs.failed_len(Kind::Check), 1);
    assert_eq!(jobs.get(id).payload, 7);
    assert_eq!(jobs.stats().parked, 1);
}

#[test]
fn test_critical_failure_stops() {
    let jobs = system(1);
    let id = jobs.queue(Kind::Lex, 1);
    jobs.queue(Kind::Check, 2);
    jobs.next(None);
    jobs.finish(id, false);

    assert!(jobs.is_stopping());
    assert_eq!(jobs.next(None), None);
    let stats = jobs.stats();
    assert_eq!(stats.critical, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.queued, stats.recycled + stats.critical + stats.parked + stats.pending);
}

#[test]
fn test_stall_with_nothing_parked_stops() {
    let jobs = system(1);
    assert_eq!(jobs.next(None), None);
    assert!(jobs.is_stopping());
    assert_eq!(jobs.stats().stall_decisions, 1);
    assert_eq!(jobs.stats().retries, 0);
}

#[test]
fn test_stall_retries_after_progress() {
    let jobs = system(1);
    let check = jobs.queue(Kind::Check, 1);
    assert_eq!(jobs.next(None), Some(check));
    jobs.finish(check, false);

    let lex = jobs.queue(Kind::Lex, 2);
    assert_eq!(jobs.next(None), Some(lex));
    jobs.finish(lex, true);

    // Every worker is stalled, one job succeeded: the parked job comes back.
    assert_eq!(jobs.next(None), Some(check));
    assert_eq!(jobs.failed_len(Kind::Check), 0);
    jobs.finish(check, false);

    // No success since the last decision: stop.
    assert_eq!(jobs.next(None), None);
    let stats = jobs.stats();
    assert_eq!(stats.stall_decisions, 2);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.parked, 1);
}

#[test]
fn test_reset_after_a_finished_run() {
    let mut jobs = system(1);
    let check = jobs.queue(Kind::Check, 1);
    jobs.next(None);
    jobs.finish(check, false);
    assert_eq!(jobs.next(None), None);
    assert!(jobs.is_stopping());

    jobs.reset().unwrap();
    assert!(!jobs.is_stopping());
    assert_eq!(jobs.flags().load(), RunFlags::empty());
    assert_eq!(jobs.stats(), JobStats::default());
    assert_eq!(jobs.failed_len(Kind::Check), 0);
    assert_eq!(jobs.free_len(), 0);

    let fresh = jobs.queue(Kind::Lex, 9);
    assert_eq!((fresh.slot(), fresh.generation()), (1, 0));
    assert_eq!(jobs.next(None), Some(fresh));
    jobs.finish(fresh, true);
    assert_eq!(jobs.next(None), None);
    assert_eq!(jobs.stats().recycled, 1);
}

#[test]
fn test_concurrent_workers_claim_each_job_once() {
    const WORKERS: usize = 4;
    const JOBS: u32 = 2000;

    let jobs = system(WORKERS);
    for payload in 0..JOBS {
        jobs.queue(Kind::Check, payload);
    }
    let claims: Vec<AtomicU8> = (0..JOBS).map(|_| AtomicU8::new(0)).collect();

    thread::scope(|s| {
        for _ in 0..WORKERS {
            s.spawn(|| {
                let mut last = None;
                while let Some(id) = jobs.next(last) {
                    let job = jobs.get(id);
                    claims[job.payload as usize].fetch_add(1, Ordering::Relaxed);
                    last = Some(job.kind);
                    jobs.finish(id, true);
                }
            });
        }
    });

    assert!(claims.iter().all(|count| count.load(Ordering::Relaxed) == 1));
    let stats = jobs.stats();
    assert_eq!(stats.recycled, u64::from(JOBS));
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.stall_decisions, 1);
    assert_eq!(jobs.available_len(Kind::Check), 0);
}

proptest! {
    #[test]
    fn prop_every_job_is_accounted_for(
        ops in proptest::collection::vec((0u8..3, any::<bool>(), any::<bool>()), 1..200)
    ) {
        let jobs = system(1);
        let mut claimed = Vec::new();
        for (op, critical, success) in ops {
            match op {
                0 => {
                    jobs.queue(if critical { Kind::Lex } else { Kind::Check }, 0);
                }
                1 => {
                    if jobs.stats().pending > 0 && !jobs.is_stopping() {
                        claimed.push(jobs.next(None).unwrap());
                    }
                }
                _ => {
                    if let Some(id) = claimed.pop() {
                        jobs.finish(id, success);
                    }
                }
            }
        }
        let stats = jobs.stats();
        prop_assert_eq!(
            stats.queued,
            stats.recycled + stats.critical + stats.parked + stats.pending + claimed.len() as u64
        );
        prop_assert_eq!(stats.parked as usize, jobs.failed_len(Kind::Check));
    }
}
