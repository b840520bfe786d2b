use super::*;
use crate::page_size;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread;

#[test]
fn test_publish_then_get() {
    let set = SegmentSet::reserve(&[page_size()]).unwrap();
    let slots = set.publish_slots::<String>(0);
    assert!(slots.get(3).is_none());

    let record = slots.publish(3, "three".to_string()).unwrap();
    assert_eq!(record, "three");
    assert_eq!(slots.get(3).map(String::as_str), Some("three"));
}

#[test]
fn test_records_live_inside_the_segment() {
    let set = SegmentSet::reserve(&[page_size()]).unwrap();
    let slots = set.publish_slots::<[u64; 4]>(0);
    let last = slots.capacity() - 1;
    let record = slots.publish(last, [1, 2, 3, 4]).unwrap();

    let addr = std::ptr::from_ref(record) as usize;
    assert!(addr >= set.addr(0));
    assert!(addr + mem::size_of::<[u64; 4]>() <= set.addr(0) + set.capacity(0));
}

#[test]
fn test_capacity_matches_bytes_for() {
    let bytes = PublishSlots::<u64>::bytes_for(100);
    let set = SegmentSet::reserve(&[bytes]).unwrap();
    let slots = set.publish_slots::<u64>(0);
    assert!(slots.capacity() >= 100);
    assert_eq!(slots.capacity(), set.capacity(0) / mem::size_of::<PublishSlot<u64>>());
}

#[test]
fn test_second_publish_is_rejected() {
    let set = SegmentSet::reserve(&[page_size()]).unwrap();
    let slots = set.publish_slots::<u64>(0);
    slots.publish(0, 1).unwrap();
    assert_eq!(slots.publish(0, 2), Err(2));
    assert_eq!(slots.get(0), Some(&1));
}

#[test]
fn test_wait_sees_late_publish() {
    let set = SegmentSet::reserve(&[page_size()]).unwrap();
    let slots = set.publish_slots::<u64>(0);
    let value = thread::scope(|s| {
        let reader = s.spawn(|| *set.publish_slots::<u64>(0).wait(5));
        thread::sleep(std::time::Duration::from_millis(10));
        slots.publish(5, 55).unwrap();
        reader.join().unwrap()
    });
    assert_eq!(value, 55);
}

#[test]
fn test_racing_publishers_one_wins() {
    let set = SegmentSet::reserve(&[page_size()]).unwrap();
    let wins = AtomicUsize::new(0);
    thread::scope(|s| {
        for value in 0..8u64 {
            let set = &set;
            let wins = &wins;
            s.spawn(move || {
                if set.publish_slots::<u64>(0).publish(1, value).is_ok() {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(wins.load(Ordering::Relaxed), 1);
    assert!(set.publish_slots::<u64>(0).get(1).is_some());
}

#[derive(Debug)]
struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_drop_published_runs_destructors() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut set = SegmentSet::reserve(&[page_size()]).unwrap();
    {
        let slots = set.publish_slots::<Counted>(0);
        slots.publish(0, Counted(drops.clone())).unwrap();
        slots.publish(2, Counted(drops.clone())).unwrap();
        // A rejected record comes back to the caller and drops there.
        let rejected = slots.publish(2, Counted(drops.clone())).unwrap_err();
        drop(rejected);
    }
    assert_eq!(drops.load(Ordering::Relaxed), 1);

    set.drop_published::<Counted>(0, 3);
    assert_eq!(drops.load(Ordering::Relaxed), 3);
    assert!(set.publish_slots::<Counted>(0).get(0).is_none());

    // Emptied slots can be published again.
    set.publish_slots::<Counted>(0)
        .publish(0, Counted(drops.clone()))
        .unwrap();
    set.drop_published::<Counted>(0, 1);
    assert_eq!(drops.load(Ordering::Relaxed), 4);
}
