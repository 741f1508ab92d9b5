use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{AttachError, RingError};
use crate::policy::{Mpmc, Spsc};
use crate::ring::RingBuffer;
use crate::shm::shm_unlink;

static SHM_NAME_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(tag: &str) -> String {
    format!(
        "/shmring_test_{}_{}_{}",
        tag,
        process::id(),
        SHM_NAME_COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

#[test]
fn attach_observes_pushes_made_through_the_creator() {
    let name = unique_name("roundtrip");
    let creator = RingBuffer::<Spsc, u64>::create_shm(&name, 32).expect("create_shm");
    let attached = RingBuffer::<Spsc, u64>::attach_shm(&name).expect("attach_shm");

    assert_eq!(attached.capacity(), 32);
    creator.push(7).unwrap();
    creator.push(8).unwrap();
    assert_eq!(attached.len(), 2);
    assert_eq!(attached.pop().unwrap(), 7);
    assert_eq!(attached.pop().unwrap(), 8);
    assert!(attached.is_empty());

    shm_unlink(&name).expect("shm_unlink");
}

#[test]
fn attach_after_unlink_fails() {
    let name = unique_name("unlink");
    let ring = RingBuffer::<Spsc, u64>::create_shm(&name, 8).expect("create_shm");
    ring.push(1).unwrap();

    shm_unlink(&name).expect("shm_unlink");

    // The existing mapping stays valid after the name is gone...
    assert_eq!(ring.pop().unwrap(), 1);

    // ...but no new attach can find it.
    let err = RingBuffer::<Spsc, u64>::attach_shm(&name)
        .err()
        .expect("attach after unlink must fail");
    assert!(matches!(err, RingError::AttachFailed(_)));
}

#[test]
fn attach_with_the_wrong_policy_is_rejected() {
    let name = unique_name("magic");
    let _creator = RingBuffer::<Spsc, u64>::create_shm(&name, 8).expect("create_shm");

    let err = RingBuffer::<Mpmc, u64>::attach_shm(&name)
        .err()
        .expect("policy mismatch must fail");
    assert!(matches!(
        err,
        RingError::AttachFailed(AttachError::MagicMismatch { .. })
    ));

    shm_unlink(&name).expect("shm_unlink");
}

#[test]
fn create_over_a_stale_name_reinitializes() {
    let name = unique_name("stale");
    let first = RingBuffer::<Spsc, u64>::create_shm(&name, 8).expect("create_shm");
    first.push(5).unwrap();
    // Unmap without unlinking: the name stays registered, as after a crash.
    drop(first);

    let second = RingBuffer::<Spsc, u64>::create_shm(&name, 8).expect("recreate over stale name");
    assert!(second.is_empty());

    shm_unlink(&name).expect("shm_unlink");
}

#[test]
fn moving_a_shared_ring_keeps_the_mapping_valid() {
    let name = unique_name("move");
    let ring = RingBuffer::<Mpmc, u64>::create_shm(&name, 4).expect("create_shm");
    ring.push(11).unwrap();

    let moved = ring;
    moved.push(22).unwrap();
    assert_eq!(moved.pop().unwrap(), 11);
    assert_eq!(moved.pop().unwrap(), 22);

    shm_unlink(&name).expect("shm_unlink");
}

#[test]
fn shared_ring_coerces_zero_capacity() {
    let name = unique_name("zerocap");
    let ring = RingBuffer::<Spsc, u64>::create_shm(&name, 0).expect("create_shm");
    assert_eq!(ring.capacity(), 1);

    let attached = RingBuffer::<Spsc, u64>::attach_shm(&name).expect("attach_shm");
    assert_eq!(attached.capacity(), 1);

    shm_unlink(&name).expect("shm_unlink");
}

#[test]
fn two_handles_share_one_queue_state() {
    let name = unique_name("shared_state");
    let producer = RingBuffer::<Mpmc, u64>::create_shm(&name, 16).expect("create_shm");
    let consumer = RingBuffer::<Mpmc, u64>::attach_shm(&name).expect("attach_shm");

    for value in 0..16 {
        producer.push(value).unwrap();
    }
    assert!(producer.is_full());
    assert!(consumer.is_full());
    assert!(matches!(consumer.push(99), Err(RingError::Full)));

    assert_eq!(consumer.drain(), (0..16).collect::<Vec<u64>>());
    assert!(producer.is_empty());

    shm_unlink(&name).expect("shm_unlink");
}
