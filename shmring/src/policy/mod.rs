use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::RingHeader;
use crate::errors::RingError;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Spsc {}
    impl Sealed for super::Spmc {}
    impl Sealed for super::Mpmc {}
}

/// A concurrency protocol layered over the shared header counters.
///
/// The steps pair up: a successful claim must be followed by exactly one
/// publish of the same position, after the slot payload has been written
/// (producer side) or moved out (consumer side). The committed counters
/// `write_pos`/`read_pos` only ever advance past fully written / fully read
/// slots, so the opposite side never observes a half-done slot and no slot
/// is delivered twice.
pub trait Policy: sealed::Sealed + 'static {
    /// Header magic identifying this policy inside a shared mapping.
    const MAGIC: u32;
    const NAME: &'static str;

    #[doc(hidden)]
    fn claim_write(header: &RingHeader) -> Result<u64, RingError>;
    #[doc(hidden)]
    fn publish_write(header: &RingHeader, pos: u64);
    #[doc(hidden)]
    fn claim_read(header: &RingHeader) -> Result<u64, RingError>;
    #[doc(hidden)]
    fn publish_read(header: &RingHeader, pos: u64);
}

/// Single producer thread, single consumer thread. Upholding the one
/// thread per role rule is the caller's responsibility; violating it is
/// undefined behavior, not a checked error.
pub struct Spsc;

/// Single producer thread, multiple competing consumer threads.
pub struct Spmc;

/// Multiple producer threads, multiple consumer threads.
pub struct Mpmc;

/// Claim-or-retry over a reservation counter.
///
/// `ready` is the validity predicate (has-room / has-data) and is
/// re-evaluated against a fresh opposing-counter load on every attempt.
/// `None` means the predicate failed, i.e. the ring is full or empty at
/// this moment.
#[inline]
fn claim<F>(counter: &AtomicU64, ready: F) -> Option<u64>
where
    F: Fn(u64) -> bool,
{
    let mut pos = counter.load(Ordering::Relaxed);
    loop {
        if !ready(pos) {
            return None;
        }
        match counter.compare_exchange_weak(pos, pos + 1, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return Some(pos),
            Err(current) => pos = current,
        }
    }
}

/// Publishes `pos` on a committed counter, in claim order.
///
/// Waits only for peers holding earlier claims to finish their payload
/// step; it is a bounded handoff, not a full/empty wait. The acquire loads
/// chain each publisher's release store so a reader of the counter observes
/// every payload at or below the value it loads.
#[inline]
fn commit(counter: &AtomicU64, pos: u64) {
    while counter.load(Ordering::Acquire) != pos {
        std::hint::spin_loop();
    }
    counter.store(pos + 1, Ordering::Release);
}

impl Policy for Spsc {
    const MAGIC: u32 = 0x5350_5343; // "SPSC"
    const NAME: &'static str = "spsc";

    fn claim_write(header: &RingHeader) -> Result<u64, RingError> {
        let pos = header.write_pos.load(Ordering::Relaxed);
        if pos - header.read_pos.load(Ordering::Acquire) == header.capacity {
            return Err(RingError::Full);
        }
        Ok(pos)
    }

    fn publish_write(header: &RingHeader, pos: u64) {
        header.write_pos.store(pos + 1, Ordering::Release);
    }

    fn claim_read(header: &RingHeader) -> Result<u64, RingError> {
        let pos = header.read_pos.load(Ordering::Relaxed);
        if header.write_pos.load(Ordering::Acquire) == pos {
            return Err(RingError::Empty);
        }
        Ok(pos)
    }

    fn publish_read(header: &RingHeader, pos: u64) {
        header.read_pos.store(pos + 1, Ordering::Release);
    }
}

impl Policy for Spmc {
    const MAGIC: u32 = 0x5350_4D43; // "SPMC"
    const NAME: &'static str = "spmc";

    // Producer side is the SPSC protocol: one writer, no contention.
    fn claim_write(header: &RingHeader) -> Result<u64, RingError> {
        Spsc::claim_write(header)
    }

    fn publish_write(header: &RingHeader, pos: u64) {
        Spsc::publish_write(header, pos)
    }

    fn claim_read(header: &RingHeader) -> Result<u64, RingError> {
        claim(&header.read_res, |pos| {
            pos != header.write_pos.load(Ordering::Acquire)
        })
        .ok_or(RingError::Empty)
    }

    fn publish_read(header: &RingHeader, pos: u64) {
        commit(&header.read_pos, pos);
    }
}

impl Policy for Mpmc {
    const MAGIC: u32 = 0x4D50_4D43; // "MPMC"
    const NAME: &'static str = "mpmc";

    fn claim_write(header: &RingHeader) -> Result<u64, RingError> {
        claim(&header.write_res, |pos| {
            pos - header.read_pos.load(Ordering::Acquire) < header.capacity
        })
        .ok_or(RingError::Full)
    }

    fn publish_write(header: &RingHeader, pos: u64) {
        commit(&header.write_pos, pos);
    }

    fn claim_read(header: &RingHeader) -> Result<u64, RingError> {
        claim(&header.read_res, |pos| {
            pos != header.write_pos.load(Ordering::Acquire)
        })
        .ok_or(RingError::Empty)
    }

    fn publish_read(header: &RingHeader, pos: u64) {
        commit(&header.read_pos, pos);
    }
}
