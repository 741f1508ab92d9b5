use std::sync::atomic::Ordering;

use serde_derive::{Deserialize, Serialize};

use crate::errors::RingError;
use crate::policy::Policy;
use crate::ring::RingBuffer;

/// Point-in-time capture of a ring's header state and, optionally, its
/// occupied elements.
///
/// A plain serializable value used for persistence and diagnostics. Under
/// concurrent mutation the capture is a consistent-enough view, not a
/// linearization point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub magic: u32,
    pub capacity: u64,
    pub write_pos: u64,
    pub read_pos: u64,
    /// Occupied elements in FIFO order; `None` for header-only captures.
    pub data: Option<Vec<T>>,
}

impl<P: Policy, T> RingBuffer<P, T> {
    /// Captures the header state without touching any payload.
    pub fn snapshot(&self) -> Snapshot<T> {
        let header = self.region().header();
        let read_pos = header.read_pos.load(Ordering::Acquire);
        let write_pos = header.write_pos.load(Ordering::Acquire);
        Snapshot {
            magic: header.magic,
            capacity: header.capacity,
            write_pos,
            read_pos,
            data: None,
        }
    }

    /// Materializes a fresh in-process, non-shared ring pre-loaded with the
    /// captured elements in their original FIFO order. The physical slot
    /// alignment is not reproduced, only the logical contents.
    pub fn from_snapshot(snapshot: Snapshot<T>) -> Result<RingBuffer<P, T>, RingError> {
        if snapshot.magic != P::MAGIC {
            return Err(RingError::RestoreFailed(format!(
                "snapshot magic {:#010x} does not match {} ({:#010x})",
                snapshot.magic,
                P::NAME,
                P::MAGIC
            )));
        }
        if snapshot.capacity == 0 {
            return Err(RingError::RestoreFailed("snapshot capacity is 0".to_string()));
        }
        if snapshot.write_pos < snapshot.read_pos
            || snapshot.write_pos - snapshot.read_pos > snapshot.capacity
        {
            return Err(RingError::RestoreFailed(format!(
                "inconsistent counters: write_pos={} read_pos={} capacity={}",
                snapshot.write_pos, snapshot.read_pos, snapshot.capacity
            )));
        }
        if let Some(data) = &snapshot.data {
            if data.len() as u64 > snapshot.capacity {
                return Err(RingError::RestoreFailed(format!(
                    "payload of {} elements exceeds capacity {}",
                    data.len(),
                    snapshot.capacity
                )));
            }
        }
        let ring = RingBuffer::new(snapshot.capacity as usize);
        if let Some(data) = snapshot.data {
            for value in data {
                ring.push(value)
                    .map_err(|_| RingError::RestoreFailed("ring overflowed during restore".to_string()))?;
            }
        }
        Ok(ring)
    }
}

impl<P: Policy, T: Clone> RingBuffer<P, T> {
    /// Captures the header state plus every occupied element in FIFO
    /// order, without consuming anything or mutating either counter.
    pub fn snapshot_with_data(&self) -> Snapshot<T> {
        let mut snapshot = self.snapshot();
        let mut data = Vec::with_capacity((snapshot.write_pos - snapshot.read_pos) as usize);
        for pos in snapshot.read_pos..snapshot.write_pos {
            // SAFETY: slots in [read_pos, write_pos) were published by
            // producers and stay initialized until a consumer claims past
            // them.
            data.push(unsafe { self.region().slot(pos).peek() }.clone());
        }
        snapshot.data = Some(data);
        snapshot
    }
}
