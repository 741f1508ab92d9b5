use std::cmp;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::Ordering;

use crate::core::Region;
use crate::errors::RingError;
use crate::policy::Policy;
use crate::shm;

/// Fixed-capacity lock-free queue handle.
///
/// The handle exclusively owns its backing region: process-local heap for
/// rings built with [`RingBuffer::new`] or restored from a snapshot, a
/// shared-memory mapping for rings built with [`RingBuffer::create_shm`] /
/// [`RingBuffer::attach_shm`]. Dropping a shared handle unmaps the region
/// but leaves the named object alive; only [`crate::shm::shm_unlink`]
/// removes the name. Moving a handle transfers the mapping, so ordinary
/// move-and-drop can never unmap twice.
///
/// All operations are non-blocking: `Full`/`Empty` are immediate results,
/// and retry strategy (spin, yield, back off) belongs to the caller.
pub struct RingBuffer<P: Policy, T> {
    region: Region<T>,
    _policy: PhantomData<P>,
}

// SAFETY: counter mutation goes through the header atomics and slot access
// is serialized by the policy claim protocol; the region itself is stable
// for the lifetime of the handle.
unsafe impl<P: Policy, T: Send> Send for RingBuffer<P, T> {}
unsafe impl<P: Policy, T: Send> Sync for RingBuffer<P, T> {}

impl<P: Policy, T> RingBuffer<P, T> {
    /// Builds a process-local ring. A requested capacity of 0 silently
    /// uses capacity 1.
    pub fn new(capacity: usize) -> RingBuffer<P, T> {
        RingBuffer {
            region: Region::new_heap(P::MAGIC, capacity),
            _policy: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Elements currently queued: `write_pos - read_pos`.
    pub fn len(&self) -> usize {
        let header = self.region.header();
        let read = header.read_pos.load(Ordering::Acquire);
        let write = header.write_pos.load(Ordering::Acquire);
        write.saturating_sub(read) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Whether this handle maps a named shared-memory object.
    pub fn is_shared(&self) -> bool {
        self.region.is_shared()
    }

    /// Appends `value` at the back of the queue.
    pub fn push(&self, value: T) -> Result<(), RingError> {
        let header = self.region.header();
        let pos = P::claim_write(header)?;
        // SAFETY: the claim grants exclusive write access to this slot and
        // the consumer side cannot observe it until the publish below.
        unsafe { self.region.slot(pos).write(value) };
        P::publish_write(header, pos);
        Ok(())
    }

    /// Constructs the element directly inside the claimed slot, avoiding a
    /// temporary for types that are expensive to move.
    pub fn emplace<F>(&self, init: F) -> Result<(), RingError>
    where
        F: FnOnce() -> T,
    {
        let header = self.region.header();
        let pos = P::claim_write(header)?;
        // SAFETY: as in `push`; the closure result is written straight into
        // the slot.
        unsafe { self.region.slot(pos).write(init()) };
        P::publish_write(header, pos);
        Ok(())
    }

    /// Removes and returns the front element.
    pub fn pop(&self) -> Result<T, RingError> {
        let header = self.region.header();
        let pos = P::claim_read(header)?;
        // SAFETY: the claim grants exclusive read access to a slot whose
        // write was published before the claim could succeed.
        let value = unsafe { self.region.slot(pos).read() };
        P::publish_read(header, pos);
        Ok(value)
    }

    /// Borrows the front element without consuming it.
    ///
    /// Well-defined only while a single consumer role holds the ring;
    /// peeking while other consumers race `pop` is the caller's
    /// responsibility, as with the SPSC role contract.
    pub fn peek(&self) -> Result<&T, RingError> {
        let header = self.region.header();
        let pos = header.read_pos.load(Ordering::Relaxed);
        if header.write_pos.load(Ordering::Acquire) == pos {
            return Err(RingError::Empty);
        }
        // SAFETY: the slot at `pos` was published by a producer and is not
        // reused until `read_pos` advances past it.
        Ok(unsafe { self.region.slot(pos).peek() })
    }

    /// Pops until empty, returning everything removed in FIFO order.
    ///
    /// The drain is element-wise: each pop holds the per-policy guarantees
    /// but the drain as a whole is not atomic.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        while let Ok(value) = self.pop() {
            out.push(value);
        }
        out
    }

    pub(crate) fn region(&self) -> &Region<T> {
        &self.region
    }

    pub(crate) fn from_region(region: Region<T>) -> RingBuffer<P, T> {
        RingBuffer {
            region,
            _policy: PhantomData,
        }
    }
}

impl<P: Policy, T: Copy> RingBuffer<P, T> {
    /// Creates (or truncates) the named shared-memory object, sized for
    /// `capacity` slots, maps it, and initializes the header for this
    /// policy. A requested capacity of 0 silently uses capacity 1.
    ///
    /// Shared rings require `T: Copy`: the bytes may outlive this process
    /// and are never dropped element-wise, so the element type must not own
    /// heap or OS resources.
    pub fn create_shm(name: &str, capacity: usize) -> Result<RingBuffer<P, T>, RingError> {
        let capacity = cmp::max(capacity, 1);
        let mapping = shm::create(name, Region::<T>::byte_len(capacity))?;
        Ok(RingBuffer::from_region(Region::init_shared(
            mapping,
            P::MAGIC,
            capacity,
        )))
    }

    /// Opens and maps the existing named object, validating the stored
    /// magic against this policy. The header is left exactly as the
    /// creator (and every other attached process) has it.
    pub fn attach_shm(name: &str) -> Result<RingBuffer<P, T>, RingError> {
        let mapping = shm::open(name)?;
        let region = Region::open_shared(mapping, P::MAGIC)?;
        Ok(RingBuffer::from_region(region))
    }
}

impl<P: Policy, T> Drop for RingBuffer<P, T> {
    fn drop(&mut self) {
        // Elements inside a shared mapping are left untouched: the region
        // may outlive this process and other handles may still consume.
        if self.region.is_shared() || !mem::needs_drop::<T>() {
            return;
        }
        let header = self.region.header();
        let read = header.read_pos.load(Ordering::Acquire);
        let write = header.write_pos.load(Ordering::Acquire);
        for pos in read..write {
            // SAFETY: `&mut self` means no claim is in flight; every slot
            // in [read_pos, write_pos) holds an initialized element.
            unsafe { self.region.slot(pos).drop_in_place() };
        }
    }
}
